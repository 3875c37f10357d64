// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the frame tree: identifiers, flags, colors, and configuration.

/// Identifier for a frame in the tree (generational).
///
/// A `FrameId` stays valid until the frame is removed with
/// [`FrameTree::remove`](crate::FrameTree::remove). Slots are reused, but each
/// reuse bumps the generation, so an old id never aliases a new frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FrameId(pub(crate) u32, pub(crate) u32);

impl FrameId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of an input device (keyboard or pointer) as reported by the host.
pub type DeviceId = u32;

bitflags::bitflags! {
    /// Frame flags controlling visibility and interaction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        /// Frame is drawn and hit-tested. Cleared by [`FrameTree::set_hidden`](crate::FrameTree::set_hidden).
        const VISIBLE      = 0b0000_0001;
        /// Frame may receive input at all.
        const ENABLED      = 0b0000_0010;
        /// Frame opts into user input events while enabled.
        const INPUT_EVENTS = 0b0000_0100;
    }
}

impl Default for FrameFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::ENABLED | Self::INPUT_EVENTS
    }
}

/// Straight-alpha RGBA color used to tint a frame when it is composited into its parent.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    /// Red, `0.0..=1.0`.
    pub r: f32,
    /// Green, `0.0..=1.0`.
    pub g: f32,
    /// Blue, `0.0..=1.0`.
    pub b: f32,
    /// Alpha, `0.0..=1.0`.
    pub a: f32,
}

impl Color {
    /// Opaque white; compositing with it leaves a texture untinted.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a color from its components.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Blend state used when a frame's cached surface is drawn into its parent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    /// Source replaces destination.
    #[default]
    Opaque,
    /// Source-over alpha blending.
    Alpha,
    /// Source is added to destination.
    Additive,
    /// Source multiplies destination.
    Multiply,
}

/// Pixel format of an offscreen render target.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    /// Single 8-bit red channel.
    R8Unorm,
    /// 8-bit RGBA, linear.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, linear.
    Bgra8Unorm,
    /// 8-bit BGRA, sRGB encoded.
    Bgra8UnormSrgb,
    /// 10-bit RGB with 2-bit alpha.
    Rgb10a2Unorm,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
    /// 8-bit stencil.
    Stencil8,
}

impl PixelFormat {
    /// Returns `true` if the format can back a color render target.
    pub const fn is_color_format(self) -> bool {
        !matches!(
            self,
            Self::Depth32Float | Self::Depth24Stencil8 | Self::Stencil8
        )
    }
}

/// Tunables for a [`FrameTree`](crate::FrameTree).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameTreeConfig {
    /// Largest width or height, in pixels, of a frame's backing surface.
    pub max_texture_dimension: u32,
    /// Smallest allowed content scale component.
    pub min_content_scale: f64,
    /// Content scale changes smaller than this (per axis) are ignored.
    pub scale_epsilon: f64,
}

impl Default for FrameTreeConfig {
    fn default() -> Self {
        Self {
            max_texture_dimension: 1 << 14,
            min_content_scale: 1e-6,
            scale_epsilon: f64::from(f32::EPSILON),
        }
    }
}
