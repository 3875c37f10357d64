// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator interfaces implemented by the host.
//!
//! The frame tree does not talk to a window system or a graphics device directly.
//! The host supplies a [`Screen`] (resolution, surface allocation, pointer mapping,
//! and the per-device [`InputClaims`]), and the screen hands out [`Canvas`] values
//! that paint into a [`RenderTarget`] or into the live screen surface.

use std::rc::Rc;

use kurbo::{Affine, Point, Rect, Size};

use crate::claims::InputClaims;
use crate::types::{BlendMode, Color, DeviceId, FrameId, PixelFormat};

/// An offscreen color surface that can be drawn into and later sampled.
pub trait RenderTarget: core::fmt::Debug {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Pixel format the surface was created with.
    fn pixel_format(&self) -> PixelFormat;
}

/// A cached frame surface drawn as a transformed, tinted, blended quad.
#[derive(Clone, Copy, Debug)]
pub struct TexturedQuad<'a> {
    /// Destination rectangle before `transform`.
    pub rect: Rect,
    /// Destination transform, in the canvas's content space.
    pub transform: Affine,
    /// Source rectangle in normalized texture coordinates.
    pub tex_rect: Rect,
    /// Transform applied to texture coordinates.
    pub tex_transform: Affine,
    /// Texture to sample.
    pub texture: &'a dyn RenderTarget,
    /// Tint multiplied into the sampled color.
    pub color: Color,
    /// How the quad combines with what is already on the canvas.
    pub blend: BlendMode,
}

/// A paintable surface bound to a render target or to the screen.
pub trait Canvas {
    /// Pixel rectangle painted by subsequent calls.
    fn set_viewport(&mut self, viewport: Rect);

    /// Logical coordinate range mapped onto the viewport.
    fn set_content_bounds(&mut self, bounds: Rect);

    /// Transform applied to logical coordinates before the bounds mapping.
    fn set_content_transform(&mut self, transform: Affine);

    /// Fill the viewport with `color`.
    fn clear(&mut self, color: Color);

    /// Draw a textured quad.
    fn draw_textured_rect(&mut self, quad: &TexturedQuad<'_>);

    /// Finish recording and submit the work.
    fn commit(&mut self);
}

/// The screen (device context) that owns the root frame and the device timeline.
pub trait Screen {
    /// Current resolution of the live surface, in pixels.
    fn resolution(&self) -> Size;

    /// Allocate an offscreen color target. `None` if allocation failed.
    fn create_target(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Option<Rc<dyn RenderTarget>>;

    /// Create a canvas painting into `target`, or into the live screen surface when
    /// `target` is `None`. `None` if no canvas could be created.
    fn create_canvas(&self, target: Option<Rc<dyn RenderTarget>>) -> Option<Box<dyn Canvas>>;

    /// Map a window-space position to normalized screen space `[0,1]²`.
    fn window_to_screen(&self, p: Point) -> Point;

    /// Current pointer position of `device` in window space, if known.
    fn mouse_position(&self, device: DeviceId) -> Option<Point>;

    /// Capture and hover tables.
    fn claims(&self) -> &InputClaims;

    /// Mutable capture and hover tables.
    fn claims_mut(&mut self) -> &mut InputClaims;

    /// Notification that the pointer left `frame` for every device hovering it.
    ///
    /// Implementations that track enter/leave state can override this; the default
    /// only updates the hover table.
    fn leave_hover_frame(&mut self, frame: FrameId) {
        self.claims_mut().leave_hover_frame(frame);
    }
}
