// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Frame Tree: a retained tree of composited frames with nested coordinate spaces.
//!
//! A *frame* is a rectangular region that paints into its own cached surface. Frames nest:
//! each child occupies a transformed unit box inside its parent, and each parent composites its
//! children's surfaces back to front after painting its own content. One frame, the *root*, is
//! bound to a host [`Screen`] and paints straight to it.
//!
//! - Coordinate spaces per frame: *normalized* (the unit box), *local* (content space, scaled by
//!   the content scale and offset by a content transform), and *pixel* (the surface).
//! - Surfaces are allocated lazily at the resolution the frame projects to on screen, and only
//!   repainted when marked dirty.
//! - Input is routed with an intercept pass from the root down, hit testing toward the
//!   frontmost child, and per-device keyboard and mouse capture.
//!
//! ## Coordinate spaces
//!
//! A child's [`FrameGeometry::transform`] maps its normalized box into the parent's *local*
//! space. Local space spans `[0, content_scale]` before the content transform is applied, so a
//! frame with a content scale of `800 x 600` can lay out children in pixel-like units regardless
//! of how large it is drawn. [`FrameTree::local_to_root`] and [`FrameTree::root_to_local`] chain
//! these maps through every ancestor.
//!
//! ## Lifecycle
//!
//! Frames are created detached with [`FrameTree::insert`]. Attaching a screen with
//! [`FrameTree::attach_screen`] *loads* the root's subtree: each frame receives
//! [`FrameBehavior::on_loaded`] and a content resolution. Children added to a loaded parent load
//! immediately; removed children unload and give up any input they had captured.
//!
//! ## Drawing
//!
//! [`FrameTree::draw`] walks from a frame downward, skipping hidden children and children whose
//! box lies fully outside the parent's content bounds. Each dirty frame opens a [`Canvas`] on its
//! surface, calls [`FrameBehavior::on_draw`], composites its children as [`TexturedQuad`]s, then
//! calls [`FrameBehavior::on_draw_overlay`]. Clean frames are reused as they are.
//!
//! ## Input
//!
//! - [`FrameTree::route_mouse_event`] and [`FrameTree::route_keyboard_event`] accept host events.
//! - [`FrameTree::dispatch_mouse_event`] and [`FrameTree::dispatch_keyboard_event`] deliver to a
//!   specific frame.
//! - [`FrameTree::capture_mouse`] / [`FrameTree::capture_keyboard`] claim a device;
//!   [`FrameTree::update_hover`] tracks which frame sits under the pointer.
//!
//! Claims are stored in the screen's [`InputClaims`], so they are dropped along with the screen.
//!
//! ## Example
//!
//! ```
//! use kurbo::{Affine, Point, Size};
//! use understory_frame_tree::{FrameTree, PlainFrame};
//!
//! let mut tree = FrameTree::new();
//! let root = tree.insert(PlainFrame);
//! let panel = tree.insert(PlainFrame);
//! tree.set_content_scale(root, Size::new(800.0, 600.0)).unwrap();
//! tree.add_child(root, panel).unwrap();
//!
//! // The panel covers the right half of its parent's local space.
//! tree.set_transform(panel, Affine::new([400.0, 0.0, 0.0, 600.0, 400.0, 0.0]))
//!     .unwrap();
//! assert_eq!(
//!     tree.local_to_super(panel, Point::new(0.5, 0.5)),
//!     Some(Point::new(600.0, 300.0))
//! );
//! ```
//!
//! This crate uses `std`: surfaces are reference counted and redraw flags use interior mutability.

mod behavior;
mod claims;
mod error;
mod event;
mod geometry;
mod input;
mod render;
mod screen;
mod tree;
mod types;
mod util;

#[cfg(test)]
mod testing;

pub use behavior::{FrameBehavior, FrameCx, PlainFrame};
pub use claims::{InputClaims, ReleasedDevices};
pub use error::FrameError;
pub use event::{KeyboardEvent, KeyboardEventKind, MouseEvent, MouseEventKind, UpdateTick};
pub use geometry::{Containment, FrameGeometry, FrameTransforms};
pub use input::HoverChange;
pub use screen::{Canvas, RenderTarget, Screen, TexturedQuad};
pub use tree::FrameTree;
pub use types::{BlendMode, Color, DeviceId, FrameFlags, FrameId, FrameTreeConfig, PixelFormat};
