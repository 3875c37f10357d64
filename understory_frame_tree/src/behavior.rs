// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame customization points.
//!
//! A frame's behavior is a boxed [`FrameBehavior`]. Every hook has a default, so a
//! behavior only implements what it needs. Hooks that can change the tree receive a
//! [`FrameCx`] with mutable access to the whole [`FrameTree`]; paint hooks only get
//! the canvas.
//!
//! While a hook runs, its behavior is lent out of the tree. A nested call that would
//! reach the same frame (for example dispatching an event to it from inside its own
//! handler) sees the default hook instead.

use kurbo::{Point, Vec2};

use crate::event::{KeyboardEvent, MouseEvent, UpdateTick};
use crate::screen::Canvas;
use crate::tree::FrameTree;
use crate::types::{Color, DeviceId, FrameId};

/// Context handed to mutating hooks.
pub struct FrameCx<'a> {
    pub(crate) tree: &'a mut FrameTree,
    pub(crate) frame: FrameId,
}

impl core::fmt::Debug for FrameCx<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameCx")
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl FrameCx<'_> {
    /// The frame whose hook is running.
    pub fn id(&self) -> FrameId {
        self.frame
    }

    /// The tree, read-only.
    pub fn tree(&self) -> &FrameTree {
        self.tree
    }

    /// The tree, for structural changes from inside a hook.
    pub fn tree_mut(&mut self) -> &mut FrameTree {
        self.tree
    }

    /// Mark this frame's surface stale.
    pub fn set_redraw(&self) {
        self.tree.set_redraw(self.frame);
    }

    /// Capture mouse `device` for this frame. See [`FrameTree::capture_mouse`].
    pub fn capture_mouse(&mut self, device: DeviceId) -> bool {
        self.tree.capture_mouse(self.frame, device)
    }

    /// Release mouse `device` if this frame holds it.
    pub fn release_mouse(&mut self, device: DeviceId) {
        self.tree.release_mouse(self.frame, device);
    }

    /// Capture keyboard `device` for this frame. See [`FrameTree::capture_keyboard`].
    pub fn capture_keyboard(&mut self, device: DeviceId) -> bool {
        self.tree.capture_keyboard(self.frame, device)
    }

    /// Release keyboard `device` if this frame holds it.
    pub fn release_keyboard(&mut self, device: DeviceId) {
        self.tree.release_keyboard(self.frame, device);
    }
}

/// Behavior attached to a frame.
///
/// Positions passed to input hooks are in the frame's local space; deltas are the
/// difference of the mapped current and previous positions, so they stay correct
/// under rotation and content transforms.
#[allow(unused_variables, reason = "Default hook bodies ignore their arguments.")]
pub trait FrameBehavior {
    /// The frame was attached to a screen.
    fn on_loaded(&mut self, cx: &mut FrameCx<'_>) {}

    /// The frame is about to be detached from its screen.
    fn on_unload(&mut self, cx: &mut FrameCx<'_>) {}

    /// The frame's content resolution changed.
    fn on_content_resized(&mut self, cx: &mut FrameCx<'_>) {}

    /// Per-frame update, called parent first.
    fn on_update(&mut self, cx: &mut FrameCx<'_>, tick: &UpdateTick) {}

    /// Paint the frame's own content, beneath its children. Clears to white by default.
    fn on_draw(&self, canvas: &mut dyn Canvas) {
        canvas.clear(Color::WHITE);
    }

    /// Paint on top of the frame's children.
    fn on_draw_overlay(&self, canvas: &mut dyn Canvas) {}

    /// Intercept a keyboard event headed for a descendant (or this frame).
    /// Return `true` to consume it and stop dispatch.
    fn preprocess_keyboard_event(&mut self, cx: &mut FrameCx<'_>, event: &KeyboardEvent) -> bool {
        false
    }

    /// Intercept a mouse event headed for a descendant (or this frame).
    /// Return `true` to consume it and stop dispatch.
    fn preprocess_mouse_event(
        &mut self,
        cx: &mut FrameCx<'_>,
        event: &MouseEvent,
        pos: Point,
        delta: Vec2,
    ) -> bool {
        false
    }

    /// Handle a keyboard event delivered to this frame.
    fn on_keyboard_event(&mut self, cx: &mut FrameCx<'_>, event: &KeyboardEvent) {}

    /// Handle a mouse event delivered to this frame.
    fn on_mouse_event(&mut self, cx: &mut FrameCx<'_>, event: &MouseEvent, pos: Point, delta: Vec2) {}

    /// Mouse capture for `device` was taken away because the frame was detached.
    fn on_mouse_released(&mut self, cx: &mut FrameCx<'_>, device: DeviceId) {}

    /// Keyboard capture for `device` was taken away because the frame was detached.
    fn on_keyboard_released(&mut self, cx: &mut FrameCx<'_>, device: DeviceId) {}

    /// Whether a local point belongs to this frame at all.
    fn hit_test(&self, pos: Point) -> bool {
        true
    }

    /// Whether children may be searched for a local point.
    fn content_hit_test(&self, pos: Point) -> bool {
        true
    }
}

/// Behavior with every hook left at its default.
#[derive(Copy, Clone, Debug, Default)]
pub struct PlainFrame;

impl FrameBehavior for PlainFrame {}
