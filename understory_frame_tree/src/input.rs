// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input routing: dispatch, interception, hover, and capture.
//!
//! ## Dispatch
//!
//! Every event first runs an *intercept* pass from the root down to the target,
//! calling [`FrameBehavior::preprocess_keyboard_event`] or
//! [`FrameBehavior::preprocess_mouse_event`] on each frame of the path. The first
//! frame that returns `true` consumes the event. Otherwise the target handles it if it
//! can.
//!
//! Mouse events additionally hit-test downward when `propagate` is set: the event is
//! offered to the frontmost visible child whose box contains the position, and only
//! falls back to the current frame if no child takes it. With `propagate` unset the
//! call is a direct delivery to a capturing frame and skips the downward search.
//!
//! ## Claims
//!
//! Capture and hover live in the screen's [`InputClaims`](crate::InputClaims). Frames
//! can only capture input they could currently handle, and a frame outside the
//! root's tree never reports a capture.
//!
//! [`FrameBehavior::preprocess_keyboard_event`]: crate::FrameBehavior::preprocess_keyboard_event
//! [`FrameBehavior::preprocess_mouse_event`]: crate::FrameBehavior::preprocess_mouse_event

use kurbo::{Point, Vec2};
use smallvec::SmallVec;
use tracing::trace;

use crate::behavior::PlainFrame;
use crate::event::{KeyboardEvent, MouseEvent};
use crate::screen::Screen;
use crate::tree::FrameTree;
use crate::types::{DeviceId, FrameFlags, FrameId};
use crate::util::in_unit_box;

/// Path from the root of a subtree down to a frame, inclusive.
type FramePath = SmallVec<[FrameId; 16]>;

/// Hover transition produced by [`FrameTree::update_hover`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HoverChange {
    /// Frame that was hovered before the update.
    pub previous: Option<FrameId>,
    /// Frame hovered now.
    pub current: Option<FrameId>,
}

impl HoverChange {
    /// Returns `true` if the hovered frame changed.
    pub fn is_changed(&self) -> bool {
        self.previous != self.current
    }
}

impl FrameTree {
    // --- predicates ---

    /// Enabled and opted into input events.
    pub fn can_handle_keyboard(&self, id: FrameId) -> bool {
        self.node_opt(id).is_some_and(|n| {
            n.flags
                .contains(FrameFlags::ENABLED | FrameFlags::INPUT_EVENTS)
        })
    }

    /// Like [`FrameTree::can_handle_keyboard`], and also visible on screen.
    pub fn can_handle_mouse(&self, id: FrameId) -> bool {
        self.can_handle_keyboard(id) && self.is_visible_on_screen(id)
    }

    /// Whether the frame can currently be seen.
    ///
    /// The root is always visible. Any other frame is visible if it is loaded, not
    /// hidden, and its parent is visible.
    pub fn is_visible_on_screen(&self, id: FrameId) -> bool {
        let Some(node) = self.node_opt(id) else {
            return false;
        };
        if !node.loaded || self.screen.is_none() {
            return false;
        }
        if self.is_root(id) {
            return true;
        }
        if node.is_hidden() {
            return false;
        }
        node.parent.is_some_and(|p| self.is_visible_on_screen(p))
    }

    // --- dispatch ---

    /// Deliver a keyboard event to `id` after the intercept pass.
    ///
    /// Returns `true` if an ancestor intercepted it or `id` handled it. A frame whose
    /// behavior is busy in one of its own hooks does not handle nested events.
    pub fn dispatch_keyboard_event(&mut self, id: FrameId, event: &KeyboardEvent) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        for frame in self.path_to(id) {
            let consumed = self
                .with_behavior(frame, |b, cx| b.preprocess_keyboard_event(cx, event))
                .unwrap_or(false);
            if consumed {
                trace!(?frame, target = ?id, "keyboard event intercepted");
                return true;
            }
        }
        self.can_handle_keyboard(id)
            && self
                .with_behavior(id, |b, cx| b.on_keyboard_event(cx, event))
                .is_some()
    }

    /// Deliver a mouse event at `pos` (with movement `delta`) in `id`'s normalized space.
    ///
    /// Positions handed to hooks are in local space, and deltas are the difference of
    /// the mapped current and previous positions. Returns `true` if the event was
    /// consumed anywhere.
    pub fn dispatch_mouse_event(
        &mut self,
        id: FrameId,
        event: &MouseEvent,
        pos: Point,
        delta: Vec2,
        propagate: bool,
    ) -> bool {
        let Some(node) = self.node_opt(id) else {
            return false;
        };
        let to_local = node.geometry.local_from_normalized_transform();
        let local = to_local * pos;
        let local_old = to_local * (pos - delta);

        if propagate {
            let behavior = self.behavior(id).unwrap_or(&PlainFrame);
            if !behavior.hit_test(local) {
                return false;
            }
            if behavior.content_hit_test(local) {
                for child in self.children_snapshot(id) {
                    let Some(c) = self.node_opt(child) else {
                        continue;
                    };
                    if c.is_hidden() {
                        continue;
                    }
                    let inv = c.geometry.transform_inverse();
                    let in_child = inv * local;
                    if !in_unit_box(in_child) {
                        continue;
                    }
                    let child_delta = in_child - inv * local_old;
                    if self.dispatch_mouse_event(child, event, in_child, child_delta, true) {
                        return true;
                    }
                }
            }
        } else if self.intercept_mouse(id, event, local, local_old) {
            return true;
        }

        if !self.can_handle_mouse(id) {
            return false;
        }
        if propagate && self.intercept_mouse(id, event, local, local_old) {
            return true;
        }
        self.with_behavior(id, |b, cx| {
            b.on_mouse_event(cx, event, local, local - local_old);
        })
        .is_some()
    }

    /// Run the mouse intercept pass for `id`, mapping positions up the path.
    fn intercept_mouse(&mut self, id: FrameId, event: &MouseEvent, pos: Point, old: Point) -> bool {
        let mut chain: SmallVec<[(FrameId, Point, Point); 16]> = SmallVec::new();
        let mut cursor = Some((id, pos, old));
        while let Some((frame, p, o)) = cursor {
            chain.push((frame, p, o));
            cursor = self.node_opt(frame).and_then(|n| {
                let to_super = n.geometry.local_to_super_transform();
                n.parent.map(|parent| (parent, to_super * p, to_super * o))
            });
        }
        for &(frame, p, o) in chain.iter().rev() {
            let consumed = self
                .with_behavior(frame, |b, cx| b.preprocess_mouse_event(cx, event, p, p - o))
                .unwrap_or(false);
            if consumed {
                trace!(?frame, target = ?id, "mouse event intercepted");
                return true;
            }
        }
        false
    }

    /// Deepest frame under `pos` (in `id`'s normalized space) that can take mouse input.
    pub fn find_hover_frame(&self, id: FrameId, pos: Point) -> Option<FrameId> {
        let node = self.node_opt(id)?;
        if node.is_hidden() || !in_unit_box(pos) {
            return None;
        }
        let local = node.geometry.local_from_normalized_transform() * pos;
        let behavior = self.behavior(id).unwrap_or(&PlainFrame);
        if !behavior.hit_test(local) {
            return None;
        }
        if behavior.content_hit_test(local) {
            for &child in &node.children {
                let Some(c) = self.node_opt(child) else {
                    continue;
                };
                let hover = self.find_hover_frame(child, c.geometry.transform_inverse() * local);
                if hover.is_some() {
                    return hover;
                }
            }
        }
        self.can_handle_mouse(id).then_some(id)
    }

    // --- host routing ---

    /// Send a keyboard event to the frame capturing its device.
    ///
    /// Returns `false` if no frame in the root's tree holds the keyboard.
    pub fn route_keyboard_event(&mut self, event: &KeyboardEvent) -> bool {
        let target = self
            .screen
            .as_deref()
            .and_then(|s| s.claims().key_frame(event.device));
        match target {
            Some(target) if self.in_root_tree(target) => {
                self.dispatch_keyboard_event(target, event)
            }
            _ => false,
        }
    }

    /// Send a window-space mouse event into the tree.
    ///
    /// If a frame captured the device the event goes straight to it, remapped into its
    /// normalized space; otherwise it is hit-tested from the root.
    pub fn route_mouse_event(&mut self, event: &MouseEvent) -> bool {
        let (Some(root), Some(screen)) = (self.root, self.screen.as_deref()) else {
            return false;
        };
        let pos = screen.window_to_screen(event.location);
        let old = screen.window_to_screen(event.location - event.delta);
        let captured = screen
            .claims()
            .focus_frame(event.device)
            .filter(|&f| self.in_root_tree(f));

        let Some(target) = captured else {
            return self.dispatch_mouse_event(root, event, pos, pos - old, true);
        };
        let Some(from_root) = self.local_from_root_transform(target) else {
            return false;
        };
        let to_target = self.node(target).geometry.normalized_from_local_transform()
            * from_root
            * self.node(root).geometry.local_from_normalized_transform();
        let p = to_target * pos;
        let o = to_target * old;
        self.dispatch_mouse_event(target, event, p, p - o, false)
    }

    /// Recompute the hover frame of `device` for a window-space pointer position.
    pub fn update_hover(&mut self, device: DeviceId, window_pos: Point) -> HoverChange {
        let (Some(root), Some(screen)) = (self.root, self.screen.as_deref()) else {
            return HoverChange::default();
        };
        let pos = screen.window_to_screen(window_pos);
        let current = self.find_hover_frame(root, pos);
        let previous = self
            .screen
            .as_deref_mut()
            .and_then(|s| s.claims_mut().set_hover_frame(device, current));
        HoverChange { previous, current }
    }

    // --- capture ---

    /// Take keyboard capture for `device`. Fails if another frame holds it or the
    /// frame cannot handle keyboard input.
    pub fn capture_keyboard(&mut self, id: FrameId, device: DeviceId) -> bool {
        if !self.is_loaded(id) || !self.can_handle_keyboard(id) {
            return false;
        }
        self.screen
            .as_deref_mut()
            .is_some_and(|s| s.claims_mut().set_key_frame(device, id))
    }

    /// Take mouse capture for `device`. Fails if another frame holds it or the frame
    /// cannot handle mouse input.
    pub fn capture_mouse(&mut self, id: FrameId, device: DeviceId) -> bool {
        if !self.can_handle_mouse(id) {
            return false;
        }
        self.screen
            .as_deref_mut()
            .is_some_and(|s| s.claims_mut().set_focus_frame(device, id))
    }

    /// Release keyboard capture for `device` if `id` holds it.
    pub fn release_keyboard(&mut self, id: FrameId, device: DeviceId) {
        if let Some(screen) = self.loaded_screen_mut(id) {
            screen.claims_mut().remove_key_frame(device, id);
        }
    }

    /// Release mouse capture for `device` if `id` holds it.
    pub fn release_mouse(&mut self, id: FrameId, device: DeviceId) {
        if let Some(screen) = self.loaded_screen_mut(id) {
            screen.claims_mut().remove_focus_frame(device, id);
        }
    }

    /// Release every keyboard `id` holds.
    pub fn release_all_keyboards(&mut self, id: FrameId) {
        if let Some(screen) = self.loaded_screen_mut(id) {
            screen.claims_mut().remove_key_frame_for_any_device(id);
        }
    }

    /// Release every mouse `id` holds.
    pub fn release_all_mice(&mut self, id: FrameId) {
        if let Some(screen) = self.loaded_screen_mut(id) {
            screen.claims_mut().remove_focus_frame_for_any_device(id);
        }
    }

    /// Returns `true` if `id` is in the root's tree and holds keyboard `device`.
    pub fn is_keyboard_captured_by(&self, id: FrameId, device: DeviceId) -> bool {
        self.in_root_tree(id)
            && self
                .screen
                .as_deref()
                .is_some_and(|s| s.claims().key_frame(device) == Some(id))
    }

    /// Returns `true` if `id` is in the root's tree and holds mouse `device`.
    pub fn is_mouse_captured_by(&self, id: FrameId, device: DeviceId) -> bool {
        self.in_root_tree(id)
            && self
                .screen
                .as_deref()
                .is_some_and(|s| s.claims().focus_frame(device) == Some(id))
    }

    /// Returns `true` if `id` is the hover frame of `device`.
    pub fn is_mouse_hover(&self, id: FrameId, device: DeviceId) -> bool {
        self.screen
            .as_deref()
            .is_some_and(|s| s.claims().hover_frame(device) == Some(id))
    }

    /// Pointer position of `device` in `id`'s local space.
    ///
    /// `None` if the frame is outside the root's tree or the screen does not know
    /// where the pointer is.
    pub fn mouse_position(&self, id: FrameId, device: DeviceId) -> Option<Point> {
        let root = self.root?;
        if !self.is_descendant_of(id, root) {
            return None;
        }
        let screen = self.screen.as_deref()?;
        let normalized = screen.window_to_screen(screen.mouse_position(device)?);
        let root_local = self.node(root).geometry.local_from_normalized_transform() * normalized;
        Some(self.local_from_root_transform(id)? * root_local)
    }

    // --- helpers ---

    fn in_root_tree(&self, id: FrameId) -> bool {
        self.root.is_some_and(|root| self.is_descendant_of(id, root))
    }

    fn loaded_screen_mut(&mut self, id: FrameId) -> Option<&mut (dyn Screen + 'static)> {
        if self.is_loaded(id) {
            self.screen.as_deref_mut()
        } else {
            None
        }
    }

    /// Frames from the topmost ancestor down to `id`.
    fn path_to(&self, id: FrameId) -> FramePath {
        let mut path = FramePath::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.parent_of(current);
        }
        path.reverse();
        path
    }
}
