// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolution tracking and the draw pass.
//!
//! Each loaded frame keeps a pixel resolution derived from how large its box appears
//! in its parent's surface, and optionally a cached surface of that size. A draw walks
//! the subtree depth first, repaints stale surfaces, and composites children into
//! their parents back to front.

use std::rc::Rc;

use kurbo::{Affine, Point, Rect, Size};
use tracing::{debug, error, info, trace, warn};

use crate::behavior::PlainFrame;
use crate::screen::{Canvas, RenderTarget, TexturedQuad};
use crate::tree::{FrameTree, Node};
use crate::types::FrameId;
use crate::util::{UNIT_RECT, pixel_extent, round_pixels};

impl FrameTree {
    /// Recompute the content resolution of `id` and its subtree.
    ///
    /// The root follows the screen's resolution; other frames take the projected size
    /// of their box in the parent's pixel space, clamped to
    /// [`FrameTreeConfig::max_texture_dimension`](crate::FrameTreeConfig::max_texture_dimension).
    /// A frame whose resolution changed gets [`FrameBehavior::on_content_resized`] and
    /// is marked dirty; a non-root frame also loses its cached surface.
    ///
    /// Call this on the root after the screen resizes. Unloaded frames are skipped.
    ///
    /// [`FrameBehavior::on_content_resized`]: crate::FrameBehavior::on_content_resized
    pub fn update_content_resolution(&mut self, id: FrameId) {
        if !self.is_loaded(id) {
            return;
        }
        let target = if self.is_root(id) {
            let Some(screen) = self.screen.as_deref() else {
                return;
            };
            let size = screen.resolution();
            Size::new(
                round_pixels(size.width).max(1.0),
                round_pixels(size.height).max(1.0),
            )
        } else {
            self.calculate_content_resolution(id)
        };

        let is_root = self.is_root(id);
        let node = self.node_mut(id);
        let current = node.geometry.content_resolution();
        let resized = round_pixels(current.width) != target.width
            || round_pixels(current.height) != target.height;
        node.geometry.set_content_resolution(target);
        if resized {
            if !is_root {
                node.surface.get_mut().take();
            }
            debug!(?id, from = ?current, to = ?target, "content resized");
            self.with_behavior(id, |b, cx| b.on_content_resized(cx));
            self.set_redraw(id);
        }

        for child in self.children_snapshot(id) {
            self.update_content_resolution(child);
        }
    }

    /// Projected resolution for a frame with a parent; the current value otherwise.
    pub(crate) fn calculate_content_resolution(&self, id: FrameId) -> Size {
        let node = self.node(id);
        let current = node.geometry.content_resolution();
        let Some(parent) = node.parent.and_then(|p| self.node_opt(p)) else {
            return current;
        };
        let projected = node.geometry.projected_resolution(&parent.geometry);
        let max = self.config.max_texture_dimension;
        Size::new(
            f64::from(pixel_extent(projected.width, max)),
            f64::from(pixel_extent(projected.height, max)),
        )
    }

    /// Repaint every stale surface under `id` and recomposite what changed.
    ///
    /// Takes `&self`: only redraw flags and cached surfaces change. Returns `true`
    /// if `id` itself was painted. Surfaces that could not be obtained stay dirty and
    /// are retried on the next call.
    pub fn draw(&self, id: FrameId) -> bool {
        if !self.is_loaded(id) {
            debug!(?id, "skipping draw of an unloaded frame");
            return false;
        }
        self.draw_internal(id)
    }

    fn draw_internal(&self, id: FrameId) -> bool {
        let node = self.node(id);
        let bounds = node.geometry.bounds();
        let tm = node.geometry.content_transform();
        let inv_tm = node.geometry.content_transform_inverse();

        let mut draw_self = false;
        for &child in &node.children {
            let Some(c) = self.node_opt(child) else {
                continue;
            };
            if c.is_hidden() {
                continue;
            }
            if !c.geometry.containment(bounds, tm, inv_tm).is_visible() {
                trace!(?child, "culled");
                continue;
            }
            if node.needs_redraw.get() && c.surface.borrow().is_none() {
                c.needs_redraw.set(true);
            }
            if self.draw_internal(child) {
                draw_self = true;
            }
        }

        if !draw_self && !node.needs_redraw.get() {
            return false;
        }
        let Some(mut canvas) = self.begin_canvas(id, node) else {
            return false;
        };

        let resolution = node.geometry.content_resolution();
        canvas.set_viewport(Rect::from_origin_size(Point::ZERO, resolution));
        canvas.set_content_bounds(bounds);
        canvas.set_content_transform(tm);

        let behavior = self.behavior(id).unwrap_or(&PlainFrame);
        behavior.on_draw(&mut *canvas);
        for &child in node.children.iter().rev() {
            let Some(c) = self.node_opt(child) else {
                continue;
            };
            if c.is_hidden() {
                continue;
            }
            let texture = c.surface.borrow().clone();
            if let Some(texture) = texture {
                canvas.draw_textured_rect(&TexturedQuad {
                    rect: UNIT_RECT,
                    transform: c.geometry.transform(),
                    tex_rect: UNIT_RECT,
                    tex_transform: Affine::IDENTITY,
                    texture: &*texture,
                    color: c.color,
                    blend: c.blend,
                });
            }
        }
        behavior.on_draw_overlay(&mut *canvas);
        canvas.commit();

        node.needs_redraw.set(false);
        true
    }

    /// Canvas for painting `id`: the live screen for the root, the cached surface
    /// (allocated on first use) for everything else.
    fn begin_canvas(&self, id: FrameId, node: &Node) -> Option<Box<dyn Canvas>> {
        let Some(screen) = self.screen.as_deref() else {
            error!(?id, "cannot draw without a screen");
            return None;
        };
        if self.is_root(id) {
            node.surface.borrow_mut().take();
            let canvas = screen.create_canvas(None);
            if canvas.is_none() {
                error!(?id, "screen did not provide a canvas");
            }
            return canvas;
        }

        let cached = node.surface.borrow().clone();
        let target: Rc<dyn RenderTarget> = match cached {
            Some(target) => target,
            None => {
                let resolution = node.geometry.content_resolution();
                let max = self.config.max_texture_dimension;
                let width = pixel_extent(resolution.width, max);
                let height = pixel_extent(resolution.height, max);
                let Some(target) = screen.create_target(width, height, node.pixel_format) else {
                    error!(?id, width, height, "failed to create render target");
                    return None;
                };
                info!(?id, width, height, "created render target");
                *node.surface.borrow_mut() = Some(target.clone());
                node.needs_redraw.set(true);
                target
            }
        };
        let canvas = screen.create_canvas(Some(target));
        if canvas.is_none() {
            warn!(?id, "failed to bind a canvas to the render target");
        }
        canvas
    }
}
