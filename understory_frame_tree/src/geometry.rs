// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame coordinate spaces.
//!
//! Every frame has three spaces:
//!
//! - **local**: the logical drawing space, `(0,0)..(content_scale)` before the content
//!   transform is applied;
//! - **normalized**: the unit box `[0,1]²`, reached from local space by the content
//!   transform followed by division by the content scale;
//! - **pixel**: the backing surface, `(0,0)..(content_resolution)`.
//!
//! A frame's placement `transform` maps its normalized space into the parent's local
//! space. Composition uses kurbo's column-vector convention, so `a * b` applies `b`
//! first.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use tracing::warn;

use crate::util::{
    UNIT_RECT, in_unit_box, mapped_rect_intersects, rect_corners, round_pixels, transform_rect_bbox,
};

/// Result of testing a child's box against a query rectangle in its parent's space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Containment {
    /// The child's box does not touch the rectangle.
    Outside,
    /// The child's box overlaps the rectangle.
    Intersects,
    /// The child's box covers the whole rectangle.
    Covers,
}

impl Containment {
    /// Returns `true` unless the box lies fully outside.
    pub fn is_visible(self) -> bool {
        !matches!(self, Self::Outside)
    }
}

/// Placement and content transforms of a frame, without derived inverses.
///
/// Restoring a snapshot recomputes both inverses exactly as the setters do, so a
/// save/restore cycle reproduces identical forward and inverse matrices.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameTransforms {
    /// Normalized space to parent local space.
    pub transform: Affine,
    /// Remap of local drawing coordinates applied before normalization.
    pub content_transform: Affine,
}

/// Geometry state of a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameGeometry {
    transform: Affine,
    transform_inverse: Affine,
    content_scale: Size,
    content_transform: Affine,
    content_transform_inverse: Affine,
    content_resolution: Size,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            transform_inverse: Affine::IDENTITY,
            content_scale: Size::new(1.0, 1.0),
            content_transform: Affine::IDENTITY,
            content_transform_inverse: Affine::IDENTITY,
            content_resolution: Size::new(1.0, 1.0),
        }
    }
}

/// Invert `m`, or `None` if it is singular or not finite.
pub(crate) fn checked_inverse(m: Affine) -> Option<Affine> {
    let det = m.determinant();
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let inv = m.inverse();
    inv.as_coeffs().iter().all(|c| c.is_finite()).then_some(inv)
}

impl FrameGeometry {
    /// Placement transform: normalized space to parent local space.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Inverse of [`FrameGeometry::transform`].
    pub fn transform_inverse(&self) -> Affine {
        self.transform_inverse
    }

    /// Logical size of the frame's drawing surface.
    pub fn content_scale(&self) -> Size {
        self.content_scale
    }

    /// Remap applied to local drawing coordinates before normalization.
    pub fn content_transform(&self) -> Affine {
        self.content_transform
    }

    /// Inverse of [`FrameGeometry::content_transform`].
    pub fn content_transform_inverse(&self) -> Affine {
        self.content_transform_inverse
    }

    /// Pixel size of the backing surface.
    pub fn content_resolution(&self) -> Size {
        self.content_resolution
    }

    /// Snapshot of the placement and content transforms.
    pub fn transforms(&self) -> FrameTransforms {
        FrameTransforms {
            transform: self.transform,
            content_transform: self.content_transform,
        }
    }

    /// `(0, 0, content_scale.width, content_scale.height)`.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.content_scale)
    }

    /// Bounding box of [`FrameGeometry::bounds`] pulled back through the content transform.
    ///
    /// This is the region of local coordinates that ends up on the surface.
    pub fn display_bounds(&self) -> Rect {
        transform_rect_bbox(self.content_transform_inverse, self.bounds())
    }

    // --- composed transforms ---

    /// Local space to parent local space.
    pub fn local_to_super_transform(&self) -> Affine {
        self.transform * self.normalized_from_local_transform()
    }

    /// Parent local space to local space.
    pub fn local_from_super_transform(&self) -> Affine {
        self.local_from_normalized_transform() * self.transform_inverse
    }

    /// Local space to the unit box.
    pub fn normalized_from_local_transform(&self) -> Affine {
        Affine::scale_non_uniform(
            1.0 / self.content_scale.width,
            1.0 / self.content_scale.height,
        ) * self.content_transform
    }

    /// Unit box to local space.
    pub fn local_from_normalized_transform(&self) -> Affine {
        self.content_transform_inverse
            * Affine::scale_non_uniform(self.content_scale.width, self.content_scale.height)
    }

    /// Local space to surface pixels.
    pub fn local_to_pixel_transform(&self) -> Affine {
        Affine::scale_non_uniform(
            self.content_resolution.width / self.content_scale.width,
            self.content_resolution.height / self.content_scale.height,
        ) * self.content_transform
    }

    /// Surface pixels to local space.
    pub fn pixel_to_local_transform(&self) -> Affine {
        self.content_transform_inverse
            * Affine::scale_non_uniform(
                self.content_scale.width / self.content_resolution.width,
                self.content_scale.height / self.content_resolution.height,
            )
    }

    // --- point, size, and rect mapping ---

    /// Map a local point into the parent's local space.
    pub fn local_to_super(&self, p: Point) -> Point {
        self.local_to_super_transform() * p
    }

    /// Map a point in the parent's local space into local space.
    pub fn super_to_local(&self, p: Point) -> Point {
        self.local_from_super_transform() * p
    }

    /// Map a local point to surface pixels.
    pub fn local_to_pixel(&self, p: Point) -> Point {
        self.local_to_pixel_transform() * p
    }

    /// Map a surface pixel position to local space.
    pub fn pixel_to_local(&self, p: Point) -> Point {
        self.pixel_to_local_transform() * p
    }

    /// Pixel extent of a local size, measured from the local origin.
    pub fn local_to_pixel_size(&self, s: Size) -> Size {
        let p0 = self.local_to_pixel(Point::ZERO);
        let p1 = self.local_to_pixel(Point::new(s.width, s.height));
        (p1 - p0).to_size()
    }

    /// Local extent of a pixel size, measured from the pixel origin.
    pub fn pixel_to_local_size(&self, s: Size) -> Size {
        let p0 = self.pixel_to_local(Point::ZERO);
        let p1 = self.pixel_to_local(Point::new(s.width, s.height));
        (p1 - p0).to_size()
    }

    /// Map a local rect to pixels (origin mapped as a point, size as a size).
    pub fn local_to_pixel_rect(&self, r: Rect) -> Rect {
        Rect::from_origin_size(
            self.local_to_pixel(r.origin()),
            self.local_to_pixel_size(r.size()),
        )
    }

    /// Map a pixel rect to local space (origin mapped as a point, size as a size).
    pub fn pixel_to_local_rect(&self, r: Rect) -> Rect {
        Rect::from_origin_size(
            self.pixel_to_local(r.origin()),
            self.pixel_to_local_size(r.size()),
        )
    }

    // --- queries used by the draw pass ---

    /// Classify this frame's unit box against `rect`, a rectangle in the parent's
    /// surface-bounds space.
    ///
    /// `tm` and `inv_tm` are the parent's content transform and its inverse.
    pub fn containment(&self, rect: Rect, tm: Affine, inv_tm: Affine) -> Containment {
        let to_normalized = self.transform_inverse * inv_tm;
        if rect_corners(rect)
            .iter()
            .all(|&p| in_unit_box(to_normalized * p))
        {
            return Containment::Covers;
        }
        if mapped_rect_intersects(tm * self.transform, UNIT_RECT, rect) {
            Containment::Intersects
        } else {
            Containment::Outside
        }
    }

    /// Pixel footprint of this frame's box when drawn into `parent`.
    ///
    /// The box's corners are projected into the parent's pixel space and each axis
    /// takes the longer of its two opposing edges, so a rotated or skewed box gets
    /// enough pixels along its longest side. Results are rounded but not clamped.
    pub fn projected_resolution(&self, parent: &Self) -> Size {
        let w = self.content_scale.width;
        let h = self.content_scale.height;
        let m = parent.local_to_pixel_transform() * self.local_to_super_transform();

        let lt = m * Point::new(0.0, 0.0);
        let rt = m * Point::new(w, 0.0);
        let lb = m * Point::new(0.0, h);
        let rb = m * Point::new(w, h);

        let horizontal1: Vec2 = rb - lb;
        let horizontal2: Vec2 = rt - lt;
        let vertical1: Vec2 = lt - lb;
        let vertical2: Vec2 = rt - rb;

        Size::new(
            round_pixels(horizontal1.hypot().max(horizontal2.hypot())),
            round_pixels(vertical1.hypot().max(vertical2.hypot())),
        )
    }

    // --- mutation ---

    /// Replace the placement transform. Returns `true` if the stored value changed.
    ///
    /// A singular transform is replaced with identity, which is no change for a frame
    /// already placed at identity.
    pub(crate) fn set_transform(&mut self, t: Affine) -> bool {
        if self.transform == t {
            return false;
        }
        let (fwd, inv) = match checked_inverse(t) {
            Some(inv) => (t, inv),
            None => {
                warn!(?t, "placement transform is not invertible, using identity");
                (Affine::IDENTITY, Affine::IDENTITY)
            }
        };
        if self.transform == fwd {
            return false;
        }
        self.transform = fwd;
        self.transform_inverse = inv;
        true
    }

    /// Replace the content transform. Returns `true` if the input differed from the
    /// current value.
    ///
    /// A singular transform silently resets both the transform and its inverse to identity.
    pub(crate) fn set_content_transform(&mut self, m: Affine) -> bool {
        if self.content_transform == m {
            return false;
        }
        let (fwd, inv) = match checked_inverse(m) {
            Some(inv) => (m, inv),
            None => (Affine::IDENTITY, Affine::IDENTITY),
        };
        self.content_transform = fwd;
        self.content_transform_inverse = inv;
        true
    }

    /// Replace the content scale, clamping each axis to `min`. Returns `true` if it
    /// changed by at least `epsilon` on either axis.
    pub(crate) fn set_content_scale(&mut self, s: Size, min: f64, epsilon: f64) -> bool {
        let w = s.width.max(min);
        let h = s.height.max(min);
        if (w - self.content_scale.width).abs() < epsilon
            && (h - self.content_scale.height).abs() < epsilon
        {
            return false;
        }
        self.content_scale = Size::new(w, h);
        true
    }

    pub(crate) fn set_content_resolution(&mut self, s: Size) {
        self.content_resolution = s;
    }
}
