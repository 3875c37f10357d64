// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Affine, Point, Rect, Vec2};

/// The normalized box every frame occupies in its parent's space before its transform.
pub(crate) const UNIT_RECT: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);

/// Transform an axis-aligned `Rect` by an `Affine` and return a conservative
/// axis-aligned bounding box.
pub(crate) fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let min_x = (a * rect.x0).min(a * rect.x1) + (c * rect.y0).min(c * rect.y1);
    let max_x = (a * rect.x0).max(a * rect.x1) + (c * rect.y0).max(c * rect.y1);
    let min_y = (b * rect.x0).min(b * rect.x1) + (d * rect.y0).min(d * rect.y1);
    let max_y = (b * rect.x0).max(b * rect.x1) + (d * rect.y0).max(d * rect.y1);
    Rect::new(min_x + e, min_y + f, max_x + e, max_y + f)
}

/// Inclusive containment in the unit box `[0,1]²`.
///
/// Unlike [`Rect::contains`], points on the far edges count as inside.
pub(crate) fn in_unit_box(p: Point) -> bool {
    (0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y)
}

/// Corners of `rect` in the order left-top, left-bottom, right-bottom, right-top.
pub(crate) fn rect_corners(rect: Rect) -> [Point; 4] {
    [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x0, rect.y1),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x1, rect.y0),
    ]
}

/// Exact overlap test between `local` mapped through `affine` (a parallelogram)
/// and the axis-aligned `rect`. Shared edges count as overlapping.
pub(crate) fn mapped_rect_intersects(affine: Affine, local: Rect, rect: Rect) -> bool {
    let quad = rect_corners(local).map(|p| affine * p);
    let target = rect_corners(rect);

    let e1 = quad[3] - quad[0];
    let e2 = quad[1] - quad[0];
    let axes = [
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(-e1.y, e1.x),
        Vec2::new(-e2.y, e2.x),
    ];
    axes.iter().all(|&axis| {
        let (q0, q1) = project(&quad, axis);
        let (r0, r1) = project(&target, axis);
        q0 <= r1 && r0 <= q1
    })
}

fn project(points: &[Point; 4], axis: Vec2) -> (f64, f64) {
    points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        let d = p.to_vec2().dot(axis);
        (lo.min(d), hi.max(d))
    })
}

/// Round a pixel length to the nearest integer, halves rounding up.
pub(crate) fn round_pixels(v: f64) -> f64 {
    (v + 0.5).floor()
}

/// Round a pixel length and clamp it to `1..=max`.
pub(crate) fn pixel_extent(v: f64, max: u32) -> u32 {
    let rounded = round_pixels(v);
    if rounded.is_nan() || rounded < 1.0 {
        return 1;
    }
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Value is clamped to a u32 texture dimension first."
    )]
    let px = rounded.min(f64::from(max)) as u32;
    px.max(1)
}
