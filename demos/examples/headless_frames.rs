// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless frame tree: a panel with two buttons driven by scripted input.
//!
//! The screen and canvas here only log what they are asked to do, so the example shows
//! which frames repaint, how events are routed, and how capture follows a drag.
//!
//! Run:
//! - `RUST_LOG=understory_frame_tree=trace cargo run -p understory_frame_tree_demos --example headless_frames`

use std::cell::Cell;
use std::rc::Rc;
use std::time::SystemTime;

use kurbo::{Affine, Point, Rect, Size, Vec2};
use tracing::{info, trace};
use tracing_subscriber::EnvFilter;
use understory_frame_tree::{
    Canvas, Color, DeviceId, FrameBehavior, FrameCx, FrameTree, InputClaims, MouseEvent,
    MouseEventKind, PixelFormat, RenderTarget, Screen, TexturedQuad, UpdateTick,
};

const MOUSE: DeviceId = 0;

#[derive(Debug)]
struct Surface {
    size: (u32, u32),
    format: PixelFormat,
}

impl RenderTarget for Surface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }
}

/// Canvas that logs each call instead of painting.
struct LogCanvas {
    label: String,
    quads: usize,
}

impl Canvas for LogCanvas {
    fn set_viewport(&mut self, viewport: Rect) {
        trace!(canvas = %self.label, ?viewport, "viewport");
    }

    fn set_content_bounds(&mut self, bounds: Rect) {
        trace!(canvas = %self.label, ?bounds, "content bounds");
    }

    fn set_content_transform(&mut self, transform: Affine) {
        trace!(canvas = %self.label, ?transform, "content transform");
    }

    fn clear(&mut self, color: Color) {
        trace!(canvas = %self.label, ?color, "clear");
    }

    fn draw_textured_rect(&mut self, quad: &TexturedQuad<'_>) {
        self.quads += 1;
        trace!(canvas = %self.label, texture = ?quad.texture.size(), "quad");
    }

    fn commit(&mut self) {
        info!(canvas = %self.label, quads = self.quads, "commit");
    }
}

/// Fixed-size window with a single pointer.
struct LogScreen {
    size: Size,
    pointer: Rc<Cell<Option<Point>>>,
    claims: InputClaims,
}

impl Screen for LogScreen {
    fn resolution(&self) -> Size {
        self.size
    }

    fn create_target(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Option<Rc<dyn RenderTarget>> {
        Some(Rc::new(Surface {
            size: (width, height),
            format,
        }))
    }

    fn create_canvas(&self, target: Option<Rc<dyn RenderTarget>>) -> Option<Box<dyn Canvas>> {
        let label = match target {
            Some(t) => format!("surface {:?}", t.size()),
            None => "screen".to_owned(),
        };
        Some(Box::new(LogCanvas { label, quads: 0 }))
    }

    fn window_to_screen(&self, p: Point) -> Point {
        Point::new(p.x / self.size.width, p.y / self.size.height)
    }

    fn mouse_position(&self, device: DeviceId) -> Option<Point> {
        (device == MOUSE).then(|| self.pointer.get()).flatten()
    }

    fn claims(&self) -> &InputClaims {
        &self.claims
    }

    fn claims_mut(&mut self) -> &mut InputClaims {
        &mut self.claims
    }
}

/// Button that captures the mouse while pressed and fires on release over itself.
struct Button {
    name: &'static str,
    pressed: bool,
}

impl FrameBehavior for Button {
    fn on_loaded(&mut self, cx: &mut FrameCx<'_>) {
        info!(button = self.name, frame = ?cx.id(), "loaded");
    }

    fn on_draw(&self, canvas: &mut dyn Canvas) {
        let shade = if self.pressed { 0.4 } else { 0.8 };
        canvas.clear(Color::new(shade, shade, shade, 1.0));
    }

    fn on_mouse_event(&mut self, cx: &mut FrameCx<'_>, event: &MouseEvent, pos: Point, _delta: Vec2) {
        match event.kind {
            MouseEventKind::ButtonDown => {
                self.pressed = cx.capture_mouse(event.device);
                cx.set_redraw();
            }
            MouseEventKind::ButtonUp if self.pressed => {
                self.pressed = false;
                cx.release_mouse(event.device);
                cx.set_redraw();
                let id = cx.id();
                let inside = cx
                    .tree()
                    .bounds(id)
                    .is_some_and(|b| b.contains(pos));
                info!(button = self.name, inside, "released");
            }
            _ => {}
        }
    }
}

/// Panel that counts ticks and swallows the wheel for all of its descendants.
struct Panel {
    ticks: u64,
}

impl FrameBehavior for Panel {
    fn on_update(&mut self, _cx: &mut FrameCx<'_>, tick: &UpdateTick) {
        self.ticks = tick.tick;
    }

    fn preprocess_mouse_event(
        &mut self,
        _cx: &mut FrameCx<'_>,
        event: &MouseEvent,
        pos: Point,
        _delta: Vec2,
    ) -> bool {
        let wheel = event.kind == MouseEventKind::Wheel;
        if wheel {
            info!(ticks = self.ticks, ?pos, "panel took the wheel");
        }
        wheel
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let window = Size::new(800.0, 600.0);
    let pointer = Rc::new(Cell::new(None));

    let mut tree = FrameTree::new();
    let root = tree.insert(Panel { ticks: 0 });
    let ok = tree.insert(Button {
        name: "ok",
        pressed: false,
    });
    let cancel = tree.insert(Button {
        name: "cancel",
        pressed: false,
    });

    // Lay buttons out in root pixels.
    tree.set_content_scale(root, window).unwrap();
    tree.add_child(root, ok).unwrap();
    tree.add_child(root, cancel).unwrap();
    for (button, x) in [(ok, 200.0), (cancel, 450.0)] {
        tree.set_content_scale(button, Size::new(150.0, 50.0))
            .unwrap();
        tree.set_transform(button, Affine::new([150.0, 0.0, 0.0, 50.0, x, 500.0]))
            .unwrap();
    }

    let screen = LogScreen {
        size: window,
        pointer: pointer.clone(),
        claims: InputClaims::new(),
    };
    tree.attach_screen(root, Box::new(screen), window).unwrap();

    let script = [
        MouseEvent::new(MOUSE, MouseEventKind::Move, Point::new(260.0, 520.0)),
        MouseEvent::new(MOUSE, MouseEventKind::ButtonDown, Point::new(260.0, 520.0)),
        // Drag off the button: capture keeps it as the target.
        MouseEvent {
            delta: Vec2::new(300.0, 0.0),
            ..MouseEvent::new(MOUSE, MouseEventKind::Move, Point::new(560.0, 520.0))
        },
        MouseEvent::new(MOUSE, MouseEventKind::ButtonUp, Point::new(560.0, 520.0)),
        MouseEvent::new(MOUSE, MouseEventKind::Wheel, Point::new(500.0, 525.0)),
    ];

    let start = SystemTime::now();
    for (n, event) in script.iter().enumerate() {
        let tick = UpdateTick {
            delta: 1.0 / 60.0,
            tick: n as u64,
            time: start,
        };
        tree.update(root, &tick);

        pointer.set(Some(event.location));
        let hover = tree.update_hover(event.device, event.location);
        if hover.is_changed() {
            info!(previous = ?hover.previous, current = ?hover.current, "hover changed");
        }
        let handled = tree.route_mouse_event(event);
        info!(kind = ?event.kind, handled, "routed");

        if let Some(local) = tree.mouse_position(ok, MOUSE) {
            trace!(?local, "pointer in ok button space");
        }
        let painted = tree.draw(root);
        info!(tick = n, painted, "frame");
    }

    drop(tree.detach_screen());
}
