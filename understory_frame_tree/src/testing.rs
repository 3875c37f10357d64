// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording doubles for the host collaborators, shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hashbrown::HashMap;
use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::behavior::{FrameBehavior, FrameCx};
use crate::claims::InputClaims;
use crate::event::{KeyboardEvent, MouseEvent, UpdateTick};
use crate::screen::{Canvas, RenderTarget, Screen, TexturedQuad};
use crate::types::{BlendMode, Color, DeviceId, PixelFormat};

#[derive(Debug)]
pub(crate) struct MockTarget {
    size: (u32, u32),
    format: PixelFormat,
}

impl RenderTarget for MockTarget {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }
}

/// One recorded canvas call. `Begin` carries the target size, `None` for the screen.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DrawOp {
    Begin(Option<(u32, u32)>),
    Viewport(Rect),
    ContentBounds(Rect),
    ContentTransform(Affine),
    Clear(Color),
    Quad {
        texture: (u32, u32),
        transform: Affine,
        color: Color,
        blend: BlendMode,
    },
    Commit,
}

/// Shared handles into a [`MockScreen`] that stay usable after the screen is boxed.
#[derive(Clone, Debug, Default)]
pub(crate) struct ScreenProbe {
    pub(crate) resolution: Rc<Cell<Size>>,
    pub(crate) targets_created: Rc<Cell<usize>>,
    pub(crate) fail_targets: Rc<Cell<bool>>,
    pub(crate) fail_canvas: Rc<Cell<bool>>,
    pub(crate) ops: Rc<RefCell<Vec<DrawOp>>>,
    pub(crate) mouse: Rc<RefCell<HashMap<DeviceId, Point>>>,
}

impl ScreenProbe {
    pub(crate) fn take_ops(&self) -> Vec<DrawOp> {
        core::mem::take(&mut *self.ops.borrow_mut())
    }
}

#[derive(Debug)]
pub(crate) struct MockScreen {
    probe: ScreenProbe,
    claims: InputClaims,
}

impl MockScreen {
    pub(crate) fn new(width: f64, height: f64) -> (Box<dyn Screen>, ScreenProbe) {
        let probe = ScreenProbe::default();
        probe.resolution.set(Size::new(width, height));
        let screen = Self {
            probe: probe.clone(),
            claims: InputClaims::new(),
        };
        (Box::new(screen), probe)
    }
}

impl Screen for MockScreen {
    fn resolution(&self) -> Size {
        self.probe.resolution.get()
    }

    fn create_target(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Option<Rc<dyn RenderTarget>> {
        if self.probe.fail_targets.get() {
            return None;
        }
        self.probe
            .targets_created
            .set(self.probe.targets_created.get() + 1);
        Some(Rc::new(MockTarget {
            size: (width, height),
            format,
        }))
    }

    fn create_canvas(&self, target: Option<Rc<dyn RenderTarget>>) -> Option<Box<dyn Canvas>> {
        if self.probe.fail_canvas.get() {
            return None;
        }
        self.probe
            .ops
            .borrow_mut()
            .push(DrawOp::Begin(target.map(|t| t.size())));
        Some(Box::new(RecordingCanvas {
            ops: self.probe.ops.clone(),
        }))
    }

    fn window_to_screen(&self, p: Point) -> Point {
        let res = self.probe.resolution.get();
        Point::new(p.x / res.width, p.y / res.height)
    }

    fn mouse_position(&self, device: DeviceId) -> Option<Point> {
        self.probe.mouse.borrow().get(&device).copied()
    }

    fn claims(&self) -> &InputClaims {
        &self.claims
    }

    fn claims_mut(&mut self) -> &mut InputClaims {
        &mut self.claims
    }
}

struct RecordingCanvas {
    ops: Rc<RefCell<Vec<DrawOp>>>,
}

impl Canvas for RecordingCanvas {
    fn set_viewport(&mut self, viewport: Rect) {
        self.ops.borrow_mut().push(DrawOp::Viewport(viewport));
    }

    fn set_content_bounds(&mut self, bounds: Rect) {
        self.ops.borrow_mut().push(DrawOp::ContentBounds(bounds));
    }

    fn set_content_transform(&mut self, transform: Affine) {
        self.ops.borrow_mut().push(DrawOp::ContentTransform(transform));
    }

    fn clear(&mut self, color: Color) {
        self.ops.borrow_mut().push(DrawOp::Clear(color));
    }

    fn draw_textured_rect(&mut self, quad: &TexturedQuad<'_>) {
        self.ops.borrow_mut().push(DrawOp::Quad {
            texture: quad.texture.size(),
            transform: quad.transform,
            color: quad.color,
            blend: quad.blend,
        });
    }

    fn commit(&mut self) {
        self.ops.borrow_mut().push(DrawOp::Commit);
    }
}

/// Hook invocation recorded by [`Probe`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Note {
    Loaded(&'static str),
    Unloaded(&'static str),
    Resized(&'static str),
    Updated(&'static str, u64),
    Draw(&'static str),
    Overlay(&'static str),
    KeyIntercept(&'static str),
    Key(&'static str),
    MouseIntercept(&'static str, Point),
    Mouse(&'static str, Point, Vec2),
    MouseReleased(&'static str, DeviceId),
    KeyboardReleased(&'static str, DeviceId),
}

pub(crate) type Journal = Rc<RefCell<Vec<Note>>>;

/// Behavior that journals every hook and can be told to intercept.
#[derive(Clone, Debug)]
pub(crate) struct Probe {
    pub(crate) name: &'static str,
    pub(crate) journal: Journal,
    pub(crate) intercept_keys: bool,
    pub(crate) intercept_mouse: bool,
    /// Local-space hit region; `None` accepts everything.
    pub(crate) hit_region: Option<Rect>,
}

impl Probe {
    pub(crate) fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            intercept_keys: false,
            intercept_mouse: false,
            hit_region: None,
        }
    }

    fn note(&self, note: Note) {
        self.journal.borrow_mut().push(note);
    }
}

impl FrameBehavior for Probe {
    fn on_loaded(&mut self, _cx: &mut FrameCx<'_>) {
        self.note(Note::Loaded(self.name));
    }

    fn on_unload(&mut self, _cx: &mut FrameCx<'_>) {
        self.note(Note::Unloaded(self.name));
    }

    fn on_content_resized(&mut self, _cx: &mut FrameCx<'_>) {
        self.note(Note::Resized(self.name));
    }

    fn on_update(&mut self, _cx: &mut FrameCx<'_>, tick: &UpdateTick) {
        self.note(Note::Updated(self.name, tick.tick));
    }

    fn on_draw(&self, canvas: &mut dyn Canvas) {
        self.note(Note::Draw(self.name));
        canvas.clear(Color::TRANSPARENT);
    }

    fn on_draw_overlay(&self, _canvas: &mut dyn Canvas) {
        self.note(Note::Overlay(self.name));
    }

    fn preprocess_keyboard_event(&mut self, _cx: &mut FrameCx<'_>, _event: &KeyboardEvent) -> bool {
        self.note(Note::KeyIntercept(self.name));
        self.intercept_keys
    }

    fn preprocess_mouse_event(
        &mut self,
        _cx: &mut FrameCx<'_>,
        _event: &MouseEvent,
        pos: Point,
        _delta: Vec2,
    ) -> bool {
        self.note(Note::MouseIntercept(self.name, pos));
        self.intercept_mouse
    }

    fn on_keyboard_event(&mut self, _cx: &mut FrameCx<'_>, _event: &KeyboardEvent) {
        self.note(Note::Key(self.name));
    }

    fn on_mouse_event(&mut self, _cx: &mut FrameCx<'_>, _event: &MouseEvent, pos: Point, delta: Vec2) {
        self.note(Note::Mouse(self.name, pos, delta));
    }

    fn on_mouse_released(&mut self, _cx: &mut FrameCx<'_>, device: DeviceId) {
        self.note(Note::MouseReleased(self.name, device));
    }

    fn on_keyboard_released(&mut self, _cx: &mut FrameCx<'_>, device: DeviceId) {
        self.note(Note::KeyboardReleased(self.name, device));
    }

    fn hit_test(&self, pos: Point) -> bool {
        self.hit_region.is_none_or(|r| {
            (r.x0..=r.x1).contains(&pos.x) && (r.y0..=r.y1).contains(&pos.y)
        })
    }
}

pub(crate) fn journal() -> Journal {
    Journal::default()
}

pub(crate) fn tick(n: u64) -> UpdateTick {
    UpdateTick {
        delta: 1.0 / 60.0,
        tick: n,
        time: std::time::SystemTime::UNIX_EPOCH,
    }
}
