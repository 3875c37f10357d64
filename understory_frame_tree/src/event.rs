// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input and update payloads delivered by the host.

use std::time::SystemTime;

use kurbo::{Point, Vec2};

use crate::types::DeviceId;

/// Kind of keyboard event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyboardEventKind {
    /// A key was pressed.
    KeyDown,
    /// A key was released.
    KeyUp,
    /// Committed text input.
    TextInput,
    /// In-progress IME composition text.
    TextComposition,
}

/// A keyboard event from the host window.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEvent {
    /// Keyboard that produced the event.
    pub device: DeviceId,
    /// What happened.
    pub kind: KeyboardEventKind,
    /// Platform-independent key code; `0` for text events.
    pub key: u32,
    /// Text for [`KeyboardEventKind::TextInput`] and [`KeyboardEventKind::TextComposition`].
    pub text: String,
}

impl KeyboardEvent {
    /// A key-down event for `key`.
    pub fn key_down(device: DeviceId, key: u32) -> Self {
        Self {
            device,
            kind: KeyboardEventKind::KeyDown,
            key,
            text: String::new(),
        }
    }

    /// A key-up event for `key`.
    pub fn key_up(device: DeviceId, key: u32) -> Self {
        Self {
            device,
            kind: KeyboardEventKind::KeyUp,
            key,
            text: String::new(),
        }
    }

    /// A text input event.
    pub fn text(device: DeviceId, text: impl Into<String>) -> Self {
        Self {
            device,
            kind: KeyboardEventKind::TextInput,
            key: 0,
            text: text.into(),
        }
    }
}

/// Kind of pointer event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    /// A button was pressed.
    ButtonDown,
    /// A button was released.
    ButtonUp,
    /// The pointer moved.
    Move,
    /// The wheel or trackpad scrolled; `delta` carries the amount.
    Wheel,
    /// Hover movement reported without buttons, e.g. a pen in proximity.
    Pointing,
}

/// A pointer event from the host window.
#[derive(Clone, Debug, PartialEq)]
pub struct MouseEvent {
    /// Pointer device that produced the event.
    pub device: DeviceId,
    /// What happened.
    pub kind: MouseEventKind,
    /// Button index for button events.
    pub button: u8,
    /// Pointer position in window space.
    pub location: Point,
    /// Movement since the previous event, in window space.
    pub delta: Vec2,
}

impl MouseEvent {
    /// Create an event of `kind` at `location` with no movement.
    pub fn new(device: DeviceId, kind: MouseEventKind, location: Point) -> Self {
        Self {
            device,
            kind,
            button: 0,
            location,
            delta: Vec2::ZERO,
        }
    }
}

/// Timing of one host update pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UpdateTick {
    /// Seconds elapsed since the previous update.
    pub delta: f64,
    /// Monotonic tick counter from the host timeline.
    pub tick: u64,
    /// Wall-clock time of the update.
    pub time: SystemTime,
}
