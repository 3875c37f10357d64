// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-device capture and hover tables.
//!
//! [`InputClaims`] is owned by the [`Screen`](crate::Screen) implementation. The frame
//! tree only reads and updates it through [`Screen::claims`](crate::Screen::claims) and
//! [`Screen::claims_mut`](crate::Screen::claims_mut); it never keeps device state itself.
//!
//! Updates are transactional: a capture is only taken if the device is free (or
//! already held by the same frame), and a release only removes an entry that still
//! points at the releasing frame. Releasing one frame never disturbs claims held by
//! other frames.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::types::{DeviceId, FrameId};

/// Devices released by a bulk release call.
pub type ReleasedDevices = SmallVec<[DeviceId; 4]>;

#[derive(Clone, Debug, Default)]
struct DeviceTable {
    entries: HashMap<DeviceId, FrameId>,
}

impl DeviceTable {
    fn get(&self, device: DeviceId) -> Option<FrameId> {
        self.entries.get(&device).copied()
    }

    fn claim(&mut self, device: DeviceId, frame: FrameId) -> bool {
        match self.entries.get(&device) {
            Some(&holder) => holder == frame,
            None => {
                self.entries.insert(device, frame);
                true
            }
        }
    }

    fn release(&mut self, device: DeviceId, frame: FrameId) -> bool {
        if self.get(device) == Some(frame) {
            self.entries.remove(&device);
            true
        } else {
            false
        }
    }

    fn release_all(&mut self, frame: FrameId) -> ReleasedDevices {
        let mut released: ReleasedDevices = self
            .entries
            .iter()
            .filter(|&(_, &f)| f == frame)
            .map(|(&d, _)| d)
            .collect();
        released.sort_unstable();
        for d in &released {
            self.entries.remove(d);
        }
        released
    }

    fn holds_any(&self, frame: FrameId) -> bool {
        self.entries.values().any(|&f| f == frame)
    }
}

/// Keyboard capture, mouse capture, and hover tables keyed by device.
#[derive(Clone, Debug, Default)]
pub struct InputClaims {
    keyboard: DeviceTable,
    mouse: DeviceTable,
    hover: DeviceTable,
}

impl InputClaims {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    // --- keyboard capture ---

    /// Frame holding keyboard capture for `device`.
    pub fn key_frame(&self, device: DeviceId) -> Option<FrameId> {
        self.keyboard.get(device)
    }

    /// Give `frame` keyboard capture for `device` unless another frame holds it.
    ///
    /// Returns `true` if `frame` holds the capture afterwards.
    pub fn set_key_frame(&mut self, device: DeviceId, frame: FrameId) -> bool {
        self.keyboard.claim(device, frame)
    }

    /// Release keyboard capture for `device` if `frame` holds it.
    pub fn remove_key_frame(&mut self, device: DeviceId, frame: FrameId) -> bool {
        self.keyboard.release(device, frame)
    }

    /// Release every keyboard capture held by `frame`.
    pub fn remove_key_frame_for_any_device(&mut self, frame: FrameId) -> ReleasedDevices {
        self.keyboard.release_all(frame)
    }

    // --- mouse capture ---

    /// Frame holding mouse capture for `device`.
    pub fn focus_frame(&self, device: DeviceId) -> Option<FrameId> {
        self.mouse.get(device)
    }

    /// Give `frame` mouse capture for `device` unless another frame holds it.
    ///
    /// Returns `true` if `frame` holds the capture afterwards.
    pub fn set_focus_frame(&mut self, device: DeviceId, frame: FrameId) -> bool {
        self.mouse.claim(device, frame)
    }

    /// Release mouse capture for `device` if `frame` holds it.
    pub fn remove_focus_frame(&mut self, device: DeviceId, frame: FrameId) -> bool {
        self.mouse.release(device, frame)
    }

    /// Release every mouse capture held by `frame`.
    pub fn remove_focus_frame_for_any_device(&mut self, frame: FrameId) -> ReleasedDevices {
        self.mouse.release_all(frame)
    }

    // --- hover ---

    /// Frame under the pointer of `device`.
    pub fn hover_frame(&self, device: DeviceId) -> Option<FrameId> {
        self.hover.get(device)
    }

    /// Replace the hover frame for `device`, returning the previous one.
    pub fn set_hover_frame(&mut self, device: DeviceId, frame: Option<FrameId>) -> Option<FrameId> {
        match frame {
            Some(f) => self.hover.entries.insert(device, f),
            None => self.hover.entries.remove(&device),
        }
    }

    /// Drop `frame` from the hover table for every device.
    pub fn leave_hover_frame(&mut self, frame: FrameId) -> ReleasedDevices {
        self.hover.release_all(frame)
    }

    /// Returns `true` if `frame` holds any capture or hover entry.
    pub fn is_claimed_by(&self, frame: FrameId) -> bool {
        self.keyboard.holds_any(frame) || self.mouse.holds_any(frame) || self.hover.holds_any(frame)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
