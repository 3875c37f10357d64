// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by structural and attribute mutators.

use crate::types::{FrameId, PixelFormat};

/// Reason a frame tree mutation was rejected.
///
/// A rejected call never changes the tree.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The identifier does not refer to a live frame.
    #[error("frame {0:?} is stale")]
    StaleFrame(FrameId),
    /// The frame already has a parent.
    #[error("frame {0:?} already has a parent")]
    AlreadyAttached(FrameId),
    /// Attaching would make a frame its own ancestor.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCycle {
        /// The prospective parent.
        parent: FrameId,
        /// The frame being attached.
        child: FrameId,
    },
    /// The root frame cannot be attached under another frame.
    #[error("frame {0:?} is the root frame")]
    RootFrame(FrameId),
    /// The attribute is owned by the screen for the root frame.
    #[error("root frame's {0} cannot be changed")]
    RootPolicy(&'static str),
    /// The pixel format cannot back a color target.
    #[error("pixel format {0:?} is not a color format")]
    UnsupportedPixelFormat(PixelFormat),
}
