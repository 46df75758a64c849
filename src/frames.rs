// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `frames` module implements the ring of decoded video pictures.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::codecs::Picture;
use crate::units::Timestamp;
use crate::VIDEO_FRAMES_TO_PREFETCH;

/// One decoded picture with its presentation timestamp.
#[derive(Clone, Debug)]
pub(crate) struct FrameSlot {
    pub picture: Arc<Picture>,
    pub ts: Timestamp,
}

/// A bounded ring of decoded pictures ordered by presentation timestamp.
///
/// The video worker pushes in decode order; the caller drains slots whose timestamp the session
/// position has reached. Capacity is one more than the prefetch window so a display-ready frame
/// can sit at the head while the window stays full behind it.
#[derive(Debug, Default)]
pub(crate) struct FrameRing {
    slots: VecDeque<FrameSlot>,
}

impl FrameRing {
    pub const CAPACITY: usize = VIDEO_FRAMES_TO_PREFETCH + 1;

    pub fn new() -> Self {
        FrameRing { slots: VecDeque::with_capacity(Self::CAPACITY) }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Append a picture. If the ring is full the oldest slot is dropped to make room.
    pub fn push(&mut self, picture: Arc<Picture>, ts: Timestamp) {
        debug_assert!(self.slots.back().map_or(true, |last| last.ts <= ts));

        if self.slots.len() == Self::CAPACITY {
            self.slots.pop_front();
        }
        self.slots.push_back(FrameSlot { picture, ts });
    }

    /// Append a picture, releasing the oldest slot first.
    ///
    /// Used for packets decoded during a seek pre-roll: each new picture replaces its
    /// predecessor, so at most one picture survives the pre-roll.
    pub fn push_replacing(&mut self, picture: Arc<Picture>, ts: Timestamp) {
        self.slots.pop_front();
        self.slots.push_back(FrameSlot { picture, ts });
    }

    /// The timestamp of the oldest slot.
    pub fn oldest_ts(&self) -> Option<Timestamp> {
        self.slots.front().map(|slot| slot.ts)
    }

    /// Whether a display-ready frame exists for the given session position.
    pub fn has_frame_at(&self, position: Timestamp) -> bool {
        self.oldest_ts().map_or(false, |ts| ts <= position)
    }

    /// Consume the oldest slot whose timestamp the position has reached.
    ///
    /// Slots come out one per call, in presentation order, and none is skipped: a position that
    /// jumped past several frames leaves all of them retrievable. Shedding under overload
    /// happens only on the push side, when a full ring drops its oldest slot.
    pub fn take_frame_at(&mut self, position: Timestamp) -> Option<FrameSlot> {
        if self.slots.front()?.ts > position {
            return None;
        }
        self.slots.pop_front()
    }

    /// Drop all slots, releasing their pictures.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::FrameRing;
    use crate::codecs::{ColorDescription, Picture, PixelLayout};
    use std::sync::Arc;

    fn picture() -> Arc<Picture> {
        Arc::new(Picture {
            planes: [Box::from([]), Box::from([]), Box::from([])],
            strides: [0; 3],
            width: 16,
            height: 16,
            bit_depth: 8,
            layout: PixelLayout::Yuv420,
            color: ColorDescription::default(),
        })
    }

    #[test]
    fn push_drops_oldest_when_full() {
        let mut ring = FrameRing::new();

        for ts in 0..(FrameRing::CAPACITY as u64 + 3) {
            ring.push(picture(), ts * 10);
        }

        assert_eq!(ring.len(), FrameRing::CAPACITY);
        assert_eq!(ring.oldest_ts(), Some(30));
    }

    #[test]
    fn push_replacing_keeps_at_most_one() {
        let mut ring = FrameRing::new();

        for ts in 0..5u64 {
            ring.push_replacing(picture(), ts * 10);
        }

        assert_eq!(ring.len(), 1);
        assert_eq!(ring.oldest_ts(), Some(40));
    }

    #[test]
    fn take_frame_hands_out_due_slots_in_order() {
        let mut ring = FrameRing::new();
        ring.push(picture(), 0);
        ring.push(picture(), 40);
        ring.push(picture(), 80);
        ring.push(picture(), 120);

        assert!(ring.has_frame_at(0));
        assert_eq!(ring.take_frame_at(0).map(|slot| slot.ts), Some(0));
        assert!(!ring.has_frame_at(0));

        // The position jumped past two frames: both stay retrievable, oldest first, each
        // exactly once.
        assert_eq!(ring.take_frame_at(90).map(|slot| slot.ts), Some(40));
        assert_eq!(ring.take_frame_at(90).map(|slot| slot.ts), Some(80));
        assert!(ring.take_frame_at(90).is_none());
        assert_eq!(ring.len(), 1);
        assert!(ring.has_frame_at(120));
    }
}
