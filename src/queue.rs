// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `queue` module implements the per-stream packet queues.

use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::errors::{Error, Result};
use crate::units::Timestamp;
use crate::{QUEUE_CAPACITY_STEP, VIDEO_FRAMES_TO_PREFETCH};

bitflags! {
    /// Attributes of a queued packet.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub(crate) struct PacketFlags: u8 {
        /// The packet contains a keyframe.
        const KEYFRAME    = 1 << 0;
        /// The packet was enqueued while a seek was in progress. The video worker replaces the
        /// head of the frame ring instead of appending, so at most one picture survives the
        /// pre-roll decode.
        const DURING_SEEK = 1 << 1;
        /// The video worker has decoded the packet and placed its picture on the frame ring.
        const DECODED     = 1 << 2;
    }
}

/// A demuxed packet with its normalized timestamp and queue metadata.
///
/// A packet is owned by exactly one queue slot from enqueue until it is released, the queue is
/// cleared, or the session is torn down. Chunk data is shared (`Arc`) so the video worker can
/// decode without the queue lock held.
#[derive(Clone, Debug)]
pub(crate) struct Packet {
    /// Session-unique serial, used by the worker to mark the decoded flag without holding a
    /// reference across the decode.
    pub serial: u64,
    /// Presentation timestamp, in milliseconds.
    pub ts: Timestamp,
    /// Packet attributes.
    pub flags: PacketFlags,
    /// The bitstream chunks.
    pub chunks: SmallVec<[Arc<[u8]>; 1]>,
}

impl Packet {
    pub fn is_decoded(&self) -> bool {
        self.flags.contains(PacketFlags::DECODED)
    }
}

/// An ordered packet queue, implemented as a growable ring.
///
/// Capacity grows in steps of [`QUEUE_CAPACITY_STEP`] and never shrinks during a session.
/// Growth re-linearizes the ring into a fresh allocation; packets never move otherwise.
///
/// Growth happens under the I/O lock alone. The worker clones `Arc` chunk handles out of a slot
/// before decoding and never reads queue storage while the decode runs, so re-linearization
/// cannot invalidate an in-flight decode.
#[derive(Debug, Default)]
pub(crate) struct PacketQueue {
    slots: Vec<Option<Packet>>,
    begin: usize,
    count: usize,
}

impl PacketQueue {
    pub fn new() -> Self {
        PacketQueue { slots: Vec::new(), begin: 0, count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn slot_index(&self, nth: usize) -> usize {
        (self.begin + nth) % self.slots.len()
    }

    /// Append a packet. Packets of one queue must arrive in non-decreasing timestamp order; the
    /// demuxer driver guarantees this per stream.
    pub fn push(&mut self, packet: Packet) -> Result<()> {
        if self.count == self.slots.len() {
            self.grow()?;
        }

        debug_assert!(self.peek_newest().map_or(true, |last| last.ts <= packet.ts));

        let index = self.slot_index(self.count);
        self.slots[index] = Some(packet);
        self.count += 1;
        Ok(())
    }

    /// Grow capacity by one step, re-linearizing the ring. On allocation failure the queue is
    /// left consistent at its old capacity.
    fn grow(&mut self) -> Result<()> {
        let new_cap = self.slots.len() + QUEUE_CAPACITY_STEP;

        let mut new_slots: Vec<Option<Packet>> = Vec::new();
        new_slots.try_reserve_exact(new_cap).map_err(|_| Error::OutOfMemory)?;

        if !self.slots.is_empty() {
            for nth in 0..self.count {
                let index = self.slot_index(nth);
                new_slots.push(self.slots[index].take());
            }
        }
        new_slots.resize_with(new_cap, || None);

        self.slots = new_slots;
        self.begin = 0;
        Ok(())
    }

    pub fn peek_oldest(&self) -> Option<&Packet> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.begin].as_ref()
    }

    pub fn peek_newest(&self) -> Option<&Packet> {
        if self.count == 0 {
            return None;
        }
        self.slots[self.slot_index(self.count - 1)].as_ref()
    }

    /// Find the first packet, in queue order, that has not been decoded yet.
    ///
    /// The scan bounds its own work: it gives up once it has passed more than
    /// [`VIDEO_FRAMES_TO_PREFETCH`] packets whose timestamp exceeds `position`. During a
    /// playback stall everything past the prefetch window is not worth decoding yet.
    pub fn peek_oldest_undecoded(&self, position: Timestamp) -> Option<&Packet> {
        let mut ahead = 0usize;

        for nth in 0..self.count {
            let packet = self.slots[self.slot_index(nth)].as_ref()?;

            if !packet.is_decoded() {
                return Some(packet);
            }

            if packet.ts > position {
                ahead += 1;
                if ahead > VIDEO_FRAMES_TO_PREFETCH {
                    break;
                }
            }
        }

        None
    }

    /// Set the decoded flag on the packet with the given serial. Returns false if the packet is
    /// no longer queued (e.g. the queue was cleared by a seek while the decode ran).
    pub fn mark_decoded(&mut self, serial: u64) -> bool {
        for nth in 0..self.count {
            let index = self.slot_index(nth);
            if let Some(packet) = self.slots[index].as_mut() {
                if packet.serial == serial {
                    packet.flags.insert(PacketFlags::DECODED);
                    return true;
                }
            }
        }
        false
    }

    /// Remove and return the oldest packet. Dropping the returned packet releases the underlying
    /// chunk data, exactly once, unless the worker still holds a decode in flight on it.
    pub fn release_oldest(&mut self) -> Option<Packet> {
        if self.count == 0 {
            return None;
        }

        let packet = self.slots[self.begin].take();
        debug_assert!(packet.is_some());

        self.begin = (self.begin + 1) % self.slots.len();
        self.count -= 1;
        packet
    }

    /// Drop all packets. Capacity is retained.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.begin = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{Packet, PacketFlags, PacketQueue};
    use crate::QUEUE_CAPACITY_STEP;
    use smallvec::SmallVec;

    fn packet(serial: u64, ts: u64) -> Packet {
        Packet { serial, ts, flags: PacketFlags::empty(), chunks: SmallVec::new() }
    }

    #[test]
    fn push_and_release_preserve_order() {
        let mut queue = PacketQueue::new();

        for i in 0..40 {
            queue.push(packet(i, i * 10)).unwrap();
        }
        assert_eq!(queue.len(), 40);
        assert_eq!(queue.peek_oldest().unwrap().serial, 0);
        assert_eq!(queue.peek_newest().unwrap().serial, 39);

        for i in 0..40 {
            let released = queue.release_oldest().unwrap();
            assert_eq!(released.serial, i);
            assert_eq!(released.ts, i * 10);
        }
        assert!(queue.is_empty());
        assert!(queue.release_oldest().is_none());
    }

    #[test]
    fn growth_relinearizes_wrapped_ring() {
        let mut queue = PacketQueue::new();

        // Fill one capacity step, drain half so `begin` sits mid-ring, then push enough to wrap
        // and force a growth while wrapped.
        for i in 0..QUEUE_CAPACITY_STEP as u64 {
            queue.push(packet(i, i)).unwrap();
        }
        for _ in 0..QUEUE_CAPACITY_STEP / 2 {
            queue.release_oldest().unwrap();
        }
        for i in 0..QUEUE_CAPACITY_STEP as u64 + 4 {
            queue.push(packet(100 + i, 100 + i)).unwrap();
        }

        // All packets must come out in order despite the re-linearization.
        let mut last = 0;
        while let Some(released) = queue.release_oldest() {
            assert!(released.ts >= last);
            last = released.ts;
        }
        assert_eq!(last, 100 + QUEUE_CAPACITY_STEP as u64 + 3);
    }

    #[test]
    fn undecoded_scan_is_bounded_by_prefetch_window() {
        let mut queue = PacketQueue::new();

        // All packets decoded, all far ahead of the position: the scan must give up rather than
        // walk an arbitrarily long queue.
        for i in 0..64u64 {
            let mut p = packet(i, 1_000 + i);
            p.flags.insert(PacketFlags::DECODED);
            queue.push(p).unwrap();
        }
        // One undecoded packet beyond the scan bound is not found.
        queue.push(packet(64, 2_000)).unwrap();
        assert!(queue.peek_oldest_undecoded(0).is_none());

        // But it is found once the position catches up.
        assert_eq!(queue.peek_oldest_undecoded(1_060).unwrap().serial, 64);
    }

    #[test]
    fn mark_decoded_by_serial() {
        let mut queue = PacketQueue::new();
        queue.push(packet(7, 0)).unwrap();
        queue.push(packet(8, 10)).unwrap();

        assert!(queue.mark_decoded(8));
        assert!(!queue.peek_oldest().unwrap().is_decoded());
        assert!(!queue.mark_decoded(99));

        queue.clear();
        assert!(!queue.mark_decoded(7));
        assert!(queue.is_empty());
    }
}
