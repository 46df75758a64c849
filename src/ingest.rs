// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `ingest` module implements the demuxer driver and the prefetch policy.

use log::debug;

use crate::errors::Result;
use crate::queue::{Packet, PacketFlags};
use crate::session::PullState;
use crate::settings::LogLevel;
use crate::units::fmt_timestamp;
use crate::VIDEO_FRAMES_TO_PREFETCH;

/// The outcome of one demuxer read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Fetch {
    /// One packet was read (and enqueued or dropped).
    Fetched,
    /// The demuxer is at the end of the stream.
    EndOfStream,
}

impl PullState {
    /// Read one packet from the demuxer, classify it against the bound tracks, normalize its
    /// timestamp to milliseconds, and enqueue it. Packets for non-active tracks are read and
    /// dropped immediately; audio packets whose adjusted timestamp falls outside the media are
    /// dropped silently.
    pub(crate) fn fetch_one(&mut self) -> Result<Fetch> {
        if self.all_fetched {
            return Ok(Fetch::EndOfStream);
        }

        let raw = match self.demuxer.next_packet()? {
            Some(raw) => raw,
            None => {
                self.all_fetched = true;
                return Ok(Fetch::EndOfStream);
            }
        };

        let ts = self.time_scale.ticks_to_ms(raw.ts);
        let video_track = self.video.as_ref().map(|v| v.track_id);
        let audio_track = self.audio.as_ref().map(|a| a.track_id);

        if Some(raw.track_id) == video_track {
            // Frames that precede the seek keyframe have no reference to decode against.
            if self.seek.is_seeking() && self.discard_video_below.map_or(false, |limit| ts < limit)
            {
                return Ok(Fetch::Fetched);
            }

            let mut flags = PacketFlags::empty();
            if raw.keyframe {
                flags |= PacketFlags::KEYFRAME;
            }
            if self.seek.is_seeking() {
                flags |= PacketFlags::DURING_SEEK;
            }

            let packet = Packet { serial: self.next_serial(), ts, flags, chunks: raw.chunks };

            {
                let mut io = self.shared.io.lock().unwrap();
                io.video.push(packet)?;
            }
            self.shared.has_packets.notify_all();
        }
        else if Some(raw.track_id) == audio_track {
            if let Some(adjusted) = self.adjust_audio_timestamp(ts) {
                let mut flags = PacketFlags::empty();
                if raw.keyframe {
                    flags |= PacketFlags::KEYFRAME;
                }

                let packet =
                    Packet { serial: self.next_serial(), ts: adjusted, flags, chunks: raw.chunks };

                let mut io = self.shared.io.lock().unwrap();
                io.audio.push(packet)?;
            }
        }
        else if self.shared.log_allows(LogLevel::Info) {
            debug!("dropping packet of inactive track {} at {}", raw.track_id, fmt_timestamp(ts));
        }

        Ok(Fetch::Fetched)
    }

    /// Apply the configured audio offset. Returns `None` when the packet must be dropped: a
    /// negative offset larger than the timestamp, or a positive offset pushing the timestamp
    /// past the media duration.
    fn adjust_audio_timestamp(&self, ts: u64) -> Option<u64> {
        let offset = self.settings.audio_offset_time;

        if offset < 0 {
            ts.checked_sub(offset.unsigned_abs())
        }
        else {
            let adjusted = ts.saturating_add(offset as u64);
            if adjusted > self.duration {
                return None;
            }
            Some(adjusted)
        }
    }

    /// The prefetch policy, run before every queue consumption:
    ///
    /// * keep the video queue at the prefetch window plus the display slot;
    /// * with a negative audio offset, keep an audio packet at or past the session position
    ///   queued so the offset invariant holds;
    /// * never leave both queues empty while the stream has packets left.
    ///
    /// Demands are satisfied by pulling packets one at a time until the demuxer reports end of
    /// stream. A successful sync latches until the next release.
    pub(crate) fn sync_queues(&mut self) -> Result<()> {
        if self.synced {
            return Ok(());
        }

        loop {
            if self.all_fetched {
                break;
            }

            // Read the position before the I/O lock; the two locks are never held together.
            let position = self.shared.position();

            let demand = {
                let io = self.shared.io.lock().unwrap();

                let video_low = self.video.is_some()
                    && io.video.len() < VIDEO_FRAMES_TO_PREFETCH + 1;

                let audio_low = self.audio.is_some()
                    && self.settings.audio_offset_time < 0
                    && io.audio.peek_newest().map_or(true, |p| p.ts < position);

                let starved = io.video.is_empty() && io.audio.is_empty();

                video_low || audio_low || starved
            };

            if !demand {
                break;
            }

            match self.fetch_one()? {
                Fetch::EndOfStream => break,
                Fetch::Fetched => {}
            }
        }

        self.synced = true;
        Ok(())
    }
}
