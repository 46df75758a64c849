// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `seek` module implements the two-pass seek engine.
//!
//! AV1 requires a sequence header and a keyframe before any other frame can be decoded, so a
//! seek cannot simply reposition the demuxer. Pass A is a dry run that locates the last safe
//! starting point at or before the target without decoding anything; pass B decodes forward
//! from there, replacing rather than accumulating pictures, until the target is reached.

use log::debug;

use crate::errors::{decoder_error, Result, Status};
use crate::ingest::Fetch;
use crate::session::{PullState, SeekPhase};
use crate::settings::LogLevel;
use crate::units::{fmt_timestamp, Timestamp};

impl PullState {
    /// Seek to `target` milliseconds. `fast` ends the seek at the located keyframe instead of
    /// decoding up to the exact target. `forced` runs the protocol even when the session is
    /// already positioned at the target.
    ///
    /// Errors latch the session status before propagating.
    pub(crate) fn seek_to_checked(
        &mut self,
        target: Timestamp,
        fast: bool,
        forced: bool,
    ) -> Result<Status> {
        let target = target.min(self.duration);

        // Repeating a completed seek is a no-op.
        if !forced && self.shared.position() == target && !self.seek.is_seeking() {
            return Ok(self.shared.status());
        }

        match self.run_seek(target, fast) {
            Ok(status) => Ok(status),
            Err(err) => {
                self.seek = SeekPhase::NotSeeking;
                self.discard_video_below = None;
                self.shared.latch_error(err.kind());
                self.shared.resume_worker();
                Err(err)
            }
        }
    }

    /// Convenience wrapper used by the decode path and the playback driver.
    pub(crate) fn seek_to(&mut self, target: Timestamp, fast: bool) -> Result<Status> {
        self.seek_to_checked(target, fast, false)
    }

    fn run_seek(&mut self, target: Timestamp, fast: bool) -> Result<Status> {
        if self.shared.log_allows(LogLevel::Info) {
            debug!("seeking to {} (fast={})", fmt_timestamp(target), fast);
        }

        self.seek = SeekPhase::Starting;

        // Pause the worker. From here until resume, the queues, the frame ring, and the AV1
        // decoder belong to this thread.
        self.shared.pause_worker();

        // Seeking to the very end produces no picture: drain everything and finish.
        if target == self.duration {
            self.reset_pipeline();
            self.all_fetched = true;
            self.seek = SeekPhase::NotSeeking;
            self.shared.resume_worker();
            self.shared.set_position(target);
            self.shared.set_status(Status::Finished);
            return Ok(Status::Finished);
        }

        let plan = match &self.video {
            Some(_) => Some(self.locate_keyframe(target)?),
            None => None,
        };

        // Pass B: reposition, then decode forward.
        self.reset_pipeline();

        match plan {
            Some((cue_ticks, keyframe_ts)) => {
                let track_id = self.video.as_ref().unwrap().track_id;
                self.demuxer.seek_track(track_id, cue_ticks)?;

                self.seek = SeekPhase::ForTimestamp;
                self.discard_video_below = Some(keyframe_ts);
                self.shared.resume_worker();
                self.preroll(target, keyframe_ts, fast)?;
            }
            None => {
                let track_id = self.audio.as_ref().unwrap().track_id;
                self.demuxer.seek_track(track_id, self.time_scale.ms_to_ticks(target))?;

                self.seek = SeekPhase::ForTimestamp;
                self.shared.resume_worker();
                self.preroll_audio_only(target)?;
            }
        }

        self.seek = SeekPhase::NotSeeking;
        self.discard_video_below = None;
        self.shared.set_position(target);

        // A backward seek out of the finished state resumes normal decoding.
        self.shared.set_status(Status::Ok);
        Ok(Status::Ok)
    }

    /// Pass A: locate the last keyframe at or before `target`, retrying from earlier cue
    /// points when a scan finds none. Returns the cue position to restart from (in ticks) and
    /// the keyframe timestamp (in milliseconds).
    ///
    /// The scan is a dry run: packets are read straight off the demuxer, never enqueued, and
    /// only the sequence-header parser ever sees their payload. Audio is ignored entirely.
    fn locate_keyframe(&mut self, target: Timestamp) -> Result<(u64, Timestamp)> {
        let track_id = self.video.as_ref().unwrap().track_id;

        // Candidate cue positions at or before the target, most specific first, with the start
        // of the stream as the final fallback.
        let mut candidates: Vec<u64> = self
            .demuxer
            .cue_points()
            .iter()
            .map(|cue| cue.ts)
            .filter(|&ts| self.time_scale.ticks_to_ms(ts) <= target)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        if candidates.first() != Some(&0) {
            candidates.insert(0, 0);
        }

        while let Some(cue_ticks) = candidates.pop() {
            self.seek = SeekPhase::ForSequenceHeader;
            self.demuxer.seek_track(track_id, cue_ticks)?;
            self.reset_pipeline();

            let mut keyframe: Option<Timestamp> = None;
            let mut have_seq_header = false;

            while let Some(raw) = self.demuxer.next_packet()? {
                if raw.track_id != track_id {
                    continue;
                }

                let ts = self.time_scale.ticks_to_ms(raw.ts);

                if !have_seq_header {
                    let mut slot = self.shared.decoder.lock().unwrap();
                    let decoder = slot.as_mut().expect("video decoder bound");
                    for chunk in &raw.chunks {
                        if decoder.parse_sequence_header(chunk).is_ok() {
                            have_seq_header = true;
                            self.seek = SeekPhase::ForKeyframe;
                            break;
                        }
                    }
                }

                if have_seq_header && raw.keyframe {
                    if ts <= target {
                        keyframe = Some(ts);
                        self.seek = SeekPhase::FoundKeyframe;
                    }
                    else if keyframe.is_none() && cue_ticks == 0 {
                        // The stream has no keyframe at or before the target even from its
                        // start (it begins mid group-of-pictures). Land on the first keyframe
                        // past the target so the seek still reaches decodable data.
                        keyframe = Some(ts);
                        self.seek = SeekPhase::FoundKeyframe;
                        break;
                    }
                }

                if ts >= target && (keyframe.is_some() || cue_ticks > 0) {
                    break;
                }
            }

            if let Some(keyframe_ts) = keyframe {
                if self.shared.log_allows(LogLevel::Info) {
                    debug!(
                        "seek keyframe at {} (cue {})",
                        fmt_timestamp(keyframe_ts),
                        cue_ticks
                    );
                }
                return Ok((cue_ticks, keyframe_ts));
            }

            if self.shared.log_allows(LogLevel::Info) {
                debug!("no keyframe found after cue {}, retrying from an earlier cue", cue_ticks);
            }

            // The demuxer may have run to the end during the scan.
            self.all_fetched = false;
        }

        decoder_error("no keyframe found for seek target")
    }

    /// Pass B: stream packets forward from the cue point, decoding video through the worker in
    /// replace mode and warming the audio decoder, until the stop bound is consumed.
    ///
    /// The stop bound is the target, or the keyframe for a fast seek. Prefetching during the
    /// pre-roll never queues a video packet beyond the first one at or past the bound, so the
    /// worker cannot decode ahead of the stop point and evict the display frame.
    fn preroll(&mut self, target: Timestamp, keyframe_ts: Timestamp, fast: bool) -> Result<()> {
        let bound = if fast { keyframe_ts } else { target.max(keyframe_ts) };

        loop {
            self.sync_for_seek(bound)?;

            let (video_ts, audio_ts) = self.peek_heads();

            let pick_video = match (video_ts, audio_ts) {
                (None, None) => {
                    if self.all_fetched {
                        break;
                    }
                    continue;
                }
                (Some(v), Some(a)) => v <= a,
                (Some(_), None) => true,
                (None, Some(_)) => false,
            };

            if pick_video {
                let head = video_ts.unwrap();
                if head > bound {
                    break;
                }
                let ts = self.consume_video_head()?;
                if ts >= bound {
                    break;
                }
            }
            else {
                let head = audio_ts.unwrap();
                if head > bound {
                    break;
                }
                // Track-only until the keyframe; decode for real from there so the ring holds
                // audio covering the target when the seek completes.
                self.consume_audio_head(head < keyframe_ts)?;
            }
        }

        Ok(())
    }

    /// Pass B for a session without video: warm the audio decoder up to the target.
    fn preroll_audio_only(&mut self, target: Timestamp) -> Result<()> {
        loop {
            self.sync_for_seek(target)?;

            let head = {
                let io = self.shared.io.lock().unwrap();
                io.audio.peek_oldest().map(|p| p.ts)
            };

            match head {
                None => {
                    if self.all_fetched {
                        break;
                    }
                }
                Some(ts) if ts >= target => break,
                Some(_) => {
                    self.consume_audio_head(true)?;
                }
            }
        }

        Ok(())
    }

    /// The seek-mode prefetch policy: pull packets until the queue of the driving stream holds
    /// one at or past `bound`, or the stream ends. Unlike the playback policy, this never reads
    /// ahead of the stop point.
    fn sync_for_seek(&mut self, bound: Timestamp) -> Result<()> {
        loop {
            if self.all_fetched {
                return Ok(());
            }

            let satisfied = {
                let io = self.shared.io.lock().unwrap();
                if self.video.is_some() {
                    io.video.peek_newest().map_or(false, |p| p.ts >= bound)
                }
                else {
                    io.audio.peek_newest().map_or(false, |p| p.ts >= bound)
                }
            };

            if satisfied {
                return Ok(());
            }

            match self.fetch_one()? {
                Fetch::EndOfStream => return Ok(()),
                Fetch::Fetched => {}
            }
        }
    }

    /// Clear both queues and the frame ring, flush the AV1 decoder, restart Vorbis synthesis,
    /// and reset the demux bookkeeping. Requires the worker to be paused.
    pub(crate) fn reset_pipeline(&mut self) {
        {
            let mut io = self.shared.io.lock().unwrap();
            io.video.clear();
            io.audio.clear();
            io.frames.clear();
        }

        if let Some(decoder) = self.shared.decoder.lock().unwrap().as_mut() {
            decoder.flush();
        }

        if let Some(audio) = self.audio.as_mut() {
            audio.stream.restart();
        }

        self.all_fetched = false;
        self.synced = false;
    }

    /// The head timestamps of the two queues, for streams that are bound.
    fn peek_heads(&self) -> (Option<Timestamp>, Option<Timestamp>) {
        let io = self.shared.io.lock().unwrap();
        let video = if self.video.is_some() { io.video.peek_oldest().map(|p| p.ts) } else { None };
        let audio = if self.audio.is_some() { io.audio.peek_oldest().map(|p| p.ts) } else { None };
        (video, audio)
    }
}
