// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `worker` module implements the dedicated video decode thread.

use std::sync::Arc;

use log::{error, warn};
use smallvec::SmallVec;

use crate::codecs::{Picture, VideoDecoder};
use crate::errors::Result;
use crate::queue::PacketFlags;
use crate::settings::LogLevel;
use crate::shared::{Shared, WorkerCommand};
use crate::units::{fmt_timestamp, Timestamp};

/// Everything the worker needs to decode one packet without holding the I/O lock. Chunk data is
/// shared with the owning queue slot.
struct DecodeJob {
    serial: u64,
    ts: Timestamp,
    during_seek: bool,
    chunks: SmallVec<[Arc<[u8]>; 1]>,
}

/// The worker loop.
///
/// The lifecycle is bound to the session: the session spawns the thread at construction and
/// joins it on teardown. The loop:
///
/// 1. services the command word (pause handshake, stop);
/// 2. under the I/O lock, picks the oldest not-yet-decoded video packet, or sleeps on
///    `has_packets`;
/// 3. under the decoder lock (I/O lock released), runs the AV1 decode;
/// 4. under the I/O lock again, pushes the picture onto the frame ring (replacing instead of
///    appending for packets enqueued mid-seek), marks the packet decoded, and signals
///    `has_frames`.
pub(crate) fn run(shared: Arc<Shared>) {
    loop {
        {
            let mut ctl = shared.ctl.lock().unwrap();
            match ctl.command {
                WorkerCommand::Stop => {
                    ctl.exited = true;
                    drop(ctl);
                    shared.has_changed_status.notify_all();
                    return;
                }
                WorkerCommand::Pause => {
                    ctl.command = WorkerCommand::None;
                    ctl.paused = true;
                    shared.has_changed_status.notify_all();

                    while ctl.paused && ctl.command != WorkerCommand::Stop {
                        ctl = shared.has_changed_status.wait(ctl).unwrap();
                    }

                    if ctl.command == WorkerCommand::Stop {
                        ctl.exited = true;
                        drop(ctl);
                        shared.has_changed_status.notify_all();
                        return;
                    }
                    continue;
                }
                WorkerCommand::None => {}
            }
        }

        // A latched error aborts the loop; the caller was already woken.
        if shared.status().is_error() {
            exit(&shared);
            return;
        }

        // The undecoded scan needs the session position to bound itself. Read it before taking
        // the I/O lock; the two locks are never held together.
        let position = shared.position();

        let job = {
            let io = shared.io.lock().unwrap();
            match io.video.peek_oldest_undecoded(position) {
                Some(packet) => Some(DecodeJob {
                    serial: packet.serial,
                    ts: packet.ts,
                    during_seek: packet.flags.contains(PacketFlags::DURING_SEEK),
                    chunks: packet.chunks.clone(),
                }),
                None => {
                    // Nothing to decode. The command word is re-checked while the I/O lock is
                    // still held: a pause or stop request issued since the top of the loop
                    // notifies `has_packets` under the I/O lock, so it either lands before this
                    // check or wakes the wait below. Taking the control lock here nests io
                    // before ctl; no other thread nests them in the opposite order.
                    let command_pending =
                        { shared.ctl.lock().unwrap().command != WorkerCommand::None };
                    if !command_pending && !shared.has_failed() {
                        let _io = shared.has_packets.wait(io).unwrap();
                    }
                    None
                }
            }
        };

        let Some(job) = job
        else {
            continue;
        };

        let decoded = {
            let mut slot = shared.decoder.lock().unwrap();
            match slot.as_mut() {
                Some(decoder) => decode_packet(decoder.as_mut(), &job, &shared),
                // The video stream is being reconfigured; the packet will be cleared.
                None => Ok(None),
            }
        };

        match decoded {
            Ok(picture) => {
                let mut io = shared.io.lock().unwrap();
                if io.video.mark_decoded(job.serial) {
                    if let Some(picture) = picture {
                        let picture = Arc::new(picture);
                        if job.during_seek {
                            io.frames.push_replacing(picture, job.ts);
                        }
                        else {
                            io.frames.push(picture, job.ts);
                        }
                    }
                }
                else if shared.log_allows(LogLevel::Warning) {
                    // Only a queue reset can make a packet disappear, and resets require the
                    // pause handshake. Seeing this means the handshake was bypassed.
                    warn!("decoded packet at {} is no longer queued", fmt_timestamp(job.ts));
                }
                drop(io);
                shared.has_frames.notify_all();
            }
            Err(err) => {
                if shared.log_allows(LogLevel::Error) {
                    error!("video decode failed at {}: {}", fmt_timestamp(job.ts), err);
                }
                shared.latch_error(err.kind());
                exit(&shared);
                return;
            }
        }
    }
}

/// Decode all chunks of one packet. One packet is expected to produce at most one picture;
/// extra pictures are dropped with a warning.
fn decode_packet(
    decoder: &mut dyn VideoDecoder,
    job: &DecodeJob,
    shared: &Shared,
) -> Result<Option<Picture>> {
    let mut first = None;

    for chunk in &job.chunks {
        decoder.send_data(chunk)?;

        while let Some(picture) = decoder.next_picture()? {
            if first.is_none() {
                first = Some(picture);
            }
            else if shared.log_allows(LogLevel::Warning) {
                warn!(
                    "video packet at {} produced more than one picture, dropping the extras",
                    fmt_timestamp(job.ts)
                );
            }
        }
    }

    Ok(first)
}

fn exit(shared: &Shared) {
    let mut ctl = shared.ctl.lock().unwrap();
    ctl.exited = true;
    drop(ctl);
    shared.has_changed_status.notify_all();
}
