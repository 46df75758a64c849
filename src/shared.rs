// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `shared` module holds the session state shared between the caller thread, the video
//! worker, and the playback driver, together with the locking plan.
//!
//! Four locks exist, all owned here:
//!
//! * the I/O lock (`io`) guards the packet queues and the frame ring, and anchors the
//!   `has_packets` and `has_frames` condition variables;
//! * the decoder lock (`decoder`) guards the AV1 decoder context;
//! * the info lock (`info`) guards position, status, the frame counter, and the playback
//!   seek-request slot;
//! * the control lock (`ctl`) guards the worker command word and anchors the pause/resume
//!   handshake (`has_changed_status`).
//!
//! Lock order: io and info are never held together; a caller-side thread takes io, drops it,
//! then touches info. The worker takes io then decoder, and may take `ctl` while holding io.
//! No thread takes io while already holding `ctl`. The seek engine takes the decoder lock only
//! while the worker is paused.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};

use crate::codecs::VideoDecoder;
use crate::errors::{ErrorKind, Status};
use crate::frames::FrameRing;
use crate::queue::PacketQueue;
use crate::settings::LogLevel;
use crate::units::Timestamp;

/// The worker command word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum WorkerCommand {
    None,
    Pause,
    Stop,
}

/// State guarded by the control lock.
#[derive(Debug)]
pub(crate) struct WorkerCtl {
    pub command: WorkerCommand,
    /// The worker acknowledged a pause and will not touch the queues, the frame ring, or the
    /// decoder until resumed.
    pub paused: bool,
    /// The worker thread has returned.
    pub exited: bool,
}

/// State guarded by the I/O lock.
#[derive(Debug, Default)]
pub(crate) struct IoState {
    pub video: PacketQueue,
    pub audio: PacketQueue,
    pub frames: FrameRing,
}

/// State guarded by the info lock.
#[derive(Debug)]
pub(crate) struct Info {
    /// The session position in milliseconds. Monotone non-decreasing except across a seek.
    pub position: Timestamp,
    pub status: Status,
    /// Video packets consumed after decode, including seek pre-roll.
    pub frames_processed: u64,
    /// Seek target deposited while timed playback is active, serviced by the playback thread.
    pub seek_request: Option<Timestamp>,
}

pub(crate) struct Shared {
    pub io: Mutex<IoState>,
    /// Signaled after a video packet is appended; waited on by the worker.
    pub has_packets: Condvar,
    /// Signaled after the worker pushes a picture; waited on by the caller.
    pub has_frames: Condvar,
    pub decoder: Mutex<Option<Box<dyn VideoDecoder>>>,
    pub info: Mutex<Info>,
    pub ctl: Mutex<WorkerCtl>,
    /// The pause/resume/exit handshake.
    pub has_changed_status: Condvar,
    /// Mirrors `Info::status.is_error()`. Wait loops that hold the I/O lock check this instead
    /// of the info lock; the two locks are never held together.
    failed: AtomicBool,
    log_level: AtomicU8,
}

impl Shared {
    pub fn new(log_level: LogLevel) -> Self {
        Shared {
            io: Mutex::new(IoState::default()),
            has_packets: Condvar::new(),
            has_frames: Condvar::new(),
            decoder: Mutex::new(None),
            info: Mutex::new(Info {
                position: 0,
                status: Status::Ok,
                frames_processed: 0,
                seek_request: None,
            }),
            ctl: Mutex::new(WorkerCtl {
                command: WorkerCommand::None,
                paused: false,
                exited: true,
            }),
            has_changed_status: Condvar::new(),
            failed: AtomicBool::new(false),
            log_level: AtomicU8::new(log_level as u8),
        }
    }

    /// Whether an error kind has been latched. Safe to call with any lock held.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.log_level.store(level as u8, Ordering::Relaxed);
    }

    /// Whether the session's log level admits messages of the given level.
    pub fn log_allows(&self, level: LogLevel) -> bool {
        level as u8 <= self.log_level.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> Status {
        self.info.lock().unwrap().status
    }

    pub fn position(&self) -> Timestamp {
        self.info.lock().unwrap().position
    }

    pub fn set_position(&self, position: Timestamp) {
        self.info.lock().unwrap().position = position;
    }

    pub fn set_status(&self, status: Status) {
        let mut info = self.info.lock().unwrap();
        // An error kind, once latched, is never overwritten.
        if !info.status.is_error() {
            info.status = status;
        }
    }

    /// Latch an error kind into the status and wake every thread that may be blocked, so wait
    /// loops can observe the failure and abort.
    ///
    /// The failed flag is not guarded by the I/O lock, so the wakeups for its condvars must be
    /// issued with the I/O lock held: a waiter that observed the flag clear cannot then miss
    /// the notification, because the flag was set before this thread could acquire the lock the
    /// waiter is about to release.
    pub fn latch_error(&self, kind: ErrorKind) {
        {
            let mut info = self.info.lock().unwrap();
            if !info.status.is_error() {
                info.status = Status::Error(kind);
            }
        }
        self.failed.store(true, Ordering::Relaxed);
        {
            let _io = self.io.lock().unwrap();
            self.has_packets.notify_all();
            self.has_frames.notify_all();
        }
        self.has_changed_status.notify_all();
    }

    /// Request the worker to pause and wait for the acknowledgment.
    ///
    /// On return the worker is parked and will not touch the queues, the frame ring, or the
    /// decoder until [`resume_worker`](Self::resume_worker). This is the discipline that makes
    /// seeking possible.
    pub fn pause_worker(&self) {
        {
            let mut ctl = self.ctl.lock().unwrap();
            if ctl.exited {
                return;
            }
            ctl.command = WorkerCommand::Pause;
        }

        // The worker may be asleep waiting for packets. Notifying under the I/O lock pairs
        // with the worker's command re-check before it sleeps, so the wakeup cannot be missed.
        // The control lock is not held here; the worker acquires it while holding the I/O lock.
        {
            let _io = self.io.lock().unwrap();
            self.has_packets.notify_all();
        }

        let mut ctl = self.ctl.lock().unwrap();
        while !ctl.paused && !ctl.exited {
            ctl = self.has_changed_status.wait(ctl).unwrap();
        }
    }

    /// Release a paused worker.
    pub fn resume_worker(&self) {
        let mut ctl = self.ctl.lock().unwrap();
        ctl.paused = false;
        self.has_changed_status.notify_all();
    }

    /// Request the worker to stop. The caller joins the thread afterwards.
    pub fn stop_worker(&self) {
        {
            let mut ctl = self.ctl.lock().unwrap();
            ctl.command = WorkerCommand::Stop;
            ctl.paused = false;
            self.has_changed_status.notify_all();
        }

        let _io = self.io.lock().unwrap();
        self.has_packets.notify_all();
    }
}
