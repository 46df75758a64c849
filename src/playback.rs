// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `playback` module implements the timed playback driver.
//!
//! The driver is an ordinary consumer of the pull API running on its own thread: it samples a
//! monotonic clock, asks the session to decode up to the elapsed position, and hands output to
//! the session callbacks. Seeks requested while it runs are deposited in the info-lock slot and
//! serviced between ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::errors::{Error, Result, Status};
use crate::session::PullState;
use crate::shared::Shared;

pub(crate) struct PlaybackHandle {
    thread: thread::JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

impl PlaybackHandle {
    pub fn spawn(
        pull: Arc<Mutex<PullState>>,
        shared: Arc<Shared>,
        playing: Arc<AtomicBool>,
    ) -> Result<PlaybackHandle> {
        let stop = Arc::new(AtomicBool::new(false));

        playing.store(true, Ordering::Relaxed);

        let thread = {
            let stop = stop.clone();
            let playing = playing.clone();
            thread::Builder::new()
                .name("vignette-playback".to_string())
                .spawn(move || run(pull, shared, stop, playing))
        };

        match thread {
            Ok(thread) => Ok(PlaybackHandle { thread, stop }),
            Err(err) => {
                playing.store(false, Ordering::Relaxed);
                Err(Error::IoError(err))
            }
        }
    }

    /// Ask the driver to wind down at the next tick.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn join(self) {
        let _ = self.thread.join();
    }
}

fn run(
    pull: Arc<Mutex<PullState>>,
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
) {
    let mut base = shared.position();
    let mut start = Instant::now();

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        // Service a seek deposited by the caller thread. The clock restarts at the new
        // position.
        let request = { shared.info.lock().unwrap().seek_request.take() };
        if let Some(target) = request {
            let mut pull = pull.lock().unwrap();
            let fast = pull.settings.use_fast_seeking;
            if pull.seek_to(target, fast).is_err() {
                break;
            }
            base = shared.position();
            start = Instant::now();
            continue;
        }

        let target = base.saturating_add(start.elapsed().as_millis() as u64);

        // Nothing to decode this tick.
        if shared.position() >= target {
            thread::sleep(Duration::from_millis(1));
            continue;
        }

        let outcome = { pull.lock().unwrap().decode_until(target) };
        match outcome {
            Ok(Status::Ok) => {}
            // End of media, or a latched error: the driver winds down either way.
            Ok(Status::Finished) | Ok(Status::Error(_)) | Err(_) => break,
        }
    }

    playing.store(false, Ordering::Relaxed);
}
