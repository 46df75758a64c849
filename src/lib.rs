// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vignette is a playback library for short WebM clips carrying AV1 video and Vorbis audio,
//! aimed at applications and games that want to embed a cutscene or intro player without
//! linking a general media framework.
//!
//! A [`Player`] session demultiplexes the container, runs AV1 decoding on a dedicated worker
//! thread overlapped with Vorbis decoding on the caller thread, and hands back decoded YUV
//! pictures and float PCM. The caller either polls packet-by-packet ([`Player::decode_next`],
//! [`Player::decode_until`]) or lets a background driver pace decoding against a wall clock
//! ([`Player::play`]).
//!
//! The WebM parser, the AV1 decoder, and the Vorbis decoder are external collaborators: the
//! session drives them through the traits in [`formats`] and [`codecs`], bound by a
//! [`MediaBackend`](formats::MediaBackend) implementation supplied at construction.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU8, Ordering};

pub mod codecs;
pub mod errors;
pub mod formats;
pub mod io;
pub mod settings;
pub mod units;

mod audio;
mod frames;
mod ingest;
mod playback;
mod queue;
mod seek;
mod session;
mod shared;
mod worker;

pub use errors::{Error, Result, Status};
pub use session::{AudioFrame, Player, VideoFrame};
pub use settings::{LogLevel, Settings};

/// The bound on how many video packets may sit decoded ahead of the display position. The
/// frame ring holds one more than this so a display-ready frame can wait at the head while the
/// window stays full behind it.
pub const VIDEO_FRAMES_TO_PREFETCH: usize = 10;

/// The capacity of the audio buffer, in frames per channel.
pub const AUDIO_BUFFER_SIZE: usize = 4096;

/// The packet queue growth increment, in slots.
pub(crate) const QUEUE_CAPACITY_STEP: usize = 16;

static DEFAULT_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warning as u8);

/// Set the log level used by sessions whose settings do not override it. Affects sessions
/// created afterwards; running sessions keep the level they were configured with.
pub fn set_default_log_level(level: LogLevel) {
    DEFAULT_LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// The library-wide default log level.
pub(crate) fn default_log_level() -> LogLevel {
    match DEFAULT_LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Error,
        1 => LogLevel::Warning,
        _ => LogLevel::Info,
    }
}
