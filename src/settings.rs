// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `settings` module defines the per-session options.

use std::fmt;
use std::sync::Arc;

use crate::session::{AudioFrame, VideoFrame};

/// The amount of diagnostics a session emits through the `log` facade.
///
/// This gates the library's own emission on top of whatever filtering the application's logger
/// performs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Only errors.
    Error = 0,
    /// Errors and warnings.
    Warning = 1,
    /// Errors, warnings, and informational messages.
    Info = 2,
}

/// Invoked after each video frame becomes display-ready during pull decode or timed playback.
pub type VideoCallback = Arc<dyn Fn(&VideoFrame) + Send + Sync>;

/// Invoked after decoded audio becomes available during pull decode or timed playback.
pub type AudioCallback = Arc<dyn Fn(&AudioFrame) + Send + Sync>;

/// `Settings` is the set of options a session is opened with.
///
/// All fields can also be changed later through
/// [`Player::update_settings`](crate::Player::update_settings); changing the selected tracks or
/// the audio offset reopens the affected stream and re-seeks to the current position.
#[derive(Clone)]
pub struct Settings {
    /// Whether to initialize and decode the video stream. Default: `true`.
    pub enable_video: bool,
    /// Whether to initialize and decode the audio stream. Default: `true`.
    pub enable_audio: bool,
    /// In pull mode, if the decoder cannot keep up with the requested timestamps, issue a
    /// silent fast seek to the requested timestamp instead of decoding every frame in between.
    /// Default: `false`.
    pub skip_unprocessed_frames: bool,
    /// Output interleaved float samples instead of per-channel planes. Default: `true`.
    pub interlace_audio: bool,
    /// Zero-based selection among the container's video tracks. Default: `0`.
    pub video_track: u32,
    /// Zero-based selection among the container's audio tracks. Default: `0`.
    pub audio_track: u32,
    /// End seeks at the last keyframe at or before the target instead of decoding up to the
    /// exact target. Default: `false`.
    pub use_fast_seeking: bool,
    /// Offset applied to audio timestamps, in milliseconds. Audio packets whose adjusted
    /// timestamp falls before zero or past the file duration are dropped. Default: `0`.
    pub audio_offset_time: i64,
    /// The session's log level. Default: the library default, see
    /// [`set_default_log_level`](crate::set_default_log_level).
    pub log_level: LogLevel,
    /// Optional push-style video output.
    pub on_video: Option<VideoCallback>,
    /// Optional push-style audio output.
    pub on_audio: Option<AudioCallback>,
}

impl Settings {
    /// Enable or disable the video stream.
    pub fn with_video(mut self, enable: bool) -> Self {
        self.enable_video = enable;
        self
    }

    /// Enable or disable the audio stream.
    pub fn with_audio(mut self, enable: bool) -> Self {
        self.enable_audio = enable;
        self
    }

    /// Select the video track.
    pub fn with_video_track(mut self, track: u32) -> Self {
        self.video_track = track;
        self
    }

    /// Select the audio track.
    pub fn with_audio_track(mut self, track: u32) -> Self {
        self.audio_track = track;
        self
    }

    /// Select interleaved or planar audio output.
    pub fn with_interlaced_audio(mut self, interlace: bool) -> Self {
        self.interlace_audio = interlace;
        self
    }

    /// Select fast (keyframe-accurate) or exact seeking.
    pub fn with_fast_seeking(mut self, fast: bool) -> Self {
        self.use_fast_seeking = fast;
        self
    }

    /// Provide the audio offset in milliseconds.
    pub fn with_audio_offset(mut self, offset_ms: i64) -> Self {
        self.audio_offset_time = offset_ms;
        self
    }

    /// Skip frames the decoder failed to keep up with in pull mode.
    pub fn with_skip_unprocessed_frames(mut self, skip: bool) -> Self {
        self.skip_unprocessed_frames = skip;
        self
    }

    /// Provide the session log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Provide a video frame callback.
    pub fn with_video_callback(mut self, callback: VideoCallback) -> Self {
        self.on_video = Some(callback);
        self
    }

    /// Provide an audio callback.
    pub fn with_audio_callback(mut self, callback: AudioCallback) -> Self {
        self.on_audio = Some(callback);
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enable_video: true,
            enable_audio: true,
            skip_unprocessed_frames: false,
            interlace_audio: true,
            video_track: 0,
            audio_track: 0,
            use_fast_seeking: false,
            audio_offset_time: 0,
            log_level: crate::default_log_level(),
            on_video: None,
            on_audio: None,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("enable_video", &self.enable_video)
            .field("enable_audio", &self.enable_audio)
            .field("skip_unprocessed_frames", &self.skip_unprocessed_frames)
            .field("interlace_audio", &self.interlace_audio)
            .field("video_track", &self.video_track)
            .field("audio_track", &self.audio_track)
            .field("use_fast_seeking", &self.use_fast_seeking)
            .field("audio_offset_time", &self.audio_offset_time)
            .field("log_level", &self.log_level)
            .field("on_video", &self.on_video.as_ref().map(|_| ".."))
            .field("on_audio", &self.on_audio.as_ref().map(|_| ".."))
            .finish()
    }
}
