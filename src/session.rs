// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `session` module implements the playback session and its public API.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::info;

use crate::audio::AudioStream;
use crate::codecs::{well_known, Picture};
use crate::errors::{
    invalid_argument_error, unsupported_error, Error, Result, Status,
};
use crate::formats::{
    AudioTrackParams, Demuxer, MediaBackend, TrackParams, TrackType, VideoTrackParams,
};
use crate::frames::FrameSlot;
use crate::io::MediaSource;
use crate::playback::PlaybackHandle;
use crate::settings::{LogLevel, Settings};
use crate::shared::Shared;
use crate::units::{fmt_timestamp, TimeScale, Timestamp};
use crate::{worker, VIDEO_FRAMES_TO_PREFETCH};

/// One display-ready video frame.
///
/// The picture is reference counted: the frame stays valid for as long as the caller holds it,
/// independent of any further session activity.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    /// The decoded picture.
    pub picture: Arc<Picture>,
    /// The presentation timestamp, in milliseconds.
    pub timestamp: Timestamp,
}

/// A buffer of decoded audio handed to the caller.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    samples: Vec<f32>,
    frames: usize,
    channels: u32,
    sample_rate: u32,
    interleaved: bool,
}

impl AudioFrame {
    /// All samples. Interleaved output is frame-major (`frames * channels` samples); planar
    /// output is the per-channel planes concatenated.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// The number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// The number of channels.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// The sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the samples are channel-interleaved.
    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    /// The samples of one channel. Only available for planar output.
    pub fn plane(&self, channel: u32) -> Option<&[f32]> {
        if self.interleaved || channel >= self.channels {
            return None;
        }
        let start = channel as usize * self.frames;
        Some(&self.samples[start..start + self.frames])
    }
}

/// The five-state seek machine. See the seek engine for the transitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SeekPhase {
    NotSeeking,
    Starting,
    ForSequenceHeader,
    ForKeyframe,
    FoundKeyframe,
    ForTimestamp,
}

impl SeekPhase {
    pub fn is_seeking(&self) -> bool {
        *self != SeekPhase::NotSeeking
    }
}

/// The bound video stream.
pub(crate) struct VideoBinding {
    pub track_id: u32,
    pub params: VideoTrackParams,
}

/// The bound audio stream.
pub(crate) struct AudioBinding {
    pub track_id: u32,
    pub params: AudioTrackParams,
    pub stream: AudioStream,
}

/// The caller-side half of the session.
///
/// Everything here is driven by whichever thread invokes the pull API: the demuxer, the audio
/// decoder, the seek engine, and the prefetch bookkeeping. The playback thread and the user's
/// thread serialize on the mutex wrapping this struct. The video worker never touches it.
pub(crate) struct PullState {
    pub shared: Arc<Shared>,
    pub backend: Arc<dyn MediaBackend>,
    pub demuxer: Box<dyn Demuxer>,
    pub settings: Settings,
    pub time_scale: TimeScale,
    /// Media duration in milliseconds.
    pub duration: Timestamp,
    pub video: Option<VideoBinding>,
    pub audio: Option<AudioBinding>,
    pub seek: SeekPhase,
    /// During a seek pre-roll, video packets below this timestamp precede the located keyframe
    /// and cannot be decoded; they are dropped at ingest.
    pub discard_video_below: Option<Timestamp>,
    /// The demuxer has reported end of stream.
    pub all_fetched: bool,
    /// Latched after a successful queue sync; cleared whenever a packet is released.
    pub synced: bool,
    next_serial: u64,
    /// The currently displayed picture, owned by the session. Replaced at the start of every
    /// successful frame retrieval.
    display: Option<FrameSlot>,
}

impl PullState {
    pub fn next_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    fn log_allows(&self, level: LogLevel) -> bool {
        self.shared.log_allows(level)
    }

    /// Run one polling step: consume the earliest queued packet across both streams.
    ///
    /// Internal errors latch the session status before propagating.
    pub fn step(&mut self) -> Result<Status> {
        match self.step_inner() {
            Ok(status) => Ok(status),
            Err(err) => {
                self.shared.latch_error(err.kind());
                Err(err)
            }
        }
    }

    fn step_inner(&mut self) -> Result<Status> {
        self.sync_queues()?;

        // Pick the stream whose oldest packet comes first. Ties go to video so a frame is
        // display-ready by the time its audio plays.
        let choice = {
            let io = self.shared.io.lock().unwrap();
            let video_ts =
                if self.video.is_some() { io.video.peek_oldest().map(|p| p.ts) } else { None };
            let audio_ts =
                if self.audio.is_some() { io.audio.peek_oldest().map(|p| p.ts) } else { None };

            match (video_ts, audio_ts) {
                (Some(v), Some(a)) if v <= a => Some(TrackType::Video),
                (Some(_), None) => Some(TrackType::Video),
                (None, Some(_)) | (Some(_), Some(_)) => Some(TrackType::Audio),
                (None, None) => None,
            }
        };

        let Some(choice) = choice
        else {
            if self.all_fetched {
                self.finish();
                return Ok(Status::Finished);
            }
            return Ok(Status::Ok);
        };

        match choice {
            TrackType::Video => {
                self.consume_video_head()?;
            }
            TrackType::Audio => {
                self.consume_audio_head(false)?;
            }
        }

        self.deliver_callbacks();
        self.finish_if_drained();

        Ok(Status::Ok)
    }

    /// Release the oldest video packet once the worker has decoded it, and advance the session
    /// position to its timestamp.
    pub(crate) fn consume_video_head(&mut self) -> Result<Timestamp> {
        let packet = {
            let mut io = self.shared.io.lock().unwrap();
            loop {
                if self.shared.has_failed() {
                    drop(io);
                    return Err(self.latched_error());
                }

                match io.video.peek_oldest() {
                    Some(head) if head.is_decoded() => break,
                    Some(_) => {}
                    // Cannot happen: the caller observed a head under the same pull lock, and
                    // only the pull side releases packets.
                    None => return invalid_argument_error("video queue unexpectedly empty"),
                }

                io = self.shared.has_frames.wait(io).unwrap();
            }
            io.video.release_oldest().unwrap()
        };

        self.synced = false;

        {
            let mut info = self.shared.info.lock().unwrap();
            if packet.ts > info.position {
                info.position = packet.ts;
            }
            info.frames_processed += 1;
        }

        Ok(packet.ts)
    }

    /// Release the oldest audio packet and feed it through Vorbis: into the PCM ring, or in
    /// warmup (track-only) mode while the seek engine has not reached its target.
    pub(crate) fn consume_audio_head(&mut self, warmup: bool) -> Result<Timestamp> {
        let packet = {
            let mut io = self.shared.io.lock().unwrap();
            match io.audio.release_oldest() {
                Some(packet) => packet,
                None => return invalid_argument_error("audio queue unexpectedly empty"),
            }
        };

        self.synced = false;

        let audio = self.audio.as_mut().unwrap();
        if warmup {
            audio.stream.warmup_packet(&packet)?;
        }
        else {
            audio.stream.decode_packet(&packet)?;
        }

        let mut info = self.shared.info.lock().unwrap();
        if packet.ts > info.position {
            info.position = packet.ts;
        }

        Ok(packet.ts)
    }

    /// Invoke the push callbacks for any output that became ready during this step.
    fn deliver_callbacks(&mut self) {
        if let Some(on_video) = self.settings.on_video.clone() {
            if let Some(frame) = self.take_ready_video_frame() {
                on_video(&frame);
            }
        }

        if let Some(on_audio) = self.settings.on_audio.clone() {
            if let Some(frame) = self.take_audio_frame() {
                on_audio(&frame);
            }
        }
    }

    /// Consume the oldest display-ready frame for the current position, if any, and make it the
    /// session's displayed picture.
    pub(crate) fn take_ready_video_frame(&mut self) -> Option<VideoFrame> {
        let position = self.shared.position();
        let slot = { self.shared.io.lock().unwrap().frames.take_frame_at(position) }?;

        let frame = VideoFrame { picture: slot.picture.clone(), timestamp: slot.ts };
        self.display = Some(slot);
        Some(frame)
    }

    /// The picture most recently handed out, which the session keeps alive as the "currently
    /// displayed" slot.
    pub(crate) fn displayed_frame(&self) -> Option<VideoFrame> {
        self.display
            .as_ref()
            .map(|slot| VideoFrame { picture: slot.picture.clone(), timestamp: slot.ts })
    }

    /// Drain the PCM ring into an output buffer, if it holds samples.
    pub(crate) fn take_audio_frame(&mut self) -> Option<AudioFrame> {
        let audio = self.audio.as_mut()?;
        if !audio.stream.ring().has_samples() {
            return None;
        }

        let channels = audio.stream.channels();
        let sample_rate = audio.stream.sample_rate();
        let interleaved = audio.stream.ring().is_interleaved();
        let (samples, frames) = audio.stream.ring_mut().drain();

        Some(AudioFrame { samples, frames, channels, sample_rate, interleaved })
    }

    /// Transition to `Finished` if the demuxer hit end of stream and both queues drained.
    fn finish_if_drained(&mut self) {
        if !self.all_fetched {
            return;
        }

        let drained = {
            let io = self.shared.io.lock().unwrap();
            io.video.is_empty() && io.audio.is_empty()
        };

        if drained {
            self.finish();
        }
    }

    fn finish(&mut self) {
        let mut info = self.shared.info.lock().unwrap();
        info.position = self.duration;
        drop(info);
        self.shared.set_status(Status::Finished);
    }

    /// Reconstruct the latched error for propagation.
    fn latched_error(&self) -> Error {
        match self.shared.status() {
            Status::Error(kind) => kind.into_error(),
            _ => Error::InvalidState("expected a latched error"),
        }
    }

    /// Whether the worker has fallen behind the requested decode target: the prefetch window is
    /// full of packets that are all older than the target and the head is still undecoded.
    fn decoder_is_behind(&self, target: Timestamp) -> bool {
        let io = self.shared.io.lock().unwrap();
        io.video.len() > VIDEO_FRAMES_TO_PREFETCH
            && io.video.peek_newest().map_or(false, |p| p.ts < target)
            && io.video.peek_oldest().map_or(false, |p| !p.is_decoded())
    }

    /// Decode packets until the session position reaches `target`.
    pub(crate) fn decode_until(&mut self, target: Timestamp) -> Result<Status> {
        // If the caller requests timestamps faster than the worker can decode, optionally skip
        // ahead with a silent fast seek instead of grinding through every frame.
        if self.settings.skip_unprocessed_frames
            && self.video.is_some()
            && self.decoder_is_behind(target)
        {
            if self.log_allows(LogLevel::Info) {
                info!("decoder is behind, fast-seeking to {}", fmt_timestamp(target));
            }
            return self.seek_to(target.min(self.duration), true);
        }

        loop {
            match self.shared.status() {
                Status::Error(kind) => return Err(kind.into_error()),
                Status::Finished => return Ok(Status::Finished),
                Status::Ok => {}
            }

            if self.shared.position() >= target {
                return Ok(Status::Ok);
            }

            self.step()?;
        }
    }
}

/// Immutable stream facts cached at bind time so getters never contend with decoding.
#[derive(Clone, Debug, Default)]
struct SessionMeta {
    duration: Timestamp,
    total_video_tracks: u32,
    total_audio_tracks: u32,
    video: Option<VideoTrackParams>,
    audio_channels: u32,
    audio_sample_rate: u32,
    has_audio: bool,
}

/// A `Player` is one playback session over one media source.
///
/// The caller either polls the session packet-by-packet ([`decode_next`](Player::decode_next),
/// [`decode_until`](Player::decode_until)) and retrieves output with
/// [`get_video_frame`](Player::get_video_frame) / [`get_audio_frame`](Player::get_audio_frame),
/// or hands the pacing to a background driver with [`play`](Player::play) and receives output
/// through the callbacks in [`Settings`].
pub struct Player {
    shared: Arc<Shared>,
    pull: Arc<Mutex<PullState>>,
    worker: Option<thread::JoinHandle<()>>,
    playback: Option<PlaybackHandle>,
    playing: Arc<AtomicBool>,
    meta: SessionMeta,
}

impl Player {
    /// Open a session over the file at `path`.
    pub fn from_path(
        path: impl AsRef<Path>,
        backend: Arc<dyn MediaBackend>,
        settings: Settings,
    ) -> Result<Player> {
        let file = File::open(path)?;
        Player::from_source(Box::new(file), backend, settings)
    }

    /// Open a session over an already-open file.
    pub fn from_file(
        file: File,
        backend: Arc<dyn MediaBackend>,
        settings: Settings,
    ) -> Result<Player> {
        Player::from_source(Box::new(file), backend, settings)
    }

    /// Open a session over an in-memory media buffer.
    pub fn from_memory(
        data: impl Into<Box<[u8]>>,
        backend: Arc<dyn MediaBackend>,
        settings: Settings,
    ) -> Result<Player> {
        Player::from_source(Box::new(Cursor::new(data.into())), backend, settings)
    }

    /// Open a session over a custom media source.
    pub fn from_source(
        source: Box<dyn MediaSource>,
        backend: Arc<dyn MediaBackend>,
        settings: Settings,
    ) -> Result<Player> {
        let demuxer = backend.open_demuxer(source)?;

        let time_scale = demuxer.time_scale();
        let duration = time_scale.ticks_to_ms(demuxer.duration());

        let shared = Arc::new(Shared::new(settings.log_level));

        let mut pull = PullState {
            shared: shared.clone(),
            backend,
            demuxer,
            settings,
            time_scale,
            duration,
            video: None,
            audio: None,
            seek: SeekPhase::NotSeeking,
            discard_video_below: None,
            all_fetched: false,
            synced: false,
            next_serial: 0,
            display: None,
        };

        pull.bind_streams(true, true)?;

        if pull.video.is_none() && pull.audio.is_none() {
            return unsupported_error("no playable tracks");
        }

        let meta = Player::make_meta(&pull);

        // The worker is spawned unconditionally so the video stream can be enabled later
        // through update_settings. Without video packets it just sleeps.
        let worker = {
            let shared = shared.clone();
            shared.ctl.lock().unwrap().exited = false;
            thread::Builder::new()
                .name("vignette-video".to_string())
                .spawn(move || worker::run(shared))
                .map_err(Error::IoError)?
        };

        Ok(Player {
            shared,
            pull: Arc::new(Mutex::new(pull)),
            worker: Some(worker),
            playback: None,
            playing: Arc::new(AtomicBool::new(false)),
            meta,
        })
    }

    fn make_meta(pull: &PullState) -> SessionMeta {
        let tracks = pull.demuxer.tracks();
        SessionMeta {
            duration: pull.duration,
            total_video_tracks: tracks
                .iter()
                .filter(|t| t.track_type() == TrackType::Video)
                .count() as u32,
            total_audio_tracks: tracks
                .iter()
                .filter(|t| t.track_type() == TrackType::Audio)
                .count() as u32,
            video: pull.video.as_ref().map(|v| v.params.clone()),
            audio_channels: pull.audio.as_ref().map_or(0, |a| a.stream.channels()),
            audio_sample_rate: pull.audio.as_ref().map_or(0, |a| a.stream.sample_rate()),
            has_audio: pull.audio.is_some(),
        }
    }

    fn guard_not_playing(&self) -> Result<()> {
        if self.playing.load(Ordering::Relaxed) {
            return Err(Error::InvalidState("operation not available during timed playback"));
        }
        Ok(())
    }

    fn status_guard(&self) -> Result<Status> {
        match self.shared.status() {
            Status::Error(kind) => Err(kind.into_error()),
            status => Ok(status),
        }
    }

    /// Decode the next packet. Returns `Status::Finished` once the whole stream has been
    /// consumed.
    pub fn decode_next(&mut self) -> Result<Status> {
        self.guard_not_playing()?;
        match self.status_guard()? {
            Status::Finished => Ok(Status::Finished),
            _ => self.pull.lock().unwrap().step(),
        }
    }

    /// Decode packets until the session position reaches `timestamp` (in milliseconds).
    pub fn decode_until(&mut self, timestamp: Timestamp) -> Result<Status> {
        self.guard_not_playing()?;
        match self.status_guard()? {
            Status::Finished => Ok(Status::Finished),
            _ => self.pull.lock().unwrap().decode_until(timestamp),
        }
    }

    /// Decode packets for `duration` milliseconds past the current position.
    pub fn decode_for(&mut self, duration: u64) -> Result<Status> {
        let target = self.shared.position().saturating_add(duration);
        self.decode_until(target)
    }

    /// Start the background playback driver. Output is delivered through the callbacks in
    /// [`Settings`]. A no-op when playback is already running.
    pub fn play(&mut self) -> Result<Status> {
        self.status_guard()?;

        if self.playing.load(Ordering::Relaxed) {
            return Ok(Status::Ok);
        }
        // Reap a finished driver before starting a new one.
        if let Some(handle) = self.playback.take() {
            handle.join();
        }

        let handle =
            PlaybackHandle::spawn(self.pull.clone(), self.shared.clone(), self.playing.clone())?;
        self.playback = Some(handle);
        Ok(Status::Ok)
    }

    /// Stop the background playback driver and join its thread.
    pub fn stop(&mut self) -> Result<Status> {
        if let Some(handle) = self.playback.take() {
            handle.stop();
            handle.join();
        }
        match self.shared.status() {
            Status::Error(kind) => Err(kind.into_error()),
            status => Ok(status),
        }
    }

    /// Whether the playback driver is running.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Seek to `timestamp` (in milliseconds). Targets past the duration clamp to the duration
    /// and finish the stream.
    ///
    /// While timed playback is active the request is deposited for the playback driver and
    /// serviced on its next tick.
    pub fn seek_to_timestamp(&mut self, timestamp: Timestamp) -> Result<Status> {
        self.status_guard()?;

        if self.playing.load(Ordering::Relaxed) {
            self.shared.info.lock().unwrap().seek_request = Some(timestamp);
            return Ok(Status::Ok);
        }

        let mut pull = self.pull.lock().unwrap();
        let fast = pull.settings.use_fast_seeking;
        pull.seek_to(timestamp, fast)
    }

    /// Seek forward by `delta` milliseconds.
    pub fn seek_forward(&mut self, delta: u64) -> Result<Status> {
        let target = self.shared.position().saturating_add(delta);
        self.seek_to_timestamp(target)
    }

    /// Seek backward by `delta` milliseconds.
    pub fn seek_backward(&mut self, delta: u64) -> Result<Status> {
        let target = self.shared.position().saturating_sub(delta);
        self.seek_to_timestamp(target)
    }

    /// Whether a display-ready video frame is available for the current position.
    pub fn has_video_frame(&self) -> bool {
        let position = self.shared.position();
        self.shared.io.lock().unwrap().frames.has_frame_at(position)
    }

    /// Retrieve the oldest display-ready video frame, consuming it. Frames come out in
    /// presentation order, each at most once; call repeatedly to drain everything the position
    /// has reached. Returns `None` when no frame is ready.
    pub fn get_video_frame(&self) -> Option<VideoFrame> {
        self.pull.lock().unwrap().take_ready_video_frame()
    }

    /// The frame most recently retrieved through [`get_video_frame`](Player::get_video_frame)
    /// or the video callback. Remains readable after the stream finishes.
    pub fn last_video_frame(&self) -> Option<VideoFrame> {
        self.pull.lock().unwrap().displayed_frame()
    }

    /// Whether decoded audio is waiting to be retrieved.
    pub fn is_audio_buffer_filled(&self) -> bool {
        let pull = self.pull.lock().unwrap();
        pull.audio.as_ref().map_or(false, |a| a.stream.ring().has_samples())
    }

    /// Retrieve and clear the buffered audio samples.
    pub fn get_audio_frame(&self) -> Option<AudioFrame> {
        self.pull.lock().unwrap().take_audio_frame()
    }

    /// Whether a video track is bound.
    pub fn has_video_track(&self) -> bool {
        self.meta.video.is_some()
    }

    /// Whether an audio track is bound.
    pub fn has_audio_track(&self) -> bool {
        self.meta.has_audio
    }

    /// The number of video tracks in the container.
    pub fn total_video_tracks(&self) -> u32 {
        self.meta.total_video_tracks
    }

    /// The number of audio tracks in the container.
    pub fn total_audio_tracks(&self) -> u32 {
        self.meta.total_audio_tracks
    }

    /// The width of the bound video track, or 0 if none.
    pub fn video_width(&self) -> u32 {
        self.meta.video.as_ref().map_or(0, |v| v.width)
    }

    /// The height of the bound video track, or 0 if none.
    pub fn video_height(&self) -> u32 {
        self.meta.video.as_ref().map_or(0, |v| v.height)
    }

    /// The frame rate of the bound video track, derived from its default frame duration, or 0.0
    /// if unknown.
    pub fn video_fps(&self) -> f64 {
        match self.meta.video.as_ref().and_then(|v| v.default_frame_duration) {
            Some(dur) if dur > 0 => 1_000.0 / dur as f64,
            _ => 0.0,
        }
    }

    /// The channel count of the bound audio track, or 0 if none.
    pub fn audio_channels(&self) -> u32 {
        self.meta.audio_channels
    }

    /// The sample rate of the bound audio track, or 0 if none.
    pub fn audio_sample_rate(&self) -> u32 {
        self.meta.audio_sample_rate
    }

    /// The media duration in milliseconds.
    pub fn duration(&self) -> Timestamp {
        self.meta.duration
    }

    /// The session position in milliseconds.
    pub fn current_timestamp(&self) -> Timestamp {
        self.shared.position()
    }

    /// Whether the whole stream has been consumed.
    pub fn is_finished(&self) -> bool {
        self.shared.status() == Status::Finished
    }

    /// The session status.
    pub fn status(&self) -> Status {
        self.shared.status()
    }

    /// The number of video packets consumed after decode, including seek pre-roll.
    pub fn total_video_frames_processed(&self) -> u64 {
        self.shared.info.lock().unwrap().frames_processed
    }

    /// A copy of the session's current settings.
    pub fn settings(&self) -> Settings {
        self.pull.lock().unwrap().settings.clone()
    }

    /// Replace the session settings.
    ///
    /// Changing the selected tracks, the enabled streams, the audio offset, or the audio layout
    /// reopens the affected stream and issues a forced seek to the current position so decode
    /// state stays coherent.
    pub fn update_settings(&mut self, settings: Settings) -> Result<Status> {
        self.guard_not_playing()?;
        self.status_guard()?;

        if !settings.enable_video && !settings.enable_audio {
            return invalid_argument_error("at least one stream must stay enabled");
        }

        let mut pull = self.pull.lock().unwrap();

        let reopen_video = settings.enable_video != pull.settings.enable_video
            || settings.video_track != pull.settings.video_track;
        let reopen_audio = settings.enable_audio != pull.settings.enable_audio
            || settings.audio_track != pull.settings.audio_track
            || settings.audio_offset_time != pull.settings.audio_offset_time
            || settings.interlace_audio != pull.settings.interlace_audio;

        self.shared.set_log_level(settings.log_level);
        pull.settings = settings;

        if reopen_video || reopen_audio {
            pull.bind_streams(reopen_video, reopen_audio)?;

            let position = self.shared.position();
            let fast = pull.settings.use_fast_seeking;
            pull.seek_to_checked(position, fast, true)?;

            self.meta = Player::make_meta(&pull);
        }

        Ok(Status::Ok)
    }
}

impl PullState {
    /// Select and open the configured streams. Existing bindings for the given types are
    /// dropped first; the video decoder is swapped under the decoder lock with the worker
    /// paused.
    pub(crate) fn bind_streams(&mut self, video: bool, audio: bool) -> Result<()> {
        if video {
            let worker_alive = !self.shared.ctl.lock().unwrap().exited;
            if worker_alive {
                self.shared.pause_worker();
            }

            self.video = None;
            *self.shared.decoder.lock().unwrap() = None;

            if self.settings.enable_video {
                if let Some((track_id, params)) =
                    self.select_track_video(self.settings.video_track)?
                {
                    if params.codec != well_known::CODEC_ID_AV1 {
                        if worker_alive {
                            self.shared.resume_worker();
                        }
                        return unsupported_error("video codec is not AV1");
                    }

                    let decoder = self.backend.make_video_decoder(&params)?;
                    *self.shared.decoder.lock().unwrap() = Some(decoder);
                    self.video = Some(VideoBinding { track_id, params });
                }
            }

            if worker_alive {
                self.shared.resume_worker();
            }
        }

        if audio {
            self.audio = None;

            if self.settings.enable_audio {
                if let Some((track_id, params)) =
                    self.select_track_audio(self.settings.audio_track)?
                {
                    if params.codec != well_known::CODEC_ID_VORBIS {
                        return unsupported_error("audio codec is not Vorbis");
                    }

                    let decoder = self.backend.make_audio_decoder(&params)?;
                    let stream = AudioStream::new(decoder, self.settings.interlace_audio);
                    self.audio = Some(AudioBinding { track_id, params, stream });
                }
            }
        }

        Ok(())
    }

    /// Find the nth video track. `None` if the container has no video; an error if it has some
    /// but not n+1 of them.
    fn select_track_video(&self, nth: u32) -> Result<Option<(u32, VideoTrackParams)>> {
        let mut seen = 0;
        for track in self.demuxer.tracks() {
            if let TrackParams::Video(params) = &track.params {
                if seen == nth {
                    return Ok(Some((track.id, params.clone())));
                }
                seen += 1;
            }
        }
        if seen == 0 {
            Ok(None)
        }
        else {
            invalid_argument_error("video track index out of range")
        }
    }

    /// Find the nth audio track, with the same convention as the video selection.
    fn select_track_audio(&self, nth: u32) -> Result<Option<(u32, AudioTrackParams)>> {
        let mut seen = 0;
        for track in self.demuxer.tracks() {
            if let TrackParams::Audio(params) = &track.params {
                if seen == nth {
                    return Ok(Some((track.id, params.clone())));
                }
                seen += 1;
            }
        }
        if seen == 0 {
            Ok(None)
        }
        else {
            invalid_argument_error("audio track index out of range")
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        // Graceful teardown: stop the playback driver first so nothing drives the pull API,
        // then stop and join the worker.
        if let Some(handle) = self.playback.take() {
            handle.stop();
            handle.join();
        }

        self.shared.stop_worker();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
