// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `formats` module provides the traits and support structures the session uses to drive an
//! external WebM demuxer.
//!
//! The demuxer itself is a black-box collaborator. The session consumes it exclusively through
//! [`Demuxer`], and binds a concrete implementation through [`MediaBackend`].

use std::sync::Arc;

use smallvec::SmallVec;

use crate::codecs::{AudioDecoder, CodecId, VideoDecoder};
use crate::errors::Result;
use crate::io::MediaSource;
use crate::units::TimeScale;

/// The track type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrackType {
    /// A video track.
    Video,
    /// An audio track.
    Audio,
}

/// Parameters of a video track as reported by the demuxer.
#[derive(Clone, Debug)]
pub struct VideoTrackParams {
    /// The codec of the track's bitstream.
    pub codec: CodecId,
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// The default duration of one frame, in milliseconds, if the container declares one.
    pub default_frame_duration: Option<u64>,
}

/// Parameters of an audio track as reported by the demuxer.
#[derive(Clone, Debug)]
pub struct AudioTrackParams {
    /// The codec of the track's bitstream.
    pub codec: CodecId,
    /// The number of audio channels.
    pub channels: u32,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The codec delay in milliseconds.
    pub codec_delay: u64,
    /// Codec-private header blocks, in the order the container stores them. For Vorbis these are
    /// the identification, comment, and setup headers.
    pub codec_private: Vec<Box<[u8]>>,
}

/// Per-track parameters.
#[derive(Clone, Debug)]
pub enum TrackParams {
    Video(VideoTrackParams),
    Audio(AudioTrackParams),
}

/// A `TrackInfo` describes one independently coded bitstream within the container.
#[derive(Clone, Debug)]
pub struct TrackInfo {
    /// A unique identifier for the track, matched against [`RawPacket::track_id`].
    pub id: u32,
    /// The track's parameters.
    pub params: TrackParams,
}

impl TrackInfo {
    /// The type of the track.
    pub fn track_type(&self) -> TrackType {
        match self.params {
            TrackParams::Video(_) => TrackType::Video,
            TrackParams::Audio(_) => TrackType::Audio,
        }
    }
}

/// A cue point maps a presentation timestamp to the byte range of the cluster that contains it.
/// All values are in the demuxer's native units: timestamps in [`TimeScale`] ticks, positions in
/// bytes.
#[derive(Copy, Clone, Debug)]
pub struct CuePoint {
    /// Byte offset of the start of the cluster.
    pub start: u64,
    /// Byte offset of the end of the cluster.
    pub end: u64,
    /// Presentation timestamp of the cue, in ticks.
    pub ts: u64,
}

/// A `RawPacket` is one demuxed packet: an owned sequence of bitstream chunks for a single track.
///
/// WebM block lacing may pack more than one codec chunk into a single block, so a packet carries
/// one or more chunks; in the overwhelmingly common case there is exactly one. Chunk data is
/// reference counted so a consumer can hold onto it without keeping the packet (or the queue slot
/// that owns the packet) alive.
#[derive(Clone, Debug)]
pub struct RawPacket {
    /// The identifier of the track this packet belongs to.
    pub track_id: u32,
    /// The presentation timestamp in [`TimeScale`] ticks.
    pub ts: u64,
    /// Whether the packet contains a keyframe.
    pub keyframe: bool,
    /// The bitstream chunks.
    pub chunks: SmallVec<[Arc<[u8]>; 1]>,
}

impl RawPacket {
    /// Create a new single-chunk packet.
    pub fn new(track_id: u32, ts: u64, keyframe: bool, data: impl Into<Arc<[u8]>>) -> Self {
        let mut chunks = SmallVec::new();
        chunks.push(data.into());
        RawPacket { track_id, ts, keyframe, chunks }
    }
}

/// A `Demuxer` is the abstract surface of the external WebM parser.
///
/// Packets are read one-by-one, in stream order, and may be discarded or decoded at the choice of
/// the caller. The session owns the demuxer and only ever drives it from the thread that invokes
/// the public API; the video worker never touches it.
pub trait Demuxer: Send {
    /// Get all tracks in the container.
    fn tracks(&self) -> &[TrackInfo];

    /// The conversion factor between the demuxer's internal timestamps and milliseconds.
    fn time_scale(&self) -> TimeScale;

    /// The duration of the media, in [`TimeScale`] ticks.
    fn duration(&self) -> u64;

    /// Read the next packet in stream order. Returns `Ok(None)` once the end of the stream has
    /// been reached.
    fn next_packet(&mut self) -> Result<Option<RawPacket>>;

    /// The container's seek index, ordered by timestamp. Empty if the container carries none.
    fn cue_points(&self) -> &[CuePoint];

    /// Reposition the stream so that the next packet read for `track_id` is at or before the
    /// given timestamp, in ticks.
    fn seek_track(&mut self, track_id: u32, ts: u64) -> Result<()>;
}

/// A `MediaBackend` binds concrete collaborator implementations (the WebM parser, the AV1
/// decoder, and the Vorbis decoder) to a session.
///
/// The session calls `open_demuxer` once at construction, and the `make_*` constructors at
/// construction and again whenever a stream must be reopened (track change, audio restart after a
/// seek with a changed offset).
pub trait MediaBackend: Send + Sync {
    /// Open a demuxer over the given source.
    fn open_demuxer(&self, source: Box<dyn MediaSource>) -> Result<Box<dyn Demuxer>>;

    /// Create a video decoder for a track.
    fn make_video_decoder(&self, params: &VideoTrackParams) -> Result<Box<dyn VideoDecoder>>;

    /// Create an audio decoder for a track. The implementation is expected to consume the
    /// track's codec-private header blocks before returning.
    fn make_audio_decoder(&self, params: &AudioTrackParams) -> Result<Box<dyn AudioDecoder>>;
}
