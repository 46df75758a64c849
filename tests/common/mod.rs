// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A scripted media backend for driving the session against synthetic streams.
//!
//! Packet payloads carry their own metadata (timestamp, keyframe flag, sample count) so the
//! mock decoders can validate decode order and reference requirements the way the real codecs
//! would.

// Each test binary compiles its own copy of this module and uses a different slice of it.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use vignette::codecs::{
    well_known, AudioDecoder, ColorDescription, PcmBuffer, Picture, PixelLayout, VideoDecoder,
};
use vignette::errors::{decoder_error, invalid_data_error, Result};
use vignette::formats::{
    AudioTrackParams, CuePoint, Demuxer, MediaBackend, RawPacket, TrackInfo, TrackParams,
    VideoTrackParams,
};
use vignette::io::MediaSource;
use vignette::units::TimeScale;

pub const VIDEO_TRACK: u32 = 1;
pub const AUDIO_TRACK: u32 = 2;

/// Describes the synthetic stream a [`MockBackend`] serves.
#[derive(Clone)]
pub struct StreamSpec {
    pub fps: u32,
    pub duration_ms: u64,
    /// A keyframe every this many frames.
    pub keyframe_interval: u32,
    /// Index of the first keyframe; a non-zero value simulates a file that starts mid
    /// group-of-pictures.
    pub first_keyframe: u32,
    pub ticks_per_ms: u64,
    /// Emit a cue point for every keyframe.
    pub with_cues: bool,
    pub audio: Option<AudioSpec>,
    /// Inject a video decode failure at this timestamp (in milliseconds).
    pub fail_video_at: Option<u64>,
}

#[derive(Clone)]
pub struct AudioSpec {
    pub channels: u32,
    pub sample_rate: u32,
    /// Milliseconds of audio per packet.
    pub packet_ms: u64,
}

impl Default for StreamSpec {
    fn default() -> Self {
        StreamSpec {
            fps: 24,
            duration_ms: 10_000,
            keyframe_interval: 24,
            first_keyframe: 0,
            ticks_per_ms: 1,
            with_cues: true,
            audio: None,
            fail_video_at: None,
        }
    }
}

impl StreamSpec {
    pub fn with_audio(mut self, channels: u32, sample_rate: u32, packet_ms: u64) -> Self {
        self.audio = Some(AudioSpec { channels, sample_rate, packet_ms });
        self
    }

    pub fn frame_ts(&self, frame: u32) -> u64 {
        u64::from(frame) * 1_000 / u64::from(self.fps)
    }

    pub fn total_frames(&self) -> u32 {
        (self.duration_ms * u64::from(self.fps) / 1_000) as u32
    }
}

// Payload layout shared by the mock demuxer and decoders: an 8-byte timestamp, a tag byte, and
// a 4-byte sample count (audio only).
const TAG_KEYFRAME: u8 = 1 << 0;
const TAG_SEQ_HEADER: u8 = 1 << 1;
const TAG_AUDIO: u8 = 1 << 2;

fn encode_video(ts: u64, keyframe: bool) -> Vec<u8> {
    let mut data = ts.to_le_bytes().to_vec();
    let mut tag = 0;
    if keyframe {
        // Sequence headers ship in keyframe temporal units.
        tag |= TAG_KEYFRAME | TAG_SEQ_HEADER;
    }
    data.push(tag);
    data
}

fn encode_audio(ts: u64, samples: u32) -> Vec<u8> {
    let mut data = ts.to_le_bytes().to_vec();
    data.push(TAG_AUDIO);
    data.extend_from_slice(&samples.to_le_bytes());
    data
}

struct Payload {
    ts: u64,
    tag: u8,
    samples: u32,
}

fn decode_payload(data: &[u8]) -> Result<Payload> {
    if data.len() < 9 {
        return invalid_data_error("mock payload too short");
    }
    let ts = u64::from_le_bytes(data[0..8].try_into().unwrap());
    let tag = data[8];
    let samples = if data.len() >= 13 {
        u32::from_le_bytes(data[9..13].try_into().unwrap())
    }
    else {
        0
    };
    Ok(Payload { ts, tag, samples })
}

/// Record of every audio decode, for assertions: `(raw timestamp, warmup)`.
pub type AudioLog = Arc<Mutex<Vec<(u64, bool)>>>;

pub struct MockDemuxer {
    packets: Vec<RawPacket>,
    cues: Vec<CuePoint>,
    tracks: Vec<TrackInfo>,
    time_scale: TimeScale,
    duration_ticks: u64,
    index: usize,
}

impl MockDemuxer {
    fn new(spec: &StreamSpec) -> Self {
        let mut packets = Vec::new();
        let mut cues = Vec::new();

        for frame in 0..spec.total_frames() {
            let ts = spec.frame_ts(frame);
            let keyframe = frame >= spec.first_keyframe
                && (frame - spec.first_keyframe) % spec.keyframe_interval == 0;

            if keyframe && spec.with_cues {
                cues.push(CuePoint { start: 0, end: 0, ts: ts * spec.ticks_per_ms });
            }

            packets.push(RawPacket::new(
                VIDEO_TRACK,
                ts * spec.ticks_per_ms,
                keyframe,
                encode_video(ts, keyframe),
            ));
        }

        if let Some(audio) = &spec.audio {
            let samples = (u64::from(audio.sample_rate) * audio.packet_ms / 1_000) as u32;
            let mut ts = 0;
            while ts < spec.duration_ms {
                packets.push(RawPacket::new(
                    AUDIO_TRACK,
                    ts * spec.ticks_per_ms,
                    true,
                    encode_audio(ts, samples),
                ));
                ts += audio.packet_ms;
            }
        }

        // Interleave the way a muxer would: by timestamp, video first on ties.
        packets.sort_by_key(|p| (p.ts, p.track_id));

        let mut tracks = vec![TrackInfo {
            id: VIDEO_TRACK,
            params: TrackParams::Video(VideoTrackParams {
                codec: well_known::CODEC_ID_AV1,
                width: 640,
                height: 360,
                default_frame_duration: Some(1_000 / u64::from(spec.fps)),
            }),
        }];

        if let Some(audio) = &spec.audio {
            tracks.push(TrackInfo {
                id: AUDIO_TRACK,
                params: TrackParams::Audio(AudioTrackParams {
                    codec: well_known::CODEC_ID_VORBIS,
                    channels: audio.channels,
                    sample_rate: audio.sample_rate,
                    codec_delay: 0,
                    codec_private: vec![
                        Box::from(&b"\x01vorbis"[..]),
                        Box::from(&b"\x03vorbis"[..]),
                        Box::from(&b"\x05vorbis"[..]),
                    ],
                }),
            });
        }

        MockDemuxer {
            packets,
            cues,
            tracks,
            time_scale: TimeScale::new(spec.ticks_per_ms),
            duration_ticks: spec.duration_ms * spec.ticks_per_ms,
            index: 0,
        }
    }
}

impl Demuxer for MockDemuxer {
    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn time_scale(&self) -> TimeScale {
        self.time_scale
    }

    fn duration(&self) -> u64 {
        self.duration_ticks
    }

    fn next_packet(&mut self) -> Result<Option<RawPacket>> {
        match self.packets.get(self.index) {
            Some(packet) => {
                self.index += 1;
                Ok(Some(packet.clone()))
            }
            None => Ok(None),
        }
    }

    fn cue_points(&self) -> &[CuePoint] {
        &self.cues
    }

    fn seek_track(&mut self, _track_id: u32, ts: u64) -> Result<()> {
        self.index = self.packets.iter().position(|p| p.ts >= ts).unwrap_or(self.packets.len());
        Ok(())
    }
}

pub struct MockVideoDecoder {
    pending: Vec<Picture>,
    have_reference: bool,
    fail_at: Option<u64>,
}

fn make_picture() -> Picture {
    Picture {
        planes: [Box::from([0u8; 4]), Box::from([0u8; 1]), Box::from([0u8; 1])],
        strides: [2, 1, 1],
        width: 2,
        height: 2,
        bit_depth: 8,
        layout: PixelLayout::Yuv420,
        color: ColorDescription::default(),
    }
}

impl VideoDecoder for MockVideoDecoder {
    fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let payload = decode_payload(data)?;

        if self.fail_at == Some(payload.ts) {
            return decoder_error("injected video decode failure");
        }

        if payload.tag & TAG_KEYFRAME != 0 {
            self.have_reference = true;
        }
        else if !self.have_reference {
            return decoder_error("no reference frame for inter frame");
        }

        self.pending.push(make_picture());
        Ok(())
    }

    fn next_picture(&mut self) -> Result<Option<Picture>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.pending.remove(0)))
    }

    fn parse_sequence_header(&mut self, data: &[u8]) -> Result<()> {
        let payload = decode_payload(data)?;
        if payload.tag & TAG_SEQ_HEADER != 0 {
            Ok(())
        }
        else {
            invalid_data_error("no sequence header in chunk")
        }
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.have_reference = false;
    }
}

pub struct MockAudioDecoder {
    channels: u32,
    sample_rate: u32,
    buffer: PcmBuffer,
    log: AudioLog,
}

impl AudioDecoder for MockAudioDecoder {
    fn channels(&self) -> u32 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn decode(&mut self, data: &[u8]) -> Result<&PcmBuffer> {
        let payload = decode_payload(data)?;
        if payload.tag & TAG_AUDIO == 0 {
            return invalid_data_error("not an audio packet");
        }

        self.log.lock().unwrap().push((payload.ts, false));

        // Every sample of the packet carries its raw timestamp, so output provenance is
        // checkable.
        let plane = vec![payload.ts as f32; payload.samples as usize];
        self.buffer.set_planar(vec![plane; self.channels as usize]);
        Ok(&self.buffer)
    }

    fn advance(&mut self, data: &[u8]) -> Result<()> {
        let payload = decode_payload(data)?;
        self.log.lock().unwrap().push((payload.ts, true));
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

pub struct MockBackend {
    spec: StreamSpec,
    pub audio_log: AudioLog,
}

impl MockBackend {
    pub fn new(spec: StreamSpec) -> Arc<MockBackend> {
        Arc::new(MockBackend { spec, audio_log: Arc::new(Mutex::new(Vec::new())) })
    }

    /// Raw timestamps of packets decoded for real (not warmed up), in decode order.
    pub fn decoded_audio(&self) -> Vec<u64> {
        self.audio_log.lock().unwrap().iter().filter(|(_, warm)| !warm).map(|(ts, _)| *ts).collect()
    }
}

impl MediaBackend for MockBackend {
    fn open_demuxer(&self, _source: Box<dyn MediaSource>) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(MockDemuxer::new(&self.spec)))
    }

    fn make_video_decoder(&self, _params: &VideoTrackParams) -> Result<Box<dyn VideoDecoder>> {
        Ok(Box::new(MockVideoDecoder {
            pending: Vec::new(),
            have_reference: false,
            fail_at: self.spec.fail_video_at,
        }))
    }

    fn make_audio_decoder(&self, params: &AudioTrackParams) -> Result<Box<dyn AudioDecoder>> {
        if params.codec_private.len() != 3 {
            return invalid_data_error("expected three Vorbis headers");
        }
        Ok(Box::new(MockAudioDecoder {
            channels: params.channels,
            sample_rate: params.sample_rate,
            buffer: PcmBuffer::new(params.channels as usize),
            log: self.audio_log.clone(),
        }))
    }
}
