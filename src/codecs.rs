// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codecs` module provides the traits and support structures the session uses to drive the
//! external AV1 and Vorbis decoders.
//!
//! Both decoders are black-box collaborators: the session consumes them exclusively through
//! [`VideoDecoder`] and [`AudioDecoder`].

use std::fmt;

use crate::errors::Result;

/// A `CodecId` is a unique identifier used to identify a specific codec.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodecId(u32);

/// Null codec ID.
pub const CODEC_ID_NULL: CodecId = CodecId(0x0);

impl Default for CodecId {
    fn default() -> Self {
        CODEC_ID_NULL
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Codec IDs for the codecs in scope.
pub mod well_known {
    use super::CodecId;

    /// AOMedia Video 1 (AV1)
    pub const CODEC_ID_AV1: CodecId = CodecId(0x100);
    /// Vorbis
    pub const CODEC_ID_VORBIS: CodecId = CodecId(0x200);
}

/// The chroma subsampling layout of a decoded picture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// 4:0:0 (luma only).
    Monochrome,
    /// 4:2:0 (chroma halved horizontally and vertically).
    Yuv420,
    /// 4:2:2 (chroma halved horizontally).
    Yuv422,
    /// 4:4:4 (no chroma subsampling).
    Yuv444,
}

impl PixelLayout {
    /// The number of planes carried by a picture with this layout.
    pub fn plane_count(&self) -> usize {
        match self {
            PixelLayout::Monochrome => 1,
            _ => 3,
        }
    }

    /// The dimensions of the given plane for a picture of `width` x `height`.
    ///
    /// Chroma plane dimensions round up, matching how the decoder pads odd picture sizes.
    pub fn plane_dimensions(&self, width: u32, height: u32, plane: usize) -> (u32, u32) {
        if plane == 0 {
            return (width, height);
        }
        match self {
            PixelLayout::Monochrome => (0, 0),
            PixelLayout::Yuv420 => ((width + 1) / 2, (height + 1) / 2),
            PixelLayout::Yuv422 => ((width + 1) / 2, height),
            PixelLayout::Yuv444 => (width, height),
        }
    }
}

/// The position of chroma samples relative to luma samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChromaSamplePosition {
    Unknown,
    Vertical,
    Colocated,
}

/// The color description of a decoded picture, surfaced untouched from the bitstream.
///
/// Code points are as coded by the sequence header (ISO/IEC 23091-4). The session performs no
/// color-space conversion; these values exist so the caller can.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColorDescription {
    /// Color primaries code point.
    pub primaries: u8,
    /// Transfer characteristics code point.
    pub transfer: u8,
    /// Matrix coefficients code point.
    pub matrix: u8,
    /// Chroma sample position, meaningful for 4:2:0 layouts.
    pub chroma_position: ChromaSamplePosition,
}

impl Default for ColorDescription {
    fn default() -> Self {
        // 2 is the "unspecified" code point for primaries, transfer, and matrix alike.
        ColorDescription {
            primaries: 2,
            transfer: 2,
            matrix: 2,
            chroma_position: ChromaSamplePosition::Unknown,
        }
    }
}

/// A decoded video picture.
///
/// A picture owns its plane data. Planes that do not exist for the picture's layout are empty.
/// Samples wider than 8 bits are stored as native-endian `u16` pairs, so a row occupies
/// `width * bytes_per_sample()` bytes of its stride.
#[derive(Clone, Debug)]
pub struct Picture {
    /// The plane data: Y, U, V.
    pub planes: [Box<[u8]>; 3],
    /// The stride, in bytes, of each plane.
    pub strides: [u32; 3],
    /// Picture width in pixels.
    pub width: u32,
    /// Picture height in pixels.
    pub height: u32,
    /// Bits per sample: 8, 10, or 12.
    pub bit_depth: u8,
    /// The chroma subsampling layout.
    pub layout: PixelLayout,
    /// The color description.
    pub color: ColorDescription,
}

impl Picture {
    /// The number of bytes used to store one sample.
    pub fn bytes_per_sample(&self) -> u32 {
        if self.bit_depth > 8 {
            2
        }
        else {
            1
        }
    }

    /// The dimensions of the given plane.
    pub fn plane_dimensions(&self, plane: usize) -> (u32, u32) {
        self.layout.plane_dimensions(self.width, self.height, plane)
    }
}

/// A `VideoDecoder` is the abstract surface of the external AV1 decoder.
///
/// The decoder is fed bitstream chunks with [`send_data`](VideoDecoder::send_data) and drained
/// with [`next_picture`](VideoDecoder::next_picture). The two calls are decoupled because the
/// decoder may need more than one chunk before it can produce a picture.
pub trait VideoDecoder: Send {
    /// Feed one bitstream chunk to the decoder.
    fn send_data(&mut self, data: &[u8]) -> Result<()>;

    /// Retrieve the next decoded picture.
    ///
    /// Returns `Ok(None)` when the decoder needs more data before it can produce a picture. This
    /// is the retryable outcome; an `Err` is not.
    fn next_picture(&mut self) -> Result<Option<Picture>>;

    /// Parse a chunk for a sequence header without decoding it. Returns an error if the chunk
    /// does not contain a valid sequence header.
    fn parse_sequence_header(&mut self, data: &[u8]) -> Result<()>;

    /// Discard all in-flight decoder state. Required before decoding discontinuous data, most
    /// notably after a seek.
    fn flush(&mut self);
}

/// Decoded planar PCM owned by an [`AudioDecoder`].
///
/// One plane per channel; all planes are the same length. The buffer is overwritten by each
/// successful decode.
#[derive(Clone, Debug, Default)]
pub struct PcmBuffer {
    planes: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Create an empty buffer with one plane per channel.
    pub fn new(channels: usize) -> Self {
        PcmBuffer { planes: vec![Vec::new(); channels] }
    }

    /// Replace the buffer contents. All planes must be the same length.
    pub fn set_planar(&mut self, planes: Vec<Vec<f32>>) {
        assert!(planes.windows(2).all(|w| w[0].len() == w[1].len()));
        self.planes = planes;
    }

    /// Truncate all planes to zero length.
    pub fn clear(&mut self) {
        for plane in &mut self.planes {
            plane.clear();
        }
    }

    /// The number of channels.
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// The number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.planes.first().map_or(0, |p| p.len())
    }

    /// The samples of one channel.
    pub fn plane(&self, channel: usize) -> &[f32] {
        &self.planes[channel]
    }
}

/// An `AudioDecoder` is the abstract surface of the external Vorbis decoder.
///
/// Constructing an implementation consumes the track's codec-private header blocks (for Vorbis:
/// identification, comment, and setup headers, in order); see
/// [`MediaBackend::make_audio_decoder`](crate::formats::MediaBackend::make_audio_decoder).
pub trait AudioDecoder: Send {
    /// The number of channels the decoder produces.
    fn channels(&self) -> u32;

    /// The sample rate of the decoded output, in Hz.
    fn sample_rate(&self) -> u32;

    /// Decode one packet and expose the produced samples. The returned buffer is valid until the
    /// next call on the decoder, and may contain zero frames.
    fn decode(&mut self, data: &[u8]) -> Result<&PcmBuffer>;

    /// Feed one packet through the decoder without producing output samples. Internal codec
    /// state advances as if the packet had been decoded. Used to warm the decoder up to a seek
    /// target.
    fn advance(&mut self, data: &[u8]) -> Result<()>;

    /// Restart the decoder's synthesis state. Required before decoding discontinuous data.
    fn reset(&mut self);
}
