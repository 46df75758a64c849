// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module implements the Vorbis decode driver and its PCM ring.

use crate::codecs::{AudioDecoder, PcmBuffer};
use crate::errors::Result;
use crate::queue::Packet;
use crate::AUDIO_BUFFER_SIZE;

/// A fixed-capacity buffer of decoded float PCM.
///
/// Capacity is [`AUDIO_BUFFER_SIZE`] frames. Samples are stored in the output layout selected at
/// construction: channel-interleaved per frame, or per-channel planes sharing one backing store
/// partitioned into `channels` equal regions of [`AUDIO_BUFFER_SIZE`] samples.
///
/// When new samples would overflow, the oldest buffered samples are shifted out to make room:
/// the newest audio is always preserved.
#[derive(Debug)]
pub(crate) struct AudioRing {
    data: Vec<f32>,
    channels: usize,
    interleaved: bool,
    /// Frames currently buffered.
    frames: usize,
    /// Latched true by any decode that produced output; cleared when the buffer is handed to
    /// the caller.
    has_samples: bool,
}

impl AudioRing {
    pub fn new(channels: usize, interleaved: bool) -> Self {
        AudioRing {
            data: vec![0.0; AUDIO_BUFFER_SIZE * channels],
            channels,
            interleaved,
            frames: 0,
            has_samples: false,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn has_samples(&self) -> bool {
        self.has_samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    /// Append decoded planar PCM, converting to the output layout.
    pub fn push(&mut self, pcm: &PcmBuffer) {
        let mut new_frames = pcm.frames();
        if new_frames == 0 || self.channels == 0 {
            return;
        }

        // A single decode larger than the whole buffer resets it and keeps only the tail window.
        let mut skip = 0;
        if new_frames > AUDIO_BUFFER_SIZE {
            skip = new_frames - AUDIO_BUFFER_SIZE;
            new_frames = AUDIO_BUFFER_SIZE;
            self.frames = 0;
        }
        else if self.frames + new_frames > AUDIO_BUFFER_SIZE {
            self.shift_out(self.frames + new_frames - AUDIO_BUFFER_SIZE);
        }

        let base = self.frames;
        if self.interleaved {
            for frame in 0..new_frames {
                for ch in 0..self.channels {
                    self.data[(base + frame) * self.channels + ch] =
                        pcm.plane(ch.min(pcm.channels() - 1))[skip + frame];
                }
            }
        }
        else {
            for ch in 0..self.channels {
                let plane = pcm.plane(ch.min(pcm.channels() - 1));
                let region = ch * AUDIO_BUFFER_SIZE + base;
                self.data[region..region + new_frames]
                    .copy_from_slice(&plane[skip..skip + new_frames]);
            }
        }

        self.frames = base + new_frames;
        self.has_samples = true;
    }

    /// Shift the `count` oldest frames out of the buffer.
    fn shift_out(&mut self, count: usize) {
        debug_assert!(count <= self.frames);

        let keep = self.frames - count;
        if self.interleaved {
            self.data.copy_within(count * self.channels..self.frames * self.channels, 0);
        }
        else {
            for ch in 0..self.channels {
                let region = ch * AUDIO_BUFFER_SIZE;
                self.data.copy_within(region + count..region + self.frames, region);
            }
        }
        self.frames = keep;
    }

    /// Hand the buffered samples to the caller and clear the buffer.
    ///
    /// Interleaved output is `frames * channels` samples, frame-major. Planar output is the
    /// per-channel planes concatenated, each exactly `frames` samples long.
    pub fn drain(&mut self) -> (Vec<f32>, usize) {
        let frames = self.frames;
        let mut out = Vec::with_capacity(frames * self.channels);

        if self.interleaved {
            out.extend_from_slice(&self.data[..frames * self.channels]);
        }
        else {
            for ch in 0..self.channels {
                let region = ch * AUDIO_BUFFER_SIZE;
                out.extend_from_slice(&self.data[region..region + frames]);
            }
        }

        self.frames = 0;
        self.has_samples = false;
        (out, frames)
    }

    /// Drop all buffered samples and the latch.
    pub fn reset(&mut self) {
        self.frames = 0;
        self.has_samples = false;
    }
}

/// The audio decode driver: one Vorbis decoder feeding one PCM ring.
///
/// Runs entirely on the caller thread.
pub(crate) struct AudioStream {
    decoder: Box<dyn AudioDecoder>,
    ring: AudioRing,
}

impl AudioStream {
    pub fn new(decoder: Box<dyn AudioDecoder>, interleaved: bool) -> Self {
        let channels = decoder.channels() as usize;
        AudioStream { decoder, ring: AudioRing::new(channels, interleaved) }
    }

    pub fn channels(&self) -> u32 {
        self.decoder.channels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.decoder.sample_rate()
    }

    pub fn ring(&self) -> &AudioRing {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut AudioRing {
        &mut self.ring
    }

    /// Decode all chunks of one packet into the ring.
    pub fn decode_packet(&mut self, packet: &Packet) -> Result<()> {
        for chunk in &packet.chunks {
            let pcm = self.decoder.decode(chunk)?;
            self.ring.push(pcm);
        }
        Ok(())
    }

    /// Feed one packet through the decoder without producing output. Used while the seek engine
    /// has not yet reached its target.
    pub fn warmup_packet(&mut self, packet: &Packet) -> Result<()> {
        for chunk in &packet.chunks {
            self.decoder.advance(chunk)?;
        }
        Ok(())
    }

    /// Restart the decoder's synthesis state and drop buffered output.
    pub fn restart(&mut self) {
        self.decoder.reset();
        self.ring.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::AudioRing;
    use crate::codecs::PcmBuffer;
    use crate::AUDIO_BUFFER_SIZE;

    fn pcm(channels: usize, start: f32, frames: usize) -> PcmBuffer {
        let mut buf = PcmBuffer::new(channels);
        let planes = (0..channels)
            .map(|ch| (0..frames).map(|i| start + i as f32 + 1000.0 * ch as f32).collect())
            .collect();
        buf.set_planar(planes);
        buf
    }

    #[test]
    fn interleaved_push_and_drain() {
        let mut ring = AudioRing::new(2, true);
        ring.push(&pcm(2, 0.0, 3));

        assert!(ring.has_samples());
        let (out, frames) = ring.drain();
        assert_eq!(frames, 3);
        assert_eq!(out, vec![0.0, 1000.0, 1.0, 1001.0, 2.0, 1002.0]);
        assert!(!ring.has_samples());
        assert_eq!(ring.frames(), 0);
    }

    #[test]
    fn planar_push_and_drain() {
        let mut ring = AudioRing::new(2, false);
        ring.push(&pcm(2, 0.0, 3));

        let (out, frames) = ring.drain();
        assert_eq!(frames, 3);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 1000.0, 1001.0, 1002.0]);
    }

    #[test]
    fn overflow_shifts_oldest_out() {
        let mut ring = AudioRing::new(1, true);
        ring.push(&pcm(1, 0.0, AUDIO_BUFFER_SIZE - 2));
        ring.push(&pcm(1, 50_000.0, 6));

        // Length never exceeds capacity; the newest samples survive.
        assert_eq!(ring.frames(), AUDIO_BUFFER_SIZE);
        let (out, _) = ring.drain();
        assert_eq!(
            out[AUDIO_BUFFER_SIZE - 6..],
            [50_000.0, 50_001.0, 50_002.0, 50_003.0, 50_004.0, 50_005.0]
        );
        // The oldest four samples were shifted out.
        assert_eq!(out[0], 4.0);
    }

    #[test]
    fn oversized_decode_keeps_tail_window() {
        let mut ring = AudioRing::new(1, true);
        ring.push(&pcm(1, 0.0, 10));
        ring.push(&pcm(1, 0.0, AUDIO_BUFFER_SIZE + 100));

        assert_eq!(ring.frames(), AUDIO_BUFFER_SIZE);
        let (out, _) = ring.drain();
        // Only the tail window of the oversized decode remains.
        assert_eq!(out[0], 100.0);
        assert_eq!(out[AUDIO_BUFFER_SIZE - 1], (AUDIO_BUFFER_SIZE + 99) as f32);
    }
}
