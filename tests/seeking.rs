// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seek engine behavior: accurate and fast seeks, boundary targets, idempotence.

mod common;

use std::sync::Arc;

use common::{MockBackend, StreamSpec};
use vignette::formats::MediaBackend;
use vignette::{Player, Settings, Status};

fn open(spec: StreamSpec, settings: Settings) -> (Player, Arc<MockBackend>) {
    let backend = MockBackend::new(spec);
    let dyn_backend: Arc<dyn MediaBackend> = backend.clone();
    let player = Player::from_memory(Vec::<u8>::new(), dyn_backend, settings).expect("open session");
    (player, backend)
}

// With the default spec (24 fps, keyframes every 24 frames), 5166 ms is frame 124, four frames
// past the keyframe at frame 120 (5000 ms).
const MID_GOP_TARGET: u64 = 5_166;

#[test]
fn accurate_seek_decodes_from_keyframe_to_target() {
    let (mut player, _) = open(StreamSpec::default(), Settings::default());

    assert_eq!(player.seek_to_timestamp(MID_GOP_TARGET).expect("seek"), Status::Ok);
    assert_eq!(player.current_timestamp(), MID_GOP_TARGET);

    // The pre-roll decoded the keyframe at 5000 and the four frames after it; the frame at the
    // target is the one left to display.
    assert_eq!(player.total_video_frames_processed(), 5);
    let frame = player.get_video_frame().expect("frame at target");
    assert_eq!(frame.timestamp, MID_GOP_TARGET);

    // Decoding continues seamlessly from the target.
    assert_eq!(player.decode_next().expect("decode"), Status::Ok);
    let frame = player.get_video_frame().expect("next frame");
    assert_eq!(frame.timestamp, 5_208);
}

#[test]
fn fast_seek_stops_at_the_keyframe() {
    let settings = Settings::default().with_fast_seeking(true);
    let (mut player, _) = open(StreamSpec::default(), settings);

    assert_eq!(player.seek_to_timestamp(MID_GOP_TARGET).expect("seek"), Status::Ok);

    // The position reports the requested target, but the displayable frame is the keyframe:
    // nothing between the keyframe and the target was decoded.
    assert_eq!(player.current_timestamp(), MID_GOP_TARGET);
    assert_eq!(player.total_video_frames_processed(), 1);
    let frame = player.get_video_frame().expect("keyframe");
    assert_eq!(frame.timestamp, 5_000);
}

#[test]
fn seek_past_duration_finishes_without_a_picture() {
    let (mut player, _) = open(StreamSpec::default(), Settings::default());

    assert_eq!(player.seek_to_timestamp(25_000).expect("seek"), Status::Finished);
    assert_eq!(player.current_timestamp(), 10_000);
    assert!(player.is_finished());
    assert!(player.get_video_frame().is_none());
    assert_eq!(player.total_video_frames_processed(), 0);
    assert_eq!(player.decode_next().expect("decode"), Status::Finished);
}

#[test]
fn repeated_seek_is_a_no_op() {
    let (mut player, _) = open(StreamSpec::default(), Settings::default());

    player.seek_to_timestamp(MID_GOP_TARGET).expect("seek");
    let position = player.current_timestamp();
    let processed = player.total_video_frames_processed();

    assert_eq!(player.seek_to_timestamp(MID_GOP_TARGET).expect("seek again"), Status::Ok);
    assert_eq!(player.current_timestamp(), position);
    assert_eq!(player.total_video_frames_processed(), processed);
}

#[test]
fn seek_to_zero_on_a_mid_gop_stream_finds_the_first_keyframe() {
    // The stream's first keyframe is frame 5 (208 ms): it starts mid group-of-pictures.
    let spec = StreamSpec {
        first_keyframe: 5,
        ..StreamSpec::default()
    };
    let (mut player, _) = open(spec, Settings::default());

    assert_eq!(player.seek_to_timestamp(0).expect("seek"), Status::Ok);
    assert_eq!(player.current_timestamp(), 0);

    // The first decodable picture is the keyframe; it becomes displayable once the position
    // reaches it.
    player.decode_until(300).expect("decode");
    let frame = player.get_video_frame().expect("first picture");
    assert!(frame.timestamp >= 208);
}

#[test]
fn backward_seek_resumes_a_finished_session() {
    let (mut player, _) = open(StreamSpec::default(), Settings::default());

    loop {
        if player.decode_next().expect("decode") == Status::Finished {
            break;
        }
    }
    assert!(player.is_finished());

    assert_eq!(player.seek_backward(5_000).expect("seek"), Status::Ok);
    assert_eq!(player.current_timestamp(), 5_000);
    assert!(!player.is_finished());
    assert_eq!(player.decode_next().expect("decode"), Status::Ok);
}

#[test]
fn seek_with_audio_warms_the_decoder_up_to_the_keyframe() {
    let spec = StreamSpec::default().with_audio(2, 48_000, 20);
    let (mut player, backend) = open(spec, Settings::default());

    player.seek_to_timestamp(MID_GOP_TARGET).expect("seek");

    // Audio between the keyframe and the target was decoded for real so the ring covers the
    // resume point; nothing after the target was consumed.
    let decoded = backend.decoded_audio();
    assert!(decoded.iter().all(|&ts| ts >= 5_000 && ts <= MID_GOP_TARGET));

    // Playback continues with both streams.
    player.decode_until(MID_GOP_TARGET + 500).expect("decode");
    assert!(player.get_audio_frame().is_some());
}

#[test]
fn seek_forward_steps_from_the_current_position() {
    let (mut player, _) = open(StreamSpec::default(), Settings::default());

    player.decode_until(1_000).expect("decode");
    let before = player.current_timestamp();

    player.seek_forward(2_000).expect("seek");
    assert_eq!(player.current_timestamp(), before + 2_000);
}
