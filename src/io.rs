// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module defines the byte source a session plays back from.

use std::fs::File;
use std::io;
use std::io::{Read, Seek};

/// The byte source a session plays back from.
///
/// A source is handed to the demuxer once, at construction, and the demuxer is the only
/// component that ever reads it. [`Player::from_path`], [`from_file`], and [`from_memory`]
/// wrap the common cases; [`from_source`] accepts any implementation of this trait.
///
/// The [`Seek`] supertrait is required so demuxers can jump to cue-point byte offsets, but
/// whether the source honors it is a runtime property: a demuxer handed a source whose
/// [`is_seekable`](MediaSource::is_seekable) returns false can still demux front to back, and
/// timestamp seeks on the session will fail instead.
///
/// [`Player::from_path`]: crate::Player::from_path
/// [`from_file`]: crate::Player::from_file
/// [`from_memory`]: crate::Player::from_memory
/// [`from_source`]: crate::Player::from_source
pub trait MediaSource: Read + Seek + Send {
    /// Whether `seek` can actually reposition the source.
    fn is_seekable(&self) -> bool;

    /// The total size of the source in bytes, when it is known up front.
    fn byte_len(&self) -> Option<u64>;
}

impl MediaSource for File {
    fn is_seekable(&self) -> bool {
        // A regular file seeks; a pipe or device handed in as a `File` does not. The metadata
        // query costs a system call each time, so demuxers should ask once and remember.
        match self.metadata() {
            Ok(metadata) => metadata.is_file(),
            Err(_) => false,
        }
    }

    fn byte_len(&self) -> Option<u64> {
        self.metadata().map(|metadata| metadata.len()).ok()
    }
}

impl<T: AsRef<[u8]> + Send> MediaSource for io::Cursor<T> {
    fn is_seekable(&self) -> bool {
        // Memory rewinds for free.
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.get_ref().as_ref().len() as u64)
    }
}
