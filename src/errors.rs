// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Vignette.
#[derive(Debug)]
pub enum Error {
    /// An argument passed to a public operation was invalid.
    InvalidArgument(&'static str),
    /// An allocation required to grow an internal buffer failed.
    OutOfMemory,
    /// An IO error occurred while reading or seeking the media source.
    IoError(io::Error),
    /// The demuxer or one of the codecs reported a failure.
    DecoderError(&'static str),
    /// The operation is not valid in the session's current state.
    InvalidState(&'static str),
    /// The stream contained malformed data.
    InvalidData(&'static str),
    /// An unsupported container or codec feature was encountered.
    Unsupported(&'static str),
    /// The operation is recognized but not implemented.
    NotImplemented,
}

impl Error {
    /// Get the kind of the error, for latching into a session status.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::OutOfMemory => ErrorKind::OutOfMemory,
            Error::IoError(_) => ErrorKind::Io,
            Error::DecoderError(_) => ErrorKind::Decoder,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::InvalidData(_) => ErrorKind::InvalidData,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::NotImplemented => ErrorKind::NotImplemented,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::IoError(err) => write!(f, "io error: {}", err),
            Error::DecoderError(msg) => write!(f, "decoder error: {}", msg),
            Error::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            Error::InvalidData(msg) => write!(f, "malformed stream: {}", msg),
            Error::Unsupported(feature) => write!(f, "unsupported feature: {}", feature),
            Error::NotImplemented => write!(f, "not implemented"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// A copyable discriminant of [`Error`], used to latch an error into a session
/// [`Status`] while the original error is returned to the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    OutOfMemory,
    Io,
    Decoder,
    InvalidState,
    InvalidData,
    Unsupported,
    NotImplemented,
}

impl ErrorKind {
    /// Reconstruct an error for a latched kind. Public operations on a session whose status
    /// carries an error kind short-circuit by returning this.
    pub fn into_error(self) -> Error {
        match self {
            ErrorKind::InvalidArgument => Error::InvalidArgument("session failed earlier"),
            ErrorKind::OutOfMemory => Error::OutOfMemory,
            ErrorKind::Io => {
                Error::IoError(io::Error::new(io::ErrorKind::Other, "session failed earlier"))
            }
            ErrorKind::Decoder => Error::DecoderError("session failed earlier"),
            ErrorKind::InvalidState => Error::InvalidState("session failed earlier"),
            ErrorKind::InvalidData => Error::InvalidData("session failed earlier"),
            ErrorKind::Unsupported => Error::Unsupported("session failed earlier"),
            ErrorKind::NotImplemented => Error::NotImplemented,
        }
    }
}

/// The session status.
///
/// A session starts `Ok`, transitions to `Finished` when all packets of all
/// active tracks have been demuxed and consumed, and latches an `Error` kind
/// on the first failure. Once an error kind is latched, every public operation
/// short-circuits to an error. `Finished` is not terminal: seeking backwards
/// returns the session to `Ok`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    Finished,
    Error(ErrorKind),
}

impl Status {
    /// Whether the status allows further decode operations.
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Whether an error kind has been latched.
    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error(_))
    }
}

/// Convenience function to create an invalid argument error.
pub fn invalid_argument_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::InvalidArgument(msg))
}

/// Convenience function to create a decoder error.
pub fn decoder_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::DecoderError(msg))
}

/// Convenience function to create an invalid state error.
pub fn invalid_state_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::InvalidState(msg))
}

/// Convenience function to create an invalid data error.
pub fn invalid_data_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::InvalidData(msg))
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}
