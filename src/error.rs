// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors at the display level.

use std::fmt;
use std::sync::Arc;

use crate::backend::{PlatformError, Serial};

/// An error reported asynchronously by the windowing server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolError {
    /// Serial of the request that failed.
    pub serial: Serial,
    /// The server's error code.
    pub code: u8,
    /// The major opcode of the failed request, if known.
    pub request_code: u8,
    /// The resource the failing request named.
    pub resource: u64,
}

/// Display errors.
#[derive(Debug, Clone)]
pub enum Error {
    /// The display connection has been closed.
    DisplayClosed,
    /// The connection to the windowing server was lost.
    ConnectionLost,
    /// The window has already been destroyed.
    WindowDestroyed,
    /// A caller passed arguments the operation cannot work with.
    InvalidInput(String),
    /// The server rejected a request and no error trap was active.
    Protocol(ProtocolError),
    /// Platform specific error.
    Platform(PlatformError),
    /// Other miscellaneous error.
    Other(Arc<anyhow::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::DisplayClosed => write!(f, "The display has already been closed."),
            Error::ConnectionLost => write!(f, "The connection to the display was lost."),
            Error::WindowDestroyed => write!(f, "The window has already been destroyed."),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Error::Protocol(err) => write!(
                f,
                "Protocol error {} (request {}) on resource {:#x}, serial {}",
                err.code, err.request_code, err.resource, err.serial.0
            ),
            Error::Platform(err) => fmt::Display::fmt(err, f),
            Error::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(src: anyhow::Error) -> Error {
        Error::Other(Arc::new(src))
    }
}

impl From<PlatformError> for Error {
    fn from(src: PlatformError) -> Error {
        Error::Platform(src)
    }
}

impl From<ProtocolError> for Error {
    fn from(src: ProtocolError) -> Error {
        Error::Protocol(src)
    }
}
