// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors at the X11 connection level.

use std::fmt;
use std::sync::Arc;

use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

use crate::backend::PlatformError;

#[derive(Debug, Clone)]
pub enum Error {
    /// The display could not be opened.
    Connect(Arc<ConnectError>),
    XError(Arc<ReplyError>),
    /// The server's setup block lacks something we rely on.
    InvalidSetup(&'static str),
    /// The client ran out of resource ids.
    IdsExhausted,
    /// The display has been closed.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::Connect(e) => write!(f, "cannot open display: {e}"),
            Error::XError(e) => e.fmt(f),
            Error::InvalidSetup(what) => write!(f, "unusable X11 setup: {what}"),
            Error::IdsExhausted => write!(f, "X11 resource ids exhausted"),
            Error::Closed => write!(f, "the X11 connection has been closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<x11rb::x11_utils::X11Error> for Error {
    fn from(err: x11rb::x11_utils::X11Error) -> Error {
        Error::XError(Arc::new(ReplyError::X11Error(err)))
    }
}

impl From<ReplyError> for Error {
    fn from(err: ReplyError) -> Error {
        Error::XError(Arc::new(err))
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Error {
        Error::XError(Arc::new(ReplyError::ConnectionError(err)))
    }
}

impl From<ConnectError> for Error {
    fn from(err: ConnectError) -> Error {
        Error::Connect(Arc::new(err))
    }
}

impl From<ReplyOrIdError> for Error {
    fn from(err: ReplyOrIdError) -> Error {
        match err {
            ReplyOrIdError::IdsExhausted => Error::IdsExhausted,
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::X11Error(e) => e.into(),
        }
    }
}

impl From<Error> for crate::error::Error {
    fn from(err: Error) -> crate::error::Error {
        crate::error::Error::Platform(PlatformError::X11(err))
    }
}
