// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors of the headless server.

use std::fmt;
use std::sync::Arc;

use crate::backend::PlatformError;

#[derive(Debug, Clone)]
pub enum Error {
    /// A request that needed an immediate answer was refused.
    Refused { code: u8, request_code: u8, resource: u64 },
    /// The server has been shut down.
    Closed,
    /// The server state was already borrowed.
    Busy(Arc<anyhow::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::Refused {
                code,
                request_code,
                resource,
            } => write!(
                f,
                "headless server refused request {request_code} on {resource:#x} with error {code}"
            ),
            Error::Closed => write!(f, "the headless server has been closed"),
            Error::Busy(e) => write!(f, "headless server state unavailable: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for crate::error::Error {
    fn from(err: Error) -> crate::error::Error {
        crate::error::Error::Platform(PlatformError::Headless(err))
    }
}
