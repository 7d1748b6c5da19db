// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors at the Win32 API level.

use std::fmt;
use std::ptr;

use winapi::shared::minwindef::{DWORD, HLOCAL};
use winapi::shared::ntdef::{HRESULT, LPWSTR};
use winapi::shared::winerror::HRESULT_CODE;
use winapi::um::winbase::{
    FormatMessageW, LocalFree, FORMAT_MESSAGE_ALLOCATE_BUFFER, FORMAT_MESSAGE_FROM_SYSTEM,
    FORMAT_MESSAGE_IGNORE_INSERTS, FORMAT_MESSAGE_MAX_WIDTH_MASK,
};

use super::util::FromWide;
use crate::backend::PlatformError;

/// Windows backend errors.
#[derive(Debug, Clone)]
pub enum Error {
    /// Windows error code.
    Hr(HRESULT),
    /// A function returned a null handle without setting an error.
    Null,
    /// The display has been closed.
    Closed,
}

fn hresult_description(hr: HRESULT) -> Option<String> {
    unsafe {
        let mut message_buffer: LPWSTR = ptr::null_mut();
        let format_result = FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM
                | FORMAT_MESSAGE_ALLOCATE_BUFFER
                | FORMAT_MESSAGE_IGNORE_INSERTS
                | FORMAT_MESSAGE_MAX_WIDTH_MASK,
            ptr::null(),
            HRESULT_CODE(hr) as DWORD,
            0,
            &mut message_buffer as *mut LPWSTR as LPWSTR,
            0,
            ptr::null_mut(),
        );
        if format_result == 0 || message_buffer.is_null() {
            return None;
        }

        let slice = std::slice::from_raw_parts(message_buffer, format_result as usize);
        let result = slice.to_string();
        LocalFree(message_buffer as HLOCAL);
        result
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::Hr(hr) => {
                write!(f, "HRESULT 0x{hr:x}")?;
                if let Some(description) = hresult_description(*hr) {
                    write!(f, ": {description}")?;
                }
                Ok(())
            }
            Error::Null => write!(f, "null handle"),
            Error::Closed => write!(f, "the display has been closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<HRESULT> for Error {
    fn from(hr: HRESULT) -> Error {
        Error::Hr(hr)
    }
}

impl From<Error> for crate::error::Error {
    fn from(err: Error) -> crate::error::Error {
        crate::error::Error::Platform(PlatformError::Windows(err))
    }
}
