// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Small helpers shared by the core and the backends.

/// Wrapper around `RefCell::borrow` that provides error context.
// Only the backends that keep shared server state use these.
#[allow(unused_macros)]
macro_rules! borrow {
    ($val:expr) => {{
        use anyhow::Context;
        $val.try_borrow().with_context(|| {
            format!(
                "[{}:{}] {}",
                std::file!(),
                std::line!(),
                std::stringify!($val)
            )
        })
    }};
}

/// Wrapper around `RefCell::borrow_mut` that provides error context.
#[allow(unused_macros)]
macro_rules! borrow_mut {
    ($val:expr) => {{
        use anyhow::Context;
        $val.try_borrow_mut().with_context(|| {
            format!(
                "[{}:{}] {}",
                std::file!(),
                std::line!(),
                std::stringify!($val)
            )
        })
    }};
}

/// Logs a debug note when the given debug flag is enabled.
///
/// `note!(flags, GEOMETRY, "moved {:?}", id)`
macro_rules! note {
    ($flags:expr, $flag:ident, $($arg:tt)+) => {
        if $flags.contains($crate::config::DebugFlags::$flag) {
            tracing::debug!($($arg)+);
        }
    };
}

/// Clamp a 32-bit coordinate into the signed 16-bit range used on the wire.
pub(crate) fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Clamp a 32-bit extent into the unsigned 16-bit range, keeping it at least 1.
pub(crate) fn clamp_u16(value: i32) -> u16 {
    value.clamp(1, u16::MAX as i32) as u16
}

/// Truncate a coordinate to 16 bits the way the server does.
pub(crate) fn wrap_i16(value: i32) -> i16 {
    value as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping() {
        assert_eq!(clamp_i16(40000), i16::MAX);
        assert_eq!(clamp_i16(-40000), i16::MIN);
        assert_eq!(clamp_u16(0), 1);
        assert_eq!(clamp_u16(70000), u16::MAX);
        assert_eq!(wrap_i16(-33606), 31930);
    }
}
