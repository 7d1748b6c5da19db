// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! The connection to the X server and the state shared by every request.

use std::cell::Cell;
use std::convert::TryFrom;
use std::ffi::CStr;
use std::os::raw::c_int;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

use x11rb::connection::Connection;
use x11rb::cookie::{Cookie, VoidCookie};
use x11rb::errors::ConnectionError;
use x11rb::protocol::xproto::{self, ConnectionExt};
use x11rb::x11_utils::TryParse;
use x11rb::xcb_ffi::XCBConnection;

use super::error::Error;
use super::event::Keymap;
use super::util;
use crate::colormap::Visual;

// This creates a `struct AppAtoms` containing the specified atoms as members (along with some
// convenience methods to intern and query those atoms). We use the following atoms:
//
// WM_PROTOCOLS
//
// List of atoms that identify the communications protocols between
// the client and window manager in which the client is willing to participate.
//
// https://www.x.org/releases/X11R7.6/doc/xorg-docs/specs/ICCCM/icccm.html#wm_protocols_property
//
// WM_DELETE_WINDOW
//
// Including this atom in the WM_PROTOCOLS property on each window makes sure that
// if the window manager respects WM_DELETE_WINDOW it will send us the event.
//
// The WM_DELETE_WINDOW event is sent when there is a request to close the window.
// Registering for but ignoring this event means that the window will remain open.
//
// https://www.x.org/releases/X11R7.6/doc/xorg-docs/specs/ICCCM/icccm.html#window_deletion
//
// _NET_WM_PID
//
// A property containing the PID of the process that created the window.
//
// https://specifications.freedesktop.org/wm-spec/wm-spec-1.3.html#idm45805407915360
//
// _NET_WM_NAME
//
// A version of WM_NAME supporting UTF8 text.
//
// https://specifications.freedesktop.org/wm-spec/wm-spec-1.3.html#idm45805407982336
//
// UTF8_STRING
//
// The type of _NET_WM_NAME
x11rb::atom_manager! {
    pub(crate) AppAtoms: AppAtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        _NET_WM_PID,
        _NET_WM_NAME,
        UTF8_STRING,
    }
}

pub(crate) struct Application {
    /// The connection to the X server.
    ///
    /// Requests go out through [`send`](Application::send) and
    /// [`call`](Application::call), which keep track of request serials.
    connection: XCBConnection,
    root: xproto::Window,
    visual: Visual,
    colormap: xproto::Colormap,
    screen_size: (i32, i32),
    pub(crate) atoms: AppAtoms,
    pub(crate) keymap: Keymap,
    /// Round-trip after every request so errors arrive next to their cause.
    synchronous: bool,
    /// The sequence number of the most recent request.
    last_serial: Cell<u64>,
    /// Set when the connection broke; reported once as `ConnectionLost`.
    lost: Cell<bool>,
    lost_reported: Cell<bool>,
    closed: Cell<bool>,
}

impl Application {
    pub fn new(display: Option<&CStr>, synchronous: bool) -> Result<Application, Error> {
        let (connection, screen_num) = XCBConnection::connect(display)?;
        let setup = connection.setup();
        let screen = setup
            .roots
            .get(screen_num)
            .ok_or(Error::InvalidSetup("the default screen is missing"))?;
        let (visual_type, depth) = util::find_visual(screen, screen.root_visual)
            .ok_or(Error::InvalidSetup("the root visual is missing"))?;
        let visual = util::visual_from_x11(&visual_type, depth);
        let root = screen.root;
        let colormap = screen.default_colormap;
        let screen_size = (
            i32::from(screen.width_in_pixels),
            i32::from(screen.height_in_pixels),
        );

        let atoms = AppAtoms::new(&connection)?.reply()?;
        let keymap = Keymap::fetch(&connection)?;
        tracing::debug!(
            "connected to screen {} ({}x{}, {:?})",
            screen_num,
            screen_size.0,
            screen_size.1,
            visual.class
        );

        Ok(Application {
            connection,
            root,
            visual,
            colormap,
            screen_size,
            atoms,
            keymap,
            synchronous,
            last_serial: Cell::new(0),
            lost: Cell::new(false),
            lost_reported: Cell::new(false),
            closed: Cell::new(false),
        })
    }

    pub fn connection(&self) -> &XCBConnection {
        &self.connection
    }

    pub fn root(&self) -> xproto::Window {
        self.root
    }

    pub fn visual(&self) -> &Visual {
        &self.visual
    }

    pub fn default_colormap(&self) -> xproto::Colormap {
        self.colormap
    }

    pub fn screen_size(&self) -> (i32, i32) {
        self.screen_size
    }

    pub fn next_serial(&self) -> u64 {
        self.last_serial.get().wrapping_add(1)
    }

    pub fn generate_id(&self) -> Result<u32, Error> {
        if self.closed.get() {
            return Err(Error::Closed);
        }
        Ok(self.connection.generate_id()?)
    }

    /// Issues a request without a reply.
    ///
    /// The cookie is dropped right away, so a failure comes back later as an
    /// error event carrying the request's serial.
    pub fn send<F>(&self, request: F)
    where
        F: for<'c> FnOnce(
            &'c XCBConnection,
        ) -> Result<VoidCookie<'c, XCBConnection>, ConnectionError>,
    {
        if self.closed.get() {
            return;
        }
        match request(&self.connection) {
            Ok(cookie) => {
                self.last_serial.set(cookie.sequence_number());
                drop(cookie);
                if self.synchronous {
                    self.round_trip();
                }
            }
            Err(e) => self.connection_failed(&e),
        }
    }

    /// Issues a request without a reply and waits until the server has
    /// processed it. A failure is returned here instead of as an event.
    pub fn send_checked<F>(&self, request: F) -> Result<(), Error>
    where
        F: for<'c> FnOnce(
            &'c XCBConnection,
        ) -> Result<VoidCookie<'c, XCBConnection>, ConnectionError>,
    {
        if self.closed.get() {
            return Err(Error::Closed);
        }
        let cookie = match request(&self.connection) {
            Ok(cookie) => cookie,
            Err(e) => {
                self.connection_failed(&e);
                return Err(e.into());
            }
        };
        self.last_serial.set(cookie.sequence_number());
        Ok(cookie.check()?)
    }

    /// Issues a request and waits for its reply.
    pub fn call<R, F>(&self, request: F) -> Result<R, Error>
    where
        R: TryParse,
        F: for<'c> FnOnce(&'c XCBConnection) -> Result<Cookie<'c, XCBConnection, R>, ConnectionError>,
    {
        if self.closed.get() {
            return Err(Error::Closed);
        }
        let cookie = match request(&self.connection) {
            Ok(cookie) => cookie,
            Err(e) => {
                self.connection_failed(&e);
                return Err(e.into());
            }
        };
        self.last_serial.set(cookie.sequence_number());
        Ok(cookie.reply()?)
    }

    fn round_trip(&self) {
        match self.connection.get_input_focus() {
            Ok(cookie) => {
                self.last_serial.set(cookie.sequence_number());
                log_x11!(cookie.reply());
            }
            Err(e) => self.connection_failed(&e),
        }
    }

    fn connection_failed(&self, err: &ConnectionError) {
        if !self.lost.replace(true) {
            tracing::error!("X11 connection failed: {}", err);
        }
    }

    pub fn flush(&self) {
        if self.closed.get() {
            return;
        }
        if let Err(e) = self.connection.flush() {
            self.connection_failed(&e);
        }
    }

    pub fn sync(&self) {
        if !self.closed.get() {
            self.round_trip();
        }
    }

    pub fn beep(&self) {
        self.send(|c| c.bell(0));
    }

    /// The next event with its full sequence number, without blocking.
    pub fn poll_event(&self) -> Option<crate::backend::NativeEvent> {
        if self.closed.get() || self.lost_reported.get() {
            return None;
        }
        loop {
            if self.lost.get() {
                self.lost_reported.set(true);
                return Some(crate::backend::NativeEvent::ConnectionLost);
            }
            match self.connection.poll_for_event_with_sequence() {
                Ok(Some((event, serial))) => {
                    // Events we have no use for are skipped here.
                    if let Some(event) = self.translate_event(event, serial) {
                        return Some(event);
                    }
                }
                Ok(None) => return None,
                Err(e) => self.connection_failed(&e),
            }
        }
    }

    /// Waits for the connection to become readable.
    pub fn wait_event(&self, timeout: Option<Duration>) -> bool {
        use nix::poll::{poll, PollFd, PollFlags};

        if self.closed.get() || self.lost.get() {
            return false;
        }
        self.flush();

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut fds = [PollFd::new(self.connection.as_raw_fd(), PollFlags::POLLIN)];
        loop {
            let poll_timeout = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        return false;
                    }
                    // Round up, `as_millis` rounds down.
                    c_int::try_from(deadline.duration_since(now).as_millis())
                        .unwrap_or(c_int::MAX - 1)
                        + 1
                }
                None => -1,
            };
            match poll(&mut fds, poll_timeout) {
                Ok(0) => return false,
                Ok(_) => {
                    return fds[0]
                        .revents()
                        .unwrap_or_else(PollFlags::empty)
                        .intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
                }
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => {
                    tracing::error!("Error while waiting for X11 connection: {}", e);
                    return false;
                }
            }
        }
    }

    pub fn close(&self) {
        if self.closed.get() {
            return;
        }
        self.flush();
        self.closed.set(true);
    }
}
