// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Windows implementation of the connection-wide state.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;
use std::ptr;
use std::rc::Rc;
use std::time::Duration;

use winapi::shared::minwindef::{DWORD, UINT};
use winapi::shared::windef::HWND;
use winapi::shared::winerror::WAIT_TIMEOUT;
use winapi::um::wingdi::{GetDeviceCaps, GdiFlush, BITSPIXEL};
use winapi::um::winbase::{GlobalAddAtomW, GlobalFindAtomW, GlobalGetAtomNameW, INFINITE, WAIT_OBJECT_0};
use winapi::um::winuser::*;

use super::drawable::GcState;
use super::error::Error;
use super::util::{FromWide, ToWide};
use crate::backend::{NativeEvent, NativeEventKind, NativeWindow, Serial};
use crate::colormap::{Visual, VisualClass};
use crate::display::Atom;
use crate::error::ProtocolError;

/// X protocol error codes, reported for failures on unknown handles.
pub(crate) mod error_code {
    pub const BAD_WINDOW: u8 = 3;
    pub const BAD_PIXMAP: u8 = 4;
    pub const BAD_FONT: u8 = 7;
    pub const BAD_DRAWABLE: u8 = 9;
    pub const BAD_ACCESS: u8 = 10;
    pub const BAD_COLOR: u8 = 12;
    pub const BAD_GC: u8 = 13;
}

/// State shared between the display side and the window procedure.
pub(crate) struct Shared {
    events: RefCell<VecDeque<NativeEvent>>,
    /// Serial of the most recent request.
    serial: Cell<u64>,
    /// Every window we created and that still exists.
    pub(crate) windows: RefCell<HashSet<usize>>,
}

impl Shared {
    pub fn push(&self, hwnd: HWND, kind: NativeEventKind) {
        let event = NativeEvent::Window {
            window: NativeWindow(hwnd as usize as u64),
            serial: Serial(self.serial.get()),
            kind,
        };
        match self.events.try_borrow_mut() {
            Ok(mut events) => events.push_back(event),
            Err(_) => tracing::warn!("event queue busy, dropping {:?}", event),
        }
    }

    pub fn push_error(&self, code: u8, resource: u64) {
        let err = ProtocolError {
            serial: Serial(self.serial.get()),
            code,
            request_code: 0,
            resource,
        };
        tracing::debug!("request {} failed with code {}", err.serial.0, code);
        if let Ok(mut events) = self.events.try_borrow_mut() {
            events.push_back(NativeEvent::Error(err));
        }
    }

    fn pop(&self) -> Option<NativeEvent> {
        self.events.try_borrow_mut().ok()?.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.events.try_borrow().map_or(true, |e| e.is_empty())
    }
}

/// Client-side resources standing in for server resources.
#[derive(Default)]
pub(crate) struct Resources {
    next_id: u64,
    pub(crate) gcs: HashMap<u64, GcState>,
    pub(crate) pixmaps: HashSet<u64>,
    pub(crate) fonts: HashSet<u64>,
    pub(crate) colormaps: HashSet<u64>,
}

impl Resources {
    pub fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// The id of the system colormap. Win32 has no colormaps for true color
/// displays; ours are bookkeeping only.
pub(crate) const SYSTEM_COLORMAP: u64 = 1;

pub(crate) struct Application {
    pub(crate) shared: Rc<Shared>,
    pub(crate) resources: RefCell<Resources>,
    visual: Visual,
    screen_size: (i32, i32),
    closed: Cell<bool>,
}

impl Application {
    pub fn new() -> Result<Application, Error> {
        super::window::register_class()?;
        let screen_size = unsafe {
            let dc = GetDC(ptr::null_mut());
            if dc.is_null() {
                return Err(Error::Null);
            }
            let depth = GetDeviceCaps(dc, BITSPIXEL);
            ReleaseDC(ptr::null_mut(), dc);
            tracing::debug!("screen depth is {} bits", depth);
            (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN))
        };
        // Pixels are COLORREFs whatever the screen depth: red in the low byte.
        let visual = Visual {
            id: 0,
            class: VisualClass::TrueColor,
            depth: 24,
            colormap_size: 256,
            bits_per_rgb: 8,
            red_mask: 0x0000_00ff,
            green_mask: 0x0000_ff00,
            blue_mask: 0x00ff_0000,
        };

        let mut resources = Resources {
            next_id: SYSTEM_COLORMAP,
            ..Resources::default()
        };
        resources.colormaps.insert(SYSTEM_COLORMAP);
        Ok(Application {
            shared: Rc::new(Shared {
                events: RefCell::new(VecDeque::new()),
                serial: Cell::new(0),
                windows: RefCell::new(HashSet::new()),
            }),
            resources: RefCell::new(resources),
            visual,
            screen_size,
            closed: Cell::new(false),
        })
    }

    pub fn visual(&self) -> &Visual {
        &self.visual
    }

    pub fn screen_size(&self) -> (i32, i32) {
        self.screen_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Accounts for one request and returns its serial.
    pub fn request(&self) -> Serial {
        let serial = self.shared.serial.get().wrapping_add(1);
        self.shared.serial.set(serial);
        Serial(serial)
    }

    pub fn next_serial(&self) -> Serial {
        Serial(self.shared.serial.get().wrapping_add(1))
    }

    pub fn intern_atom(&self, name: &str, only_if_exists: bool) -> Option<Atom> {
        let wide = name.to_wide();
        self.request();
        let atom = unsafe {
            if only_if_exists {
                GlobalFindAtomW(wide.as_ptr())
            } else {
                GlobalAddAtomW(wide.as_ptr())
            }
        };
        if atom == 0 {
            None
        } else {
            Some(Atom(u32::from(atom)))
        }
    }

    pub fn atom_name(&self, atom: Atom) -> Option<String> {
        let atom = u16::try_from(atom.0).ok()?;
        let mut buf = [0u16; 256];
        self.request();
        let len = unsafe { GlobalGetAtomNameW(atom, buf.as_mut_ptr(), buf.len() as i32) };
        if len == 0 {
            return None;
        }
        buf.get(..len as usize).and_then(FromWide::to_string)
    }

    /// Dispatches window messages until an event is queued or none are left.
    pub fn poll_event(&self) -> Option<NativeEvent> {
        if self.closed.get() {
            return None;
        }
        loop {
            if let Some(event) = self.shared.pop() {
                return Some(event);
            }
            unsafe {
                let mut msg = mem::MaybeUninit::uninit();
                if PeekMessageW(msg.as_mut_ptr(), ptr::null_mut(), 0, 0, PM_REMOVE) == 0 {
                    return None;
                }
                let msg: MSG = msg.assume_init();
                if msg.message == WM_QUIT {
                    tracing::debug!("WM_QUIT received");
                    return Some(NativeEvent::ConnectionLost);
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    pub fn wait_event(&self, timeout: Option<Duration>) -> bool {
        if self.closed.get() {
            return false;
        }
        if !self.shared.is_empty() {
            return true;
        }
        let millis = match timeout {
            Some(t) => DWORD::try_from(t.as_millis()).unwrap_or(INFINITE - 1),
            None => INFINITE,
        };
        let res = unsafe {
            MsgWaitForMultipleObjectsEx(0, ptr::null(), millis, QS_ALLINPUT, MWMO_INPUTAVAILABLE)
        };
        match res {
            WAIT_OBJECT_0 => true,
            WAIT_TIMEOUT => false,
            other => {
                tracing::error!("MsgWaitForMultipleObjectsEx failed: {}", other);
                false
            }
        }
    }

    pub fn flush(&self) {
        unsafe {
            GdiFlush();
        }
    }

    pub fn beep(&self) {
        self.request();
        unsafe {
            MessageBeep(MB_OK as UINT);
        }
    }

    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        let windows: Vec<usize> = self.shared.windows.borrow().iter().copied().collect();
        for hwnd in windows {
            let hwnd = hwnd as HWND;
            unsafe {
                // Children go with their toplevel.
                if IsWindow(hwnd) != 0 && GetParent(hwnd).is_null() {
                    DestroyWindow(hwnd);
                }
            }
        }
        if let Ok(mut events) = self.shared.events.try_borrow_mut() {
            events.clear();
        }
    }
}
