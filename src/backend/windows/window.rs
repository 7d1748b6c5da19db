// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Creation and management of windows.

#![allow(non_snake_case)]

use std::cell::Cell;
use std::mem;
use std::ptr;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use winapi::shared::basetsd::LONG_PTR;
use winapi::shared::minwindef::{DWORD, FALSE, HINSTANCE, LPARAM, LPVOID, LRESULT, UINT, WPARAM};
use winapi::shared::ntdef::LPCWSTR;
use winapi::shared::windef::{HCURSOR, HWND, POINT, RECT};
use winapi::um::libloaderapi::GetModuleHandleW;
use winapi::um::wingdi::{CreateSolidBrush, DeleteObject};
use winapi::um::winuser::*;

use super::application::{error_code, Application, Shared};
use super::error::Error;
use super::util::{self, ToWide};
use crate::backend::{InputInfo, NativeEventKind, NativeWindow, NativeWindowAttributes};
use crate::event::{CrossingMode, NotifyDetail};
use crate::geometry::Rectangle;
use crate::window::{WindowClass, WindowType};

const CLASS_NAME: &str = "gdk-shell";

/// Used to ensure the window class is registered only once per process.
static WINDOW_CLASS_REGISTERED: AtomicBool = AtomicBool::new(false);

pub(crate) fn register_class() -> Result<(), Error> {
    if WINDOW_CLASS_REGISTERED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Ok(());
    }
    let class_name = CLASS_NAME.to_wide();
    let wnd = WNDCLASSW {
        // Whole-window repaints on resize would defeat update tracking.
        style: 0,
        lpfnWndProc: Some(win_proc_dispatch),
        cbClsExtra: 0,
        cbWndExtra: 0,
        hInstance: 0 as HINSTANCE,
        hIcon: ptr::null_mut(),
        hCursor: unsafe { LoadCursorW(ptr::null_mut(), IDC_ARROW) } as HCURSOR,
        hbrBackground: ptr::null_mut(), // Backgrounds are painted in WM_ERASEBKGND
        lpszMenuName: 0 as LPCWSTR,
        lpszClassName: class_name.as_ptr(),
    };
    let class_atom = unsafe { RegisterClassW(&wnd) };
    if class_atom == 0 {
        WINDOW_CLASS_REGISTERED.store(false, Ordering::Release);
        return Err(util::last_error());
    }
    Ok(())
}

/// Per-window state reachable from the window procedure.
struct WindowState {
    shared: Rc<Shared>,
    background: Cell<Option<u32>>,
    /// Whether we asked for `WM_MOUSELEAVE`.
    tracking: Cell<bool>,
}

fn hwnd_of(window: NativeWindow) -> HWND {
    window.0 as usize as HWND
}

unsafe fn window_state<'a>(hwnd: HWND) -> Option<&'a WindowState> {
    let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowState;
    ptr.as_ref()
}

fn lparam_point(lparam: LPARAM) -> (i32, i32) {
    let x = (lparam & 0xffff) as u16 as i16 as i32;
    let y = ((lparam >> 16) & 0xffff) as u16 as i16 as i32;
    (x, y)
}

fn input_info(hwnd: HWND, x: i32, y: i32, state: u16) -> InputInfo {
    let mut root = POINT { x, y };
    unsafe {
        ClientToScreen(hwnd, &mut root);
    }
    InputInfo {
        time: unsafe { GetMessageTime() } as u32,
        x,
        y,
        x_root: root.x,
        y_root: root.y,
        state,
    }
}

fn is_toplevel(hwnd: HWND) -> bool {
    let style = unsafe { GetWindowLongW(hwnd, GWL_STYLE) } as DWORD;
    style & WS_CHILD == 0
}

/// Client area geometry, relative to the parent's client area or the screen.
fn client_geometry(hwnd: HWND) -> Option<Rectangle> {
    unsafe {
        let mut rect: RECT = mem::zeroed();
        if GetClientRect(hwnd, &mut rect) == FALSE {
            return None;
        }
        let mut origin = POINT { x: 0, y: 0 };
        ClientToScreen(hwnd, &mut origin);
        let parent = GetParent(hwnd);
        if !parent.is_null() && !is_toplevel(hwnd) {
            ScreenToClient(parent, &mut origin);
        }
        Some(Rectangle::new(
            origin.x,
            origin.y,
            rect.right - rect.left,
            rect.bottom - rect.top,
        ))
    }
}

impl WindowState {
    fn window_proc(&self, hwnd: HWND, msg: UINT, wparam: WPARAM, lparam: LPARAM) -> Option<LRESULT> {
        let push = |kind| self.shared.push(hwnd, kind);
        match msg {
            WM_ERASEBKGND => {
                if let Some(pixel) = self.background.get() {
                    unsafe {
                        let dc = wparam as winapi::shared::windef::HDC;
                        let mut rect: RECT = mem::zeroed();
                        GetClientRect(hwnd, &mut rect);
                        let brush = CreateSolidBrush(util::colorref(pixel));
                        FillRect(dc, &rect, brush);
                        DeleteObject(brush as _);
                    }
                }
                Some(1)
            }
            WM_PAINT => unsafe {
                let mut rect: RECT = mem::zeroed();
                let dirty = GetUpdateRect(hwnd, &mut rect, FALSE) != 0;
                let mut ps: PAINTSTRUCT = mem::zeroed();
                BeginPaint(hwnd, &mut ps);
                EndPaint(hwnd, &ps);
                if dirty {
                    push(NativeEventKind::Expose {
                        area: util::rect_from_win(&rect),
                        count: 0,
                    });
                }
                Some(0)
            },
            WM_LBUTTONDOWN | WM_MBUTTONDOWN | WM_RBUTTONDOWN => {
                let button = match msg {
                    WM_LBUTTONDOWN => 1,
                    WM_MBUTTONDOWN => 2,
                    _ => 3,
                };
                let (x, y) = lparam_point(lparam);
                unsafe {
                    // Like an implicit grab.
                    SetCapture(hwnd);
                }
                push(NativeEventKind::ButtonPress {
                    info: input_info(hwnd, x, y, util::mouse_state(wparam)),
                    button,
                });
                Some(0)
            }
            WM_LBUTTONUP | WM_MBUTTONUP | WM_RBUTTONUP => {
                let button = match msg {
                    WM_LBUTTONUP => 1,
                    WM_MBUTTONUP => 2,
                    _ => 3,
                };
                let (x, y) = lparam_point(lparam);
                unsafe {
                    ReleaseCapture();
                }
                push(NativeEventKind::ButtonRelease {
                    info: input_info(hwnd, x, y, util::mouse_state(wparam)),
                    button,
                });
                Some(0)
            }
            WM_MOUSEWHEEL | WM_MOUSEHWHEEL => {
                let delta = ((wparam >> 16) & 0xffff) as u16 as i16;
                let button = match (msg == WM_MOUSEWHEEL, delta > 0) {
                    (true, true) => 4,
                    (true, false) => 5,
                    (false, true) => 7,
                    (false, false) => 6,
                };
                // Wheel positions are in screen coordinates.
                let (x, y) = lparam_point(lparam);
                let mut pos = POINT { x, y };
                unsafe {
                    ScreenToClient(hwnd, &mut pos);
                }
                push(NativeEventKind::ButtonPress {
                    info: input_info(hwnd, pos.x, pos.y, util::mouse_state(wparam)),
                    button,
                });
                Some(0)
            }
            WM_MOUSEMOVE => {
                let (x, y) = lparam_point(lparam);
                let info = input_info(hwnd, x, y, util::mouse_state(wparam));
                if !self.tracking.replace(true) {
                    let mut track = TRACKMOUSEEVENT {
                        cbSize: mem::size_of::<TRACKMOUSEEVENT>() as DWORD,
                        dwFlags: TME_LEAVE,
                        hwndTrack: hwnd,
                        dwHoverTime: 0,
                    };
                    unsafe {
                        TrackMouseEvent(&mut track);
                    }
                    push(NativeEventKind::Crossing {
                        info,
                        enter: true,
                        mode: CrossingMode::Normal,
                        detail: NotifyDetail::Nonlinear,
                    });
                }
                push(NativeEventKind::Motion {
                    info,
                    is_hint: false,
                });
                Some(0)
            }
            WM_MOUSELEAVE => {
                self.tracking.set(false);
                let mut pos = POINT { x: 0, y: 0 };
                unsafe {
                    GetCursorPos(&mut pos);
                    ScreenToClient(hwnd, &mut pos);
                }
                push(NativeEventKind::Crossing {
                    info: input_info(hwnd, pos.x, pos.y, util::key_state()),
                    enter: false,
                    mode: CrossingMode::Normal,
                    detail: NotifyDetail::Nonlinear,
                });
                Some(0)
            }
            WM_KEYDOWN | WM_SYSKEYDOWN | WM_KEYUP | WM_SYSKEYUP => {
                let state = util::key_state();
                let keyval = util::vk_to_keysym(wparam as i32, state & 1 != 0);
                let info = input_info(hwnd, 0, 0, state);
                let keycode = wparam as u32;
                if msg == WM_KEYDOWN || msg == WM_SYSKEYDOWN {
                    push(NativeEventKind::KeyPress {
                        info,
                        keycode,
                        keyval,
                    });
                } else {
                    push(NativeEventKind::KeyRelease {
                        info,
                        keycode,
                        keyval,
                    });
                }
                // System keys still need the default handling for Alt+F4.
                if msg == WM_SYSKEYDOWN || msg == WM_SYSKEYUP {
                    None
                } else {
                    Some(0)
                }
            }
            WM_SETFOCUS => {
                push(NativeEventKind::Focus { focus_in: true });
                Some(0)
            }
            WM_KILLFOCUS => {
                push(NativeEventKind::Focus { focus_in: false });
                Some(0)
            }
            WM_WINDOWPOSCHANGED => {
                if is_toplevel(hwnd) {
                    if let Some(rect) = client_geometry(hwnd) {
                        push(NativeEventKind::Configure {
                            x: rect.x,
                            y: rect.y,
                            width: rect.width,
                            height: rect.height,
                        });
                    }
                }
                // The default procedure still sends WM_SIZE and WM_MOVE.
                None
            }
            WM_SHOWWINDOW => {
                push(if wparam != 0 {
                    NativeEventKind::Map
                } else {
                    NativeEventKind::Unmap
                });
                None
            }
            WM_CLOSE => {
                // The toolkit decides whether to destroy the window.
                push(NativeEventKind::DeleteRequest);
                Some(0)
            }
            WM_DESTROY => {
                push(NativeEventKind::Destroy);
                Some(0)
            }
            _ => None,
        }
    }
}

unsafe extern "system" fn win_proc_dispatch(
    hwnd: HWND,
    msg: UINT,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_CREATE {
        let create_struct = &*(lparam as *const CREATESTRUCTW);
        let state_ptr = create_struct.lpCreateParams;
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, state_ptr as LONG_PTR);
    }
    let result = window_state(hwnd).and_then(|state| state.window_proc(hwnd, msg, wparam, lparam));
    if msg == WM_NCDESTROY {
        let state_ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowState;
        if !state_ptr.is_null() {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            let state = Rc::from_raw(state_ptr);
            if let Ok(mut windows) = state.shared.windows.try_borrow_mut() {
                windows.remove(&(hwnd as usize));
            }
        }
    }
    match result {
        Some(lresult) => lresult,
        None => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

impl Application {
    /// Returns the window handle, or reports `BadWindow` if it is gone.
    fn live_window(&self, window: NativeWindow) -> Option<HWND> {
        let hwnd = hwnd_of(window);
        if unsafe { IsWindow(hwnd) } != 0 {
            Some(hwnd)
        } else {
            self.shared.push_error(error_code::BAD_WINDOW, window.0);
            None
        }
    }

    pub fn create_window(
        &self,
        parent: NativeWindow,
        attrs: &NativeWindowAttributes,
    ) -> Result<NativeWindow, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.request();
        let (mut style, mut ex_style) = match attrs.window_type {
            WindowType::Toplevel | WindowType::Dialog | WindowType::Foreign | WindowType::Root => {
                (WS_OVERLAPPEDWINDOW | WS_CLIPCHILDREN, 0)
            }
            WindowType::Temp => (
                WS_POPUP | WS_CLIPCHILDREN,
                WS_EX_TOOLWINDOW | WS_EX_TOPMOST,
            ),
            WindowType::Child => (WS_CHILD | WS_CLIPCHILDREN | WS_CLIPSIBLINGS, 0),
        };
        if attrs.override_redirect {
            style = (style & !WS_OVERLAPPEDWINDOW) | WS_POPUP;
            ex_style |= WS_EX_TOOLWINDOW;
        }
        if attrs.class == WindowClass::InputOnly {
            ex_style |= WS_EX_TRANSPARENT;
        }

        let child = style & WS_CHILD != 0;
        let parent_hwnd = if child {
            hwnd_of(parent)
        } else {
            ptr::null_mut()
        };
        // The requested size is the client area.
        let mut outer = util::rect_to_win(&Rectangle::new(
            attrs.x,
            attrs.y,
            attrs.width.max(1),
            attrs.height.max(1),
        ));
        if !child {
            unsafe {
                AdjustWindowRectEx(&mut outer, style, FALSE, ex_style);
            }
        }

        let class_name = CLASS_NAME.to_wide();
        let title = attrs.title.as_deref().unwrap_or("").to_wide();
        let state = Rc::new(WindowState {
            shared: self.shared.clone(),
            background: Cell::new(attrs.background),
            tracking: Cell::new(false),
        });
        let hwnd = unsafe {
            CreateWindowExW(
                ex_style,
                class_name.as_ptr(),
                title.as_ptr(),
                style,
                outer.left,
                outer.top,
                outer.right - outer.left,
                outer.bottom - outer.top,
                parent_hwnd,
                ptr::null_mut(),
                GetModuleHandleW(ptr::null()),
                Rc::into_raw(state) as LPVOID,
            )
        };
        if hwnd.is_null() {
            return Err(util::last_error());
        }
        self.shared.windows.borrow_mut().insert(hwnd as usize);
        Ok(NativeWindow(hwnd as usize as u64))
    }

    pub fn destroy_window(&self, window: NativeWindow) {
        self.request();
        if let Some(hwnd) = self.live_window(window) {
            unsafe {
                DestroyWindow(hwnd);
            }
        }
    }

    pub fn reparent_window(&self, window: NativeWindow, parent: NativeWindow, x: i32, y: i32) {
        self.request();
        if let (Some(hwnd), Some(parent)) = (self.live_window(window), self.live_window(parent)) {
            unsafe {
                SetParent(hwnd, parent);
            }
            self.move_window(window, x, y);
        }
    }

    pub fn map_window(&self, window: NativeWindow) {
        self.request();
        if let Some(hwnd) = self.live_window(window) {
            let cmd = if is_toplevel(hwnd) {
                SW_SHOWNORMAL
            } else {
                SW_SHOWNA
            };
            unsafe {
                ShowWindow(hwnd, cmd);
            }
        }
    }

    pub fn unmap_window(&self, window: NativeWindow) {
        self.request();
        if let Some(hwnd) = self.live_window(window) {
            unsafe {
                ShowWindow(hwnd, SW_HIDE);
            }
        }
    }

    fn set_window_pos(&self, window: NativeWindow, rect: Rectangle, flags: UINT) {
        self.request();
        if let Some(hwnd) = self.live_window(window) {
            let mut outer = util::rect_to_win(&rect);
            if is_toplevel(hwnd) {
                unsafe {
                    let style = GetWindowLongW(hwnd, GWL_STYLE) as DWORD;
                    let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as DWORD;
                    AdjustWindowRectEx(&mut outer, style, FALSE, ex_style);
                }
            }
            unsafe {
                SetWindowPos(
                    hwnd,
                    ptr::null_mut(),
                    outer.left,
                    outer.top,
                    outer.right - outer.left,
                    outer.bottom - outer.top,
                    flags | SWP_NOZORDER | SWP_NOACTIVATE,
                );
            }
        }
    }

    pub fn move_window(&self, window: NativeWindow, x: i32, y: i32) {
        self.set_window_pos(window, Rectangle::new(x, y, 1, 1), SWP_NOSIZE);
    }

    pub fn resize_window(&self, window: NativeWindow, width: i32, height: i32) {
        self.set_window_pos(
            window,
            Rectangle::new(0, 0, width.max(1), height.max(1)),
            SWP_NOMOVE,
        );
    }

    pub fn move_resize_window(&self, window: NativeWindow, rect: Rectangle) {
        let rect = Rectangle::new(rect.x, rect.y, rect.width.max(1), rect.height.max(1));
        self.set_window_pos(window, rect, 0);
    }

    pub fn restack_window(&self, window: NativeWindow, raise: bool) {
        self.request();
        if let Some(hwnd) = self.live_window(window) {
            let after = if raise { HWND_TOP } else { HWND_BOTTOM };
            unsafe {
                SetWindowPos(
                    hwnd,
                    after,
                    0,
                    0,
                    0,
                    0,
                    SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
                );
            }
        }
    }

    pub fn set_background(&self, window: NativeWindow, pixel: Option<u32>) {
        self.request();
        if let Some(hwnd) = self.live_window(window) {
            if let Some(state) = unsafe { window_state(hwnd) } {
                state.background.set(pixel);
            }
        }
    }

    pub fn set_title(&self, window: NativeWindow, title: &str) {
        self.request();
        if let Some(hwnd) = self.live_window(window) {
            let title = title.to_wide();
            unsafe {
                SetWindowTextW(hwnd, title.as_ptr());
            }
        }
    }

    pub fn window_geometry(&self, window: NativeWindow) -> Option<Rectangle> {
        let hwnd = hwnd_of(window);
        if unsafe { IsWindow(hwnd) } == 0 {
            return None;
        }
        client_geometry(hwnd)
    }

    pub fn root_window(&self) -> NativeWindow {
        NativeWindow(unsafe { GetDesktopWindow() } as usize as u64)
    }
}
