// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Window requests.

use std::convert::TryFrom;

use x11rb::protocol::xproto::{
    self, AtomEnum, ChangeWindowAttributesAux, ConfigureWindowAux, ConnectionExt, CreateWindowAux,
    Gravity, PropMode, StackMode, WindowClass as X11WindowClass,
};
use x11rb::wrapper::ConnectionExt as _;

use super::application::Application;
use super::error::Error;
use super::util;
use crate::backend::{NativeWindow, NativeWindowAttributes};
use crate::geometry::Rectangle;
use crate::util::{clamp_u16, wrap_i16};
use crate::window::{EventMask, WindowClass, WindowType};

fn xid(window: NativeWindow) -> xproto::Window {
    // Ids come from the server and fit in 29 bits.
    window.0 as xproto::Window
}

impl Application {
    pub fn create_window(
        &self,
        parent: NativeWindow,
        attrs: &NativeWindowAttributes,
    ) -> Result<NativeWindow, Error> {
        let id = self.generate_id()?;
        let input_only = attrs.class == WindowClass::InputOnly;
        let class = if input_only {
            X11WindowClass::INPUT_ONLY
        } else {
            X11WindowClass::INPUT_OUTPUT
        };

        let mut aux = CreateWindowAux::new()
            .event_mask(util::event_mask(attrs.event_mask))
            .override_redirect(u32::from(attrs.override_redirect));
        if !input_only {
            if let Some(pixel) = attrs.background {
                aux = aux.background_pixel(pixel);
            }
            if let Some(colormap) = attrs.colormap {
                aux = aux.colormap(colormap.0 as xproto::Colormap);
            }
        }

        // Depth and visual are copied from the parent; colormaps are always
        // created for the system visual.
        self.send(|conn| {
            conn.create_window(
                0,
                id,
                xid(parent),
                wrap_i16(attrs.x),
                wrap_i16(attrs.y),
                clamp_u16(attrs.width),
                clamp_u16(attrs.height),
                0,
                class,
                x11rb::COPY_FROM_PARENT,
                &aux,
            )
        });
        let window = NativeWindow(u64::from(id));

        if matches!(
            attrs.window_type,
            WindowType::Toplevel | WindowType::Dialog | WindowType::Temp
        ) {
            self.set_wm_properties(id, attrs);
        }
        if let Some(title) = &attrs.title {
            self.set_title(window, title);
        }
        Ok(window)
    }

    fn set_wm_properties(&self, id: xproto::Window, attrs: &NativeWindowAttributes) {
        let atoms = &self.atoms;
        let pid = nix::unistd::Pid::this().as_raw();
        if let Ok(pid) = u32::try_from(pid) {
            self.send(|conn| {
                conn.change_property32(
                    PropMode::REPLACE,
                    id,
                    atoms._NET_WM_PID,
                    AtomEnum::CARDINAL,
                    &[pid],
                )
            });
        }

        if let Some((instance, class)) = &attrs.wmclass {
            // ICCCM § 4.1.2.5: two consecutive null-terminated strings, the
            // instance name and the class name.
            let mut wm_class = Vec::with_capacity(instance.len() + class.len() + 2);
            wm_class.extend(instance.as_bytes());
            wm_class.push(0);
            wm_class.extend(class.as_bytes());
            wm_class.push(0);
            self.send(|conn| {
                conn.change_property8(
                    PropMode::REPLACE,
                    id,
                    AtomEnum::WM_CLASS,
                    AtomEnum::STRING,
                    &wm_class,
                )
            });
        }

        // Replace the window's WM_PROTOCOLS with the following.
        let protocols = [atoms.WM_DELETE_WINDOW];
        self.send(|conn| {
            conn.change_property32(
                PropMode::REPLACE,
                id,
                atoms.WM_PROTOCOLS,
                AtomEnum::ATOM,
                &protocols,
            )
        });
    }

    pub fn destroy_window(&self, window: NativeWindow) {
        self.send(|conn| conn.destroy_window(xid(window)));
    }

    pub fn reparent_window(&self, window: NativeWindow, parent: NativeWindow, x: i32, y: i32) {
        self.send(|conn| conn.reparent_window(xid(window), xid(parent), wrap_i16(x), wrap_i16(y)));
    }

    pub fn map_window(&self, window: NativeWindow) {
        self.send(|conn| conn.map_window(xid(window)));
    }

    pub fn unmap_window(&self, window: NativeWindow) {
        self.send(|conn| conn.unmap_window(xid(window)));
    }

    fn configure(&self, window: NativeWindow, aux: &ConfigureWindowAux) {
        self.send(|conn| conn.configure_window(xid(window), aux));
    }

    pub fn move_window(&self, window: NativeWindow, x: i32, y: i32) {
        let aux = ConfigureWindowAux::new()
            .x(i32::from(wrap_i16(x)))
            .y(i32::from(wrap_i16(y)));
        self.configure(window, &aux);
    }

    pub fn resize_window(&self, window: NativeWindow, width: i32, height: i32) {
        let aux = ConfigureWindowAux::new()
            .width(u32::from(clamp_u16(width)))
            .height(u32::from(clamp_u16(height)));
        self.configure(window, &aux);
    }

    pub fn move_resize_window(&self, window: NativeWindow, rect: Rectangle) {
        let aux = ConfigureWindowAux::new()
            .x(i32::from(wrap_i16(rect.x)))
            .y(i32::from(wrap_i16(rect.y)))
            .width(u32::from(clamp_u16(rect.width)))
            .height(u32::from(clamp_u16(rect.height)));
        self.configure(window, &aux);
    }

    pub fn restack_window(&self, window: NativeWindow, raise: bool) {
        let mode = if raise {
            StackMode::ABOVE
        } else {
            StackMode::BELOW
        };
        self.configure(window, &ConfigureWindowAux::new().stack_mode(mode));
    }

    fn change_attributes(&self, window: NativeWindow, aux: &ChangeWindowAttributesAux) {
        self.send(|conn| conn.change_window_attributes(xid(window), aux));
    }

    pub fn set_event_mask(&self, window: NativeWindow, mask: EventMask) {
        let aux = ChangeWindowAttributesAux::new().event_mask(util::event_mask(mask));
        self.change_attributes(window, &aux);
    }

    pub fn set_bit_gravity_static(&self, window: NativeWindow, on: bool) -> bool {
        let gravity = if on {
            Gravity::STATIC
        } else {
            Gravity::NORTH_WEST
        };
        let aux = ChangeWindowAttributesAux::new().bit_gravity(gravity);
        self.change_attributes(window, &aux);
        true
    }

    pub fn set_win_gravity_static(&self, window: NativeWindow, on: bool) -> bool {
        let gravity = if on {
            Gravity::STATIC
        } else {
            Gravity::NORTH_WEST
        };
        let aux = ChangeWindowAttributesAux::new().win_gravity(gravity);
        self.change_attributes(window, &aux);
        true
    }

    pub fn set_background(&self, window: NativeWindow, pixel: Option<u32>) {
        let aux = match pixel {
            Some(pixel) => ChangeWindowAttributesAux::new().background_pixel(pixel),
            None => ChangeWindowAttributesAux::new().background_pixmap(x11rb::NONE),
        };
        self.change_attributes(window, &aux);
    }

    pub fn set_title(&self, window: NativeWindow, title: &str) {
        // This is technically incorrect. STRING encoding is *not* UTF8. However, I am not sure
        // what it really is. WM_LOCALE_NAME might be involved. Hopefully, nothing cares about this
        // as long as _NET_WM_NAME is also set (which uses UTF8).
        let atoms = &self.atoms;
        self.send(|conn| {
            conn.change_property8(
                PropMode::REPLACE,
                xid(window),
                AtomEnum::WM_NAME,
                AtomEnum::STRING,
                title.as_bytes(),
            )
        });
        self.send(|conn| {
            conn.change_property8(
                PropMode::REPLACE,
                xid(window),
                atoms._NET_WM_NAME,
                atoms.UTF8_STRING,
                title.as_bytes(),
            )
        });
    }

    pub fn window_geometry(&self, window: NativeWindow) -> Option<Rectangle> {
        match self.call(|conn| conn.get_geometry(xid(window))) {
            Ok(geom) => Some(Rectangle::new(
                i32::from(geom.x),
                i32::from(geom.y),
                i32::from(geom.width),
                i32::from(geom.height),
            )),
            Err(e) => {
                tracing::debug!("no geometry for window {:#x}: {}", window.0, e);
                None
            }
        }
    }
}
