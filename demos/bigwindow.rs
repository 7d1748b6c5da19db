// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! A toplevel with a child canvas far taller than a native window can be.
//!
//! Scroll with the wheel, the arrow keys or Page Up and Page Down; Home and
//! End jump to the ends. The row numbers show the logical coordinates of
//! the canvas, well past the 16-bit limit.
//!
//! On Unix, run with `--features x11`; without it the display is headless.

use std::ops::ControlFlow;

use gdk_shell::keyboard_types::Key;
use gdk_shell::{
    Color, DefaultBackend, Display, DisplayConfig, Drawable, Event, EventMask, Font, Gc, MainLoop,
    ScrollDirection, WindowAttributes, WindowId, WindowType,
};

const CANVAS_HEIGHT: i32 = 200_000;
const ROW_HEIGHT: i32 = 40;
const VIEW_WIDTH: i32 = 480;
const VIEW_HEIGHT: i32 = 360;

struct Canvas {
    window: WindowId,
    gc: Gc<DefaultBackend>,
    font: Font<DefaultBackend>,
    even: Color,
    odd: Color,
    scroll_y: i32,
}

impl Canvas {
    fn paint(&mut self, display: &Display, area: gdk_shell::Rectangle) {
        let drawable = Drawable::Window(self.window);
        let first = area.y.max(0) / ROW_HEIGHT;
        let last = (area.y + area.height).min(CANVAS_HEIGHT) / ROW_HEIGHT;
        for row in first..=last {
            let y = row * ROW_HEIGHT;
            let color = if row % 2 == 0 { self.even } else { self.odd };
            self.gc.set_foreground(&color);
            display.draw_rectangle(&drawable, &self.gc, true, 0, y, VIEW_WIDTH, ROW_HEIGHT);
            self.gc.set_foreground(&Color::BLACK);
            let label = format!("row {row} at y = {y}");
            display.draw_text(&drawable, &self.font, &self.gc, 12, y + 26, &label);
        }
    }

    fn scroll_to(&mut self, display: &mut Display, y: i32) {
        let y = y.clamp(0, CANVAS_HEIGHT - VIEW_HEIGHT);
        if y != self.scroll_y {
            display.move_window(self.window, 0, -y);
            self.scroll_y = y;
            display.process_all_updates();
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let mut args: Vec<String> = std::env::args().collect();
    let config = DisplayConfig::from_args(&mut args);
    let mut display: Display = Display::open(config)?;

    let toplevel = display.create_window(
        None,
        &WindowAttributes {
            window_type: WindowType::Toplevel,
            width: VIEW_WIDTH,
            height: VIEW_HEIGHT,
            event_mask: EventMask::STRUCTURE | EventMask::KEY_PRESS | EventMask::SCROLL,
            title: Some("Big window".to_owned()),
            ..WindowAttributes::default()
        },
    )?;
    let window = display.create_window(
        Some(toplevel),
        &WindowAttributes {
            width: VIEW_WIDTH,
            height: CANVAS_HEIGHT,
            event_mask: EventMask::EXPOSURE | EventMask::SCROLL | EventMask::KEY_PRESS,
            // Every row is painted.
            background: None,
            ..WindowAttributes::default()
        },
    )?;

    let mut gc = Gc::new(&display, &Drawable::Window(window))?;
    let mut even = Color::rgb8(0xe8, 0xf0, 0xff);
    let mut odd = Color::rgb8(0xff, 0xf4, 0xe0);
    gc.set_rgb_fg_color(&even)?;
    even = gc.values().foreground;
    gc.set_rgb_fg_color(&odd)?;
    odd = gc.values().foreground;
    let font = Font::load(&display, "fixed")?;

    let mut canvas = Canvas {
        window,
        gc,
        font,
        even,
        odd,
        scroll_y: 0,
    };
    display.show(window);
    display.show(toplevel);

    let mut main_loop = MainLoop::new(display);
    main_loop.run(|display, event| {
        let step = match &event {
            Event::Expose { window, area, .. } if *window == canvas.window => {
                canvas.paint(display, *area);
                return ControlFlow::Continue(());
            }
            Event::Scroll(scroll) => match scroll.direction {
                ScrollDirection::Up => -ROW_HEIGHT,
                ScrollDirection::Down => ROW_HEIGHT,
                _ => 0,
            },
            Event::KeyPress(key) => match key.key {
                Key::ArrowUp => -ROW_HEIGHT,
                Key::ArrowDown => ROW_HEIGHT,
                Key::PageUp => -VIEW_HEIGHT,
                Key::PageDown => VIEW_HEIGHT,
                Key::Home => -CANVAS_HEIGHT,
                Key::End => CANVAS_HEIGHT,
                Key::Escape => return ControlFlow::Break(()),
                _ => 0,
            },
            Event::Delete { .. } => return ControlFlow::Break(()),
            _ => 0,
        };
        if step != 0 {
            let target = canvas.scroll_y + step;
            canvas.scroll_to(display, target);
        }
        ControlFlow::Continue(())
    });

    let mut display = main_loop.into_display();
    display.destroy_window(toplevel);
    display.close();
    Ok(())
}
