// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! The main loop: prepare, wait, check, dispatch.

use std::cell::Cell;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::Duration;

use crate::backend::Backend;
use crate::display::Display;
use crate::event::Event;

/// The display's event source.
///
/// One loop iteration calls [`prepare`](EventSource::prepare); if nothing
/// is ready it waits on the connection and calls
/// [`check`](EventSource::check); when either reports events,
/// [`dispatch`](EventSource::dispatch) hands one to the handler.
#[derive(Debug, Default)]
pub struct EventSource;

impl EventSource {
    /// Paints pending updates and reports whether an event is ready.
    pub fn prepare<B: Backend>(&self, display: &mut Display<B>) -> bool {
        display.process_all_updates();
        display.events_pending()
    }

    /// Reports whether an event became ready while waiting.
    pub fn check<B: Backend>(&self, display: &mut Display<B>) -> bool {
        display.events_pending()
    }

    /// Delivers the next event.
    pub fn dispatch<B: Backend>(
        &self,
        display: &mut Display<B>,
        handler: &mut impl FnMut(&mut Display<B>, Event) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        match display.get_next_event() {
            Some(event) => handler(display, event),
            None => ControlFlow::Continue(()),
        }
    }
}

/// Stops a running [`MainLoop`] from inside a handler.
#[derive(Debug, Clone, Default)]
pub struct QuitHandle(Rc<Cell<bool>>);

impl QuitHandle {
    pub fn quit(&self) {
        self.0.set(true);
    }

    pub fn is_quit(&self) -> bool {
        self.0.get()
    }
}

pub struct MainLoop<B: Backend> {
    display: Display<B>,
    source: EventSource,
    quit: QuitHandle,
}

impl<B: Backend> MainLoop<B> {
    pub fn new(display: Display<B>) -> MainLoop<B> {
        MainLoop {
            display,
            source: EventSource,
            quit: QuitHandle::default(),
        }
    }

    pub fn display(&self) -> &Display<B> {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut Display<B> {
        &mut self.display
    }

    pub fn into_display(self) -> Display<B> {
        self.display
    }

    /// How long a blocking iteration waits for events. Zero waits forever.
    pub fn set_timeout(&mut self, millis: u64) {
        self.display.config.event_timeout = match millis {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        };
    }

    pub fn quit_handle(&self) -> QuitHandle {
        self.quit.clone()
    }

    pub fn quit(&self) {
        self.quit.quit();
    }

    /// Runs one iteration. With `block`, waits for events if none are
    /// ready. Returns whether an event was dispatched.
    pub fn iteration(
        &mut self,
        block: bool,
        handler: &mut impl FnMut(&mut Display<B>, Event) -> ControlFlow<()>,
    ) -> bool {
        let mut ready = self.source.prepare(&mut self.display);
        if !ready && block && !self.display.is_closed() {
            let timeout = self.display.config.event_timeout;
            if self.display.backend.wait_event(timeout) {
                ready = self.source.check(&mut self.display);
            }
        }
        if !ready {
            return false;
        }
        if self.source.dispatch(&mut self.display, handler).is_break() {
            self.quit.quit();
        }
        true
    }

    /// Dispatches events until the handler breaks, [`quit`](Self::quit)
    /// is called, or the display is closed.
    pub fn run(&mut self, mut handler: impl FnMut(&mut Display<B>, Event) -> ControlFlow<()>) {
        self.quit.0.set(false);
        while !self.quit.is_quit() && !self.display.is_closed() {
            self.iteration(true, &mut handler);
        }
    }
}
