// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Scenarios that drive a whole display through the headless server.

mod big_window_tests;
mod event_tests;
mod helpers;
mod update_tests;

pub(crate) use helpers::*;
