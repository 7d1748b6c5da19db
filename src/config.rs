// Copyright 2024 the gdk-shell Authors
// SPDX-License-Identifier: Apache-2.0

//! Display configuration from the environment and the command line.

use std::time::Duration;

use bitflags::bitflags;

bitflags! {
    /// Subsystems that log extra debugging output.
    #[derive(Default)]
    pub struct DebugFlags: u32 {
        const EVENTS = 1 << 0;
        const GEOMETRY = 1 << 1;
        const COLORMAP = 1 << 2;
        const GC = 1 << 3;
        const MISC = 1 << 4;
    }
}

impl DebugFlags {
    /// Parses a list of flag names separated by commas, colons or spaces.
    ///
    /// `all` selects every flag. Unknown names are ignored with a warning.
    pub fn parse(list: &str) -> DebugFlags {
        let mut flags = DebugFlags::empty();
        for key in list
            .split(|c: char| c == ',' || c == ':' || c == ';' || c.is_whitespace())
            .filter(|k| !k.is_empty())
        {
            flags |= match key.to_ascii_lowercase().as_str() {
                "events" => DebugFlags::EVENTS,
                "geometry" => DebugFlags::GEOMETRY,
                "colormap" => DebugFlags::COLORMAP,
                "gc" => DebugFlags::GC,
                "misc" => DebugFlags::MISC,
                "all" => DebugFlags::all(),
                other => {
                    tracing::warn!("unknown debug flag {:?}", other);
                    DebugFlags::empty()
                }
            };
        }
        flags
    }
}

/// How to connect to the display, and how the program identifies itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    /// The display to connect to; `None` uses the platform default.
    pub display_name: Option<String>,
    /// Round-trip after every request so errors are reported where they happen.
    pub synchronous: bool,
    pub program_name: Option<String>,
    pub program_class: Option<String>,
    /// Do not use shared memory for images.
    pub no_xshm: bool,
    pub debug_flags: DebugFlags,
    /// How long one main loop iteration waits for events; `None` waits forever.
    pub event_timeout: Option<Duration>,
}

impl DisplayConfig {
    /// A configuration seeded from the `DISPLAY` and `GDK_DEBUG` environment
    /// variables.
    pub fn from_env() -> DisplayConfig {
        DisplayConfig {
            display_name: std::env::var("DISPLAY").ok().filter(|d| !d.is_empty()),
            debug_flags: std::env::var("GDK_DEBUG")
                .map(|list| DebugFlags::parse(&list))
                .unwrap_or_default(),
            ..DisplayConfig::default()
        }
    }

    /// Builds a configuration from the environment and the arguments we
    /// recognize, removing those from `args`.
    ///
    /// The first argument is taken as the program path and kept. Parsing
    /// stops at `--`.
    pub fn from_args(args: &mut Vec<String>) -> DisplayConfig {
        let mut config = DisplayConfig::from_env();
        if config.program_name.is_none() {
            config.program_name = args
                .first()
                .and_then(|path| path.rsplit(['/', '\\']).next())
                .filter(|name| !name.is_empty())
                .map(str::to_owned);
        }

        let mut kept = Vec::with_capacity(args.len());
        let mut iter = std::mem::take(args).into_iter();
        if let Some(program) = iter.next() {
            kept.push(program);
        }
        while let Some(arg) = iter.next() {
            if arg == "--" {
                kept.push(arg);
                kept.extend(iter.by_ref());
                break;
            }
            let (key, inline) = match arg.split_once('=') {
                Some((key, value)) => (key.to_owned(), Some(value.to_owned())),
                None => (arg.clone(), None),
            };
            let value = |iter: &mut std::vec::IntoIter<String>| inline.clone().or_else(|| iter.next());
            match key.as_str() {
                "--display" => config.display_name = value(&mut iter),
                "--name" => config.program_name = value(&mut iter),
                "--class" => config.program_class = value(&mut iter),
                "--gdk-debug" => {
                    if let Some(list) = value(&mut iter) {
                        config.debug_flags |= DebugFlags::parse(&list);
                    }
                }
                "--gdk-no-debug" => {
                    if let Some(list) = value(&mut iter) {
                        config.debug_flags &= !DebugFlags::parse(&list);
                    }
                }
                "--sync" if inline.is_none() => config.synchronous = true,
                "--no-xshm" if inline.is_none() => config.no_xshm = true,
                _ => kept.push(arg),
            }
        }
        *args = kept;
        config
    }

    /// The program name used for window manager hints.
    pub fn program_name(&self) -> String {
        self.program_name
            .clone()
            .unwrap_or_else(|| "gdk-shell".to_owned())
    }

    /// The program class: explicit, or the name with its first letter capitalized.
    pub fn program_class(&self) -> String {
        if let Some(class) = &self.program_class {
            return class.clone();
        }
        let name = self.program_name();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recognized_arguments_are_consumed() {
        let mut argv = args(&[
            "/usr/bin/viewer",
            "--display=:1",
            "file.txt",
            "--sync",
            "--name",
            "view",
            "--gdk-debug=geometry:events",
            "--gdk-no-debug",
            "events",
            "--",
            "--sync",
        ]);
        let config = DisplayConfig::from_args(&mut argv);
        assert_eq!(config.display_name.as_deref(), Some(":1"));
        assert!(config.synchronous);
        assert_eq!(config.program_name(), "view");
        assert_eq!(config.program_class(), "View");
        assert_eq!(config.debug_flags & DebugFlags::GEOMETRY, DebugFlags::GEOMETRY);
        assert!(!config.debug_flags.contains(DebugFlags::EVENTS));
        assert_eq!(argv, args(&["/usr/bin/viewer", "file.txt", "--", "--sync"]));
    }

    #[test]
    fn program_name_defaults_to_the_binary() {
        let mut argv = args(&["/opt/tools/bigwindow", "--class=Demo", "--no-xshm"]);
        let config = DisplayConfig::from_args(&mut argv);
        assert_eq!(config.program_class(), "Demo");
        assert!(config.no_xshm);
        assert_eq!(argv.len(), 1);
        assert_eq!(config.program_name(), "bigwindow");
    }

    #[test]
    fn debug_flag_lists() {
        assert_eq!(DebugFlags::parse("all"), DebugFlags::all());
        assert_eq!(
            DebugFlags::parse("gc, colormap"),
            DebugFlags::GC | DebugFlags::COLORMAP
        );
        assert_eq!(DebugFlags::parse("bogus"), DebugFlags::empty());
    }
}
