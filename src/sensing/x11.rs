use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::{sync::Mutex, time::Duration};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

use super::sampler::{ForegroundSampler, LastSeen};

/// Reads `_NET_ACTIVE_WINDOW` and reports its `WM_CLASS` class name as the
/// package id.
pub struct X11Sampler {
    conn: RustConnection,
    root: Window,
    active_window_atom: Atom,
    last_seen: Mutex<LastSeen>,
}

impl X11Sampler {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("failed to connect to X server")?;
        let root = conn.setup().roots[screen_num].root;
        let active_window_atom = conn
            .intern_atom(false, b"_NET_ACTIVE_WINDOW")
            .context("failed to request _NET_ACTIVE_WINDOW atom")?
            .reply()
            .context("failed to intern _NET_ACTIVE_WINDOW atom")?
            .atom;

        Ok(Self {
            conn,
            root,
            active_window_atom,
            last_seen: Mutex::new(LastSeen::default()),
        })
    }

    fn active_window(&self) -> Result<Option<Window>> {
        let reply = self
            .conn
            .get_property(false, self.root, self.active_window_atom, AtomEnum::WINDOW, 0, 1)?
            .reply()?;

        if reply.value.len() < 4 {
            return Ok(None);
        }
        let window = u32::from_ne_bytes([
            reply.value[0],
            reply.value[1],
            reply.value[2],
            reply.value[3],
        ]);
        Ok((window != 0).then_some(window))
    }

    fn window_class(&self, window: Window) -> Result<Option<String>> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)?
            .reply()?;

        Ok(parse_wm_class(&reply.value))
    }
}

/// `WM_CLASS` is `instance\0class\0`; prefer the class, which names the
/// application rather than the window.
fn parse_wm_class(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut parts = text.split('\0').filter(|part| !part.is_empty());
    let instance = parts.next();
    parts.next().or(instance).map(str::to_string)
}

impl ForegroundSampler for X11Sampler {
    fn most_recent_foreground(
        &self,
        now: DateTime<Utc>,
        lookback: Duration,
    ) -> Result<Option<String>> {
        let mut last_seen = self
            .last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = match self.active_window()? {
            Some(window) => self.window_class(window)?,
            None => None,
        };

        if let Some(class) = &current {
            last_seen.record(class, now);
        }
        Ok(last_seen.within(now, lookback))
    }
}
