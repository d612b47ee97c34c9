//! Shared fakes for tests: a settable clock, a scripted sampler and a
//! display driver that records every call.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use chrono::{DateTime, TimeZone, Utc};

use crate::overlay::{DisplayDriver, DisplayError, OverlayGeometry, PillSize, ScreenSize};
use crate::sensing::{Clock, ForegroundSampler};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clock pinned to `base + offset`; tests move the offset by hand.
pub struct ManualClock {
    base_ms: i64,
    offset_ms: Mutex<i64>,
}

impl ManualClock {
    pub fn at_millis(base_ms: i64) -> Self {
        Self {
            base_ms,
            offset_ms: Mutex::new(0),
        }
    }

    /// Instant `offset_ms` after the base, without moving the clock.
    pub fn offset(&self, offset_ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.base_ms + offset_ms)
            .single()
            .expect("test timestamp in range")
    }

    pub fn set_offset(&self, offset_ms: i64) {
        *lock(&self.offset_ms) = offset_ms;
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.offset_ms) += by.as_millis() as i64;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.offset(*lock(&self.offset_ms))
    }
}

/// Replays a fixed list of answers, then reports nothing.
pub struct ScriptedSampler {
    script: Mutex<VecDeque<Option<String>>>,
    fail: bool,
    last_lookback: Mutex<Option<Duration>>,
}

impl ScriptedSampler {
    pub fn new(script: Vec<Option<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fail: false,
            last_lookback: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn last_lookback(&self) -> Option<Duration> {
        *lock(&self.last_lookback)
    }
}

impl ForegroundSampler for ScriptedSampler {
    fn most_recent_foreground(
        &self,
        _now: DateTime<Utc>,
        lookback: Duration,
    ) -> Result<Option<String>> {
        *lock(&self.last_lookback) = Some(lookback);
        if self.fail {
            bail!("usage query unavailable");
        }
        Ok(lock(&self.script).pop_front().flatten())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Add { x: i32, y: i32, text: String },
    Move { x: i32, y: i32 },
    Text(String),
    Remove,
}

type RemoveHook = Arc<dyn Fn() + Send + Sync>;

struct Surface {
    screen: ScreenSize,
    pill: PillSize,
    attached: bool,
    calls: Vec<DisplayCall>,
    on_remove: Option<RemoveHook>,
}

/// Display driver that records calls. Clones share one surface, so a test
/// can keep a clone while the engine owns another.
#[derive(Clone)]
pub struct RecordingDisplay {
    surface: Arc<Mutex<Surface>>,
}

impl RecordingDisplay {
    pub fn new(screen: ScreenSize, pill: PillSize) -> Self {
        Self {
            surface: Arc::new(Mutex::new(Surface {
                screen,
                pill,
                attached: false,
                calls: Vec::new(),
                on_remove: None,
            })),
        }
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        lock(&self.surface).calls.clone()
    }

    pub fn set_screen(&self, screen: ScreenSize) {
        lock(&self.surface).screen = screen;
    }

    pub fn set_pill(&self, pill: PillSize) {
        lock(&self.surface).pill = pill;
    }

    /// Runs `hook` on the overlay thread each time the widget is removed,
    /// after the removal has been recorded.
    pub fn on_remove(&self, hook: impl Fn() + Send + Sync + 'static) {
        lock(&self.surface).on_remove = Some(Arc::new(hook));
    }

    /// Drops the widget behind the engine's back.
    pub fn detach(&self) {
        lock(&self.surface).attached = false;
    }

    /// Polls until `done` holds for the recorded calls or `timeout` passes.
    pub fn wait_for(&self, done: impl Fn(&[DisplayCall]) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done(&lock(&self.surface).calls) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Waits until every other clone, i.e. the one owned by the overlay
    /// thread, has been dropped.
    pub fn wait_until_closed(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while Arc::strong_count(&self.surface) > 1 {
            assert!(Instant::now() < deadline, "overlay thread did not exit");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn record(&self, call: DisplayCall) -> Result<(), DisplayError> {
        let mut surface = lock(&self.surface);
        if !surface.attached {
            return Err(DisplayError::Detached);
        }
        surface.calls.push(call);
        Ok(())
    }
}

impl DisplayDriver for RecordingDisplay {
    fn screen_size(&self) -> ScreenSize {
        lock(&self.surface).screen
    }

    fn add_widget(&mut self, geometry: &OverlayGeometry, text: &str) -> Result<(), DisplayError> {
        let mut surface = lock(&self.surface);
        surface.attached = true;
        surface.calls.push(DisplayCall::Add {
            x: geometry.x,
            y: geometry.y,
            text: text.to_string(),
        });
        Ok(())
    }

    fn measure_widget(&self) -> Result<PillSize, DisplayError> {
        let surface = lock(&self.surface);
        if surface.attached {
            Ok(surface.pill)
        } else {
            Err(DisplayError::Detached)
        }
    }

    fn update_widget_position(&mut self, geometry: &OverlayGeometry) -> Result<(), DisplayError> {
        self.record(DisplayCall::Move {
            x: geometry.x,
            y: geometry.y,
        })
    }

    fn update_widget_text(&mut self, text: &str) -> Result<(), DisplayError> {
        self.record(DisplayCall::Text(text.to_string()))
    }

    fn remove_widget(&mut self) -> Result<(), DisplayError> {
        self.record(DisplayCall::Remove)?;
        let hook = {
            let mut surface = lock(&self.surface);
            surface.attached = false;
            surface.on_remove.clone()
        };
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }
}
