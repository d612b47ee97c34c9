use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::db::TrackedSession;
use crate::utils::local_session_date;

/// Minimum dwell a visit needs before it is persisted.
pub const DWELL_THRESHOLD_MS: u64 = 1_000;

/// Display-name lookup for tracked packages. A failed lookup is not fatal;
/// the raw package id is shown instead.
pub trait LabelSource {
    fn resolve_label(&self, package_id: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub package_id: String,
    pub label: String,
    pub started_at: DateTime<Utc>,
}

impl ActiveSession {
    /// Whole seconds since the session opened, never negative.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}

/// Outcome of closing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedSession {
    Persist(TrackedSession),
    /// Shorter than the dwell threshold; never reaches the store.
    Discarded { package_id: String, duration_ms: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OverlayEffect {
    #[default]
    None,
    Show { label: String },
    Hide,
}

/// Everything one sample changed. On a package switch both `closed` and
/// `opened` are set; they are produced by a single call so no caller can see
/// the state in between.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub closed: Option<ClosedSession>,
    pub opened: Option<ActiveSession>,
    pub overlay: OverlayEffect,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.closed.is_none() && self.opened.is_none() && self.overlay == OverlayEffect::None
    }
}

/// Idle when `active` is `None`. Package, label and start time live in one
/// value, so a half-open session cannot exist.
#[derive(Debug, Clone)]
pub struct TrackingState {
    tracked_packages: BTreeSet<String>,
    active: Option<ActiveSession>,
    min_session_ms: u64,
}

impl TrackingState {
    pub fn new(tracked_packages: BTreeSet<String>, min_session_ms: u64) -> Self {
        Self {
            tracked_packages,
            active: None,
            min_session_ms,
        }
    }

    pub fn tracked_packages(&self) -> &BTreeSet<String> {
        &self.tracked_packages
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Replaces the tracked set. Returns `true` when the new set is empty,
    /// which means tracking has to shut down. An active session for a package
    /// that was just removed is closed by the next sample.
    pub fn set_tracked_packages(&mut self, packages: BTreeSet<String>) -> bool {
        self.tracked_packages = packages;
        self.tracked_packages.is_empty()
    }

    /// Feeds one poll result into the state machine.
    ///
    /// `sample` is `None` when the sampler saw nothing in its window; that is
    /// read as "foreground unchanged" and never closes a session.
    pub fn on_sample(
        &mut self,
        sample: Option<&str>,
        now: DateTime<Utc>,
        labels: &dyn LabelSource,
    ) -> Transition {
        let Some(current) = sample else {
            if let Some(active) = &self.active {
                debug!("no sample in window, assuming {} is still foreground", active.package_id);
            }
            return Transition::default();
        };

        let is_tracked = self.tracked_packages.contains(current);
        let same_as_active = self
            .active
            .as_ref()
            .is_some_and(|active| active.package_id == current);

        match (is_tracked, same_as_active) {
            (true, true) => Transition::default(),
            (true, false) => {
                let closed = self.close_active(now);
                let opened = self.open(current, now, labels);
                Transition {
                    closed,
                    overlay: OverlayEffect::Show {
                        label: opened.label.clone(),
                    },
                    opened: Some(opened),
                }
            }
            (false, _) => match self.close_active(now) {
                Some(closed) => {
                    info!("left tracked app, foreground is now {current}");
                    Transition {
                        closed: Some(closed),
                        opened: None,
                        overlay: OverlayEffect::Hide,
                    }
                }
                None => Transition::default(),
            },
        }
    }

    /// Ends the active session at `now`, if any, and returns to idle.
    pub fn close_active(&mut self, now: DateTime<Utc>) -> Option<ClosedSession> {
        let active = self.active.take()?;
        let duration_ms = (now - active.started_at).num_milliseconds().max(0) as u64;

        if duration_ms < self.min_session_ms {
            debug!(
                "discarding {} session of {}ms (< {}ms)",
                active.package_id, duration_ms, self.min_session_ms
            );
            return Some(ClosedSession::Discarded {
                package_id: active.package_id,
                duration_ms,
            });
        }

        let date = local_session_date(active.started_at);
        info!(
            "closing session for {}: {}ms on {}",
            active.package_id, duration_ms, date
        );
        Some(ClosedSession::Persist(TrackedSession::close(
            active.package_id,
            active.label,
            active.started_at,
            now,
            date,
        )))
    }

    pub fn reset(&mut self) {
        self.tracked_packages.clear();
        self.active = None;
    }

    fn open(&mut self, package_id: &str, now: DateTime<Utc>, labels: &dyn LabelSource) -> ActiveSession {
        let label = labels.resolve_label(package_id).unwrap_or_else(|err| {
            warn!("label lookup for {package_id} failed ({err}), using package id");
            package_id.to_string()
        });
        info!("opening session for {package_id} ({label})");

        let session = ActiveSession {
            package_id: package_id.to_string(),
            label,
            started_at: now,
        };
        self.active = Some(session.clone());
        session
    }
}
