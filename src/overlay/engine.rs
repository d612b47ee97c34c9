use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::animation::SnapAnimation;
use super::driver::{DisplayDriver, DisplayError};
use super::geometry::{
    edge_x, ratio_for_y, snaps_right, EdgePlacement, OverlayGeometry, PillSize,
};
use crate::utils::format_pill_text;

/// Widget resource lifecycle. Only `show` and `hide` move it forward, so setup
/// always precedes the first geometry write and teardown follows the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetLifecycle {
    Initialized,
    Created,
    Resumed,
    Destroyed,
}

/// Placement logic for the floating pill. Edge affinity and vertical ratio
/// outlive the widget, so the pill comes back where the user left it.
pub struct OverlayEngine<D: DisplayDriver> {
    driver: D,
    snap_duration: Duration,
    lifecycle: WidgetLifecycle,
    geometry: Option<OverlayGeometry>,
    placement: EdgePlacement,
    pill: PillSize,
    label: String,
    snap: Option<SnapAnimation>,
}

impl<D: DisplayDriver> OverlayEngine<D> {
    pub fn new(driver: D, snap_duration: Duration, placement: EdgePlacement) -> Self {
        Self {
            driver,
            snap_duration,
            lifecycle: WidgetLifecycle::Initialized,
            geometry: None,
            placement,
            pill: PillSize::default(),
            label: String::new(),
            snap: None,
        }
    }

    pub fn lifecycle(&self) -> WidgetLifecycle {
        self.lifecycle
    }

    pub fn geometry(&self) -> Option<&OverlayGeometry> {
        self.geometry.as_ref()
    }

    pub fn placement(&self) -> EdgePlacement {
        self.placement
    }

    pub fn is_visible(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn is_animating(&self) -> bool {
        self.snap.is_some()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Creates the widget if there is none. While visible only the label is
    /// swapped, so repeated calls never stack widgets.
    pub fn show(&mut self, label: &str) {
        if self.geometry.is_some() {
            if self.label != label {
                debug!("pill already visible, switching label to {label}");
                self.label = label.to_string();
                self.update_elapsed(0);
            }
            return;
        }

        self.label = label.to_string();
        self.lifecycle = WidgetLifecycle::Created;

        let screen = self.driver.screen_size();
        let geometry = OverlayGeometry::placed(screen, self.pill, self.placement);
        let text = format_pill_text(&self.label, 0);

        if let Err(err) = self.driver.add_widget(&geometry, &text) {
            warn!("failed to add pill: {err}");
            self.lifecycle = WidgetLifecycle::Destroyed;
            return;
        }
        self.geometry = Some(geometry);
        self.lifecycle = WidgetLifecycle::Resumed;
        info!("pill shown at ({}, {})", geometry.x, geometry.y);

        if self.remeasure() {
            let measured = OverlayGeometry::placed(screen, self.pill, self.placement);
            if Some(measured) != self.geometry {
                self.apply(measured);
            }
        }
    }

    /// Text only; geometry is left alone.
    pub fn update_elapsed(&mut self, seconds: i64) {
        if self.geometry.is_none() {
            return;
        }
        let text = format_pill_text(&self.label, seconds);
        let result = self.driver.update_widget_text(&text);
        self.check(result, "update text");
    }

    pub fn hide(&mut self) {
        self.snap = None;
        let Some(_) = self.geometry.take() else {
            return;
        };

        match self.driver.remove_widget() {
            Ok(()) => info!("pill hidden"),
            Err(DisplayError::Detached) => debug!("pill was already detached"),
            Err(err) => warn!("failed to remove pill: {err}"),
        }
        self.lifecycle = WidgetLifecycle::Destroyed;
    }

    pub fn on_drag(&mut self, dx: i32, dy: i32) {
        self.snap = None;
        let Some(current) = self.geometry else {
            return;
        };
        let screen = self.driver.screen_size();
        self.apply(current.dragged_by(dx, dy, screen));
    }

    /// Picks the edge from the pill's center and starts the slide towards it.
    /// The vertical ratio is taken from where the pill was dropped.
    pub fn on_drag_end(&mut self, now: Instant) {
        let Some(mut current) = self.geometry else {
            return;
        };
        if !self.pill.is_measured() {
            return;
        }

        let screen = self.driver.screen_size();
        let right = snaps_right(&current, screen);
        self.placement = EdgePlacement {
            is_on_right_edge: right,
            vertical_ratio: ratio_for_y(current.y, screen, self.pill),
        };
        current.is_on_right_edge = self.placement.is_on_right_edge;
        current.vertical_ratio = self.placement.vertical_ratio;
        self.geometry = Some(current);

        let target_x = edge_x(screen, self.pill, right);
        debug!(
            "snapping from x={} to x={} (right={}, ratio={:.3})",
            current.x, target_x, right, self.placement.vertical_ratio
        );
        self.snap = Some(SnapAnimation::new(
            current.x,
            target_x,
            now,
            self.snap_duration,
        ));
    }

    /// Applies one animation frame. Returns whether the snap is still
    /// running.
    pub fn advance_animation(&mut self, now: Instant) -> bool {
        let Some(snap) = self.snap else {
            return false;
        };
        let Some(current) = self.geometry else {
            self.snap = None;
            return false;
        };

        let next = OverlayGeometry {
            x: snap.x_at(now),
            ..current
        };
        if !self.apply(next) || snap.is_finished(now) {
            self.snap = None;
            return false;
        }
        true
    }

    /// Re-derives the position from edge affinity and ratio after the screen
    /// changed size or orientation.
    pub fn on_screen_change(&mut self) {
        self.snap = None;
        if self.geometry.is_none() || !self.pill.is_measured() {
            return;
        }

        let screen = self.driver.screen_size();
        let next = OverlayGeometry::placed(screen, self.pill, self.placement);
        info!(
            "screen is now {}x{}, pill moved to ({}, {})",
            screen.width, screen.height, next.x, next.y
        );
        if !self.apply(next) {
            return;
        }

        // The new size only counts once it is on screen; re-place with it so
        // the pill stays inside the bounds.
        let before = self.pill;
        if self.remeasure() && self.pill != before {
            let resized = OverlayGeometry::placed(screen, self.pill, self.placement);
            if Some(resized) != self.geometry {
                self.apply(resized);
            }
        }
    }

    /// Refreshes the cached pill size. Returns `true` when a usable size was
    /// read.
    fn remeasure(&mut self) -> bool {
        match self.driver.measure_widget() {
            Ok(size) if size.is_measured() => {
                self.pill = size;
                if let Some(geometry) = self.geometry.as_mut() {
                    geometry.pill_width = size.width;
                    geometry.pill_height = size.height;
                }
                true
            }
            Ok(_) => false,
            Err(err) => {
                self.check(Err(err), "measure");
                false
            }
        }
    }

    fn apply(&mut self, next: OverlayGeometry) -> bool {
        let result = self.driver.update_widget_position(&next);
        if self.check(result, "move") {
            if self.geometry.is_some() {
                self.geometry = Some(next);
            }
            true
        } else {
            false
        }
    }

    /// A detached widget means the surface already dropped it: forget it
    /// quietly. Other failures are logged and the widget is kept.
    fn check(&mut self, result: Result<(), DisplayError>, operation: &str) -> bool {
        match result {
            Ok(()) => true,
            Err(DisplayError::Detached) => {
                debug!("pill detached during {operation}");
                self.snap = None;
                if self.geometry.take().is_some() {
                    self.lifecycle = WidgetLifecycle::Destroyed;
                }
                false
            }
            Err(err) => {
                warn!("pill {operation} failed: {err}");
                false
            }
        }
    }
}
