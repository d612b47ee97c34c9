use serde::{Deserialize, Serialize};

/// Vertical ratio used before the user has ever dropped the pill: close to
/// the top of the screen.
pub const DEFAULT_VERTICAL_RATIO: f32 = 0.046;

/// y used while the pill has not been measured yet.
pub const UNMEASURED_Y: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillSize {
    pub width: i32,
    pub height: i32,
}

impl PillSize {
    /// Geometry math needs both dimensions; a zero means the surface has not
    /// laid the pill out yet.
    pub fn is_measured(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Position expressed relative to the screen so it survives resizes and
/// rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePlacement {
    pub is_on_right_edge: bool,
    pub vertical_ratio: f32,
}

impl Default for EdgePlacement {
    fn default() -> Self {
        Self {
            is_on_right_edge: false,
            vertical_ratio: DEFAULT_VERTICAL_RATIO,
        }
    }
}

impl EdgePlacement {
    pub fn with_ratio(vertical_ratio: f32) -> Self {
        Self {
            is_on_right_edge: false,
            vertical_ratio: vertical_ratio.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayGeometry {
    pub x: i32,
    pub y: i32,
    pub pill_width: i32,
    pub pill_height: i32,
    pub is_on_right_edge: bool,
    pub vertical_ratio: f32,
}

impl OverlayGeometry {
    /// Geometry for `placement` on `screen`, clamped to the visible area.
    pub fn placed(screen: ScreenSize, pill: PillSize, placement: EdgePlacement) -> Self {
        let (x, y) = if pill.is_measured() {
            (
                edge_x(screen, pill, placement.is_on_right_edge),
                y_for_ratio(screen, pill, placement.vertical_ratio),
            )
        } else {
            (0, UNMEASURED_Y)
        };
        let (x, y) = clamp_position(x, y, screen, pill);

        Self {
            x,
            y,
            pill_width: pill.width,
            pill_height: pill.height,
            is_on_right_edge: placement.is_on_right_edge,
            vertical_ratio: placement.vertical_ratio,
        }
    }

    pub fn pill(&self) -> PillSize {
        PillSize {
            width: self.pill_width,
            height: self.pill_height,
        }
    }

    pub fn placement(&self) -> EdgePlacement {
        EdgePlacement {
            is_on_right_edge: self.is_on_right_edge,
            vertical_ratio: self.vertical_ratio,
        }
    }

    /// Moves by a drag delta, staying on screen.
    pub fn dragged_by(&self, dx: i32, dy: i32, screen: ScreenSize) -> Self {
        let (x, y) = clamp_position(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            screen,
            self.pill(),
        );
        Self { x, y, ..*self }
    }

    pub fn center_x(&self) -> i32 {
        self.x + self.pill_width / 2
    }
}

/// Keeps the pill fully on screen. Positions pass through untouched until
/// the pill has been measured.
pub fn clamp_position(x: i32, y: i32, screen: ScreenSize, pill: PillSize) -> (i32, i32) {
    if !pill.is_measured() {
        return (x, y);
    }
    let max_x = (screen.width - pill.width).max(0);
    let max_y = (screen.height - pill.height).max(0);
    (x.clamp(0, max_x), y.clamp(0, max_y))
}

pub fn edge_x(screen: ScreenSize, pill: PillSize, right: bool) -> i32 {
    if right {
        (screen.width - pill.width).max(0)
    } else {
        0
    }
}

pub fn y_for_ratio(screen: ScreenSize, pill: PillSize, ratio: f32) -> i32 {
    let travel = (screen.height - pill.height).max(0);
    ((ratio.clamp(0.0, 1.0) * travel as f32) as i32).clamp(0, travel)
}

pub fn ratio_for_y(y: i32, screen: ScreenSize, pill: PillSize) -> f32 {
    let travel = screen.height - pill.height;
    if travel <= 0 {
        return 0.0;
    }
    (y as f32 / travel as f32).clamp(0.0, 1.0)
}

/// The pill snaps to whichever half holds its horizontal center.
pub fn snaps_right(geometry: &OverlayGeometry, screen: ScreenSize) -> bool {
    geometry.center_x() > screen.width / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT: ScreenSize = ScreenSize {
        width: 1080,
        height: 2000,
    };
    const PILL: PillSize = PillSize {
        width: 200,
        height: 100,
    };

    fn at(x: i32, y: i32) -> OverlayGeometry {
        OverlayGeometry {
            x,
            y,
            ..OverlayGeometry::placed(PORTRAIT, PILL, EdgePlacement::default())
        }
    }

    #[test]
    fn default_placement_is_near_top_left() {
        let geometry = OverlayGeometry::placed(PORTRAIT, PILL, EdgePlacement::default());
        assert_eq!(geometry.x, 0);
        assert_eq!(geometry.y, (0.046f32 * 1900.0) as i32);
        assert!(!geometry.is_on_right_edge);
    }

    #[test]
    fn unmeasured_pill_uses_fixed_offset() {
        let geometry = OverlayGeometry::placed(
            PORTRAIT,
            PillSize::default(),
            EdgePlacement {
                is_on_right_edge: true,
                vertical_ratio: 0.9,
            },
        );
        assert_eq!((geometry.x, geometry.y), (0, UNMEASURED_Y));
    }

    #[test]
    fn drag_results_stay_on_screen() {
        let deltas = [
            (0, 0),
            (5_000, 0),
            (-5_000, 0),
            (0, 9_999),
            (0, -9_999),
            (333, -77),
            (i32::MAX, i32::MIN),
            (-1, 1_899),
        ];
        for start in [at(0, 0), at(880, 1900), at(440, 950)] {
            for (dx, dy) in deltas {
                let moved = start.dragged_by(dx, dy, PORTRAIT);
                assert!((0..=880).contains(&moved.x), "x={} for {dx},{dy}", moved.x);
                assert!((0..=1900).contains(&moved.y), "y={} for {dx},{dy}", moved.y);
            }
        }
    }

    #[test]
    fn release_right_of_center_snaps_right() {
        let geometry = at(900, 300);
        assert_eq!(geometry.center_x(), 1000);
        assert!(snaps_right(&geometry, PORTRAIT));
        assert_eq!(edge_x(PORTRAIT, PILL, true), 880);
    }

    #[test]
    fn release_exactly_on_center_snaps_left() {
        assert!(!snaps_right(&at(440, 300), PORTRAIT));
        assert!(snaps_right(&at(441, 300), PORTRAIT));
    }

    #[test]
    fn ratio_follows_new_screen_height() {
        let shorter = ScreenSize {
            width: 1080,
            height: 1000,
        };
        assert_eq!(y_for_ratio(shorter, PILL, 0.5), 450);
    }

    #[test]
    fn ratio_is_zero_without_vertical_travel() {
        let tiny = ScreenSize {
            width: 300,
            height: 80,
        };
        assert_eq!(ratio_for_y(0, tiny, PILL), 0.0);
        assert_eq!(ratio_for_y(5_000, PORTRAIT, PILL), 1.0);
    }

    #[test]
    fn relative_position_survives_rotation() {
        let landscape = ScreenSize {
            width: 2000,
            height: 1080,
        };
        let before = at(880, 1234);
        let placement = EdgePlacement {
            is_on_right_edge: true,
            vertical_ratio: ratio_for_y(before.y, PORTRAIT, PILL),
        };

        let rotated = OverlayGeometry::placed(landscape, PILL, placement);
        assert_eq!(rotated.x, 1800);
        let rotated_ratio = ratio_for_y(rotated.y, landscape, PILL);
        assert!((rotated_ratio - placement.vertical_ratio).abs() < 0.002);

        let back = OverlayGeometry::placed(PORTRAIT, PILL, rotated.placement());
        assert_eq!(back.x, before.x);
        assert!((back.y - before.y).abs() <= 1);
    }
}
