pub mod animation;
pub mod driver;
pub mod engine;
pub mod geometry;
pub mod worker;

pub use animation::{decelerate, SnapAnimation};
pub use driver::{DisplayDriver, DisplayError, LogDisplay};
pub use engine::{OverlayEngine, WidgetLifecycle};
pub use geometry::{
    clamp_position, EdgePlacement, OverlayGeometry, PillSize, ScreenSize,
    DEFAULT_VERTICAL_RATIO,
};
pub use worker::{OverlayCommand, OverlayHandle};
