use log::info;
use thiserror::Error;

use super::geometry::{OverlayGeometry, PillSize, ScreenSize};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    /// The widget is no longer attached to the surface.
    #[error("widget is not attached")]
    Detached,

    #[error("display surface error: {0}")]
    Surface(String),
}

/// The surface the pill is drawn on. Only ever called from the overlay
/// thread; the engine hands it geometry and text, never drawing primitives.
pub trait DisplayDriver: Send + 'static {
    fn screen_size(&self) -> ScreenSize;
    fn add_widget(&mut self, geometry: &OverlayGeometry, text: &str) -> Result<(), DisplayError>;
    /// Current laid-out size of the pill; zero until the surface has
    /// measured it.
    fn measure_widget(&self) -> Result<PillSize, DisplayError>;
    fn update_widget_position(&mut self, geometry: &OverlayGeometry) -> Result<(), DisplayError>;
    fn update_widget_text(&mut self, text: &str) -> Result<(), DisplayError>;
    fn remove_widget(&mut self) -> Result<(), DisplayError>;
}

/// Headless surface that reports every change through the log. Used when
/// no on-screen surface is available.
pub struct LogDisplay {
    screen: ScreenSize,
    pill: PillSize,
    attached: bool,
    last_text: String,
}

impl LogDisplay {
    pub fn new(screen: ScreenSize, pill: PillSize) -> Self {
        Self {
            screen,
            pill,
            attached: false,
            last_text: String::new(),
        }
    }

    fn ensure_attached(&self) -> Result<(), DisplayError> {
        if self.attached {
            Ok(())
        } else {
            Err(DisplayError::Detached)
        }
    }
}

impl DisplayDriver for LogDisplay {
    fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    fn add_widget(&mut self, geometry: &OverlayGeometry, text: &str) -> Result<(), DisplayError> {
        if self.attached {
            return Err(DisplayError::Surface("widget already attached".into()));
        }
        self.attached = true;
        self.last_text = text.to_string();
        info!("[pill] shown at ({}, {}): {}", geometry.x, geometry.y, text);
        Ok(())
    }

    fn measure_widget(&self) -> Result<PillSize, DisplayError> {
        self.ensure_attached()?;
        Ok(self.pill)
    }

    fn update_widget_position(&mut self, geometry: &OverlayGeometry) -> Result<(), DisplayError> {
        self.ensure_attached()?;
        log::debug!("[pill] moved to ({}, {})", geometry.x, geometry.y);
        Ok(())
    }

    fn update_widget_text(&mut self, text: &str) -> Result<(), DisplayError> {
        self.ensure_attached()?;
        if self.last_text != text {
            info!("[pill] {}", text);
            self.last_text = text.to_string();
        }
        Ok(())
    }

    fn remove_widget(&mut self) -> Result<(), DisplayError> {
        self.ensure_attached()?;
        self.attached = false;
        info!("[pill] hidden");
        Ok(())
    }
}
