use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use anyhow::{Context, Result};

use super::{
    driver::DisplayDriver,
    engine::OverlayEngine,
    geometry::EdgePlacement,
};
use crate::config::OverlayConfig;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCommand {
    Show(String),
    UpdateElapsed(i64),
    Hide,
    Drag { dx: i32, dy: i32 },
    DragEnd,
    ScreenChanged,
    Shutdown,
}

struct OverlayInner {
    sender: mpsc::Sender<OverlayCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for OverlayInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            // Fails harmlessly when the thread already got an explicit shutdown.
            let _ = self.sender.send(OverlayCommand::Shutdown);
            if let Err(join_err) = handle.join() {
                log_error!("Failed to join overlay thread: {join_err:?}");
            }
        }
    }
}

/// Cheap, cloneable handle to the overlay thread. The thread owns the engine
/// and the display driver; everything else talks to it through this queue.
#[derive(Clone)]
pub struct OverlayHandle {
    inner: Arc<OverlayInner>,
}

impl OverlayHandle {
    pub fn spawn<D: DisplayDriver>(driver: D, config: OverlayConfig) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<OverlayCommand>();

        let worker = thread::Builder::new()
            .name("beaware-overlay".into())
            .spawn(move || {
                let engine = OverlayEngine::new(
                    driver,
                    config.snap_duration,
                    EdgePlacement::with_ratio(config.default_vertical_ratio),
                );
                run_overlay_loop(engine, command_rx, config);
            })
            .context("failed to spawn overlay thread")?;

        Ok(Self {
            inner: Arc::new(OverlayInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub fn show(&self, label: String) {
        self.send(OverlayCommand::Show(label));
    }

    pub fn update_elapsed(&self, seconds: i64) {
        self.send(OverlayCommand::UpdateElapsed(seconds));
    }

    pub fn hide(&self) {
        self.send(OverlayCommand::Hide);
    }

    pub fn drag(&self, dx: i32, dy: i32) {
        self.send(OverlayCommand::Drag { dx, dy });
    }

    pub fn drag_end(&self) {
        self.send(OverlayCommand::DragEnd);
    }

    pub fn screen_changed(&self) {
        self.send(OverlayCommand::ScreenChanged);
    }

    /// Queued behind anything already sent, so a preceding `hide` is applied
    /// first. The thread is joined when the last handle goes away.
    pub fn shutdown(&self) {
        self.send(OverlayCommand::Shutdown);
    }

    fn send(&self, command: OverlayCommand) {
        if let Err(err) = self.inner.sender.send(command) {
            log_debug!("overlay thread is gone, dropping {:?}", err.0);
        }
    }
}

#[cfg(test)]
impl OverlayHandle {
    /// Handle with no thread behind it; commands pile up in the returned
    /// queue in the order they were sent.
    pub(crate) fn queue_only() -> (Self, mpsc::Receiver<OverlayCommand>) {
        let (sender, receiver) = mpsc::channel();
        let handle = Self {
            inner: Arc::new(OverlayInner {
                sender,
                worker: Mutex::new(None),
            }),
        };
        (handle, receiver)
    }
}

fn run_overlay_loop<D: DisplayDriver>(
    mut engine: OverlayEngine<D>,
    commands: mpsc::Receiver<OverlayCommand>,
    config: OverlayConfig,
) {
    log_info!("overlay thread started");

    loop {
        // Block while idle; wake for the next frame while a snap is running.
        let command = if engine.is_animating() {
            match commands.recv_timeout(config.frame_interval) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(OverlayCommand::Show(label)) => engine.show(&label),
            Some(OverlayCommand::UpdateElapsed(seconds)) => engine.update_elapsed(seconds),
            Some(OverlayCommand::Hide) => engine.hide(),
            Some(OverlayCommand::Drag { dx, dy }) => engine.on_drag(dx, dy),
            Some(OverlayCommand::DragEnd) => engine.on_drag_end(Instant::now()),
            Some(OverlayCommand::ScreenChanged) => engine.on_screen_change(),
            Some(OverlayCommand::Shutdown) => break,
            None => {}
        }

        if engine.is_animating() {
            engine.advance_animation(Instant::now());
        }
    }

    engine.hide();
    log_info!("overlay thread shutting down");
}
