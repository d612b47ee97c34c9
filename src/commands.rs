use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use log::{info, warn};

use crate::{
    cli::Command,
    config::{AppPaths, OverlayConfig, TrackingConfig},
    db::Database,
    overlay::{LogDisplay, OverlayHandle},
    sensing::{native_sampler, SystemClock},
    settings::SettingsStore,
    stats::{usage_report, DateRange},
    tracking::{TrackingController, TrackingDeps},
    utils::format_duration,
};

pub async fn dispatch(command: Command, paths: &AppPaths) -> Result<()> {
    match command {
        Command::Track => track(paths).await,
        Command::Select { packages } => select(paths, packages),
        Command::Clear => select_set(paths, BTreeSet::new()),
        Command::Label { package, label } => {
            open_settings(paths)?.set_label(&package, &label)?;
            println!("{package} is now shown as \"{}\"", label.trim());
            Ok(())
        }
        Command::Stats { range } => stats(paths, range).await,
        Command::Sessions { range } => sessions(paths, range).await,
    }
}

fn open_settings(paths: &AppPaths) -> Result<SettingsStore> {
    SettingsStore::new(paths.settings())
}

fn select(paths: &AppPaths, packages: Vec<String>) -> Result<()> {
    let packages: BTreeSet<String> = packages
        .into_iter()
        .map(|package| package.trim().to_string())
        .filter(|package| !package.is_empty())
        .collect();
    if packages.is_empty() {
        bail!("no app names given");
    }
    select_set(paths, packages)
}

fn select_set(paths: &AppPaths, packages: BTreeSet<String>) -> Result<()> {
    let settings = open_settings(paths)?;
    settings.set_tracked_packages(packages.clone())?;
    if packages.is_empty() {
        println!("No apps are tracked");
    } else {
        let names: Vec<&str> = packages.iter().map(String::as_str).collect();
        println!("Tracking {}", names.join(", "));
    }
    Ok(())
}

async fn track(paths: &AppPaths) -> Result<()> {
    let settings = Arc::new(open_settings(paths)?);
    if settings.is_tracking_active() {
        warn!("previous tracking run did not shut down cleanly; its open session was lost");
    }

    let db = Database::new(paths.database())?;
    let sampler = native_sampler().context("no foreground sampler available")?;
    let overlay_config = OverlayConfig::default();
    let overlay = OverlayHandle::spawn(
        LogDisplay::new(overlay_config.screen, overlay_config.pill),
        overlay_config,
    )?;

    let mut controller = TrackingController::start(
        TrackingDeps {
            db,
            settings,
            sampler,
            clock: Arc::new(SystemClock),
            overlay,
        },
        TrackingConfig::default(),
    )?;

    let mut signals = StopSignals::install()?;
    tokio::select! {
        signal = signals.recv() => match signal {
            Ok(name) => info!("{name} received, stopping"),
            Err(err) => warn!("signal listener failed, stopping: {err:#}"),
        },
        _ = controller.closed() => {
            info!("tracked app list was emptied");
        }
    }

    controller.stop().await
}

/// OS requests that end `track` through the graceful stop path: Ctrl-C
/// everywhere, plus SIGTERM on unix.
struct StopSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl StopSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("failed to listen for SIGTERM")?,
        })
    }

    /// Resolves with the name of the first signal received.
    async fn recv(&mut self) -> Result<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.context("failed to listen for Ctrl-C")?;
                    Ok("interrupt")
                }
                _ = self.terminate.recv() => Ok("SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            Ok("interrupt")
        }
    }
}

async fn stats(paths: &AppPaths, range: DateRange) -> Result<()> {
    let db = Database::new(paths.database())?;
    let report = usage_report(&db, range).await?;
    print!("{}", report.render());
    Ok(())
}

async fn sessions(paths: &AppPaths, range: DateRange) -> Result<()> {
    let db = Database::new(paths.database())?;
    let (start, end) = range.bounds(Local::now().date_naive());
    let sessions = db.query_sessions_by_date_range(&start, &end).await?;

    if sessions.is_empty() {
        println!("No sessions between {start} and {end}");
        return Ok(());
    }
    for session in sessions {
        let started = session.start_time.with_timezone(&Local);
        let ended = session.end_time.with_timezone(&Local);
        println!(
            "{}  {}-{}  {:>8}  {}",
            session.date,
            started.format("%H:%M:%S"),
            ended.format("%H:%M:%S"),
            format_duration(session.duration_ms as i64),
            session.label
        );
    }
    Ok(())
}
