use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::PathBuf,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::tracking::LabelSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UserSettings {
    tracked_packages: BTreeSet<String>,
    tracking_active: bool,
    /// User-facing names for tracked packages, keyed by package id.
    labels: BTreeMap<String, String>,
}

/// JSON-backed preferences. The tracked set and the tracking flag are also
/// published on `watch` channels so the tracking actor can react to edits
/// made while it runs.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
    tracked_tx: watch::Sender<BTreeSet<String>>,
    active_tx: watch::Sender<bool>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        let (tracked_tx, _) = watch::channel(data.tracked_packages.clone());
        let (active_tx, _) = watch::channel(data.tracking_active);

        Ok(Self {
            path,
            data: RwLock::new(data),
            tracked_tx,
            active_tx,
        })
    }

    pub fn tracked_packages(&self) -> BTreeSet<String> {
        self.read().tracked_packages.clone()
    }

    pub fn subscribe_tracked_packages(&self) -> watch::Receiver<BTreeSet<String>> {
        self.tracked_tx.subscribe()
    }

    pub fn set_tracked_packages(&self, packages: BTreeSet<String>) -> Result<()> {
        self.update(|settings| settings.tracked_packages = packages.clone())?;
        self.tracked_tx.send_replace(packages);
        Ok(())
    }

    pub fn is_tracking_active(&self) -> bool {
        self.read().tracking_active
    }

    pub fn subscribe_tracking_active(&self) -> watch::Receiver<bool> {
        self.active_tx.subscribe()
    }

    pub fn set_tracking_active(&self, active: bool) -> Result<()> {
        self.update(|settings| settings.tracking_active = active)?;
        self.active_tx.send_replace(active);
        Ok(())
    }

    pub fn set_label(&self, package_id: &str, label: &str) -> Result<()> {
        let label = label.trim();
        if label.is_empty() {
            bail!("label for {package_id} must not be empty");
        }
        self.update(|settings| {
            settings
                .labels
                .insert(package_id.to_string(), label.to_string());
        })
    }

    /// Picks up edits another process made to the settings file and
    /// notifies subscribers of whatever changed. Returns whether anything
    /// did. An unreadable file leaves the current values in place.
    pub fn reload(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let on_disk: UserSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Unreadable settings at {}", self.path.display()))?;

        let mut guard = self.write();
        if *guard == on_disk {
            return Ok(false);
        }
        let tracked_changed = guard.tracked_packages != on_disk.tracked_packages;
        let active_changed = guard.tracking_active != on_disk.tracking_active;
        *guard = on_disk.clone();
        drop(guard);

        if tracked_changed {
            self.tracked_tx.send_replace(on_disk.tracked_packages);
        }
        if active_changed {
            self.active_tx.send_replace(on_disk.tracking_active);
        }
        Ok(true)
    }

    /// Applies `change` to a copy, persists it, and only then swaps it in.
    fn update(&self, change: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = self.write();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Re-reads the settings file on a fixed cadence so `select`/`clear` run
/// from another process reach a running tracker.
pub async fn settings_refresh_loop(
    settings: Arc<SettingsStore>,
    refresh_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => match settings.reload() {
                Ok(true) => info!("settings changed on disk, reloaded"),
                Ok(false) => {}
                Err(err) => warn!("keeping current settings: {err:#}"),
            },
            _ = cancel_token.cancelled() => break,
        }
    }
}

impl LabelSource for SettingsStore {
    fn resolve_label(&self, package_id: &str) -> Result<String> {
        match self.read().labels.get(package_id) {
            Some(label) => Ok(label.clone()),
            None => bail!("no label recorded for {package_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn packages(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert!(store.tracked_packages().is_empty());
        assert!(!store.is_tracking_active());
    }

    #[test]
    fn changes_survive_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        {
            let store = SettingsStore::new(path.clone()).unwrap();
            store.set_tracked_packages(packages(&["com.x", "com.y"])).unwrap();
            store.set_tracking_active(true).unwrap();
            store.set_label("com.x", "  X App ").unwrap();
        }

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.tracked_packages(), packages(&["com.x", "com.y"]));
        assert!(store.is_tracking_active());
        assert_eq!(store.resolve_label("com.x").unwrap(), "X App");
        assert!(store.resolve_label("com.y").is_err());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert!(store.tracked_packages().is_empty());
    }

    #[test]
    fn rejects_blank_label() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert!(store.set_label("com.x", "   ").is_err());
    }

    #[test]
    fn reload_picks_up_edits_from_another_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_tracked_packages(packages(&["com.x", "com.y"])).unwrap();
        let mut tracked = store.subscribe_tracked_packages();
        tracked.borrow_and_update();

        assert!(!store.reload().unwrap());

        let other = SettingsStore::new(path).unwrap();
        other.set_tracked_packages(packages(&["com.y"])).unwrap();
        other.set_label("com.y", "Y").unwrap();

        assert!(store.reload().unwrap());
        assert_eq!(store.tracked_packages(), packages(&["com.y"]));
        assert_eq!(store.resolve_label("com.y").unwrap(), "Y");
        assert!(tracked.has_changed().unwrap());
        assert_eq!(*tracked.borrow_and_update(), packages(&["com.y"]));
    }

    #[test]
    fn reload_keeps_values_when_file_is_garbled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_tracked_packages(packages(&["com.x"])).unwrap();

        fs::write(&path, "{ half written").unwrap();
        assert!(store.reload().is_err());
        assert_eq!(store.tracked_packages(), packages(&["com.x"]));
    }

    #[tokio::test]
    async fn refresh_loop_forwards_external_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = Arc::new(SettingsStore::new(path.clone()).unwrap());
        store.set_tracked_packages(packages(&["com.x"])).unwrap();
        let mut tracked = store.subscribe_tracked_packages();
        tracked.borrow_and_update();

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(settings_refresh_loop(
            Arc::clone(&store),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        SettingsStore::new(path)
            .unwrap()
            .set_tracked_packages(BTreeSet::new())
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), tracked.changed())
            .await
            .expect("external edit should be noticed")
            .unwrap();
        assert!(tracked.borrow_and_update().is_empty());

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        let mut tracked = store.subscribe_tracked_packages();
        let mut active = store.subscribe_tracking_active();

        store.set_tracked_packages(packages(&["com.x"])).unwrap();
        store.set_tracking_active(true).unwrap();

        tracked.changed().await.unwrap();
        assert_eq!(*tracked.borrow_and_update(), packages(&["com.x"]));
        active.changed().await.unwrap();
        assert!(*active.borrow_and_update());
    }
}
