//! Local UI layout preferences and debounced persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::ChatResult;

/// Device frame the preview is rendered in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewDevice {
    #[default]
    Desktop,
    Tablet,
    Mobile,
}

/// How the chat and preview panes are laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutPreferences {
    /// Share of the window width given to the chat pane
    pub chat_width_ratio: f32,
    pub preview_visible: bool,
    pub device: PreviewDevice,
}

impl LayoutPreferences {
    pub const MIN_RATIO: f32 = 0.2;
    pub const MAX_RATIO: f32 = 0.8;

    pub fn with_chat_width_ratio(mut self, ratio: f32) -> Self {
        self.chat_width_ratio = ratio.clamp(Self::MIN_RATIO, Self::MAX_RATIO);
        self
    }
}

impl Default for LayoutPreferences {
    fn default() -> Self {
        Self {
            chat_width_ratio: 0.4,
            preview_visible: true,
            device: PreviewDevice::default(),
        }
    }
}

/// Reads and writes `.sitecraft/layout.json` under a workspace.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        Self {
            path: workspace.as_ref().join(".sitecraft").join("layout.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved preferences, or defaults when nothing was saved yet.
    pub fn load(&self) -> ChatResult<LayoutPreferences> {
        if !self.path.exists() {
            return Ok(LayoutPreferences::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, prefs: &LayoutPreferences) -> ChatResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(prefs)?)?;
        debug!("Saved layout preferences to {}", self.path.display());
        Ok(())
    }

    /// A debouncer that saves into this store.
    pub fn debounced(&self, quiet_period: Duration) -> Debouncer<LayoutPreferences> {
        let store = self.clone();
        Debouncer::spawn(quiet_period, move |prefs: LayoutPreferences| {
            if let Err(e) = store.save(&prefs) {
                warn!("Failed to save layout preferences: {}", e);
            }
        })
    }
}

/// Coalesces rapid updates into a single write.
///
/// The latest value is written once no update has arrived for the quiet
/// period. Closing the debouncer flushes a value that is still waiting.
pub struct Debouncer<T> {
    sender: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn<F>(quiet_period: Duration, mut write: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<T>();

        let task = tokio::spawn(async move {
            while let Some(mut latest) = receiver.recv().await {
                loop {
                    tokio::select! {
                        next = receiver.recv() => match next {
                            Some(value) => latest = value,
                            None => {
                                write(latest);
                                return;
                            }
                        },
                        _ = sleep(quiet_period) => {
                            write(latest);
                            break;
                        }
                    }
                }
            }
        });

        Self { sender, task }
    }

    /// Record a new value; only the last one in a burst is written.
    pub fn update(&self, value: T) {
        if self.sender.send(value).is_err() {
            warn!("Debouncer task has stopped; update dropped");
        }
    }

    /// Flush anything pending and stop.
    pub async fn close(self) {
        drop(self.sender);
        if let Err(e) = self.task.await {
            warn!("Debouncer task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn recording() -> (Arc<Mutex<Vec<u32>>>, impl FnMut(u32) + Send + 'static) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = written.clone();
        (written, move |value| sink.lock().push(value))
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced() {
        let (written, write) = recording();
        let debouncer = Debouncer::spawn(Duration::from_millis(500), write);

        debouncer.update(1);
        debouncer.update(2);
        debouncer.update(3);
        sleep(Duration::from_millis(600)).await;
        assert_eq!(*written.lock(), vec![3]);

        debouncer.update(4);
        sleep(Duration::from_millis(600)).await;
        assert_eq!(*written.lock(), vec![3, 4]);

        debouncer.close().await;
        assert_eq!(*written.lock(), vec![3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending_value() {
        let (written, write) = recording();
        let debouncer = Debouncer::spawn(Duration::from_secs(10), write);

        debouncer.update(7);
        debouncer.close().await;
        assert_eq!(*written.lock(), vec![7]);
    }

    #[test]
    fn test_store_roundtrip_and_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path());
        assert_eq!(store.load().unwrap(), LayoutPreferences::default());

        let prefs = LayoutPreferences {
            device: PreviewDevice::Mobile,
            ..Default::default()
        }
        .with_chat_width_ratio(0.95);
        store.save(&prefs).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.device, PreviewDevice::Mobile);
        assert_eq!(loaded.chat_width_ratio, LayoutPreferences::MAX_RATIO);
        assert!(store.path().ends_with(".sitecraft/layout.json"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join(".sitecraft")).unwrap();
        std::fs::write(store.path(), r#"{"previewVisible": false}"#).unwrap();

        let loaded = store.load().unwrap();
        assert!(!loaded.preview_visible);
        assert_eq!(loaded.device, PreviewDevice::Desktop);
    }
}
