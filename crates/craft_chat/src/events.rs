//! Outward notifications for whatever renders the session.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use craft_tags::Entries;

use crate::preview::PreviewSignal;
use crate::types::{ApprovedSections, Page};

/// Default number of events a slow subscriber may fall behind by.
pub const DEFAULT_CAPACITY: usize = 256;

/// Something the UI layer may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SiteEvent {
    SitemapUpdated {
        pages: Vec<Page>,
    },
    MetadataUpdated {
        metadata: Entries,
    },
    StylesUpdated {
        styles: Entries,
    },
    PreviewUpdated {
        section: String,
        #[serde(rename = "previewUrl")]
        preview_url: String,
    },
    PreviewCleared,
    ApprovedSectionsLoaded {
        sections: ApprovedSections,
    },
    IndexGenerated,
    PreviewSignal {
        signal: PreviewSignal,
    },
    SectionApproved {
        section: String,
    },
    SystemNotice {
        message: String,
    },
}

impl SiteEvent {
    pub fn notice(message: impl Into<String>) -> Self {
        Self::SystemNotice {
            message: message.into(),
        }
    }
}

/// Broadcast channel of [`SiteEvent`]s.
///
/// Publishing never blocks and never fails; events sent while nobody is
/// subscribed are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SiteEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SiteEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: SiteEvent) -> usize {
        trace!("event: {:?}", event);
        self.sender.send(event).unwrap_or(0)
    }

    /// Publish each preview signal as its own event, in order.
    pub fn publish_signals(&self, signals: Vec<PreviewSignal>) {
        for signal in signals {
            self.publish(SiteEvent::PreviewSignal { signal });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
