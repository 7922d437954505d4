//! Preview approval state machine.
//!
//! The synchronizer owns what the live preview surface should show. It does
//! no I/O itself: every transition returns the [`PreviewSignal`]s the caller
//! must forward to the surface.
//!
//! ```text
//! Empty ──SetPreview──▶ PendingApproval ──Approve──▶ Approved
//!   ▲                     │    ▲   │                   │
//!   │                     │    └───┘ SetPreview        │ SetPreview
//!   └────ClearPreview─────┴◀───────────────────────────┘
//!          (from any state)        GenerateFinalSite ──▶ Finalized
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ChatError, ChatResult};
use crate::types::{ApprovedSection, ApprovedSections, PendingPreview};

/// Where the approval workflow currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    Empty,
    PendingApproval(PendingPreview),
    /// The most recently approved section is on display
    Approved { section: String },
    Finalized,
}

impl PreviewState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::PendingApproval(_) => "pending_approval",
            Self::Approved { .. } => "approved",
            Self::Finalized => "finalized",
        }
    }
}

/// Instruction for the live preview surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PreviewSignal {
    /// Reload the surface; the URL carries a freshness token
    RefreshPreview { url: String },
    ShowApprovalControls { section: String },
    HideApprovalControls,
    ShowFinalSite { url: String },
}

/// Approval state machine plus the local mirror of approved sections.
#[derive(Debug)]
pub struct PreviewSynchronizer {
    state: PreviewState,
    approved: ApprovedSections,
    preview_url: String,
    last_token: u64,
}

impl PreviewSynchronizer {
    /// Create a synchronizer in the `Empty` state for the given live URL.
    pub fn new(preview_url: impl Into<String>) -> Self {
        Self {
            state: PreviewState::Empty,
            approved: ApprovedSections::new(),
            preview_url: preview_url.into(),
            last_token: 0,
        }
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    /// The section awaiting approval, if any.
    pub fn pending(&self) -> Option<&PendingPreview> {
        match &self.state {
            PreviewState::PendingApproval(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn approved_sections(&self) -> &ApprovedSections {
        &self.approved
    }

    pub fn preview_url(&self) -> &str {
        &self.preview_url
    }

    /// Store a new pending section, replacing any previous one.
    ///
    /// `preview_url` is where storage published it, when it said so.
    pub fn set_preview(
        &mut self,
        section: &str,
        html: &str,
        preview_url: Option<&str>,
    ) -> Vec<PreviewSignal> {
        if let Some(url) = preview_url.filter(|u| !u.is_empty()) {
            self.preview_url = url.to_string();
        }
        debug!("Preview {} -> pending_approval ({})", self.state.name(), section);
        self.state = PreviewState::PendingApproval(PendingPreview {
            section: section.to_string(),
            html: html.to_string(),
        });

        vec![
            self.refresh(),
            PreviewSignal::ShowApprovalControls {
                section: section.to_string(),
            },
        ]
    }

    /// Commit the pending section into the approved set.
    ///
    /// Fails with [`ChatError::NoPendingPreview`] when nothing is pending or
    /// the pending section has a different name; the state is left as is.
    pub fn approve(&mut self, section: &str) -> ChatResult<Vec<PreviewSignal>> {
        let pending = match &self.state {
            PreviewState::PendingApproval(pending) if pending.section == section => pending.clone(),
            _ => return Err(ChatError::NoPendingPreview),
        };

        self.approved.insert(
            pending.section.clone(),
            ApprovedSection {
                html: pending.html,
                approved_at: Utc::now(),
            },
        );
        info!("Section approved: {}", pending.section);
        self.state = PreviewState::Approved {
            section: pending.section,
        };

        Ok(vec![PreviewSignal::HideApprovalControls, self.refresh()])
    }

    /// Drop the pending section. Approved sections are kept.
    pub fn clear(&mut self) -> Vec<PreviewSignal> {
        debug!("Preview {} -> empty", self.state.name());
        self.state = PreviewState::Empty;
        vec![PreviewSignal::HideApprovalControls, self.refresh()]
    }

    /// Switch the surface to the generated site.
    pub fn finalize(&mut self) -> Vec<PreviewSignal> {
        debug!("Preview {} -> finalized", self.state.name());
        self.state = PreviewState::Finalized;
        let url = self.fresh_url();
        vec![
            PreviewSignal::HideApprovalControls,
            PreviewSignal::ShowFinalSite { url },
        ]
    }

    /// Replace the local mirror with what storage holds.
    pub fn sync_approved(&mut self, sections: ApprovedSections) {
        debug!("Synced {} approved sections", sections.len());
        self.approved = sections;
    }

    fn refresh(&mut self) -> PreviewSignal {
        PreviewSignal::RefreshPreview {
            url: self.fresh_url(),
        }
    }

    fn fresh_url(&mut self) -> String {
        let token = self.next_token();
        with_token(&self.preview_url, token)
    }

    /// Millisecond clock, bumped when two calls land in the same millisecond.
    fn next_token(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_token = now.max(self.last_token + 1);
        self.last_token
    }
}

/// Append a `t=` freshness token to a URL.
pub fn with_token(url: &str, token: u64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", url, separator, token)
}
