//! Core types for the conversation and the project document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat message. Immutable once appended to a history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Append-only, ordered message log.
///
/// There is no way to remove, reorder or edit an entry once appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<ConversationMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a persisted log as-is.
    pub fn from_messages(messages: Vec<ConversationMessage>) -> Self {
        Self { messages }
    }

    pub fn append(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }
}

/// A sitemap page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub name: String,
    pub slug: String,
    /// 1-based position in the sitemap
    pub order: u32,
}

impl Page {
    pub fn new(name: impl Into<String>, order: u32) -> Self {
        let name = name.into().trim().to_string();
        Self {
            slug: slugify(&name),
            name,
            order,
        }
    }

    /// Build the ordered page list for a sequence of names.
    pub fn sequence<S: AsRef<str>>(names: &[S]) -> Vec<Page> {
        names
            .iter()
            .zip(1u32..)
            .map(|(name, order)| Page::new(name.as_ref(), order))
            .collect()
    }
}

/// Session ids are limited to ASCII letters, digits, `-` and `_`, so they
/// can serve as a URL path segment and a directory name unchanged.
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Derive a page slug: lower-case, whitespace runs become a single `-`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// The one section currently proposed and awaiting approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPreview {
    pub section: String,
    pub html: String,
}

/// A section the user approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedSection {
    pub html: String,
    #[serde(rename = "approvedAt")]
    pub approved_at: DateTime<Utc>,
}

/// Approved sections keyed by section name.
pub type ApprovedSections = BTreeMap<String, ApprovedSection>;

/// An approval on its way to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionApproval {
    pub section: String,
    pub html: String,
}
