//! Typed values produced by the grammar.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Flat string map used by the metadata and styles tags.
pub type Entries = BTreeMap<String, String>;

/// The seven tag kinds an assistant reply may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagKind {
    Sitemap,
    Metadata,
    Styles,
    Preview,
    ClearPreview,
    GenerateIndex,
    GetApprovedSections,
}

impl TagKind {
    /// All kinds, in dispatch order.
    pub const ALL: [TagKind; 7] = [
        TagKind::Sitemap,
        TagKind::Metadata,
        TagKind::Styles,
        TagKind::Preview,
        TagKind::ClearPreview,
        TagKind::GetApprovedSections,
        TagKind::GenerateIndex,
    ];

    /// Stable wire name of the kind.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Sitemap => "sitemap",
            Self::Metadata => "metadata",
            Self::Styles => "styles",
            Self::Preview => "preview",
            Self::ClearPreview => "clearPreview",
            Self::GenerateIndex => "generateIndex",
            Self::GetApprovedSections => "getApprovedSections",
        }
    }

    /// The opening marker text, as it appears in a message.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Sitemap => "[SITEMAP:",
            Self::Metadata => "[METADATA:",
            Self::Styles => "[STYLES:",
            Self::Preview => "[PREVIEW:",
            Self::ClearPreview => "[CLEAR_PREVIEW]",
            Self::GenerateIndex => "[GENERATE_INDEX]",
            Self::GetApprovedSections => "[GET_APPROVED_SECTIONS]",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Contents of a `[PREVIEW: section] ... [/PREVIEW]` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewTag {
    pub section: String,
    pub html: String,
}

/// A single structured instruction extracted from a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    SetSitemap { pages: Vec<String> },
    MergeMetadata { entries: Entries },
    MergeStyles { entries: Entries },
    SetPreview { section: String, html: String },
    ClearPreview,
    GenerateFinalSite { html: String },
    RequestApprovedSections,
}

impl Command {
    /// Tag kind the command was read from.
    pub fn kind(&self) -> TagKind {
        match self {
            Self::SetSitemap { .. } => TagKind::Sitemap,
            Self::MergeMetadata { .. } => TagKind::Metadata,
            Self::MergeStyles { .. } => TagKind::Styles,
            Self::SetPreview { .. } => TagKind::Preview,
            Self::ClearPreview => TagKind::ClearPreview,
            Self::GenerateFinalSite { .. } => TagKind::GenerateIndex,
            Self::RequestApprovedSections => TagKind::GetApprovedSections,
        }
    }
}

/// Everything [`crate::detect`] found in one message.
///
/// Each field is filled independently; a message may carry any combination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Entries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Entries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewTag>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_preview: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_index: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub get_approved_sections: bool,
}

impl DetectedTags {
    /// True when no tag kind was found.
    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    /// Whether the given kind was found.
    pub fn contains(&self, kind: TagKind) -> bool {
        match kind {
            TagKind::Sitemap => self.sitemap.is_some(),
            TagKind::Metadata => self.metadata.is_some(),
            TagKind::Styles => self.styles.is_some(),
            TagKind::Preview => self.preview.is_some(),
            TagKind::ClearPreview => self.clear_preview,
            TagKind::GenerateIndex => self.generate_index.is_some(),
            TagKind::GetApprovedSections => self.get_approved_sections,
        }
    }

    /// The set of kinds that were found.
    pub fn kinds(&self) -> BTreeSet<TagKind> {
        TagKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }

    /// Convert into commands, in dispatch order.
    ///
    /// Both `SetPreview` and `ClearPreview` are returned when both tags were
    /// present; resolving that conflict is up to the dispatcher.
    pub fn commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();

        if let Some(pages) = &self.sitemap {
            commands.push(Command::SetSitemap { pages: pages.clone() });
        }
        if let Some(entries) = &self.metadata {
            commands.push(Command::MergeMetadata { entries: entries.clone() });
        }
        if let Some(entries) = &self.styles {
            commands.push(Command::MergeStyles { entries: entries.clone() });
        }
        if let Some(preview) = &self.preview {
            commands.push(Command::SetPreview {
                section: preview.section.clone(),
                html: preview.html.clone(),
            });
        }
        if self.clear_preview {
            commands.push(Command::ClearPreview);
        }
        if self.get_approved_sections {
            commands.push(Command::RequestApprovedSections);
        }
        if let Some(html) = &self.generate_index {
            commands.push(Command::GenerateFinalSite { html: html.clone() });
        }

        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_detection() {
        let detected = DetectedTags::default();
        assert!(detected.is_empty());
        assert!(detected.commands().is_empty());
    }

    #[test]
    fn test_commands_follow_dispatch_order() {
        let detected = DetectedTags {
            generate_index: Some("<html></html>".to_string()),
            get_approved_sections: true,
            sitemap: Some(vec!["Home".to_string()]),
            clear_preview: true,
            ..Default::default()
        };

        let kinds: Vec<TagKind> = detected.commands().iter().map(Command::kind).collect();
        assert_eq!(
            kinds,
            vec![
                TagKind::Sitemap,
                TagKind::ClearPreview,
                TagKind::GetApprovedSections,
                TagKind::GenerateIndex,
            ]
        );
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let detected = DetectedTags {
            clear_preview: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&detected).unwrap();
        assert_eq!(json, serde_json::json!({ "clearPreview": true }));
        assert_eq!(TagKind::GetApprovedSections.to_string(), "getApprovedSections");
    }
}
