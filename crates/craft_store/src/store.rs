//! Filesystem project store.
//!
//! Each session identifier owns one directory under the store root:
//! ```text
//! <root>/<userId>/
//! ├── sitemap.json        # {"pages": [{name, slug, order}]}
//! ├── metadata.json       # flat key → value
//! ├── styles.json         # flat key → value
//! ├── conversation.json   # {messages, approvedSections}
//! ├── pending.json        # pending preview (absent when none)
//! ├── preview.html        # live artifact
//! └── index.html          # finalized site
//! ```
//!
//! Documents are created on first write; a missing document reads as empty.
//! Every mutation replaces or merges, so applying the same request twice
//! leaves the same state as applying it once.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use craft_chat::{
    is_valid_user_id, ApprovedSection, ApprovedSections, ConversationMessage, Page,
    PendingPreview, SectionApproval,
};
use craft_tags::Entries;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

const SITEMAP: &str = "sitemap.json";
const METADATA: &str = "metadata.json";
const STYLES: &str = "styles.json";
const CONVERSATION: &str = "conversation.json";
const PENDING: &str = "pending.json";
const PREVIEW_HTML: &str = "preview.html";
const INDEX_HTML: &str = "index.html";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SitemapDocument {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationDocument {
    #[serde(default)]
    messages: Vec<ConversationMessage>,
    #[serde(default)]
    approved_sections: ApprovedSections,
}

/// Everything stored for one session, as printed by `sitecraft show`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub user_id: String,
    pub sitemap: Vec<Page>,
    pub metadata: Entries,
    pub styles: Entries,
    pub pending_preview: Option<PendingPreview>,
    pub approved_sections: ApprovedSections,
    pub message_count: usize,
    pub finalized: bool,
}

/// Project documents on disk.
///
/// Clones share one write lock, so read-modify-write cycles never interleave.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl ProjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL path of a session's live preview artifact.
    pub fn preview_url(user_id: &str) -> String {
        format!("/preview/{}", user_id)
    }

    /// Replace the sitemap. Blank names are dropped.
    pub fn set_sitemap(&self, user_id: &str, names: &[String]) -> StoreResult<Vec<Page>> {
        let dir = self.writable_dir(user_id)?;
        let names: Vec<&str> = names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();
        let pages = Page::sequence(&names);

        let _guard = self.lock.lock();
        write_json(
            &dir.join(SITEMAP),
            &SitemapDocument {
                pages: pages.clone(),
            },
        )?;
        info!("Sitemap for {} set to {} pages", user_id, pages.len());
        Ok(pages)
    }

    pub fn merge_metadata(&self, user_id: &str, entries: &Entries) -> StoreResult<Entries> {
        self.merge_entries(user_id, METADATA, entries)
    }

    pub fn merge_styles(&self, user_id: &str, entries: &Entries) -> StoreResult<Entries> {
        self.merge_entries(user_id, STYLES, entries)
    }

    /// Make `section` the pending preview and publish it as the live artifact.
    pub fn set_preview(&self, user_id: &str, section: &str, html: &str) -> StoreResult<String> {
        let dir = self.writable_dir(user_id)?;
        let _guard = self.lock.lock();

        write_json(
            &dir.join(PENDING),
            &PendingPreview {
                section: section.to_string(),
                html: html.to_string(),
            },
        )?;
        write_atomic(&dir.join(PREVIEW_HTML), html)?;
        debug!("Pending preview for {}: {}", user_id, section);
        Ok(Self::preview_url(user_id))
    }

    /// Drop the pending preview; the live artifact falls back to the approved
    /// sections.
    pub fn clear_preview(&self, user_id: &str) -> StoreResult<()> {
        let dir = self.writable_dir(user_id)?;
        let _guard = self.lock.lock();

        remove_if_exists(&dir.join(PENDING))?;
        let conversation: ConversationDocument = read_json(&dir.join(CONVERSATION))?;
        write_atomic(
            &dir.join(PREVIEW_HTML),
            &render_approved(&conversation.approved_sections),
        )?;
        Ok(())
    }

    /// Publish the generated site.
    pub fn finalize(&self, user_id: &str, html: &str) -> StoreResult<()> {
        let dir = self.writable_dir(user_id)?;
        let _guard = self.lock.lock();

        write_atomic(&dir.join(INDEX_HTML), html)?;
        write_atomic(&dir.join(PREVIEW_HTML), html)?;
        remove_if_exists(&dir.join(PENDING))?;
        info!("Finalized site for {}", user_id);
        Ok(())
    }

    /// Stored history and approvals; empty for an unknown session.
    pub fn load_conversation(
        &self,
        user_id: &str,
    ) -> StoreResult<(Vec<ConversationMessage>, ApprovedSections)> {
        let dir = self.user_dir(user_id)?;
        let document: ConversationDocument = read_json(&dir.join(CONVERSATION))?;
        Ok((document.messages, document.approved_sections))
    }

    /// Replace the stored history, recording an approval when given.
    ///
    /// An approval overwrites any earlier entry for the same section and
    /// clears the pending preview if it names that section. Returns the
    /// stored message count.
    pub fn save_conversation(
        &self,
        user_id: &str,
        messages: &[ConversationMessage],
        approval: Option<&SectionApproval>,
    ) -> StoreResult<usize> {
        let dir = self.writable_dir(user_id)?;
        let _guard = self.lock.lock();

        let path = dir.join(CONVERSATION);
        let mut document: ConversationDocument = read_json(&path)?;
        document.messages = messages.to_vec();

        if let Some(approval) = approval {
            document.approved_sections.insert(
                approval.section.clone(),
                ApprovedSection {
                    html: approval.html.clone(),
                    approved_at: Utc::now(),
                },
            );

            let pending_path = dir.join(PENDING);
            let pending: Option<PendingPreview> = read_optional(&pending_path)?;
            if pending.is_some_and(|p| p.section == approval.section) {
                remove_if_exists(&pending_path)?;
            }
            info!("Section '{}' approved for {}", approval.section, user_id);
        }

        write_json(&path, &document)?;
        Ok(document.messages.len())
    }

    /// Read every document of a session.
    pub fn snapshot(&self, user_id: &str) -> StoreResult<ProjectSnapshot> {
        let dir = self.user_dir(user_id)?;
        let sitemap: SitemapDocument = read_json(&dir.join(SITEMAP))?;
        let conversation: ConversationDocument = read_json(&dir.join(CONVERSATION))?;

        Ok(ProjectSnapshot {
            user_id: user_id.to_string(),
            sitemap: sitemap.pages,
            metadata: read_json(&dir.join(METADATA))?,
            styles: read_json(&dir.join(STYLES))?,
            pending_preview: read_optional(&dir.join(PENDING))?,
            approved_sections: conversation.approved_sections,
            message_count: conversation.messages.len(),
            finalized: dir.join(INDEX_HTML).exists(),
        })
    }

    /// Contents of the live artifact, if one was written.
    pub fn live_html(&self, user_id: &str) -> StoreResult<Option<String>> {
        let path = self.user_dir(user_id)?.join(PREVIEW_HTML);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn merge_entries(&self, user_id: &str, file: &str, entries: &Entries) -> StoreResult<Entries> {
        let dir = self.writable_dir(user_id)?;
        let _guard = self.lock.lock();

        let path = dir.join(file);
        let mut merged: Entries = read_json(&path)?;
        merged.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        write_json(&path, &merged)?;
        debug!("Merged {} entries into {}/{}", entries.len(), user_id, file);
        Ok(merged)
    }

    /// Session directory; session identifiers must be plain names.
    fn user_dir(&self, user_id: &str) -> StoreResult<PathBuf> {
        if !is_valid_user_id(user_id) {
            return Err(StoreError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.root.join(user_id))
    }

    /// Session directory, created on first mutation.
    fn writable_dir(&self, user_id: &str) -> StoreResult<PathBuf> {
        let dir = self.user_dir(user_id)?;
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Approved sections in name order, wrapped in a minimal page.
fn render_approved(sections: &ApprovedSections) -> String {
    let body: Vec<&str> = sections.values().map(|s| s.html.as_str()).collect();
    format!(
        "<!DOCTYPE html>\n<html>\n<body>\n{}\n</body>\n</html>\n",
        body.join("\n")
    )
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    Ok(read_optional(path)?.unwrap_or_default())
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::CorruptDocument {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Write through a temporary file so readers never see a partial document.
fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    write_atomic(path, &serde_json::to_string_pretty(value)?)
}

/// Write to a sibling `.tmp` file, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> StoreResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> StoreResult<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ProjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path());
        (dir, store)
    }

    fn entries(pairs: &[(&str, &str)]) -> Entries {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unknown_session_reads_empty() {
        let (_dir, store) = store();
        let snapshot = store.snapshot("fresh").unwrap();
        assert!(snapshot.sitemap.is_empty());
        assert!(snapshot.metadata.is_empty());
        assert!(snapshot.pending_preview.is_none());
        assert!(!snapshot.finalized);
    }

    #[test]
    fn test_sitemap_replaces() {
        let (_dir, store) = store();
        let names = vec!["Home".to_string(), " ".to_string(), "About Us".to_string()];
        store.set_sitemap("u1", &names).unwrap();
        store.set_sitemap("u1", &names).unwrap();

        let pages = store.snapshot("u1").unwrap().sitemap;
        assert_eq!(pages, vec![Page::new("Home", 1), Page::new("About Us", 2)]);
    }

    #[test]
    fn test_metadata_merges() {
        let (_dir, store) = store();
        store.merge_metadata("u1", &entries(&[("a", "1")])).unwrap();
        let merged = store
            .merge_metadata("u1", &entries(&[("b", "2"), ("a", "3")]))
            .unwrap();

        assert_eq!(merged, entries(&[("a", "3"), ("b", "2")]));
        assert!(store.snapshot("u1").unwrap().styles.is_empty());
    }

    #[test]
    fn test_approval_clears_matching_pending() {
        let (_dir, store) = store();
        store.set_preview("u1", "hero", "<h1>v1</h1>").unwrap();

        let approval = SectionApproval {
            section: "hero".into(),
            html: "<h1>v1</h1>".into(),
        };
        store.save_conversation("u1", &[], Some(&approval)).unwrap();
        store.save_conversation("u1", &[], Some(&approval)).unwrap();

        let snapshot = store.snapshot("u1").unwrap();
        assert!(snapshot.pending_preview.is_none());
        assert_eq!(snapshot.approved_sections.len(), 1);
    }

    #[test]
    fn test_approval_keeps_other_pending() {
        let (_dir, store) = store();
        store.set_preview("u1", "about", "<p>about</p>").unwrap();

        let approval = SectionApproval {
            section: "hero".into(),
            html: "<h1/>".into(),
        };
        store.save_conversation("u1", &[], Some(&approval)).unwrap();
        assert_eq!(
            store.snapshot("u1").unwrap().pending_preview.unwrap().section,
            "about"
        );
    }

    #[test]
    fn test_clear_preview_keeps_approved() {
        let (_dir, store) = store();
        let approval = SectionApproval {
            section: "hero".into(),
            html: "<h1>Bakery</h1>".into(),
        };
        store.save_conversation("u1", &[], Some(&approval)).unwrap();
        store.set_preview("u1", "about", "<p>draft</p>").unwrap();
        store.clear_preview("u1").unwrap();

        let snapshot = store.snapshot("u1").unwrap();
        assert!(snapshot.pending_preview.is_none());
        assert_eq!(snapshot.approved_sections.len(), 1);

        let live = store.live_html("u1").unwrap().unwrap();
        assert!(live.contains("<h1>Bakery</h1>"));
        assert!(!live.contains("draft"));
    }

    #[test]
    fn test_finalize_writes_index() {
        let (dir, store) = store();
        store.set_preview("u1", "hero", "x").unwrap();
        store.finalize("u1", "<html>done</html>").unwrap();

        let snapshot = store.snapshot("u1").unwrap();
        assert!(snapshot.finalized);
        assert!(snapshot.pending_preview.is_none());
        assert_eq!(
            fs::read_to_string(dir.path().join("u1").join("index.html")).unwrap(),
            "<html>done</html>"
        );
    }

    #[test]
    fn test_html_writes_leave_no_temp_files() {
        let (dir, store) = store();
        store.set_preview("u1", "hero", "<h1>Hi</h1>").unwrap();
        store.clear_preview("u1").unwrap();
        store.finalize("u1", "<html>done</html>").unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("u1"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
        assert_eq!(
            fs::read_to_string(dir.path().join("u1").join("preview.html")).unwrap(),
            "<html>done</html>"
        );
    }

    #[test]
    fn test_rejects_path_like_user_ids() {
        let (_dir, store) = store();
        for id in ["", "../etc", "a/b", "a b"] {
            assert!(matches!(
                store.snapshot(id),
                Err(StoreError::InvalidUserId(_))
            ));
        }
    }

    #[test]
    fn test_corrupt_document_is_reported() {
        let (dir, store) = store();
        fs::create_dir_all(dir.path().join("u1")).unwrap();
        fs::write(dir.path().join("u1").join("styles.json"), "[1, 2").unwrap();

        assert!(matches!(
            store.merge_styles("u1", &Entries::new()),
            Err(StoreError::CorruptDocument { .. })
        ));
    }
}
