//! In-memory conversation store mirrored to a line-delimited JSON document.
//!
//! The store owns every conversation. Positions are the ids: removing a record
//! shifts every later id down by one. Each mutation rewrites the whole backing
//! document before returning (write-through); a failed write is logged and the
//! in-memory state stays authoritative.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dataset::codec::{decode_document, encode_document};
use crate::dataset::core::config::{LoadPolicy, StorageConfig};
use crate::dataset::core::errors::{DatasetError, DatasetResult};
use crate::dataset::core::message::Conversation;

/// Result of writing the backing document after a mutation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SaveOutcome {
    /// The document now matches memory.
    Written,
    /// The store has no backing document.
    Skipped,
    /// The write failed; the document on disk is stale.
    Failed,
}

/// Summary of a load.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoadReport {
    /// Conversations now in memory.
    pub loaded: usize,
    /// Lines skipped under [`LoadPolicy::SkipInvalid`].
    pub skipped: usize,
    /// Whether a failure discarded the document and left the store empty.
    pub reset: bool,
}

/// Ordered, position-indexed collection of conversations.
#[derive(Debug)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    backing: Option<PathBuf>,
    load_policy: LoadPolicy,
    last_save: Option<SaveOutcome>,
}

impl ConversationStore {
    /// Create an empty store with no backing document.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self {
            conversations: Vec::new(),
            backing: None,
            load_policy: LoadPolicy::Strict,
            last_save: None,
        }
    }

    /// Open a store backed by `path` and load it.
    ///
    /// Load problems never fail the call; see [`Self::reload`].
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, load_policy: LoadPolicy) -> Self {
        let mut store = Self {
            conversations: Vec::new(),
            backing: Some(path.into()),
            load_policy,
            last_save: None,
        };
        store.reload();
        store
    }

    /// Open a store from storage settings.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::open(config.data_file.clone(), config.load_policy)
    }

    /// Re-read the backing document, replacing memory.
    ///
    /// A missing document yields an empty store. An unreadable document, or a
    /// corrupt line under [`LoadPolicy::Strict`], is logged and also yields an
    /// empty store.
    pub fn reload(&mut self) -> LoadReport {
        self.conversations.clear();

        let Some(path) = self.backing.as_deref() else {
            return LoadReport::default();
        };

        if !path.exists() {
            info!("no dataset at {}, starting empty", path.display());
            return LoadReport::default();
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                error!("Error loading conversations from {}: {err}", path.display());
                return LoadReport {
                    reset: true,
                    ..LoadReport::default()
                };
            }
        };

        match decode_document(&text, self.load_policy) {
            Ok(decoded) => {
                let report = LoadReport {
                    loaded: decoded.conversations.len(),
                    skipped: decoded.skipped_lines.len(),
                    reset: false,
                };
                self.conversations = decoded.conversations;
                if report.skipped > 0 {
                    warn!(
                        "loaded {} conversations from {}, skipped {} unreadable lines",
                        report.loaded,
                        path.display(),
                        report.skipped
                    );
                } else {
                    info!("loaded {} conversations from {}", report.loaded, path.display());
                }
                report
            }
            Err(err) => {
                error!("Error loading conversations from {}: {err}", path.display());
                LoadReport {
                    reset: true,
                    ..LoadReport::default()
                }
            }
        }
    }

    /// Number of conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// All conversations in order.
    #[must_use]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Conversation at `id`.
    ///
    /// # Errors
    /// Returns [`DatasetError::IndexOutOfRange`] if `id` is past the end.
    pub fn get(&self, id: usize) -> DatasetResult<&Conversation> {
        self.conversations.get(id).ok_or(DatasetError::IndexOutOfRange {
            index: id,
            len: self.conversations.len(),
        })
    }

    /// Outcome of the most recent write, if any mutation happened yet.
    #[must_use]
    pub const fn last_save(&self) -> Option<SaveOutcome> {
        self.last_save
    }

    /// Add a conversation at the end and return its id.
    pub fn append(&mut self, conversation: Conversation) -> usize {
        self.conversations.push(conversation);
        let id = self.conversations.len() - 1;
        debug!("appended conversation {id}");
        self.save();
        id
    }

    /// Overwrite the conversation at `id`, returning the previous record.
    ///
    /// # Errors
    /// Returns [`DatasetError::IndexOutOfRange`] if `id` is past the end.
    pub fn replace(&mut self, id: usize, conversation: Conversation) -> DatasetResult<Conversation> {
        self.check_index(id)?;
        let previous = std::mem::replace(&mut self.conversations[id], conversation);
        debug!("replaced conversation {id}");
        self.save();
        Ok(previous)
    }

    /// Remove and return the conversation at `id`. Later ids shift down by one.
    ///
    /// # Errors
    /// Returns [`DatasetError::IndexOutOfRange`] if `id` is past the end.
    pub fn remove_at(&mut self, id: usize) -> DatasetResult<Conversation> {
        self.check_index(id)?;
        let removed = self.conversations.remove(id);
        debug!("removed conversation {id}");
        self.save();
        Ok(removed)
    }

    /// Remove everything and return how many records were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.conversations.len();
        self.conversations.clear();
        info!("cleared {count} conversations");
        self.save();
        count
    }

    /// The document text `save` would write, without touching the backing file.
    ///
    /// # Errors
    /// Returns [`DatasetError::EmptyStore`] when there is nothing to export.
    pub fn export_document(&self) -> DatasetResult<String> {
        if self.conversations.is_empty() {
            return Err(DatasetError::EmptyStore);
        }
        encode_document(&self.conversations)
    }

    /// Rewrite the backing document, logging instead of failing.
    pub fn save(&mut self) -> SaveOutcome {
        let outcome = if self.backing.is_none() {
            SaveOutcome::Skipped
        } else {
            match self.flush() {
                Ok(()) => SaveOutcome::Written,
                Err(err) => {
                    error!("Error saving conversations: {err}");
                    SaveOutcome::Failed
                }
            }
        };
        self.last_save = Some(outcome);
        outcome
    }

    /// Rewrite the backing document, returning the raw error on failure.
    ///
    /// The document is written to a sibling temporary file and renamed over
    /// the target, so readers never see a half-written file.
    ///
    /// # Errors
    /// Returns an error if serialization or any filesystem step fails.
    pub fn flush(&self) -> DatasetResult<()> {
        let Some(path) = self.backing.as_deref() else {
            return Ok(());
        };
        let document = encode_document(&self.conversations)?;
        write_atomically(path, document.as_bytes())?;
        Ok(())
    }

    fn check_index(&self, id: usize) -> DatasetResult<()> {
        if id < self.conversations.len() {
            Ok(())
        } else {
            Err(DatasetError::IndexOutOfRange {
                index: id,
                len: self.conversations.len(),
            })
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Write `bytes` to `path` through a temporary sibling file and a rename.
///
/// # Errors
/// Returns an error if the parent directory, the temporary file or the rename
/// cannot be handled.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map_or_else(|| "dataset".into(), |name| name.to_string_lossy());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    fs::write(&tmp, bytes)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::core::message::Message;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("convo-dataset-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample(tag: &str) -> Conversation {
        Conversation::new(vec![
            Message::user(format!("q-{tag}")),
            Message::assistant(format!("a-{tag}"), 1),
        ])
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = temp_dir();
        let store = ConversationStore::open(dir.join("conversations.jsonl"), LoadPolicy::Strict);
        assert!(store.is_empty());
        assert_eq!(store.last_save(), None);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = temp_dir();
        let path = dir.join("conversations.jsonl");

        let mut store = ConversationStore::open(&path, LoadPolicy::Strict);
        store.append(sample("1"));
        store.append(Conversation::new(vec![
            Message::system("Sei breve."),
            Message::user("Ciao ☕"),
            Message::assistant("Salve", 0),
        ]));
        assert_eq!(store.last_save(), Some(SaveOutcome::Written));

        let reopened = ConversationStore::open(&path, LoadPolicy::Strict);
        assert_eq!(reopened.conversations(), store.conversations());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Ciao ☕"));
        assert_eq!(raw.lines().count(), 2);
    }

    #[test]
    fn test_existing_document_with_large_weight_survives_append() {
        let dir = temp_dir();
        let path = dir.join("conversations.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"messages": [{"role": "system", "content": "sys"}, {"role": "user", "content": "Hi"}, {"role": "assistant", "content": "Hello", "weight": 1}]}"#,
                "\n",
                r#"{"messages": [{"role": "user", "content": "Big"}, {"role": "assistant", "content": "Weight", "weight": 5000000000}]}"#,
                "\n",
            ),
        )
        .unwrap();

        let mut store = ConversationStore::open(&path, LoadPolicy::Strict);
        assert_eq!(store.len(), 2);
        store.append(sample("3"));
        assert_eq!(store.last_save(), Some(SaveOutcome::Written));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);

        let reopened = ConversationStore::open(&path, LoadPolicy::Strict);
        assert_eq!(reopened.conversations(), store.conversations());
        assert_eq!(
            reopened.get(1).unwrap().messages[1],
            Message::assistant("Weight", 5_000_000_000)
        );
    }

    #[test]
    fn test_strict_load_resets_on_corrupt_line() {
        let dir = temp_dir();
        let path = dir.join("conversations.jsonl");
        let mut store = ConversationStore::open(&path, LoadPolicy::Strict);
        store.append(sample("1"));
        store.append(sample("2"));

        let mut raw = fs::read_to_string(&path).unwrap();
        raw.push_str("{oops\n");
        fs::write(&path, raw).unwrap();

        let mut strict = ConversationStore::open(&path, LoadPolicy::Strict);
        assert!(strict.is_empty());
        assert!(strict.reload().reset);

        let mut tolerant = ConversationStore::open(&path, LoadPolicy::SkipInvalid);
        assert_eq!(tolerant.len(), 2);
        let report = tolerant.reload();
        assert_eq!(report, LoadReport { loaded: 2, skipped: 1, reset: false });
    }

    #[test]
    fn test_append_then_remove_restores_store() {
        let mut store = ConversationStore::in_memory();
        store.append(sample("1"));
        let before = store.conversations().to_vec();

        let id = store.append(sample("2"));
        assert_eq!(id, 1);
        let removed = store.remove_at(id).unwrap();
        assert_eq!(removed, sample("2"));
        assert_eq!(store.conversations(), before.as_slice());
        assert_eq!(store.last_save(), Some(SaveOutcome::Skipped));
    }

    #[test]
    fn test_replace_only_touches_target() {
        let mut store = ConversationStore::in_memory();
        for tag in ["a", "b", "c"] {
            store.append(sample(tag));
        }

        let previous = store.replace(1, sample("z")).unwrap();
        assert_eq!(previous, sample("b"));
        assert_eq!(
            store.conversations(),
            &[sample("a"), sample("z"), sample("c")]
        );
    }

    #[test]
    fn test_remove_shifts_later_ids() {
        let mut store = ConversationStore::in_memory();
        for tag in ["a", "b", "c"] {
            store.append(sample(tag));
        }

        store.remove_at(1).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap(), &sample("c"));
    }

    #[test]
    fn test_out_of_range_ids() {
        let mut store = ConversationStore::in_memory();
        store.append(sample("a"));

        assert!(matches!(
            store.replace(1, sample("x")),
            Err(DatasetError::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert!(matches!(
            store.remove_at(5),
            Err(DatasetError::IndexOutOfRange { index: 5, len: 1 })
        ));
        assert!(store.get(1).is_err());
        assert_eq!(store.conversations(), &[sample("a")]);
    }

    #[test]
    fn test_clear_persists_empty_document() {
        let dir = temp_dir();
        let path = dir.join("conversations.jsonl");
        let mut store = ConversationStore::open(&path, LoadPolicy::Strict);
        store.append(sample("a"));
        store.append(sample("b"));

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert_eq!(store.clear(), 0);
    }

    #[test]
    fn test_export_document() {
        let mut store = ConversationStore::in_memory();
        assert!(matches!(store.export_document(), Err(DatasetError::EmptyStore)));

        store.append(sample("a"));
        store.append(sample("b"));
        let doc = store.export_document().unwrap();
        assert_eq!(doc.lines().count(), 2);
        for line in doc.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["messages"].is_array());
        }
    }

    #[test]
    fn test_export_does_not_touch_backing_file() {
        let dir = temp_dir();
        let path = dir.join("conversations.jsonl");
        let mut store = ConversationStore::open(&path, LoadPolicy::Strict);
        store.append(sample("a"));
        fs::write(&path, "").unwrap();

        let doc = store.export_document().unwrap();
        assert_eq!(doc.lines().count(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_save_failure_keeps_memory() {
        let dir = temp_dir();
        // A directory where the document should be makes the rename fail.
        let path = dir.join("blocked");
        fs::create_dir_all(path.join("inner")).unwrap();

        let mut store = ConversationStore::open(&path, LoadPolicy::Strict);
        assert!(store.reload().reset);
        let id = store.append(sample("a"));
        assert_eq!(id, 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.last_save(), Some(SaveOutcome::Failed));
        assert!(store.flush().unwrap_err().is_persistence());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = temp_dir();
        let path = dir.join("nested").join("deeper").join("data.jsonl");
        write_atomically(&path, b"{}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
