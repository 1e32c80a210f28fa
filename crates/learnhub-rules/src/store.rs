use crate::document::RulesDocument;
use arc_swap::ArcSwapOption;
use learnhub_core::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

struct Snapshot {
    document: Arc<RulesDocument>,
    mtime: Option<SystemTime>,
}

/// Cache for the on-disk rules document, keyed by modification time.
///
/// `load` never fails: a document that cannot be read or parsed falls back
/// to the last good snapshot, or an empty document if none exists yet. The
/// snapshot is swapped atomically, so concurrent readers need no locks.
pub struct RulesStore {
    path: PathBuf,
    snapshot: ArcSwapOption<Snapshot>,
}

impl RulesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: ArcSwapOption::const_empty(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Arc<RulesDocument> {
        let mtime = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok();

        let current = self.snapshot.load_full();
        if let Some(snapshot) = current.as_ref() {
            let stale = mtime.is_some() && mtime != snapshot.mtime;
            if !stale {
                return snapshot.document.clone();
            }
        }

        match self.read_document() {
            Ok(document) => {
                debug!(path = %self.path.display(), "reloaded rules document");
                let document = Arc::new(document);
                self.snapshot.store(Some(Arc::new(Snapshot {
                    document: document.clone(),
                    mtime,
                })));
                document
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    "failed to load rules, keeping previous snapshot: {err}"
                );
                match current {
                    Some(snapshot) => snapshot.document.clone(),
                    None => {
                        // The empty snapshot carries no mtime, so the file is
                        // retried as soon as it shows up on disk.
                        let empty = Arc::new(RulesDocument::default());
                        self.snapshot.store(Some(Arc::new(Snapshot {
                            document: empty.clone(),
                            mtime: None,
                        })));
                        empty
                    }
                }
            }
        }
    }

    fn read_document(&self) -> Result<RulesDocument> {
        let raw = fs::read_to_string(&self.path)?;
        let document: RulesDocument = serde_json::from_str(&raw)?;
        document.validate()?;
        Ok(document)
    }
}
