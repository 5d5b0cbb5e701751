//! Record of origins that have been fetched successfully.
//!
//! One `scheme://host` per line, loaded once at startup and rewritten
//! through a temporary file and a rename whenever a new origin shows up.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::WorkerResult;

#[derive(Debug, Default)]
struct OriginSet {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

/// Append-only set of supported origins backed by a line-oriented file.
#[derive(Debug)]
pub struct SupportedOrigins {
    path: PathBuf,
    inner: Mutex<OriginSet>,
}

impl SupportedOrigins {
    /// Load the record at `path`; a missing file is an empty set.
    pub async fn load(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut set = OriginSet::default();

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    if set.seen.insert(line.to_string()) {
                        set.ordered.push(line.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(path = %path.display(), count = set.ordered.len(), "Loaded supported origins");
        Ok(Self {
            path,
            inner: Mutex::new(set),
        })
    }

    /// Add `origin`. Returns `false` (and writes nothing) if it was already known.
    pub async fn register(&self, origin: &str) -> WorkerResult<bool> {
        let mut set = self.inner.lock().await;
        if set.seen.contains(origin) {
            return Ok(false);
        }

        let mut content = set.ordered.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(origin);
        content.push('\n');

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        set.seen.insert(origin.to_string());
        set.ordered.push(origin.to_string());
        debug!(origin, "Registered new supported origin");
        Ok(true)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.ordered.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, origin: &str) -> bool {
        self.inner.lock().await.seen.contains(origin)
    }

    /// All origins, sorted.
    pub async fn sorted(&self) -> Vec<String> {
        let mut all = self.inner.lock().await.ordered.clone();
        all.sort();
        all
    }
}
