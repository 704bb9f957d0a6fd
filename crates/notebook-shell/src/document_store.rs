//! Loading and persisting document contents.

use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use std::path::{Component, Path, PathBuf};

/// Content source and sink for workspace documents, addressed by
/// workspace-relative path.
pub trait DocumentStore: Send + Sync {
    /// Read the full text of `path`. Called only on a cache miss.
    fn load_document<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Replace the contents of `path` with `contents`.
    fn save_document<'a>(&'a self, path: &'a str, contents: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Documents stored as files below a workspace root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace path, refusing anything that would leave the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!("path escapes the workspace: {}", path),
            }
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentStore for FsDocumentStore {
    fn load_document<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String>> {
        async move {
            let full = self.resolve(path)?;
            debug!("[store] Loading {}", full.display());
            tokio::fs::read_to_string(&full)
                .await
                .with_context(|| format!("failed to read {}", full.display()))
        }
        .boxed()
    }

    fn save_document<'a>(&'a self, path: &'a str, contents: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let full = self.resolve(path)?;
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // Write a sibling temp file, then rename it over the target
            let mut tmp = full.clone().into_os_string();
            tmp.push(".tmp");
            let tmp = PathBuf::from(tmp);
            tokio::fs::write(&tmp, contents)
                .await
                .with_context(|| format!("failed to write {}", tmp.display()))?;
            tokio::fs::rename(&tmp, &full)
                .await
                .with_context(|| format!("failed to replace {}", full.display()))?;
            debug!("[store] Saved {} ({} bytes)", full.display(), contents.len());
            Ok(())
        }
        .boxed()
    }
}
