use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::constants::WORKSPACE_PREFIX;

/// Hands out one exclusively owned directory per submission under a shared
/// temporary root.
#[derive(Clone, Debug)]
pub struct Workspaces {
    root: PathBuf,
}

impl Workspaces {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    #[tracing::instrument]
    pub async fn acquire(&self) -> std::io::Result<Workspace> {
        fs::create_dir_all(&self.root).await?;

        // `create_dir` fails on an existing path, so a name is never reused.
        let path = self
            .root
            .join(format!("{}{}", WORKSPACE_PREFIX, Uuid::new_v4()));
        fs::create_dir(&path).await?;

        tracing::debug!("Workspace acquired: {}", path.display());
        Ok(Workspace {
            path,
            released: false,
        })
    }
}

/// Removed recursively on [`Workspace::release`], or on drop if it was
/// never released.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_source(&self, file_name: &str, code: &str) -> std::io::Result<PathBuf> {
        let source_path = self.path.join(file_name);
        fs::write(&source_path, code).await?;
        Ok(source_path)
    }

    /// Never fails: removal errors are logged and swallowed.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = fs::remove_dir_all(&self.path).await {
            log_cleanup_error(&self.path, &e);
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            log_cleanup_error(&self.path, &e);
        }
    }
}

fn log_cleanup_error(path: &Path, error: &std::io::Error) {
    if error.kind() != ErrorKind::NotFound {
        tracing::warn!("Failed to remove workspace {}: {}", path.display(), error);
    }
}
