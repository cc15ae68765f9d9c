// src/control.rs

//! Shared state written by the admin side and read by the sweep loop.
//!
//! [`ControlState`] holds the global pause flag and the per-recipient
//! notification toggles. [`KeywordFile`] owns the keyword list on disk and
//! raises the pause flag while the list is replaced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::storage::local::write_atomic;

/// Pause flag and recipient toggles.
#[derive(Debug, Default)]
pub struct ControlState {
    paused: AtomicBool,
    recipients: RwLock<HashMap<i64, bool>>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop keyword tasks from starting new adapter calls.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub async fn set_recipient_enabled(&self, recipient: i64, enabled: bool) {
        self.recipients.write().await.insert(recipient, enabled);
        log::info!(
            "Notifications {} for {}",
            if enabled { "enabled" } else { "disabled" },
            recipient
        );
    }

    /// Recipients are enabled until they opt out.
    pub async fn is_recipient_enabled(&self, recipient: i64) -> bool {
        self.recipients
            .read()
            .await
            .get(&recipient)
            .copied()
            .unwrap_or(true)
    }
}

/// Parse keyword list contents: one per line, trimmed, blanks ignored.
pub fn parse_keywords(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Result of appending a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Added,
    AlreadyPresent,
}

/// The keyword list file.
#[derive(Debug, Clone)]
pub struct KeywordFile {
    path: PathBuf,
    control: Arc<ControlState>,
}

impl KeywordFile {
    pub fn new(path: impl Into<PathBuf>, control: Arc<ControlState>) -> Self {
        Self {
            path: path.into(),
            control,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current keyword list.
    ///
    /// A missing or unreadable file yields an empty list.
    pub async fn load(&self) -> Vec<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => parse_keywords(&contents),
            Err(e) => {
                log::warn!(
                    "Failed to load keywords from {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Raw file contents, for download.
    pub async fn export(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Append one keyword unless an identical line already exists.
    pub async fn append(&self, keyword: &str) -> Result<AppendOutcome> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::validation("keyword must not be empty"));
        }
        if keyword.contains('\n') || keyword.contains('\r') {
            return Err(AppError::validation("keyword must be a single line"));
        }

        let mut contents = self.export().await?;
        if parse_keywords(&contents).iter().any(|k| k == keyword) {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str(keyword);
        contents.push('\n');

        write_atomic(&self.path, contents.as_bytes()).await?;
        log::info!("Keyword '{}' added to {}", keyword, self.path.display());
        Ok(AppendOutcome::Added)
    }

    /// Replace the whole list.
    ///
    /// The pause flag is raised for the duration of the write and lowered
    /// afterwards, also when the write fails.
    pub async fn replace(&self, contents: &str) -> Result<usize> {
        self.control.pause();
        log::warn!("Keyword list is being replaced, sweeping paused");
        let result = write_atomic(&self.path, contents.as_bytes()).await;
        self.control.resume();

        result?;
        let count = parse_keywords(contents).len();
        log::info!("Keyword list replaced: {} keywords", count);
        Ok(count)
    }
}
