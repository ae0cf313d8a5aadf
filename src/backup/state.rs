//! Persisted record of previous runs.
//!
//! The state file doubles as configuration: it remembers the info tool
//! binary, the backup directory, the content hashes of every APK already
//! extracted, and the memoized results of the theming engine detection.

use crate::backup::hasher::ContentHash;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::validate::validate_tool_path;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use validator::Validate;

pub static DEFAULT_STATE_FILE_NAME: &str = "apk_backup_state.yml";

#[skip_serializing_none]
#[derive(Clone, Default, Serialize, Deserialize, Debug, PartialEq, Eq, Validate)]
#[serde(deny_unknown_fields)]
pub struct BackupState {
    #[validate(custom(function = validate_tool_path))]
    pub tool_path: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    #[serde(default)]
    pub known_hashes: BTreeSet<ContentHash>,
    pub overlay_engine: Option<bool>,
    pub variant_engine: Option<bool>,
}

impl BackupState {
    pub fn is_known(&self, hash: &ContentHash) -> bool {
        self.known_hashes.contains(hash)
    }

    /// Adds a hash. The set only ever grows.
    pub fn record_hash(&mut self, hash: ContentHash) -> bool {
        self.known_hashes.insert(hash)
    }

    /// Drops a stored tool path that no longer points at a file so that it
    /// gets rediscovered.
    pub fn forget_invalid_tool_path(&mut self) {
        if let Err(e) = self.validate() {
            tracing::warn!("Stored info tool is no longer usable, rediscovering: {e}");
            self.tool_path = None;
        }
    }
}

/// Whole-file load/save/delete of a [`BackupState`].
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// `apk_backup_state.yml` next to the running executable.
    pub fn beside_executable() -> Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::new(dir.join(DEFAULT_STATE_FILE_NAME)))
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Option<BackupState>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_yml::from_reader::<_, BackupState>(BufReader::new(file))
            .map(Some)
            .map_err(Error::from)
            .with_msg(format!(
                "Parse state file failed, use --reset to start over: {:?}",
                &self.path
            ))
    }

    pub fn load_or_default(&self) -> Result<BackupState> {
        let mut state = match self.load()? {
            Some(state) => {
                tracing::info!(
                    "Loaded state from {:?} ({} known hashes)",
                    &self.path,
                    state.known_hashes.len()
                );
                state
            }
            None => {
                tracing::info!("No state at {:?}, starting fresh", &self.path);
                BackupState::default()
            }
        };
        state.forget_invalid_tool_path();
        Ok(state)
    }

    /// Writes through a temporary file in the same directory, then renames it
    /// over the old state.
    pub fn save(&self, state: &BackupState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_yml::to_writer(&mut writer, state)?;
            writer.flush()?;
        }
        tmp.persist(&self.path)
            .map_err(|e| Error::from(e.error))
            .with_msg(format!("Write state file failed: {:?}", &self.path))?;
        tracing::debug!("Saved state to {:?}", &self.path);
        Ok(())
    }

    /// Deletes the state file. Returns whether there was one.
    pub fn reset(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::from(e).with_msg(format!("Delete {:?} failed", &self.path))),
        }
    }
}
