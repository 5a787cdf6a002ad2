//! On-disk state store.
//!
//! The store is a directory (default `/run/gz302-sleep`) holding one file per
//! [`StateCategory`] plus a `cycle` metadata file. It is the only channel
//! between the pre-suspend and post-resume invocations.
//!
//! # Write Path
//!
//! Each file is written to a hidden temporary next to its final name, synced
//! and renamed into place, so a hook killed mid-write leaves either the old
//! file, the new file, or no file. Never a torn one.
//!
//! # Read Path
//!
//! Reading never fails on content: missing files load as empty categories and
//! malformed lines are skipped with a warning.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use gz302_core::CyclePhase;
use gz302_core::constants::DEFAULT_STATE_DIR;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::state::{CycleInfo, StateCategory, TransitionState};

const CYCLE_FILE: &str = "cycle";
const TEMP_PREFIX: &str = ".";
const TEMP_SUFFIX: &str = ".tmp";

/// A transition state read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCycle {
    pub state: TransitionState,
    pub info: CycleInfo,
}

/// Directory-backed store for one suspend cycle.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_DIR)
    }
}

impl StateStore {
    /// Create a store rooted at `dir`. Nothing is touched on disk.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_names() -> impl Iterator<Item = &'static str> {
        StateCategory::ALL
            .into_iter()
            .map(|c| c.file_name())
            .chain(std::iter::once(CYCLE_FILE))
    }

    /// Whether any store file exists.
    pub fn exists(&self) -> bool {
        Self::file_names().any(|name| self.dir.join(name).exists())
    }

    /// Phase implied by what is on disk.
    pub fn phase(&self) -> CyclePhase {
        if self.exists() {
            CyclePhase::Armed
        } else {
            CyclePhase::Idle
        }
    }

    /// Persist `state` and `info`, replacing any previous content.
    ///
    /// Every category file is written, empty ones included.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` on the first file that cannot be written.
    /// Returns `StorageError::Encode` if the cycle metadata cannot be
    /// serialized.
    /// Files written before the failure stay in place.
    pub fn save(&self, state: &TransitionState, info: &CycleInfo) -> StorageResult<()> {
        self.create_dir()?;
        for category in StateCategory::ALL {
            self.write_atomic(category.file_name(), &state.encode(category))?;
        }
        self.write_atomic(CYCLE_FILE, &info.encode()?)?;
        info!(
            dir = %self.dir.display(),
            nhi = state.nhi_disabled().len(),
            xhci = state.xhci_disabled().len(),
            hid = state.hid_unbound().len(),
            mmc = state.mmc_unbound().len(),
            "State store persisted"
        );
        Ok(())
    }

    /// Read the stored cycle, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` only if the store directory exists but
    /// cannot be inspected. File-level problems become empty categories.
    pub fn load(&self) -> StorageResult<Option<StoredCycle>> {
        match fs::metadata(&self.dir) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        }
        if !self.exists() {
            return Ok(None);
        }

        let mut stored = StoredCycle::default();
        for category in StateCategory::ALL {
            let Some(content) = self.read_optional(category.file_name()) else {
                continue;
            };
            for error in stored.state.decode_into(category, &content) {
                warn!(error = %error, "Skipping malformed state line");
            }
        }
        if let Some(content) = self.read_optional(CYCLE_FILE) {
            stored.info = CycleInfo::decode(&content);
        }
        Ok(Some(stored))
    }

    /// Remove every store file and the directory itself.
    ///
    /// Absent files are not an error, so this is safe on an idle store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if a present file cannot be removed.
    pub fn clear(&self) -> StorageResult<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let ours = Self::file_names().any(|known| known == name)
                || (name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX));
            if !ours {
                debug!(file = %name, "Leaving foreign file in state dir");
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::io(&path, e)),
            }
        }
        // Fails if foreign files remain; the store itself is gone either way.
        if let Err(e) = fs::remove_dir(&self.dir) {
            debug!(dir = %self.dir.display(), error = %e, "State dir not removed");
        }
        Ok(())
    }

    fn create_dir(&self) -> StorageResult<()> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.dir)
            .map_err(|e| StorageError::io(&self.dir, e))
    }

    fn write_atomic(&self, name: &str, content: &str) -> StorageResult<()> {
        let final_path = self.dir.join(name);
        let temp_path = self.dir.join(format!("{TEMP_PREFIX}{name}{TEMP_SUFFIX}"));

        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::io(&temp_path, e));
        }
        fs::rename(&temp_path, &final_path).map_err(|e| StorageError::io(&final_path, e))?;

        // Make the rename itself durable.
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        Ok(())
    }

    fn read_optional(&self, name: &str) -> Option<String> {
        let path = self.dir.join(name);
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(
                    file = %path.display(),
                    error = %e,
                    "State file unreadable, treating as empty"
                );
                None
            }
        }
    }
}
