//! JSON snapshot persistence for the in-memory store.
//!
//! Lets separate CLI invocations on the same day share foundations and trade
//! counts. Writes go to a sibling temp file first and are renamed into place,
//! so a crash never leaves a half-written snapshot behind.
//!
//! Overlapping runs are handled twice over: a [`StateLock`] serialises
//! load → mutate → save, and [`save_store`] folds whatever is on disk into the
//! store before writing, so a stale copy can never lower a trade count.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use sessionlab_core::store::{InMemoryStore, StoreSnapshot};
use tracing::{debug, warn};

use crate::error::RunnerError;

const LOCK_POLL: Duration = Duration::from_millis(25);

/// Load a store from `path`; a missing file yields an empty store.
pub fn load_store(path: &Path) -> Result<InMemoryStore, RunnerError> {
    Ok(match read_snapshot(path)? {
        Some(snapshot) => InMemoryStore::from_snapshot(snapshot),
        None => {
            debug!(path = %path.display(), "no state file, starting empty");
            InMemoryStore::new()
        }
    })
}

/// Write `store` to `path`, first merging in the records already saved there.
///
/// Stored foundations are kept and each trade count takes the larger value,
/// so the store may gain records from the file.
pub fn save_store(store: &InMemoryStore, path: &Path) -> Result<(), RunnerError> {
    if let Some(on_disk) = read_snapshot(path)? {
        store.merge(on_disk);
    }
    let json = serde_json::to_string_pretty(&store.snapshot())?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| RunnerError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| RunnerError::io(path, e))?;
    debug!(path = %path.display(), foundations = store.foundation_count(), "state saved");
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<Option<StoreSnapshot>, RunnerError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RunnerError::io(path, e)),
    };
    Ok(Some(serde_json::from_str(&text)?))
}

/// Exclusive hold on a state file, released on drop.
///
/// Backed by a `<state>.lock` file created with `create_new`, which fails for
/// every other holder in any process until the file is removed.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Wait up to `wait` for the lock on `state_path`.
    pub fn acquire(state_path: &Path, wait: Duration) -> Result<Self, RunnerError> {
        let path = lock_path(state_path);
        let deadline = Instant::now() + wait;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(path = %path.display(), "state lock acquired");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(RunnerError::StateLocked { path });
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(RunnerError::io(&path, e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release state lock");
        }
    }
}

fn lock_path(state_path: &Path) -> PathBuf {
    let mut name = OsString::from(state_path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}
