//! Single-writer coordination for index builds across processes.
//!
//! The lock file carries an owner token; a holder only ever refreshes or
//! removes a file that still carries its own token. Holders refresh the file's
//! mtime while they work, so `stale_after` measures time since the last sign
//! of life rather than time since acquisition.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use histrag_core::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    token: String,
    created_at: String,
}

fn read_token(path: &Path) -> Option<String> {
    let body = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<LockInfo>(&body).ok().map(|info| info.token)
}

/// Held while this process builds the index; the lock file is removed on drop.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
    token: String,
}

impl BuildLock {
    /// `<index_path>.lock`, next to the index directory.
    pub fn path_for(index_path: &Path) -> PathBuf {
        let mut name = index_path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "index".into());
        name.push(".lock");
        index_path.with_file_name(name)
    }

    /// Create the lock file exclusively. `None` when another holder exists.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let pid = std::process::id();
                let token = format!("{pid}-{}", uuid::Uuid::new_v4());
                let info = LockInfo { pid, token: token.clone(), created_at: chrono::Utc::now().to_rfc3339() };
                let body = serde_json::to_string(&info).map_err(|e| Error::Operation(e.to_string()))?;
                file.write_all(body.as_bytes())?;
                file.sync_all()?;
                debug!(lock = %path.display(), token = %token, "acquired build lock");
                Ok(Some(Self { path: path.to_path_buf(), token }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the file at the lock path is still ours.
    pub fn is_held(&self) -> bool {
        read_token(&self.path).as_deref() == Some(self.token.as_str())
    }

    /// Heartbeat: bump the lock file's mtime. Fails when the lock was taken
    /// over by someone else, so the caller can stop before publishing.
    pub fn refresh(&self) -> Result<()> {
        if !self.is_held() {
            return Err(Error::Operation(format!("build lock {} is no longer held", self.path.display())));
        }
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_modified(SystemTime::now())?;
        Ok(())
    }

    /// Wait until the lock at `path` is released. A lock not refreshed for
    /// longer than `stale_after` is assumed abandoned and broken.
    pub async fn wait_released(path: &Path, stale_after: Duration) -> Result<()> {
        info!(lock = %path.display(), "index build in progress elsewhere; waiting");
        loop {
            let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            let age = SystemTime::now().duration_since(modified).unwrap_or_default();
            if age > stale_after {
                let stale_token = read_token(path);
                warn!(
                    lock = %path.display(),
                    age_secs = age.as_secs(),
                    holder = stale_token.as_deref().unwrap_or("unknown"),
                    "breaking stale build lock"
                );
                break_stale(path, stale_token.as_deref())?;
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Move the lock aside atomically, then make sure what we moved is the lock we
/// judged stale. If another waiter already replaced it with a fresh lock, put
/// that one back.
fn break_stale(path: &Path, stale_token: Option<&str>) -> Result<()> {
    let mut aside = path.as_os_str().to_os_string();
    aside.push(format!(".{}.stale", uuid::Uuid::new_v4()));
    let aside = PathBuf::from(aside);

    match std::fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }
    if read_token(&aside).as_deref() != stale_token {
        // `hard_link` never overwrites, so a lock created in the meantime wins.
        match std::fs::hard_link(&aside, path) {
            Ok(()) => debug!(lock = %path.display(), "restored a fresh lock taken by another waiter"),
            Err(e) => warn!(lock = %path.display(), error = %e, "could not restore replaced build lock"),
        }
    }
    std::fs::remove_file(&aside)?;
    Ok(())
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if !self.is_held() {
            warn!(lock = %self.path.display(), "build lock was taken over; leaving it in place");
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to release build lock");
        }
    }
}
