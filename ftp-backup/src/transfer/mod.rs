//! Remote archive store access.
//!
//! Every logical operation (probe, upload, prune, directory ensure) opens
//! its own session through a [`Connector`] and closes it when the operation
//! returns, whether it succeeded or not.

pub mod ftp;
pub mod progress;

#[cfg(test)]
pub(crate) mod memory;

use crate::retention::{self, RetentionPolicy};
use crate::utils::errors::{BackupError, Result};
use progress::{format_bytes, format_duration, ProgressReader};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One authenticated conversation with the remote store.
pub trait RemoteSession {
    fn login(&mut self, user: &str, pass: &str) -> Result<()>;

    /// Change the working directory
    fn cwd(&mut self, path: &str) -> Result<()>;

    /// Current working directory
    fn pwd(&mut self) -> Result<String>;

    fn mkdir(&mut self, path: &str) -> Result<()>;

    /// Store `reader` as `name` in the working directory, in binary mode
    fn put(&mut self, name: &str, reader: &mut dyn Read) -> Result<u64>;

    /// Names in the working directory, as the server reports them
    fn list(&mut self) -> Result<Vec<String>>;

    fn delete(&mut self, name: &str) -> Result<()>;

    fn quit(&mut self) -> Result<()>;
}

/// Opens unauthenticated sessions to a remote store.
pub trait Connector {
    type Session: RemoteSession;

    fn connect(&self) -> Result<Self::Session>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"***")
            .finish()
    }
}

/// A session that quits when dropped.
struct ScopedSession<S: RemoteSession> {
    session: S,
}

impl<S: RemoteSession> Deref for ScopedSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: RemoteSession> DerefMut for ScopedSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: RemoteSession> Drop for ScopedSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.session.quit() {
            debug!("Error closing remote session: {}", e);
        }
    }
}

/// Change into `path`, creating it first if the change fails.
///
/// Returns the absolute directory the session ended up in. Passing that
/// back in on a later call changes nothing.
pub fn ensure_directory<S: RemoteSession + ?Sized>(session: &mut S, path: &str) -> Result<String> {
    if session.cwd(path).is_err() {
        debug!(dir = %path, "Remote directory missing, creating it");
        session.mkdir(path)?;
        session.cwd(path)?;
    }

    Ok(session.pwd().unwrap_or_else(|_| path.to_string()))
}

/// Last path segment of a listing entry; some servers answer NLST with
/// `dir/name`.
fn entry_name(raw: &str) -> &str {
    let trimmed = raw.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// A finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub bytes: u64,
    /// Absolute remote directory holding the file
    pub remote_dir: String,
}

/// Client for the remote archive store.
pub struct TransferClient<C: Connector> {
    connector: C,
    credentials: Credentials,
}

impl<C: Connector> TransferClient<C> {
    pub fn new(connector: C, credentials: Credentials) -> Self {
        Self {
            connector,
            credentials,
        }
    }

    fn open(&self) -> Result<ScopedSession<C::Session>> {
        let session = self.connector.connect()?;
        let mut scoped = ScopedSession { session };
        scoped.login(&self.credentials.user, &self.credentials.pass)?;
        Ok(scoped)
    }

    /// Connect, authenticate and disconnect.
    pub fn probe(&self) -> Result<()> {
        match self.open() {
            Ok(_session) => {
                info!(user = %self.credentials.user, "Remote store reachable");
                Ok(())
            }
            Err(e) => Err(BackupError::Connectivity(e.to_string())),
        }
    }

    /// Make sure `path` exists on the remote store. Returns its absolute path.
    pub fn ensure_directory(&self, path: &str) -> Result<String> {
        let mut session = self.open()?;
        ensure_directory(&mut *session, path)
    }

    /// Upload `local_file` into `remote_dir` under its base name.
    ///
    /// Every failure is reported as [`BackupError::Upload`].
    pub fn upload(&self, local_file: &Path, remote_dir: &str) -> Result<Uploaded> {
        self.upload_inner(local_file, remote_dir).map_err(|e| match e {
            BackupError::Upload(_) => e,
            other => BackupError::Upload(other.to_string()),
        })
    }

    fn upload_inner(&self, local_file: &Path, remote_dir: &str) -> Result<Uploaded> {
        let name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                BackupError::Upload(format!("invalid file name: {}", local_file.display()))
            })?
            .to_string();

        let file = File::open(local_file)?;
        let total = file.metadata()?.len();

        let mut session = self.open()?;
        let resolved_dir = ensure_directory(&mut *session, remote_dir)?;

        let started = Instant::now();
        let mut reader = ProgressReader::new(BufReader::new(file), total, name.as_str());
        let sent = session.put(&name, &mut reader)?;

        if sent != total {
            return Err(BackupError::Upload(format!(
                "sent {} of {} bytes for {}",
                sent, total, name
            )));
        }

        info!(
            file = %name,
            dir = %resolved_dir,
            "Uploaded {} in {}",
            format_bytes(sent),
            format_duration(started.elapsed().as_secs())
        );
        Ok(Uploaded {
            bytes: sent,
            remote_dir: resolved_dir,
        })
    }

    /// Keep the newest `policy.keep` entries in `remote_dir`, deleting the rest.
    ///
    /// Individual delete failures are logged; the names actually removed are
    /// returned.
    pub fn prune_remote(&self, remote_dir: &str, policy: &RetentionPolicy) -> Result<Vec<String>> {
        let mut session = self.open()?;
        session.cwd(remote_dir)?;

        let names: Vec<String> = session
            .list()?
            .iter()
            .map(|raw| entry_name(raw))
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .map(str::to_owned)
            .collect();

        let expired = policy.expired(&names);
        if expired.is_empty() {
            debug!(dir = %remote_dir, entries = names.len(), "No remote backups to prune");
            return Ok(Vec::new());
        }

        let removed = retention::remove_expired(&expired, |name| session.delete(name));
        if removed.len() < expired.len() {
            warn!(
                dir = %remote_dir,
                "{} of {} old remote backups could not be removed",
                expired.len() - removed.len(),
                expired.len()
            );
        }
        Ok(removed)
    }
}
