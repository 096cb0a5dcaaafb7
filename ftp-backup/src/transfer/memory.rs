//! In-memory remote store used by tests.

use super::{Connector, RemoteSession};
use crate::utils::errors::{BackupError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct State {
    user: String,
    pass: String,
    home: String,
    dirs: BTreeSet<String>,
    files: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    protected: BTreeSet<(String, String)>,
    refuse_connections: bool,
    fail_uploads: bool,
    dot_entries: bool,
    full_paths: bool,
    connections: usize,
    open_sessions: usize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new(user: &str, pass: &str) -> Self {
        let store = Self::default();
        {
            let mut state = store.lock();
            state.user = user.to_string();
            state.pass = pass.to_string();
            state.home = "/".to_string();
            state.dirs.insert("/".to_string());
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Login directory of new sessions; created if absent
    pub fn set_home(&self, dir: &str) {
        let mut state = self.lock();
        state.home = dir.to_string();
        state.dirs.insert(dir.to_string());
    }

    pub fn refuse_connections(&self) {
        self.lock().refuse_connections = true;
    }

    pub fn fail_uploads(&self) {
        self.lock().fail_uploads = true;
    }

    pub fn report_dot_entries(&self) {
        self.lock().dot_entries = true;
    }

    pub fn report_full_paths(&self) {
        self.lock().full_paths = true;
    }

    pub fn add_dir(&self, dir: &str) {
        self.lock().dirs.insert(dir.to_string());
    }

    pub fn has_dir(&self, dir: &str) -> bool {
        self.lock().dirs.contains(dir)
    }

    pub fn add_file(&self, dir: &str, name: &str, data: &[u8]) {
        self.lock()
            .files
            .entry(dir.to_string())
            .or_default()
            .insert(name.to_string(), data.to_vec());
    }

    /// Make deletes of this file fail
    pub fn protect(&self, dir: &str, name: &str) {
        self.lock().protected.insert((dir.to_string(), name.to_string()));
    }

    pub fn file(&self, dir: &str, name: &str) -> Option<Vec<u8>> {
        self.lock().files.get(dir).and_then(|f| f.get(name)).cloned()
    }

    pub fn files(&self, dir: &str) -> Vec<String> {
        self.lock()
            .files
            .get(dir)
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }
}

impl Connector for MemoryStore {
    type Session = MemorySession;

    fn connect(&self) -> Result<MemorySession> {
        let mut state = self.lock();
        if state.refuse_connections {
            return Err(BackupError::Transfer("connection refused".into()));
        }
        state.connections += 1;
        state.open_sessions += 1;
        Ok(MemorySession {
            store: self.clone(),
            cwd: state.home.clone(),
            logged_in: false,
            closed: false,
        })
    }
}

pub struct MemorySession {
    store: MemoryStore,
    cwd: String,
    logged_in: bool,
    closed: bool,
}

impl MemorySession {
    fn resolve(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.cwd.trim_end_matches('/'), path)
        };
        let trimmed = joined.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn check_login(&self) -> Result<()> {
        if self.logged_in {
            Ok(())
        } else {
            Err(BackupError::Transfer("530 Not logged in".into()))
        }
    }
}

impl RemoteSession for MemorySession {
    fn login(&mut self, user: &str, pass: &str) -> Result<()> {
        let state = self.store.lock();
        if state.user == user && state.pass == pass {
            drop(state);
            self.logged_in = true;
            Ok(())
        } else {
            Err(BackupError::Transfer("530 Login incorrect".into()))
        }
    }

    fn cwd(&mut self, path: &str) -> Result<()> {
        self.check_login()?;
        let target = self.resolve(path);
        if self.store.lock().dirs.contains(&target) {
            self.cwd = target;
            Ok(())
        } else {
            Err(BackupError::Transfer(format!("550 {}: No such directory", path)))
        }
    }

    fn pwd(&mut self) -> Result<String> {
        self.check_login()?;
        Ok(self.cwd.clone())
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        self.check_login()?;
        let target = self.resolve(path);
        if self.store.lock().dirs.insert(target) {
            Ok(())
        } else {
            Err(BackupError::Transfer(format!("550 {}: File exists", path)))
        }
    }

    fn put(&mut self, name: &str, reader: &mut dyn Read) -> Result<u64> {
        self.check_login()?;
        if self.store.lock().fail_uploads {
            return Err(BackupError::Transfer("451 Local error in processing".into()));
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let size = data.len() as u64;
        self.store.add_file(&self.cwd, name, &data);
        Ok(size)
    }

    fn list(&mut self) -> Result<Vec<String>> {
        self.check_login()?;
        let state = self.store.lock();
        let mut names = Vec::new();
        if state.dot_entries {
            names.push(".".to_string());
            names.push("..".to_string());
        }
        if let Some(files) = state.files.get(&self.cwd) {
            for name in files.keys() {
                if state.full_paths {
                    names.push(format!("{}/{}", self.cwd, name));
                } else {
                    names.push(name.clone());
                }
            }
        }
        Ok(names)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        self.check_login()?;
        let mut state = self.store.lock();
        if state.protected.contains(&(self.cwd.clone(), name.to_string())) {
            return Err(BackupError::Transfer(format!("550 {}: Permission denied", name)));
        }
        let removed = state
            .files
            .get_mut(&self.cwd)
            .and_then(|files| files.remove(name));
        match removed {
            Some(_) => Ok(()),
            None => Err(BackupError::Transfer(format!("550 {}: No such file", name))),
        }
    }

    fn quit(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.store.lock().open_sessions -= 1;
        }
        Ok(())
    }
}
