use crate::models::MemberCredential;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::{env, fs, io};
use tracing::error;

pub fn resolve_data_path() -> PathBuf {
    match env::var("APP_DATA_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from("data/members.json"),
    }
}

/// Key-value store for join credentials, keyed by tab id. The file-backed
/// implementation is the real thing; [`MemoryCredentialStore`] substitutes
/// for it under test.
pub trait CredentialStore: Send + Sync {
    fn get(&self, tab_id: i64) -> Option<MemberCredential>;
    fn set(&self, tab_id: i64, credential: MemberCredential) -> Result<(), io::Error>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemberData {
    tabs: BTreeMap<i64, MemberCredential>,
}

/// Credentials persisted as pretty-printed JSON, loaded once at startup and
/// rewritten on every change. Survives across sessions until the file is
/// cleared.
pub struct FileCredentialStore {
    path: PathBuf,
    data: Mutex<MemberData>,
}

impl FileCredentialStore {
    pub fn open(path: PathBuf) -> Self {
        let data = load_data(&path);
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    fn guard(&self) -> MutexGuard<'_, MemberData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn load_data(path: &Path) -> MemberData {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse member data file: {err}");
                MemberData::default()
            }
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => MemberData::default(),
        Err(err) => {
            error!("failed to read member data file: {err}");
            MemberData::default()
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, tab_id: i64) -> Option<MemberCredential> {
        self.guard().tabs.get(&tab_id).cloned()
    }

    fn set(&self, tab_id: i64, credential: MemberCredential) -> Result<(), io::Error> {
        let mut data = self.guard();
        data.tabs.insert(tab_id, credential);
        let payload = serde_json::to_vec_pretty(&*data).map_err(io::Error::other)?;
        fs::write(&self.path, payload)
    }
}

/// In-memory fake with the same contract, for tests and tooling.
#[derive(Default)]
pub struct MemoryCredentialStore {
    tabs: Mutex<BTreeMap<i64, MemberCredential>>,
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, tab_id: i64) -> Option<MemberCredential> {
        self.tabs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&tab_id)
            .cloned()
    }

    fn set(&self, tab_id: i64, credential: MemberCredential) -> Result<(), io::Error> {
        self.tabs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(tab_id, credential);
        Ok(())
    }
}
