//! JSON file persistence for session records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{CredentialStore, RecordUpdate, SessionRecord};
use crate::error::Result;

const SCHEMA_VERSION: u32 = 1;
const FILE_NAME: &str = "sessions.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
	#[serde(default)]
	schema: u32,
	#[serde(default)]
	sessions: BTreeMap<String, SessionRecord>,
}

/// Stores every record in `<dir>/sessions.json`.
///
/// The whole file is rewritten on each mutation, via a temporary sibling and
/// a rename so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct JsonFileStore {
	path: PathBuf,
	file: Mutex<StoreFile>,
}

impl JsonFileStore {
	/// Opens the store under `dir`, creating nothing until the first write.
	///
	/// A missing file is an empty store; a corrupt one is an error rather
	/// than silently dropping credentials.
	pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
		let path = dir.as_ref().join(FILE_NAME);
		let mut file: StoreFile = match std::fs::read_to_string(&path) {
			Ok(content) => serde_json::from_str(&content)?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
			Err(err) => return Err(err.into()),
		};
		file.schema = SCHEMA_VERSION;
		debug!(target = "hub.store", path = %path.display(), "opened session store");
		Ok(Self {
			path,
			file: Mutex::new(file),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn save(&self, file: &StoreFile) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		let json = serde_json::to_string_pretty(file)?;
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, json).await?;
		tokio::fs::rename(&tmp, &self.path).await?;
		Ok(())
	}
}

#[async_trait]
impl CredentialStore for JsonFileStore {
	async fn get(&self, id: &str) -> Result<Option<SessionRecord>> {
		Ok(self.file.lock().await.sessions.get(id).cloned())
	}

	async fn upsert(&self, id: &str, update: RecordUpdate) -> Result<SessionRecord> {
		let mut file = self.file.lock().await;
		let mut record = file.sessions.get(id).cloned().unwrap_or_else(|| SessionRecord::new(id));
		update.apply(&mut record);

		let previous = file.sessions.insert(id.to_string(), record.clone());
		if let Err(err) = self.save(&file).await {
			// keep memory consistent with disk
			match previous {
				Some(previous) => file.sessions.insert(id.to_string(), previous),
				None => file.sessions.remove(id),
			};
			return Err(err);
		}
		Ok(record)
	}

	async fn delete(&self, id: &str) -> Result<bool> {
		let mut file = self.file.lock().await;
		let Some(previous) = file.sessions.remove(id) else {
			return Ok(false);
		};
		if let Err(err) = self.save(&file).await {
			file.sessions.insert(id.to_string(), previous);
			return Err(err);
		}
		Ok(true)
	}

	async fn list(&self) -> Result<Vec<SessionRecord>> {
		Ok(self.file.lock().await.sessions.values().cloned().collect())
	}
}
