//! The Mutation Store: every trait source ever produced, indexed by id, with
//! a filesystem-backed artifact per version and a bounded retention policy
//! (spec.md §4.11 "Mutation Store", §6 non-goal: "no database — plain files
//! are the persistence layer").

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::record::{MutationRecord, MutationStatus};

const INDEX_FILE: &str = "index.bin";
const ARTIFACTS_DIR: &str = "artifacts";

struct Inner {
    records: BTreeMap<Uuid, MutationRecord>,
    content_hashes: BTreeSet<[u8; 32]>,
}

/// Filesystem-backed store of every mutation attempt. Cheap to clone via
/// `Arc` at the call sites that need shared ownership (the Coder, Patcher,
/// and operator HTTP surface all hold one).
pub struct MutationStore {
    root: PathBuf,
    retain_versions: u32,
    inner: RwLock<Inner>,
}

impl MutationStore {
    /// Open (or initialize) a store rooted at `root`, keeping at most
    /// `retain_versions` artifact files on disk per trait name.
    pub fn open(root: impl Into<PathBuf>, retain_versions: u32) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(ARTIFACTS_DIR)).map_err(|e| StoreError::Io {
            trait_name: String::new(),
            version: 0,
            source: e,
        })?;

        let records = match fs::read(root.join(INDEX_FILE)) {
            Ok(bytes) => bincode::deserialize::<BTreeMap<Uuid, MutationRecord>>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StoreError::Io {
                    trait_name: String::new(),
                    version: 0,
                    source: e,
                })
            }
        };
        let content_hashes = records.values().map(|r| r.code_hash).collect();

        Ok(MutationStore {
            root,
            retain_versions: retain_versions.max(1),
            inner: RwLock::new(Inner { records, content_hashes }),
        })
    }

    /// Whether `hash` already matches a previously stored source, regardless
    /// of that record's current status. Handed to
    /// `genesis_sandbox::validator::validate` as its `already_seen` callback.
    pub fn already_seen(&self, hash: &[u8; 32]) -> bool {
        self.inner.read().content_hashes.contains(hash)
    }

    /// Record a freshly-validated trait source, writing its artifact file
    /// and applying retention for `record.trait_name`.
    pub fn insert(&self, record: MutationRecord, source: &str) -> Result<(), StoreError> {
        self.write_artifact(&record.trait_name, record.version, source)?;

        {
            let mut inner = self.inner.write();
            inner.content_hashes.insert(record.code_hash);
            inner.records.insert(record.mutation_id, record);
        }
        self.persist_index()?;
        self.apply_retention(&self.inner.read().records.clone())?;
        Ok(())
    }

    /// Transition a record to `Active`, stamping `applied_at`.
    pub fn mark_active(&self, id: Uuid, applied_at: u64) -> Result<(), StoreError> {
        self.update(id, |r| {
            r.status = MutationStatus::Active;
            r.applied_at = Some(applied_at);
        })
    }

    /// Transition a record to `Failed` with a reason.
    pub fn mark_failed(&self, id: Uuid, reason: impl Into<String>) -> Result<(), StoreError> {
        self.update(id, |r| {
            r.status = MutationStatus::Failed;
            r.failure_reason = Some(reason.into());
        })
    }

    /// Transition a record to `RolledBack` (it was active, a newer version
    /// of the same trait superseded it).
    pub fn mark_rolled_back(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(id, |r| r.status = MutationStatus::RolledBack)
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut MutationRecord)) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write();
            let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            f(record);
        }
        self.persist_index()
    }

    /// Look up a record by id.
    pub fn get(&self, id: Uuid) -> Option<MutationRecord> {
        self.inner.read().records.get(&id).cloned()
    }

    /// Every record currently known, oldest-id first.
    pub fn list(&self) -> Vec<MutationRecord> {
        self.inner.read().records.values().cloned().collect()
    }

    /// The version the next mutation for `trait_name` should be assigned:
    /// one past the highest version recorded for that name, or `1` if none
    /// exists yet (spec.md §4.7 step 5).
    pub fn next_version(&self, trait_name: &str) -> u32 {
        self.inner
            .read()
            .records
            .values()
            .filter(|r| r.trait_name == trait_name)
            .map(|r| r.version)
            .max()
            .map(|v| v + 1)
            .unwrap_or(1)
    }

    /// The artifact path of the most recently `Active` version of
    /// `trait_name`, other than `except_version`, if one exists — used to
    /// populate `MutationFailedEvent::rollback_to`.
    pub fn previous_active_artifact(&self, trait_name: &str, except_version: u32) -> Option<String> {
        self.inner
            .read()
            .records
            .values()
            .filter(|r| r.trait_name == trait_name && r.status == MutationStatus::Active && r.version != except_version)
            .max_by_key(|r| r.version)
            .map(|r| self.artifact_path(trait_name, r.version).to_string_lossy().into_owned())
    }

    /// Read a trait's source straight from disk, bypassing the in-memory
    /// cache — used by the Patcher's defense-in-depth re-validation.
    pub fn read_artifact(&self, trait_name: &str, version: u32) -> Result<String, StoreError> {
        fs::read_to_string(self.artifact_path(trait_name, version)).map_err(|e| StoreError::Io {
            trait_name: trait_name.to_string(),
            version,
            source: e,
        })
    }

    fn write_artifact(&self, trait_name: &str, version: u32, source: &str) -> Result<(), StoreError> {
        let dir = self.root.join(ARTIFACTS_DIR).join(trait_name);
        fs::create_dir_all(&dir).map_err(|e| StoreError::Io {
            trait_name: trait_name.to_string(),
            version,
            source: e,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::Io {
            trait_name: trait_name.to_string(),
            version,
            source: e,
        })?;
        use std::io::Write;
        tmp.write_all(source.as_bytes()).map_err(|e| StoreError::Io {
            trait_name: trait_name.to_string(),
            version,
            source: e,
        })?;
        tmp.persist(self.artifact_path(trait_name, version))
            .map_err(|e| StoreError::Io {
                trait_name: trait_name.to_string(),
                version,
                source: e.error,
            })?;
        Ok(())
    }

    /// The path an artifact for `(trait_name, version)` is (or would be)
    /// written to, handed out in `MutationReadyEvent::file_path`.
    pub fn artifact_path(&self, trait_name: &str, version: u32) -> PathBuf {
        self.root.join(ARTIFACTS_DIR).join(trait_name).join(format!("{version}.trait"))
    }

    /// Delete artifact files beyond `retain_versions` for every trait name
    /// touched by `records`, oldest versions first. Records themselves are
    /// kept forever — only the file on disk is reclaimed.
    fn apply_retention(&self, records: &BTreeMap<Uuid, MutationRecord>) -> Result<(), StoreError> {
        let mut by_trait: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for record in records.values() {
            by_trait.entry(record.trait_name.as_str()).or_default().push(record.version);
        }
        for (trait_name, mut versions) in by_trait {
            versions.sort_unstable();
            versions.dedup();
            if versions.len() as u32 <= self.retain_versions {
                continue;
            }
            let cutoff = versions.len() - self.retain_versions as usize;
            for version in &versions[..cutoff] {
                let path = self.artifact_path(trait_name, *version);
                if path.exists() {
                    tracing::debug!(trait_name, version, "retiring mutation artifact beyond retention window");
                    fs::remove_file(&path).map_err(|e| StoreError::Io {
                        trait_name: trait_name.to_string(),
                        version: *version,
                        source: e,
                    })?;
                }
            }
        }
        Ok(())
    }

    fn persist_index(&self) -> Result<(), StoreError> {
        let snapshot = self.inner.read().records.clone();
        let bytes = bincode::serialize(&snapshot)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root).map_err(|e| StoreError::Io {
            trait_name: String::new(),
            version: 0,
            source: e,
        })?;
        use std::io::Write;
        tmp.write_all(&bytes).map_err(|e| StoreError::Io {
            trait_name: String::new(),
            version: 0,
            source: e,
        })?;
        tmp.persist(self.index_path()).map_err(|e| StoreError::Io {
            trait_name: String::new(),
            version: 0,
            source: e.error,
        })?;
        Ok(())
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(trait_name: &str, version: u32, source: &str) -> MutationRecord {
        MutationRecord {
            mutation_id: Uuid::new_v4(),
            trait_name: trait_name.to_string(),
            version,
            status: MutationStatus::Validated,
            code_hash: genesis_sandbox_hash(source),
            source: source.to_string(),
            cycle_id: Uuid::new_v4(),
            trigger_type: "manual_test".to_string(),
            created_at: 0,
            applied_at: None,
            failure_reason: None,
        }
    }

    fn genesis_sandbox_hash(source: &str) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        Sha256::digest(source.as_bytes()).into()
    }

    #[test]
    fn insert_and_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MutationStore::open(dir.path(), 4).unwrap();
        let record = sample("wander", 1, "trait wander { fn execute(entity) {} }");
        let id = record.mutation_id;
        store.insert(record.clone(), &record.source).unwrap();

        assert!(store.already_seen(&record.code_hash));
        assert_eq!(store.get(id).unwrap().status, MutationStatus::Validated);
        assert_eq!(store.read_artifact("wander", 1).unwrap(), record.source);
    }

    #[test]
    fn retention_deletes_old_artifacts_but_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = MutationStore::open(dir.path(), 2).unwrap();
        for version in 1..=3 {
            let record = sample("forage", version, &format!("trait forage {{ fn execute(entity) {{ }} }} // v{version}"));
            store.insert(record, &format!("trait forage {{ fn execute(entity) {{ }} }} // v{version}")).unwrap();
        }

        assert!(store.read_artifact("forage", 1).is_err());
        assert!(store.read_artifact("forage", 2).is_ok());
        assert!(store.read_artifact("forage", 3).is_ok());
        assert_eq!(store.list().len(), 3);
    }

    #[test]
    fn survives_reopening_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let id;
        {
            let store = MutationStore::open(dir.path(), 4).unwrap();
            let record = sample("wander", 1, "trait wander { fn execute(entity) {} }");
            id = record.mutation_id;
            store.insert(record.clone(), &record.source).unwrap();
        }
        let reopened = MutationStore::open(dir.path(), 4).unwrap();
        assert_eq!(reopened.get(id).unwrap().trait_name, "wander");
    }
}
