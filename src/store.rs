//! Thin wrapper over an embedded, memory-mapped, ordered KV store (LMDB via
//! `heed`): named sub-databases, dup-sorted values, read/write transactions
//! and automatic map-size growth on `MapFull`.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, MdbError, RoTxn, RwTxn};

use crate::error::IndexError;

pub type Db = Database<Bytes, Bytes>;

pub struct Store {
    env: Env,
    path: PathBuf,
    databases: RwLock<HashMap<String, (Db, bool)>>,
}

impl Store {
    pub fn open(path: &Path, initial_map_size: usize, max_dbs: u32, max_readers: u32) -> Result<Self, IndexError> {
        std::fs::create_dir_all(path)?;
        tracing::debug!(path = %path.display(), initial_map_size, max_readers, "opening iscc index storage");
        let env =
            unsafe { EnvOpenOptions::new().map_size(initial_map_size).max_dbs(max_dbs).max_readers(max_readers).open(path)? };
        Ok(Store { env, path: path.to_path_buf(), databases: RwLock::new(HashMap::new()) })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn map_size(&self) -> usize { self.env.info().map_size }

    pub fn read_txn(&self) -> Result<RoTxn<'_>, IndexError> { Ok(self.env.read_txn()?) }

    /// Opens (creating on first use) a named sub-database, caching the
    /// handle the way the teacher engine caches `sled::Tree` handles.
    pub fn database(&self, name: &str, dup_sort: bool) -> Result<Db, IndexError> {
        if let Some((db, existing_dup_sort)) = self.databases.read().unwrap().get(name) {
            debug_assert_eq!(*existing_dup_sort, dup_sort, "sub-store {name} opened with inconsistent dup_sort flag");
            return Ok(*db);
        }
        let mut wtxn = self.env.write_txn()?;
        let db: Db = if dup_sort {
            self.env.database_options().types::<Bytes, Bytes>().name(name).flags(heed::DatabaseFlags::DUP_SORT).create(&mut wtxn)?
        } else {
            self.env.create_database(&mut wtxn, Some(name))?
        };
        wtxn.commit()?;
        self.databases.write().unwrap().insert(name.to_string(), (db, dup_sort));
        Ok(db)
    }

    /// Runs `f` in a write transaction, retrying exactly once — doubling the
    /// map size — if the environment reports `MapFull`. A second `MapFull`
    /// is surfaced as [`IndexError::MapFull`].
    pub fn write<T>(&self, f: impl Fn(&mut RwTxn) -> Result<T, IndexError>) -> Result<T, IndexError> {
        match self.try_write(&f) {
            Err(IndexError::Storage(heed::Error::Mdb(MdbError::MapFull))) => {
                let new_size = self.map_size() * 2;
                tracing::warn!(new_size, path = %self.path.display(), "map full, doubling and retrying");
                unsafe { self.env.resize(new_size)? };
                match self.try_write(&f) {
                    Err(IndexError::Storage(heed::Error::Mdb(MdbError::MapFull))) => Err(IndexError::MapFull),
                    other => other,
                }
            }
            other => other,
        }
    }

    fn try_write<T>(&self, f: &impl Fn(&mut RwTxn) -> Result<T, IndexError>) -> Result<T, IndexError> {
        let mut wtxn = self.env.write_txn()?;
        let result = f(&mut wtxn)?;
        wtxn.commit()?;
        Ok(result)
    }

    /// Inserts `(key, value)`. If `allow_dup`, an identical `(key, value)`
    /// pair already present is a silent no-op (this falls out of LMDB
    /// dup-sort semantics directly). If `!overwrite`, a different value
    /// already stored under `key` is an [`IndexError::AlreadyPresent`].
    pub fn put(&self, wtxn: &mut RwTxn, db: &Db, key: &[u8], value: &[u8], allow_dup: bool, overwrite: bool) -> Result<(), IndexError> {
        if !allow_dup && !overwrite {
            if let Some(existing) = db.get(&*wtxn, key)? {
                if existing != value {
                    return Err(IndexError::AlreadyPresent);
                }
                return Ok(());
            }
        }
        db.put(wtxn, key, value)?;
        Ok(())
    }

    pub fn get<'txn>(&self, rtxn: &'txn RoTxn, db: &Db, key: &[u8]) -> Result<Option<&'txn [u8]>, IndexError> { Ok(db.get(rtxn, key)?) }

    pub fn len(&self, rtxn: &RoTxn, db: &Db) -> Result<u64, IndexError> { Ok(db.len(rtxn)?) }

    /// Iterates every `(key, value)` pair whose key begins with `prefix`, in
    /// key-major, value-minor order (LMDB's natural dup-sort ordering) —
    /// duplicate runs for the same key are therefore always contiguous.
    pub fn prefix_iter<'txn>(
        &self,
        rtxn: &'txn RoTxn,
        db: &Db,
        prefix: &[u8],
    ) -> Result<impl Iterator<Item = Result<(&'txn [u8], &'txn [u8]), IndexError>>, IndexError> {
        Ok(db.prefix_iter(rtxn, prefix)?.map(|r| r.map_err(IndexError::from)))
    }

    pub fn iter<'txn>(&self, rtxn: &'txn RoTxn, db: &Db) -> Result<impl Iterator<Item = Result<(&'txn [u8], &'txn [u8]), IndexError>>, IndexError> {
        Ok(db.iter(rtxn)?.map(|r| r.map_err(IndexError::from)))
    }

    /// The last (key, value) pair in iteration order, used to derive the
    /// next autoincrement key.
    pub fn last<'txn>(&self, rtxn: &'txn RoTxn, db: &Db) -> Result<Option<(&'txn [u8], &'txn [u8])>, IndexError> { Ok(db.last(rtxn)?) }

    /// The last `(key, value)` pair whose key begins with `prefix`, found in
    /// O(log n) via a reverse prefix scan rather than a full forward scan.
    pub fn last_in_prefix<'txn>(
        &self,
        rtxn: &'txn RoTxn,
        db: &Db,
        prefix: &[u8],
    ) -> Result<Option<(&'txn [u8], &'txn [u8])>, IndexError> {
        Ok(db.rev_prefix_iter(rtxn, prefix)?.next().transpose()?)
    }

    /// Names of the sub-databases opened so far (used for `stats()` without
    /// the side effect of creating sub-stores on demand).
    pub fn known_names(&self) -> Vec<String> { self.databases.read().unwrap().keys().cloned().collect() }

    pub fn close(self) { drop(self) }

    pub fn destroy(self) -> Result<(), IndexError> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_dir_all(&path)?;
        Ok(())
    }
}
