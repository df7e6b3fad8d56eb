//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `entries` - Entry log (key: entry_id, big-endian)
//! - `member_idx` - Per-member ordering index (key: member prefix + entry_id)
//! - `relations` - Relation-key lookup (key: member prefix + table, id, action)
//!
//! Index keys are built from length-prefixed components, so member ids and
//! relation-key parts may contain arbitrary bytes without two distinct keys
//! encoding identically.
//!
//! Every mutating ledger operation is committed as a single [`WriteBatch`],
//! so a storage failure never leaves an operation partially visible.

use crate::{
    error::{Error, Result},
    types::{EntryId, LedgerEntry, MemberId, RelationKey},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Column family names
const CF_ENTRIES: &str = "entries";
const CF_MEMBER_IDX: &str = "member_idx";
const CF_RELATIONS: &str = "relations";

/// Staged writes of one unit of work, applied atomically
#[derive(Debug, Default)]
pub struct CommitSet {
    /// New or modified entries
    pub upserts: Vec<LedgerEntry>,
    /// Entries removed by reversal
    pub deletes: Vec<LedgerEntry>,
}

impl CommitSet {
    /// Nothing staged
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
    /// Next entry id, seeded from the highest persisted id at open
    next_entry_id: AtomicU64,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("next_entry_id", &self.next_entry_id)
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Self::cf_options_entries()),
            ColumnFamilyDescriptor::new(CF_MEMBER_IDX, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_RELATIONS, Self::cf_options_index()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let storage = Self {
            db: Arc::new(db),
            next_entry_id: AtomicU64::new(1),
        };
        let next = storage.highest_entry_id()?.map_or(1, |id| id.raw() + 1);
        storage.next_entry_id.store(next, Ordering::SeqCst);

        tracing::info!(path = %path.display(), next_entry_id = next, "Opened point ledger store");

        Ok(storage)
    }

    fn cf_options_entries() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_index() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Point lookups dominate, bloom filters pay off
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers

    /// Append one component as a big-endian length prefix plus its bytes.
    /// Distinct component splits can never encode to the same key, and a
    /// member's prefix can never be a prefix of another member's key.
    fn push_component(key: &mut Vec<u8>, component: &str) {
        key.extend_from_slice(&(component.len() as u32).to_be_bytes());
        key.extend_from_slice(component.as_bytes());
    }

    fn member_prefix(member_id: &MemberId) -> Vec<u8> {
        let mut key = Vec::with_capacity(4 + member_id.as_str().len());
        Self::push_component(&mut key, member_id.as_str());
        key
    }

    fn member_idx_key(member_id: &MemberId, entry_id: EntryId) -> Vec<u8> {
        let mut key = Self::member_prefix(member_id);
        key.extend_from_slice(&entry_id.to_be_bytes());
        key
    }

    fn relation_idx_key(member_id: &MemberId, relation: &RelationKey) -> Vec<u8> {
        let mut key = Self::member_prefix(member_id);
        Self::push_component(&mut key, &relation.table);
        Self::push_component(&mut key, &relation.id);
        Self::push_component(&mut key, &relation.action);
        key
    }

    // Id allocation

    /// Allocate the next entry id
    pub fn allocate_entry_id(&self) -> EntryId {
        EntryId::from_raw(self.next_entry_id.fetch_add(1, Ordering::SeqCst))
    }

    fn highest_entry_id(&self) -> Result<Option<EntryId>> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        let mut iter = self.db.iterator_cf(cf, IteratorMode::End);

        if let Some(item) = iter.next() {
            let (key, _) = item?;
            let bytes: [u8; 8] = key
                .as_ref()
                .try_into()
                .map_err(|_| Error::Storage("Malformed entry key".to_string()))?;
            return Ok(Some(EntryId::from_raw(u64::from_be_bytes(bytes))));
        }

        Ok(None)
    }

    // Entry operations

    /// Get entry by id
    pub fn get_entry(&self, entry_id: EntryId) -> Result<LedgerEntry> {
        let cf = self.cf_handle(CF_ENTRIES)?;

        let value = self
            .db
            .get_cf(cf, entry_id.to_be_bytes())?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;

        let entry: LedgerEntry = bincode::deserialize(&value)?;
        Ok(entry)
    }

    /// Load all of a member's entries, ascending by id
    pub fn load_member_entries(&self, member_id: &MemberId) -> Result<Vec<LedgerEntry>> {
        let cf_idx = self.cf_handle(CF_MEMBER_IDX)?;
        let prefix = Self::member_prefix(member_id);

        let iter = self.db.prefix_iterator_cf(cf_idx, &prefix);

        let mut entries = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            let bytes: [u8; 8] = key[prefix.len()..]
                .try_into()
                .map_err(|_| Error::Storage("Malformed member index key".to_string()))?;
            let entry_id = EntryId::from_raw(u64::from_be_bytes(bytes));
            entries.push(self.get_entry(entry_id)?);
        }

        Ok(entries)
    }

    /// Look up the entry recorded for a relation key, if any
    pub fn find_relation(
        &self,
        member_id: &MemberId,
        relation: &RelationKey,
    ) -> Result<Option<EntryId>> {
        let cf = self.cf_handle(CF_RELATIONS)?;
        let key = Self::relation_idx_key(member_id, relation);

        match self.db.get_cf(cf, &key)? {
            Some(value) => {
                let bytes: [u8; 8] = value
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed relation index value".to_string()))?;
                Ok(Some(EntryId::from_raw(u64::from_be_bytes(bytes))))
            }
            None => Ok(None),
        }
    }

    // Unit-of-work commit

    /// Apply one unit of work atomically
    pub fn apply(&self, commit: &CommitSet) -> Result<()> {
        if commit.is_empty() {
            return Ok(());
        }

        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let cf_idx = self.cf_handle(CF_MEMBER_IDX)?;
        let cf_rel = self.cf_handle(CF_RELATIONS)?;

        let mut batch = WriteBatch::default();

        for entry in &commit.upserts {
            let value = bincode::serialize(entry)?;
            batch.put_cf(cf_entries, entry.id.to_be_bytes(), &value);
            batch.put_cf(cf_idx, Self::member_idx_key(&entry.member_id, entry.id), b"");
            if let Some(relation) = &entry.relation {
                batch.put_cf(
                    cf_rel,
                    Self::relation_idx_key(&entry.member_id, relation),
                    entry.id.to_be_bytes(),
                );
            }
        }

        for entry in &commit.deletes {
            batch.delete_cf(cf_entries, entry.id.to_be_bytes());
            batch.delete_cf(cf_idx, Self::member_idx_key(&entry.member_id, entry.id));
            if let Some(relation) = &entry.relation {
                batch.delete_cf(cf_rel, Self::relation_idx_key(&entry.member_id, relation));
            }
        }

        self.db.write(batch)?;

        tracing::debug!(
            upserts = commit.upserts.len(),
            deletes = commit.deletes.len(),
            "Unit of work committed"
        );

        Ok(())
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        let cf_rel = self.cf_handle(CF_RELATIONS)?;

        Ok(StorageStats {
            total_entries: self.approximate_count(cf_entries)?,
            total_relations: self.approximate_count(cf_rel)?,
            next_entry_id: self.next_entry_id.load(Ordering::SeqCst),
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate number of ledger entries
    pub total_entries: u64,
    /// Approximate number of keyed entries
    pub total_relations: u64,
    /// Next id to be assigned
    pub next_entry_id: u64,
}
