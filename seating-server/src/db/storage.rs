//! redb-based storage layer for reservations and table inventory
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `reservations` | `id` | `Reservation` (JSON) | 记录本体，永不删除 |
//! | `codes` | `code` | `id` | 确认码唯一索引 |
//! | `date_index` | `(date, id)` | `()` | 按日期范围查询 |
//! | `active` | `id` | `()` | 非终态记录索引 (巡检用) |
//! | `dining_tables` | `table_id` | `DiningTable` (JSON) | 桌台容量 + 占用 |
//! | `sequence` | `"seq"` | `u64` | 记录顺序号 |
//!
//! # Conditional writes
//!
//! 所有状态变更都是"读当前状态 → 校验预期 → 写入"在同一个写事务里完成，
//! 结果以 [`Guarded`] 返回。redb 同一时刻只有一个写事务，读事务看到的
//! 永远是已提交的完整快照，所以入座 (状态 + 桌台占用) 不会被观察到一半。

use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use shared::models::{DiningTable, NewReservation, Reservation, ReservationStatus};
use thiserror::Error;

/// key = id, value = JSON-serialized Reservation
const RESERVATIONS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("reservations");

/// key = confirmation code, value = id
const CODES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("codes");

/// key = (YYYY-MM-DD, id)
const DATE_INDEX_TABLE: TableDefinition<(&str, u64), ()> = TableDefinition::new("date_index");

/// key = id of a non-terminal record
const ACTIVE_TABLE: TableDefinition<u64, ()> = TableDefinition::new("active");

/// key = table id, value = JSON-serialized DiningTable
const DINING_TABLES_TABLE: TableDefinition<u32, &[u8]> = TableDefinition::new("dining_tables");

const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence");

const SEQUENCE_KEY: &str = "seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Reservation not found: {0}")]
    ReservationNotFound(u64),

    #[error("Confirmation code already taken: {0}")]
    DuplicateCode(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// 条件写结果
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    /// 已写入
    Applied(T),
    /// 当前状态不在预期集合内，未写入
    Skipped(ReservationStatus),
    /// 没有合适的空闲桌台，未写入
    NoTable,
}

impl<T> Guarded<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Guarded::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Guarded::Applied(_))
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Reservation storage backed by redb
#[derive(Clone)]
pub struct ReservationStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for ReservationStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationStorage").finish_non_exhaustive()
    }
}

impl ReservationStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RESERVATIONS_TABLE)?;
            let _ = write_txn.open_table(CODES_TABLE)?;
            let _ = write_txn.open_table(DATE_INDEX_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_TABLE)?;
            let _ = write_txn.open_table(DINING_TABLES_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(SEQUENCE_KEY)?.is_none() {
                seq_table.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// 连接存活检查
    pub fn ping(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(())
    }

    fn next_id(txn: &WriteTransaction) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table.get(SEQUENCE_KEY)?.map(|g| g.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(SEQUENCE_KEY, next)?;
        Ok(next)
    }

    fn load(txn: &WriteTransaction, id: u64) -> StorageResult<Reservation> {
        let table = txn.open_table(RESERVATIONS_TABLE)?;
        let record = match table.get(id)? {
            Some(value) => serde_json::from_slice(value.value())?,
            None => return Err(StorageError::ReservationNotFound(id)),
        };
        Ok(record)
    }

    fn store(txn: &WriteTransaction, record: &Reservation) -> StorageResult<()> {
        let mut table = txn.open_table(RESERVATIONS_TABLE)?;
        let value = serde_json::to_vec(record)?;
        table.insert(record.id, value.as_slice())?;

        let mut active = txn.open_table(ACTIVE_TABLE)?;
        if record.status.is_terminal() {
            active.remove(record.id)?;
        } else {
            active.insert(record.id, ())?;
        }
        Ok(())
    }

    fn load_tables(txn: &WriteTransaction) -> StorageResult<Vec<DiningTable>> {
        let table = txn.open_table(DINING_TABLES_TABLE)?;
        let mut tables = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            tables.push(serde_json::from_slice(value.value())?);
        }
        Ok(tables)
    }

    fn store_table(txn: &WriteTransaction, dining_table: &DiningTable) -> StorageResult<()> {
        let mut table = txn.open_table(DINING_TABLES_TABLE)?;
        let value = serde_json::to_vec(dining_table)?;
        table.insert(dining_table.id, value.as_slice())?;
        Ok(())
    }

    /// 释放桌台，仅当它仍被该记录占用
    fn release_table(txn: &WriteTransaction, table_id: u32, holder: u64) -> StorageResult<bool> {
        let current: Option<DiningTable> = {
            let table = txn.open_table(DINING_TABLES_TABLE)?;
            let value = table.get(table_id)?;
            match value {
                Some(v) => Some(serde_json::from_slice(v.value())?),
                None => None,
            }
        };
        match current {
            Some(mut dining_table) if dining_table.occupied_by == Some(holder) => {
                dining_table.occupied_by = None;
                Self::store_table(txn, &dining_table)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn occupy(
        txn: &WriteTransaction,
        tables: &[DiningTable],
        table_id: u32,
        holder: u64,
    ) -> StorageResult<bool> {
        match tables.iter().find(|t| t.id == table_id && !t.is_occupied()) {
            Some(found) => {
                let mut dining_table = found.clone();
                dining_table.occupied_by = Some(holder);
                Self::store_table(txn, &dining_table)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn index_new(txn: &WriteTransaction, record: &Reservation) -> StorageResult<()> {
        let mut codes = txn.open_table(CODES_TABLE)?;
        if codes.get(record.code.as_str())?.is_some() {
            return Err(StorageError::DuplicateCode(record.code.clone()));
        }
        codes.insert(record.code.as_str(), record.id)?;

        let key = date_key(record.date);
        let mut index = txn.open_table(DATE_INDEX_TABLE)?;
        index.insert((key.as_str(), record.id), ())?;
        Ok(())
    }

    // ========== Table inventory ==========

    /// 按配置同步桌台 (id 从 1 开始)
    ///
    /// 已有桌台保留占用状态；多出的桌台只有空闲时才移除。
    pub fn sync_tables(&self, capacities: &[u32]) -> StorageResult<Vec<DiningTable>> {
        let txn = self.db.begin_write()?;
        {
            let existing = Self::load_tables(&txn)?;
            for (index, capacity) in capacities.iter().enumerate() {
                let id = index as u32 + 1;
                let occupied_by = existing
                    .iter()
                    .find(|t| t.id == id)
                    .and_then(|t| t.occupied_by);
                Self::store_table(
                    &txn,
                    &DiningTable {
                        id,
                        capacity: *capacity,
                        occupied_by,
                    },
                )?;
            }
            let mut table = txn.open_table(DINING_TABLES_TABLE)?;
            for extra in existing.iter().filter(|t| t.id as usize > capacities.len()) {
                if extra.is_occupied() {
                    tracing::warn!(table_id = extra.id, "Table removed from config is still occupied, keeping it");
                } else {
                    table.remove(extra.id)?;
                }
            }
        }
        txn.commit()?;
        self.list_tables()
    }

    pub fn list_tables(&self) -> StorageResult<Vec<DiningTable>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DINING_TABLES_TABLE)?;
        let mut tables = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            tables.push(serde_json::from_slice(value.value())?);
        }
        Ok(tables)
    }

    // ========== Reservations ==========

    pub fn code_exists(&self, code: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CODES_TABLE)?;
        Ok(table.get(code)?.is_some())
    }

    /// 插入新记录，分配顺序号
    pub fn insert_reservation(&self, new: NewReservation) -> StorageResult<Reservation> {
        let txn = self.db.begin_write()?;
        let record = {
            let id = Self::next_id(&txn)?;
            let record = new.into_reservation(id);
            Self::index_new(&txn, &record)?;
            Self::store(&txn, &record)?;
            record
        };
        txn.commit()?;
        Ok(record)
    }

    /// 插入并立即入座 (现场候位直接有桌)
    ///
    /// `chooser` 在事务内看到的桌台快照上选桌；选不到则整笔不写入。
    pub fn insert_seated<C>(&self, new: NewReservation, chooser: C) -> StorageResult<Guarded<Reservation>>
    where
        C: FnOnce(&[DiningTable]) -> Option<u32>,
    {
        let txn = self.db.begin_write()?;
        let record = {
            let tables = Self::load_tables(&txn)?;
            let Some(table_id) = chooser(&tables) else {
                txn.abort()?;
                return Ok(Guarded::NoTable);
            };
            let id = Self::next_id(&txn)?;
            if !Self::occupy(&txn, &tables, table_id, id)? {
                txn.abort()?;
                return Ok(Guarded::NoTable);
            }
            let mut record = new.into_reservation(id);
            record.status = ReservationStatus::Seated;
            record.seated_at = Some(record.placed_at);
            record.table_id = Some(table_id);
            Self::index_new(&txn, &record)?;
            Self::store(&txn, &record)?;
            record
        };
        txn.commit()?;
        Ok(Guarded::Applied(record))
    }

    pub fn find_by_code(&self, code: &str) -> StorageResult<Option<Reservation>> {
        let read_txn = self.db.begin_read()?;
        let codes = read_txn.open_table(CODES_TABLE)?;
        let Some(id) = codes.get(code)?.map(|g| g.value()) else {
            return Ok(None);
        };
        let table = read_txn.open_table(RESERVATIONS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// 某日全部记录 (按 id 升序)
    pub fn list_by_date(&self, date: NaiveDate) -> StorageResult<Vec<Reservation>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DATE_INDEX_TABLE)?;
        let table = read_txn.open_table(RESERVATIONS_TABLE)?;

        let key = date_key(date);
        let range_start = (key.as_str(), 0u64);
        let range_end = (key.as_str(), u64::MAX);

        let mut records = Vec::new();
        for entry in index.range(range_start..=range_end)? {
            let (k, _) = entry?;
            let (_, id) = k.value();
            if let Some(value) = table.get(id)? {
                records.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(records)
    }

    /// 指定状态的记录；非终态走 active 索引
    pub fn list_by_status(&self, status: ReservationStatus) -> StorageResult<Vec<Reservation>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RESERVATIONS_TABLE)?;
        let mut records = Vec::new();

        if status.is_terminal() {
            for entry in table.iter()? {
                let (_, value) = entry?;
                let record: Reservation = serde_json::from_slice(value.value())?;
                if record.status == status {
                    records.push(record);
                }
            }
        } else {
            let active = read_txn.open_table(ACTIVE_TABLE)?;
            for entry in active.iter()? {
                let (k, _) = entry?;
                if let Some(value) = table.get(k.value())? {
                    let record: Reservation = serde_json::from_slice(value.value())?;
                    if record.status == status {
                        records.push(record);
                    }
                }
            }
        }
        Ok(records)
    }

    // ========== Conditional writes ==========

    /// 条件状态迁移
    ///
    /// 仅当当前状态属于 `expected` 时写入。进入终态时释放桌台
    /// (只释放仍由该记录占用的那张)，同一事务提交。
    pub fn transition(
        &self,
        id: u64,
        expected: &[ReservationStatus],
        next: ReservationStatus,
        at: NaiveDateTime,
    ) -> StorageResult<Guarded<Reservation>> {
        let txn = self.db.begin_write()?;
        let record = {
            let mut record = Self::load(&txn, id)?;
            if !expected.contains(&record.status) {
                let current = record.status;
                txn.abort()?;
                return Ok(Guarded::Skipped(current));
            }
            record.status = next;
            match next {
                ReservationStatus::Notified => record.notified_at = Some(at),
                ReservationStatus::Seated => record.seated_at = Some(at),
                _ => {}
            }
            if next.is_terminal()
                && let Some(table_id) = record.table_id
                && Self::release_table(&txn, table_id, id)?
            {
                tracing::debug!(reservation_id = id, table_id, "Table released");
            }
            Self::store(&txn, &record)?;
            record
        };
        txn.commit()?;
        Ok(Guarded::Applied(record))
    }

    /// 条件分配桌台并迁移状态
    ///
    /// 记录已持有桌台 (叫号保留) 时直接沿用，否则由 `chooser` 选桌。
    /// 状态检查、桌台占用、状态写入在同一写事务内完成。
    pub fn assign_table<C>(
        &self,
        id: u64,
        expected: &[ReservationStatus],
        next: ReservationStatus,
        at: NaiveDateTime,
        chooser: C,
    ) -> StorageResult<Guarded<Reservation>>
    where
        C: FnOnce(&Reservation, &[DiningTable]) -> Option<u32>,
    {
        let txn = self.db.begin_write()?;
        let record = {
            let mut record = Self::load(&txn, id)?;
            if !expected.contains(&record.status) {
                let current = record.status;
                txn.abort()?;
                return Ok(Guarded::Skipped(current));
            }

            let tables = Self::load_tables(&txn)?;
            let held = record.table_id.filter(|table_id| {
                tables
                    .iter()
                    .any(|t| t.id == *table_id && t.occupied_by == Some(id))
            });
            let table_id = match held {
                Some(table_id) => table_id,
                None => {
                    let Some(table_id) = chooser(&record, &tables) else {
                        txn.abort()?;
                        return Ok(Guarded::NoTable);
                    };
                    if !Self::occupy(&txn, &tables, table_id, id)? {
                        txn.abort()?;
                        return Ok(Guarded::NoTable);
                    }
                    table_id
                }
            };

            record.status = next;
            record.table_id = Some(table_id);
            match next {
                ReservationStatus::Notified => record.notified_at = Some(at),
                ReservationStatus::Seated => record.seated_at = Some(at),
                _ => {}
            }
            Self::store(&txn, &record)?;
            record
        };
        txn.commit()?;
        Ok(Guarded::Applied(record))
    }

    /// 标记提醒已发送 (仅 PENDING 且未提醒过)
    pub fn mark_reminded(&self, id: u64, at: NaiveDateTime) -> StorageResult<Guarded<Reservation>> {
        let txn = self.db.begin_write()?;
        let record = {
            let mut record = Self::load(&txn, id)?;
            if record.status != ReservationStatus::Pending || record.reminded_at.is_some() {
                let current = record.status;
                txn.abort()?;
                return Ok(Guarded::Skipped(current));
            }
            record.reminded_at = Some(at);
            Self::store(&txn, &record)?;
            record
        };
        txn.commit()?;
        Ok(Guarded::Applied(record))
    }
}

#[cfg(test)]
impl ReservationStorage {
    /// 写入无法解析的桌台行
    pub(crate) fn corrupt_table_row(&self, table_id: u32) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DINING_TABLES_TABLE)?;
            table.insert(table_id, b"not json".as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use shared::models::ReservationKind;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn new_record(code: &str, kind: ReservationKind, party_size: u32) -> NewReservation {
        NewReservation {
            code: code.to_string(),
            kind,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            party_size,
            owner_id: "guest-1".to_string(),
            contact: None,
            status: ReservationStatus::Pending,
            placed_at: at(10, 0),
            estimated_wait_minutes: None,
        }
    }

    fn smallest_free(party: u32) -> impl FnOnce(&[DiningTable]) -> Option<u32> {
        move |tables| {
            tables
                .iter()
                .filter(|t| !t.is_occupied() && t.capacity >= party)
                .min_by_key(|t| (t.capacity, t.id))
                .map(|t| t.id)
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        let record = storage
            .insert_reservation(new_record("R000001", ReservationKind::Reservation, 2))
            .unwrap();
        assert_eq!(record.id, 1);

        let by_code = storage.find_by_code("R000001").unwrap().unwrap();
        assert_eq!(by_code, record);
        assert!(storage.code_exists("R000001").unwrap());
        assert!(!storage.code_exists("R999999").unwrap());

        let by_date = storage.list_by_date(record.date).unwrap();
        assert_eq!(by_date.len(), 1);
        assert!(storage.list_by_date(record.date.succ_opt().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        storage
            .insert_reservation(new_record("R000001", ReservationKind::Reservation, 2))
            .unwrap();
        let result = storage.insert_reservation(new_record("R000001", ReservationKind::Reservation, 4));
        assert!(matches!(result, Err(StorageError::DuplicateCode(_))));
        // 失败的事务不消耗数据
        assert_eq!(storage.list_by_status(ReservationStatus::Pending).unwrap().len(), 1);
    }

    #[test]
    fn test_sync_tables_keeps_occupancy() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        storage.sync_tables(&[2, 4]).unwrap();
        let seated = storage
            .insert_seated(new_record("W000001", ReservationKind::Waitlist, 3), smallest_free(3))
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(seated.table_id, Some(2));

        let tables = storage.sync_tables(&[2, 6, 8]).unwrap();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[1].capacity, 6);
        assert_eq!(tables[1].occupied_by, Some(seated.id));

        // 占用中的桌台不会被删
        let tables = storage.sync_tables(&[2]).unwrap();
        assert_eq!(tables.len(), 2);
    }

    #[test]
    fn test_insert_seated_without_table_writes_nothing() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        storage.sync_tables(&[2]).unwrap();
        let outcome = storage
            .insert_seated(new_record("W000001", ReservationKind::Waitlist, 4), smallest_free(4))
            .unwrap();
        assert_eq!(outcome, Guarded::NoTable);
        assert!(storage.find_by_code("W000001").unwrap().is_none());
    }

    #[test]
    fn test_transition_is_guarded() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        let record = storage
            .insert_reservation(new_record("R000001", ReservationKind::Reservation, 2))
            .unwrap();

        let first = storage
            .transition(record.id, &[ReservationStatus::Pending], ReservationStatus::NoShow, at(19, 15))
            .unwrap();
        assert!(first.is_applied());

        let second = storage
            .transition(record.id, &[ReservationStatus::Pending], ReservationStatus::NoShow, at(19, 20))
            .unwrap();
        assert_eq!(second, Guarded::Skipped(ReservationStatus::NoShow));
        assert!(storage.list_by_status(ReservationStatus::Pending).unwrap().is_empty());
        assert_eq!(storage.list_by_status(ReservationStatus::NoShow).unwrap().len(), 1);
    }

    #[test]
    fn test_assign_then_complete_frees_table() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        storage.sync_tables(&[2, 4]).unwrap();
        let record = storage
            .insert_reservation(new_record("R000001", ReservationKind::Reservation, 3))
            .unwrap();

        let seated = storage
            .assign_table(
                record.id,
                &[ReservationStatus::Pending],
                ReservationStatus::Seated,
                at(19, 0),
                |r, tables| smallest_free(r.party_size)(tables),
            )
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(seated.table_id, Some(2));
        assert_eq!(seated.seated_at, Some(at(19, 0)));
        assert_eq!(storage.list_tables().unwrap()[1].occupied_by, Some(record.id));

        storage
            .transition(record.id, &[ReservationStatus::Seated], ReservationStatus::Completed, at(21, 0))
            .unwrap();
        assert!(storage.list_tables().unwrap().iter().all(|t| !t.is_occupied()));
    }

    #[test]
    fn test_release_only_own_table() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        storage.sync_tables(&[4]).unwrap();
        let held = storage
            .insert_seated(new_record("W000001", ReservationKind::Waitlist, 2), smallest_free(2))
            .unwrap()
            .applied()
            .unwrap();

        // 另一条记录指向同一桌台但并不持有它
        let other = storage
            .insert_reservation(new_record("R000002", ReservationKind::Reservation, 2))
            .unwrap();
        let mut stale = other.clone();
        stale.table_id = held.table_id;
        {
            let txn = storage.db.begin_write().unwrap();
            ReservationStorage::store(&txn, &stale).unwrap();
            txn.commit().unwrap();
        }

        storage
            .transition(other.id, &[ReservationStatus::Pending], ReservationStatus::Cancelled, at(12, 0))
            .unwrap();
        assert_eq!(storage.list_tables().unwrap()[0].occupied_by, Some(held.id));
    }

    #[test]
    fn test_mark_reminded_once() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        let record = storage
            .insert_reservation(new_record("R000001", ReservationKind::Reservation, 2))
            .unwrap();
        assert!(storage.mark_reminded(record.id, at(18, 0)).unwrap().is_applied());
        assert!(!storage.mark_reminded(record.id, at(18, 5)).unwrap().is_applied());
    }

    #[test]
    fn test_missing_record() {
        let storage = ReservationStorage::open_in_memory().unwrap();
        let result = storage.transition(42, &[ReservationStatus::Pending], ReservationStatus::Cancelled, at(12, 0));
        assert!(matches!(result, Err(StorageError::ReservationNotFound(42))));
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seating.redb");
        {
            let storage = ReservationStorage::open(&path).unwrap();
            storage.sync_tables(&[2, 4]).unwrap();
            storage
                .insert_reservation(new_record("R000001", ReservationKind::Reservation, 2))
                .unwrap();
        }
        let storage = ReservationStorage::open(&path).unwrap();
        assert_eq!(storage.list_tables().unwrap().len(), 2);
        let next = storage
            .insert_reservation(new_record("R000002", ReservationKind::Reservation, 2))
            .unwrap();
        assert_eq!(next.id, 2);
    }
}
