//! 桌台分配 (TableAllocator)
//!
//! 一桌一组客人，不拆桌。可用性计算 ([`can_pack`]) 与真实入座
//! ([`TableAllocator::allocate`]) 共用同一个选桌规则：能装下的最小桌。
//!
//! 一组一桌的前提下，降序 best-fit 等价于精确判定：第 k 大的一组
//! 必须能放进第 k 大的桌，而把每组放进能装下的最小桌不会挤占
//! 之后更小的组。

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use shared::models::{DiningTable, NewReservation, Reservation, ReservationStatus};

use crate::db::{Guarded, StoragePool};
use crate::utils::AppResult;

/// 判断一组人数能否各自分到一张不同的桌
///
/// 人数降序处理，每组取容量 ≥ 人数的最小桌并从多重集中移除。
pub fn can_pack(loads: &[u32], capacities: &[u32]) -> bool {
    if loads.len() > capacities.len() {
        return false;
    }

    let mut sorted = loads.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    // capacity -> count
    let mut free: BTreeMap<u32, usize> = BTreeMap::new();
    for capacity in capacities {
        *free.entry(*capacity).or_default() += 1;
    }

    for load in sorted {
        let Some((&capacity, _)) = free.range(load..).next() else {
            return false;
        };
        if let Some(count) = free.get_mut(&capacity) {
            *count -= 1;
            if *count == 0 {
                free.remove(&capacity);
            }
        }
    }
    true
}

/// 选桌规则：空闲且容量 ≥ 人数的最小桌，同容量取 id 小的
pub fn best_fit(party_size: u32, tables: &[DiningTable]) -> Option<u32> {
    tables
        .iter()
        .filter(|t| !t.is_occupied() && t.capacity >= party_size)
        .min_by_key(|t| (t.capacity, t.id))
        .map(|t| t.id)
}

/// 真实分配：选桌 + 占用 + 状态迁移在一个写事务内完成
#[derive(Debug, Clone)]
pub struct TableAllocator {
    pool: StoragePool,
}

impl TableAllocator {
    pub fn new(pool: StoragePool) -> Self {
        Self { pool }
    }

    /// 为已有记录分配桌台并迁移到 `next` (SEATED / NOTIFIED)
    pub async fn allocate(
        &self,
        reservation: &Reservation,
        expected: &[ReservationStatus],
        next: ReservationStatus,
        at: NaiveDateTime,
    ) -> AppResult<Guarded<Reservation>> {
        let handle = self.pool.borrow().await?;
        let outcome = handle.assign_table(reservation.id, expected, next, at, |record, tables| {
            best_fit(record.party_size, tables)
        })?;
        if let Guarded::Applied(ref seated) = outcome {
            tracing::debug!(
                code = %seated.code,
                table_id = ?seated.table_id,
                status = %seated.status,
                "Table allocated"
            );
        }
        Ok(outcome)
    }

    /// 新记录直接入座
    pub async fn seat_new(&self, new: NewReservation) -> AppResult<Guarded<Reservation>> {
        let party_size = new.party_size;
        let handle = self.pool.borrow().await?;
        Ok(handle.insert_seated(new, |tables| best_fit(party_size, tables))?)
    }

    pub async fn tables(&self) -> AppResult<Vec<DiningTable>> {
        let handle = self.pool.borrow().await?;
        Ok(handle.list_tables()?)
    }

    /// 全部桌台容量 (不论占用)
    pub async fn capacities(&self) -> AppResult<Vec<u32>> {
        Ok(self.tables().await?.iter().map(|t| t.capacity).collect())
    }
}

/// 最大桌容量，没有桌台时为 0
pub fn largest_capacity(capacities: &[u32]) -> u32 {
    capacities.iter().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// 穷举：每组尝试每张未用的桌
    fn exact_pack(loads: &[u32], capacities: &[u32]) -> bool {
        fn go(loads: &[u32], used: &mut Vec<bool>, capacities: &[u32]) -> bool {
            let Some((first, rest)) = loads.split_first() else {
                return true;
            };
            for i in 0..capacities.len() {
                if !used[i] && capacities[i] >= *first {
                    used[i] = true;
                    if go(rest, used, capacities) {
                        return true;
                    }
                    used[i] = false;
                }
            }
            false
        }
        go(loads, &mut vec![false; capacities.len()], capacities)
    }

    fn table(id: u32, capacity: u32, occupied_by: Option<u64>) -> DiningTable {
        DiningTable {
            id,
            capacity,
            occupied_by,
        }
    }

    #[test]
    fn test_can_pack_basic() {
        assert!(can_pack(&[], &[]));
        assert!(can_pack(&[2], &[2, 4]));
        assert!(can_pack(&[4, 2], &[2, 4]));
        assert!(!can_pack(&[4, 4], &[2, 4]));
        assert!(!can_pack(&[2, 2, 2], &[4, 4]));
    }

    #[test]
    fn test_no_split_across_tables() {
        // 6 人不能拆成两张 4 人桌
        assert!(!can_pack(&[6], &[2, 4, 4]));
        assert!(can_pack(&[6], &[2, 4, 6]));
    }

    #[test]
    fn test_best_fit_keeps_big_tables_free() {
        // 先放 2 人时若占 6 人桌，之后的 5 人就无桌可用
        assert!(can_pack(&[2, 5], &[6, 2]));
        assert!(can_pack(&[5, 2], &[2, 6]));
    }

    #[test]
    fn test_order_independent() {
        let capacities = [2, 2, 4, 4, 6, 8];
        let loads = [3, 1, 6, 2, 4];
        let expected = can_pack(&loads, &capacities);
        let mut rotated = loads;
        for _ in 0..loads.len() {
            rotated.rotate_left(1);
            assert_eq!(can_pack(&rotated, &capacities), expected);
            let mut reversed = rotated;
            reversed.reverse();
            assert_eq!(can_pack(&reversed, &capacities), expected);
        }
    }

    #[test]
    fn test_monotonic_in_capacities() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let capacities: Vec<u32> = (0..rng.gen_range(0..6)).map(|_| rng.gen_range(1..=8)).collect();
            let loads: Vec<u32> = (0..rng.gen_range(0..5)).map(|_| rng.gen_range(1..=8)).collect();
            let extra = rng.gen_range(1..=8);

            let mut more = capacities.clone();
            more.push(extra);
            if can_pack(&loads, &capacities) {
                assert!(can_pack(&loads, &more), "adding {extra} broke {loads:?} on {capacities:?}");
            }
            if !can_pack(&loads, &more) {
                assert!(!can_pack(&loads, &capacities));
            }
        }
    }

    #[test]
    fn test_matches_exhaustive_search() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let capacities: Vec<u32> = (0..rng.gen_range(0..6)).map(|_| rng.gen_range(1..=10)).collect();
            let loads: Vec<u32> = (0..rng.gen_range(0..6)).map(|_| rng.gen_range(1..=10)).collect();
            assert_eq!(
                can_pack(&loads, &capacities),
                exact_pack(&loads, &capacities),
                "loads {loads:?} capacities {capacities:?}"
            );
        }
    }

    #[test]
    fn test_best_fit_prefers_smallest_free() {
        let tables = vec![table(1, 6, None), table(2, 4, Some(9)), table(3, 4, None), table(4, 2, None)];
        assert_eq!(best_fit(3, &tables), Some(3));
        assert_eq!(best_fit(2, &tables), Some(4));
        assert_eq!(best_fit(5, &tables), Some(1));
        assert_eq!(best_fit(7, &tables), None);
    }

    #[test]
    fn test_largest_capacity() {
        assert_eq!(largest_capacity(&[2, 6, 4]), 6);
        assert_eq!(largest_capacity(&[]), 0);
    }
}
