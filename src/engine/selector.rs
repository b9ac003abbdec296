// src/engine/selector.rs

use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

use rand::Rng;

use crate::models::question::{CategoryKey, Question};

/// Eligible question ids per category, iterated in key order.
pub type CategoryPools = BTreeMap<CategoryKey, Vec<i64>>;

/// Number of category visits skipped before the first draw, so the first
/// question does not always come from the first category in key order.
pub const WARMUP_SKIP: RangeInclusive<usize> = 10..=20;

/// Reduces grouped questions to id pools.
pub fn pools_from(grouped: &BTreeMap<CategoryKey, Vec<Question>>) -> CategoryPools {
    grouped
        .iter()
        .map(|(key, questions)| (*key, questions.iter().map(|q| q.id).collect()))
        .collect()
}

/// Draws up to `target_count - assigned.len()` question ids, spread over the categories.
///
/// Every pass over the categories draws at most one question per category.
/// A pass that draws nothing re-opens all categories; the loop ends once the
/// requested number is reached or every pool is exhausted. The ids are returned
/// in draw order.
pub fn select_questions<R: Rng>(
    pools: &CategoryPools,
    target_count: usize,
    assigned: &HashSet<i64>,
    rng: &mut R,
) -> Vec<i64> {
    let mut todo = target_count.saturating_sub(assigned.len());
    if todo == 0 {
        return Vec::new();
    }

    let mut pools: Vec<Vec<i64>> = pools
        .values()
        .map(|ids| {
            ids.iter()
                .copied()
                .filter(|id| !assigned.contains(id))
                .collect()
        })
        .collect();

    if pools.iter().all(Vec::is_empty) {
        return Vec::new();
    }

    let mut skip = rng.random_range(WARMUP_SKIP);
    let mut visited = vec![false; pools.len()];
    let mut picked = Vec::with_capacity(todo);

    while todo > 0 {
        let before = todo;

        for (idx, pool) in pools.iter_mut().enumerate() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;

            if skip > 0 {
                skip -= 1;
                continue;
            }

            if !pool.is_empty() {
                let pick = rng.random_range(0..pool.len());
                picked.push(pool.swap_remove(pick));
                todo -= 1;
                if todo == 0 {
                    break;
                }
            }
        }

        if todo == before {
            if skip == 0 && pools.iter().all(Vec::is_empty) {
                break;
            }
            visited.fill(false);
        }
    }

    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashMap;

    fn pools(sizes: &[(CategoryKey, i64)]) -> CategoryPools {
        let mut next_id = 1;
        let mut pools = CategoryPools::new();
        for (key, size) in sizes {
            let ids: Vec<i64> = (next_id..next_id + size).collect();
            next_id += size;
            pools.insert(*key, ids);
        }
        pools
    }

    fn category_of(pools: &CategoryPools, id: i64) -> CategoryKey {
        *pools
            .iter()
            .find(|(_, ids)| ids.contains(&id))
            .map(|(key, _)| key)
            .unwrap()
    }

    #[test]
    fn test_spreads_evenly_over_categories() {
        let pools = pools(&[
            (CategoryKey::Category(1), 10),
            (CategoryKey::Category(2), 10),
            (CategoryKey::Category(3), 10),
        ]);

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = select_questions(&pools, 6, &HashSet::new(), &mut rng);
            assert_eq!(picked.len(), 6);

            let mut per_category: HashMap<CategoryKey, usize> = HashMap::new();
            for id in &picked {
                *per_category.entry(category_of(&pools, *id)).or_default() += 1;
            }
            assert_eq!(per_category.len(), 3, "seed {seed}: {per_category:?}");
            assert!(per_category.values().all(|&n| n == 2));
        }
    }

    #[test]
    fn test_every_category_appears_across_attempts() {
        let pools = pools(&[
            (CategoryKey::Uncategorized, 1),
            (CategoryKey::Category(7), 30),
            (CategoryKey::Category(9), 30),
        ]);

        let mut seen = HashSet::new();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            for id in select_questions(&pools, 4, &HashSet::new(), &mut rng) {
                seen.insert(category_of(&pools, id));
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_no_duplicates_and_respects_assigned() {
        let pools = pools(&[(CategoryKey::Category(1), 8), (CategoryKey::Uncategorized, 8)]);
        let assigned: HashSet<i64> = [1, 2, 9].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(3);

        let picked = select_questions(&pools, 12, &assigned, &mut rng);
        assert_eq!(picked.len(), 9);

        let unique: HashSet<i64> = picked.iter().copied().collect();
        assert_eq!(unique.len(), picked.len());
        assert!(unique.is_disjoint(&assigned));
    }

    #[test]
    fn test_short_catalog_returns_everything() {
        let pools = pools(&[(CategoryKey::Category(1), 2), (CategoryKey::Category(2), 3)]);
        let mut rng = StdRng::seed_from_u64(11);

        let mut picked = select_questions(&pools, 20, &HashSet::new(), &mut rng);
        picked.sort();
        assert_eq!(picked, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_nothing_to_do() {
        let pools = pools(&[(CategoryKey::Category(1), 5)]);
        let assigned: HashSet<i64> = [1, 2].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(1);

        assert!(select_questions(&pools, 2, &assigned, &mut rng).is_empty());
        assert!(select_questions(&CategoryPools::new(), 20, &HashSet::new(), &mut rng).is_empty());
        assert!(select_questions(&pools, 20, &(1..=5).collect(), &mut rng).is_empty());
    }

    #[test]
    fn test_same_seed_same_selection() {
        let pools = pools(&[(CategoryKey::Category(1), 10), (CategoryKey::Category(2), 10)]);

        let first = select_questions(&pools, 5, &HashSet::new(), &mut StdRng::seed_from_u64(42));
        let second = select_questions(&pools, 5, &HashSet::new(), &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }
}
