/// Process-wide cache of built indexes, keyed by (table, index name)
use dashmap::DashMap;
use std::sync::Arc;

use super::{BTreeIndex, IndexKey};
use crate::types::RowId;

#[derive(Default)]
pub struct IndexCache {
    entries: DashMap<(String, String), Arc<BTreeIndex>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any tree cached under the same (table, index)
    pub fn insert(&self, table: &str, index: &str, tree: BTreeIndex) -> Arc<BTreeIndex> {
        let tree = Arc::new(tree);
        self.entries
            .insert((table.to_string(), index.to_string()), Arc::clone(&tree));
        tree
    }

    pub fn get(&self, table: &str, index: &str) -> Option<Arc<BTreeIndex>> {
        self.entries
            .get(&(table.to_string(), index.to_string()))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Row ids stored under `key`, if the index is cached
    pub fn lookup(&self, table: &str, index: &str, key: &IndexKey) -> Option<Vec<RowId>> {
        self.get(table, index).map(|tree| tree.search(key).to_vec())
    }

    /// Drop every index of `table`; returns how many were evicted
    pub fn evict_table(&self, table: &str) -> usize {
        let mut evicted = 0;
        self.entries.retain(|(t, _), _| {
            let keep = t != table;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn tree_with(key: i64, row: RowId) -> BTreeIndex {
        let mut tree = BTreeIndex::new();
        tree.insert(IndexKey::scalar(Value::Integer(key)), row).unwrap();
        tree
    }

    #[test]
    fn test_insert_lookup_evict() {
        let cache = IndexCache::new();
        cache.insert("users", "idx_age", tree_with(30, 1));
        cache.insert("users", "idx_name", tree_with(1, 2));
        cache.insert("orders", "idx_total", tree_with(5, 3));
        assert_eq!(cache.len(), 3);

        let key = IndexKey::scalar(Value::Integer(30));
        assert_eq!(cache.lookup("users", "idx_age", &key), Some(vec![1]));
        assert_eq!(cache.lookup("users", "missing", &key), None);

        assert_eq!(cache.evict_table("users"), 2);
        assert!(cache.get("users", "idx_age").is_none());
        assert!(cache.get("orders", "idx_total").is_some());
    }

    #[test]
    fn test_evict_counts_only_its_table_under_concurrent_inserts() {
        let cache = Arc::new(IndexCache::new());
        for i in 0..50 {
            cache.insert("users", &format!("idx_{}", i), tree_with(i, 1));
        }

        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..500 {
                    cache.insert("orders", &format!("idx_{}", i), tree_with(i, 2));
                }
            })
        };
        let evicted = cache.evict_table("users");
        writer.join().unwrap();

        assert_eq!(evicted, 50);
        assert_eq!(cache.len(), 500);
    }

    #[test]
    fn test_replace_entry() {
        let cache = IndexCache::new();
        cache.insert("t", "i", tree_with(1, 1));
        cache.insert("t", "i", tree_with(2, 2));
        assert_eq!(cache.len(), 1);
        let key = IndexKey::scalar(Value::Integer(2));
        assert_eq!(cache.lookup("t", "i", &key), Some(vec![2]));
    }
}
