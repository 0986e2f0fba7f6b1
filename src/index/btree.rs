//! In-memory B+Tree
//!
//! ## Design
//! - Nodes live in an arena (`Vec<Node>`) and refer to each other by id
//! - Leaves hold keys with their value lists and are chained for range scans
//! - Duplicate keys accumulate values unless `unique_keys` is set
//!
//! ```text
//!            [ k3 | k6 ]
//!           /     |     \
//!   [k1 k2] -> [k3 k4 k5] -> [k6 k7]
//! ```
use crate::error::{EngineError, Result};
use std::fmt::Display;

/// Default node order (max keys per node)
pub const BTREE_ORDER: usize = 64;

type NodeId = usize;

/// B+Tree configuration
#[derive(Debug, Clone)]
pub struct BTreeConfig {
    /// Node order (max keys per node, at least 3)
    pub order: usize,

    /// Reject a second value for an existing key
    pub unique_keys: bool,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        Self {
            order: BTREE_ORDER,
            unique_keys: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BTreeStats {
    pub total_keys: usize,
    pub total_values: usize,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
    pub height: usize,
}

#[derive(Debug, Clone)]
enum Node<K, V> {
    Internal {
        keys: Vec<K>,
        children: Vec<NodeId>,
    },
    Leaf {
        keys: Vec<K>,
        values: Vec<Vec<V>>,
        next_leaf: Option<NodeId>,
    },
}

#[derive(Debug, Clone)]
pub struct BTree<K, V> {
    nodes: Vec<Node<K, V>>,
    root: NodeId,
    config: BTreeConfig,
    stats: BTreeStats,
}

impl<K, V> BTree<K, V>
where
    K: Ord + Clone + Display,
    V: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self::with_config(BTreeConfig::default())
    }

    pub fn with_config(mut config: BTreeConfig) -> Self {
        config.order = config.order.max(3);
        Self {
            nodes: vec![Node::Leaf {
                keys: Vec::new(),
                values: Vec::new(),
                next_leaf: None,
            }],
            root: 0,
            config,
            stats: BTreeStats {
                leaf_nodes: 1,
                height: 1,
                ..Default::default()
            },
        }
    }

    /// Insert a (key, value) pair. Inserting the same pair twice is a no-op.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        if let Some((split_key, new_node)) = self.insert_internal(self.root, key, value)? {
            // Root split: grow the tree by one level
            let old_root = self.root;
            self.nodes.push(Node::Internal {
                keys: vec![split_key],
                children: vec![old_root, new_node],
            });
            self.root = self.nodes.len() - 1;
            self.stats.internal_nodes += 1;
            self.stats.height += 1;
        }
        Ok(())
    }

    /// Returns the separator and new right sibling when `node_id` splits
    fn insert_internal(&mut self, node_id: NodeId, key: K, value: V) -> Result<Option<(K, NodeId)>> {
        let child = match &self.nodes[node_id] {
            Node::Internal { keys, children } => {
                let idx = match keys.binary_search(&key) {
                    Ok(i) => i + 1,
                    Err(i) => i,
                };
                Some((idx, children[idx]))
            }
            Node::Leaf { .. } => None,
        };

        match child {
            None => self.insert_into_leaf(node_id, key, value),
            Some((idx, child_id)) => {
                let Some((split_key, new_child)) = self.insert_internal(child_id, key, value)? else {
                    return Ok(None);
                };
                let overflow = match &mut self.nodes[node_id] {
                    Node::Internal { keys, children } => {
                        keys.insert(idx, split_key);
                        children.insert(idx + 1, new_child);
                        keys.len() > self.config.order
                    }
                    Node::Leaf { .. } => false,
                };
                if overflow {
                    Ok(Some(self.split_internal(node_id)))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn insert_into_leaf(&mut self, node_id: NodeId, key: K, value: V) -> Result<Option<(K, NodeId)>> {
        let unique = self.config.unique_keys;
        let order = self.config.order;

        let overflow = match &mut self.nodes[node_id] {
            Node::Leaf { keys, values, .. } => match keys.binary_search(&key) {
                Ok(i) => {
                    if values[i].contains(&value) {
                        return Ok(None);
                    }
                    if unique {
                        return Err(EngineError::ConstraintViolation(format!(
                            "duplicate key {} in unique index",
                            key
                        )));
                    }
                    values[i].push(value);
                    self.stats.total_values += 1;
                    return Ok(None);
                }
                Err(i) => {
                    keys.insert(i, key);
                    values.insert(i, vec![value]);
                    self.stats.total_keys += 1;
                    self.stats.total_values += 1;
                    keys.len() > order
                }
            },
            Node::Internal { .. } => false,
        };

        if overflow {
            Ok(Some(self.split_leaf(node_id)))
        } else {
            Ok(None)
        }
    }

    /// Move the upper half of a leaf into a new right sibling
    fn split_leaf(&mut self, node_id: NodeId) -> (K, NodeId) {
        let new_id = self.nodes.len();
        let (right_keys, right_values, right_next) = match &mut self.nodes[node_id] {
            Node::Leaf {
                keys,
                values,
                next_leaf,
            } => {
                let mid = keys.len() / 2;
                let right_keys = keys.split_off(mid);
                let right_values = values.split_off(mid);
                let right_next = next_leaf.replace(new_id);
                (right_keys, right_values, right_next)
            }
            Node::Internal { .. } => unreachable!("split_leaf called on internal node"),
        };

        let split_key = right_keys[0].clone();
        self.nodes.push(Node::Leaf {
            keys: right_keys,
            values: right_values,
            next_leaf: right_next,
        });
        self.stats.leaf_nodes += 1;
        (split_key, new_id)
    }

    /// Move the upper half of an internal node into a new sibling; the middle
    /// key moves up to the parent
    fn split_internal(&mut self, node_id: NodeId) -> (K, NodeId) {
        let (split_key, right_keys, right_children) = match &mut self.nodes[node_id] {
            Node::Internal { keys, children } => {
                let mid = keys.len() / 2;
                let mut right_keys = keys.split_off(mid);
                let split_key = right_keys.remove(0);
                let right_children = children.split_off(mid + 1);
                (split_key, right_keys, right_children)
            }
            Node::Leaf { .. } => unreachable!("split_internal called on leaf"),
        };

        self.nodes.push(Node::Internal {
            keys: right_keys,
            children: right_children,
        });
        self.stats.internal_nodes += 1;
        (split_key, self.nodes.len() - 1)
    }

    fn find_leaf(&self, key: &K) -> NodeId {
        let mut node_id = self.root;
        loop {
            match &self.nodes[node_id] {
                Node::Internal { keys, children } => {
                    let idx = match keys.binary_search(key) {
                        Ok(i) => i + 1,
                        Err(i) => i,
                    };
                    node_id = children[idx];
                }
                Node::Leaf { .. } => return node_id,
            }
        }
    }

    fn leftmost_leaf(&self) -> NodeId {
        let mut node_id = self.root;
        while let Node::Internal { children, .. } = &self.nodes[node_id] {
            node_id = children[0];
        }
        node_id
    }

    /// Values stored under `key` (empty when absent)
    pub fn search(&self, key: &K) -> &[V] {
        match &self.nodes[self.find_leaf(key)] {
            Node::Leaf { keys, values, .. } => match keys.binary_search(key) {
                Ok(i) => &values[i],
                Err(_) => &[],
            },
            Node::Internal { .. } => &[],
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        !self.search(key).is_empty()
    }

    /// Range query over `start..=end`, following the leaf chain
    ///
    /// Performance: O(log n + k) where k is the number of results
    pub fn range(&self, start: &K, end: &K) -> Vec<(K, V)> {
        let mut results = Vec::new();
        if start > end {
            return results;
        }

        let mut leaf = Some(self.find_leaf(start));
        while let Some(node_id) = leaf {
            let Node::Leaf {
                keys,
                values,
                next_leaf,
            } = &self.nodes[node_id]
            else {
                break;
            };
            for (k, vs) in keys.iter().zip(values) {
                if k < start {
                    continue;
                }
                if k > end {
                    return results;
                }
                results.extend(vs.iter().map(|v| (k.clone(), v.clone())));
            }
            leaf = *next_leaf;
        }
        results
    }

    /// Keys in order with their row ids, walking the leaf chain
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[V])> + '_ {
        std::iter::successors(Some(self.leftmost_leaf()), move |&id| match &self.nodes[id] {
            Node::Leaf { next_leaf, .. } => *next_leaf,
            Node::Internal { .. } => None,
        })
        .filter_map(move |id| match &self.nodes[id] {
            Node::Leaf { keys, values, .. } => Some((keys, values)),
            Node::Internal { .. } => None,
        })
        .flat_map(|(keys, values)| keys.iter().zip(values.iter().map(Vec::as_slice)))
    }

    /// Every (key, value) pair in key order
    pub fn scan(&self) -> Vec<(K, V)> {
        let mut results = Vec::with_capacity(self.stats.total_values);
        for (k, vs) in self.iter() {
            results.extend(vs.iter().map(|v| (k.clone(), v.clone())));
        }
        results
    }

    pub fn min_key(&self) -> Option<&K> {
        match &self.nodes[self.leftmost_leaf()] {
            Node::Leaf { keys, .. } => keys.first(),
            Node::Internal { .. } => None,
        }
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.stats.total_keys
    }

    pub fn is_empty(&self) -> bool {
        self.stats.total_keys == 0
    }

    pub fn height(&self) -> usize {
        self.stats.height
    }

    pub fn stats(&self) -> BTreeStats {
        self.stats.clone()
    }

    pub fn config(&self) -> &BTreeConfig {
        &self.config
    }
}

impl<K, V> Default for BTree<K, V>
where
    K: Ord + Clone + Display,
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
