//! The ordered multimap behind the range index: a B-tree keyed by
//! [`DataCell`] with a configurable minimum degree, mapping each key to the
//! bitmap of rows holding that value.
//!
//! Removal empties a key's bucket in place rather than rebalancing the
//! tree; emptied keys are invisible to lookups and scans and are dropped
//! wholesale by `clear`. A node holds between `t - 1` and `2t - 1` keys
//! (root excepted), `t` being the fan-out degree from the schema.

use std::ops::Bound;

use roaring::RoaringTreemap;

use crate::construct::RowId;
use crate::datatype::DataCell;
use crate::schema::MIN_FAN_OUT;

#[derive(Debug)]
struct Node {
    keys: Vec<DataCell>,
    buckets: Vec<RoaringTreemap>,
    children: Vec<Node>,
}

impl Node {
    fn leaf() -> Self {
        Self {
            keys: Vec::new(),
            buckets: Vec::new(),
            children: Vec::new(),
        }
    }
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug)]
pub struct CellTree {
    root: Node,
    degree: usize,
    rows: u64,
}

impl CellTree {
    pub fn new(degree: usize) -> Self {
        Self {
            root: Node::leaf(),
            degree: degree.max(MIN_FAN_OUT),
            rows: 0,
        }
    }

    fn max_keys(&self) -> usize {
        2 * self.degree - 1
    }

    /// Files `id` under `key`, returning whether the bucket grew.
    pub fn insert(&mut self, key: DataCell, id: RowId) -> bool {
        if self.root.keys.len() == self.max_keys() {
            let old_root = std::mem::replace(&mut self.root, Node::leaf());
            self.root.children.push(old_root);
            Self::split(&mut self.root, 0, self.degree);
        }
        let degree = self.degree;
        let mut node = &mut self.root;
        loop {
            match node.keys.binary_search(&key) {
                Ok(i) => {
                    let grew = node.buckets[i].insert(id);
                    if grew {
                        self.rows += 1;
                    }
                    return grew;
                }
                Err(i) => {
                    if node.is_leaf() {
                        let mut bucket = RoaringTreemap::new();
                        bucket.insert(id);
                        node.keys.insert(i, key);
                        node.buckets.insert(i, bucket);
                        self.rows += 1;
                        return true;
                    }
                    let mut i = i;
                    if node.children[i].keys.len() == 2 * degree - 1 {
                        Self::split(node, i, degree);
                        // the promoted key may be the one we are after
                        match key.cmp(&node.keys[i]) {
                            std::cmp::Ordering::Equal => {
                                let grew = node.buckets[i].insert(id);
                                if grew {
                                    self.rows += 1;
                                }
                                return grew;
                            }
                            std::cmp::Ordering::Greater => i += 1,
                            std::cmp::Ordering::Less => {}
                        }
                    }
                    node = &mut node.children[i];
                }
            }
        }
    }

    /// Splits the full child `i` of `parent`, promoting its median key.
    fn split(parent: &mut Node, i: usize, degree: usize) {
        let child = &mut parent.children[i];
        let mid = degree - 1;
        let mut right = Node::leaf();
        right.keys = child.keys.split_off(mid + 1);
        right.buckets = child.buckets.split_off(mid + 1);
        if !child.is_leaf() {
            right.children = child.children.split_off(mid + 1);
        }
        let promoted_key = child.keys.pop().expect("full node has a median key");
        let promoted_bucket = child.buckets.pop().expect("full node has a median bucket");
        parent.keys.insert(i, promoted_key);
        parent.buckets.insert(i, promoted_bucket);
        parent.children.insert(i + 1, right);
    }

    /// Removes `id` from `key`'s bucket, returning whether it was present.
    /// An emptied bucket stays in the tree as a tombstone.
    pub fn remove(&mut self, key: &DataCell, id: RowId) -> bool {
        let mut node = &mut self.root;
        loop {
            match node.keys.binary_search(key) {
                Ok(i) => {
                    let removed = node.buckets[i].remove(id);
                    if removed {
                        self.rows -= 1;
                    }
                    return removed;
                }
                Err(i) => {
                    if node.is_leaf() {
                        return false;
                    }
                    node = &mut node.children[i];
                }
            }
        }
    }

    pub fn get(&self, key: &DataCell) -> Option<&RoaringTreemap> {
        let mut node = &self.root;
        loop {
            match node.keys.binary_search(key) {
                Ok(i) => {
                    let bucket = &node.buckets[i];
                    return if bucket.is_empty() { None } else { Some(bucket) };
                }
                Err(i) => {
                    if node.is_leaf() {
                        return None;
                    }
                    node = &node.children[i];
                }
            }
        }
    }

    pub fn contains(&self, key: &DataCell, id: RowId) -> bool {
        self.get(key).is_some_and(|bucket| bucket.contains(id))
    }

    /// Visits every live (key, bucket) pair within the bounds in
    /// non-decreasing key order.
    pub fn scan<F>(&self, low: Bound<&DataCell>, high: Bound<&DataCell>, mut visit: F)
    where
        F: FnMut(&DataCell, &RoaringTreemap),
    {
        Self::scan_node(&self.root, low, high, &mut visit);
    }

    fn scan_node<F>(node: &Node, low: Bound<&DataCell>, high: Bound<&DataCell>, visit: &mut F)
    where
        F: FnMut(&DataCell, &RoaringTreemap),
    {
        for i in 0..node.keys.len() {
            let key = &node.keys[i];
            // the left subtree only holds keys strictly below this one
            let descend_left = match low {
                Bound::Unbounded => true,
                Bound::Included(l) | Bound::Excluded(l) => key > l,
            };
            if !node.is_leaf() && descend_left {
                Self::scan_node(&node.children[i], low, high, visit);
            }
            let below_high = match high {
                Bound::Unbounded => true,
                Bound::Included(h) => key <= h,
                Bound::Excluded(h) => key < h,
            };
            if !below_high {
                return;
            }
            let above_low = match low {
                Bound::Unbounded => true,
                Bound::Included(l) => key >= l,
                Bound::Excluded(l) => key > l,
            };
            if above_low && !node.buckets[i].is_empty() {
                visit(key, &node.buckets[i]);
            }
        }
        if let Some(last) = node.children.last() {
            Self::scan_node(last, low, high, visit);
        }
    }

    pub fn clear(&mut self) {
        self.root = Node::leaf();
        self.rows = 0;
    }

    /// Number of row ids filed in the tree.
    pub fn len(&self) -> u64 {
        self.rows
    }
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}
