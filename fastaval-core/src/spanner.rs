//! Partitioned string-keyed map
//!
//! A `SpanningKeyIndex` behaves like a single `HashMap<String, V>`, but stores
//! its entries in separate sub-maps selected by the first `spanner_length`
//! characters of each key. This keeps any one hash table from growing to tens
//! of millions of entries when indexing very large protein files.
//!
//! A spanner length of 0 puts every key in one partition.

use std::collections::HashMap;

pub const DEFAULT_SPANNER_LENGTH: usize = 1;

#[derive(Debug, Clone)]
pub struct SpanningKeyIndex<V> {
    spanner_length: usize,
    partitions: HashMap<String, HashMap<String, V>>,
    len: usize,
}

impl<V> Default for SpanningKeyIndex<V> {
    fn default() -> Self {
        Self::new(DEFAULT_SPANNER_LENGTH)
    }
}

impl<V> SpanningKeyIndex<V> {
    pub fn new(spanner_length: usize) -> Self {
        Self {
            spanner_length,
            partitions: HashMap::new(),
            len: 0,
        }
    }

    /// The prefix that selects the partition for `key`.
    ///
    /// Keys shorter than the spanner length use the whole key.
    pub fn partition_key<'a>(&self, key: &'a str) -> &'a str {
        match key.char_indices().nth(self.spanner_length) {
            Some((byte_offset, _)) => &key[..byte_offset],
            None => key,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let partition = self.partition_key(&key).to_string();
        let previous = self.partitions.entry(partition).or_default().insert(key, value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.partitions.get(self.partition_key(key))?.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

/// Case-insensitive set of protein names backed by a spanning index.
#[derive(Debug, Clone, Default)]
pub struct SpanningNameSet {
    names: SpanningKeyIndex<()>,
}

impl SpanningNameSet {
    pub fn new(spanner_length: usize) -> Self {
        Self {
            names: SpanningKeyIndex::new(spanner_length),
        }
    }

    /// Returns false if the name was already present.
    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_lowercase(), ()).is_none()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
