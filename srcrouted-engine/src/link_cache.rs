//! Interface index → name cache.
//!
//! Address and route messages carry interface indices, but the mapping is
//! keyed by name. The cache is fed by link events (the bootstrap link dump
//! runs first for exactly this reason) and kept current by runtime link
//! notifications. Link events never produce kernel mutations.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct LinkCache {
    names: HashMap<u32, String>,
}

impl LinkCache {
    pub fn upsert(&mut self, index: u32, name: Option<String>) {
        if let Some(name) = name {
            self.names.insert(index, name);
        }
    }

    pub fn remove(&mut self, index: u32) -> Option<String> {
        self.names.remove(&index)
    }

    pub fn name(&self, index: u32) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
