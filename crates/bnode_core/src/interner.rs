use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Index;

/// A bidirectional map between values and dense u32 indices.
/// Graph terms are interned once at load time so the hot paths of signature
/// computation and co-traversal only ever touch integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Deserialize<'de> + Eq + Hash"
))]
pub struct Interner<T> {
    map: HashMap<T, u32>,
    vec: Vec<T>,
}

impl<T> Default for Interner<T> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            vec: Vec::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> Interner<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing index of `value`, or assigns the next free one.
    /// O(1) average case.
    pub fn intern(&mut self, value: &T) -> u32 {
        if let Some(&id) = self.map.get(value) {
            return id;
        }
        let id = self.vec.len() as u32;
        self.vec.push(value.clone());
        self.map.insert(value.clone(), id);
        id
    }

    /// Reverse lookup: index -> value.
    pub fn lookup(&self, id: u32) -> Option<&T> {
        self.vec.get(id as usize)
    }

    pub fn lookup_id(&self, value: &T) -> Option<u32> {
        self.map.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Values in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.vec.iter().enumerate().map(|(i, v)| (i as u32, v))
    }
}

impl<T> Index<u32> for Interner<T> {
    type Output = T;

    fn index(&self, id: u32) -> &T {
        &self.vec[id as usize]
    }
}
