//! Sparse per-field storage.
//!
//! Each attribute channel of a [`VertexDb`](crate::VertexDb) is a
//! [`SparseSet`]: a sparse array mapping vertex keys to dense indices plus a
//! contiguous dense array of values. Insert, lookup, and replace are O(1);
//! iteration is cache-friendly over the dense array. Records are never
//! deleted, so there is no removal path.

/// Sparse map from a dense integer key to a value of type `T`.
pub struct SparseSet<T> {
    /// `key -> dense index`. `None` means the key has no value.
    sparse: Vec<Option<u32>>,
    /// Dense array of values.
    dense: Vec<T>,
    /// Keys corresponding to each dense element.
    keys: Vec<u32>,
}

impl<T> SparseSet<T> {
    /// Creates an empty sparse set.
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            keys: Vec::new(),
        }
    }

    /// Inserts a value for the given key, replacing any existing value.
    pub fn insert(&mut self, key: u32, value: T) {
        let idx = key as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, None);
        }

        if let Some(dense_idx) = self.sparse[idx] {
            self.dense[dense_idx as usize] = value;
        } else {
            self.sparse[idx] = Some(self.dense.len() as u32);
            self.dense.push(value);
            self.keys.push(key);
        }
    }

    /// Returns a reference to the value for the given key.
    pub fn get(&self, key: u32) -> Option<&T> {
        let dense_idx = *self.sparse.get(key as usize)?.as_ref()? as usize;
        Some(&self.dense[dense_idx])
    }

    /// Returns whether the key has a value.
    pub fn contains(&self, key: u32) -> bool {
        let idx = key as usize;
        idx < self.sparse.len() && self.sparse[idx].is_some()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Iterates over `(key, &value)` pairs in dense (insertion) order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.keys.iter().copied().zip(self.dense.iter())
    }
}

impl<T: PartialEq> SparseSet<T> {
    /// Content equality: the same key→value mapping, independent of the
    /// dense order the values were inserted in.
    pub fn content_eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
