use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Append-only hash-consing table.
///
/// Structurally equal values collapse to the same index. Index 0 is a
/// sentinel and is never handed out. There is no deletion: once a value is
/// interned, its index is stable for the lifetime of the table.
pub struct Table<T> {
    data: Vec<T>,
    /// Per-entry link to the next entry in the same bucket (0 terminates).
    chain: Vec<usize>,
    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with `2^bits` hash buckets.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Bucket bits should be in the range 0..=31");

        let size = 1 << bits;
        Self {
            data: vec![T::default()], // sentinel at index 0
            chain: vec![0],
            buckets: vec![0; size],
            bitmask: (size - 1) as u64,
        }
    }

    /// Allocate a fresh (default-valued) entry and return its index.
    ///
    /// The entry is not linked into any bucket; use it for values that are
    /// looked up by index only, such as terminals.
    pub fn alloc(&mut self) -> usize {
        self.push(T::default())
    }

    fn push(&mut self, value: T) -> usize {
        self.data.push(value);
        self.chain.push(0);
        self.data.len() - 1
    }
}

impl<T> Table<T> {
    /// Number of interned values (excluding the sentinel).
    pub fn size(&self) -> usize {
        self.data.len() - 1
    }

    /// Get the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index]
    }
}

impl<T> Table<T>
where
    T: Default + Hash + Eq,
{
    fn bucket_index(&self, value: &T) -> usize {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        (hasher.finish() & self.bitmask) as usize
    }

    /// Intern a value, returning the index of the existing copy if present.
    pub fn put(&mut self, value: T) -> usize {
        let bucket = self.bucket_index(&value);
        let mut index = self.buckets[bucket];

        if index == 0 {
            let i = self.push(value);
            self.buckets[bucket] = i;
            return i;
        }

        loop {
            debug_assert!(index > 0);

            if &value == self.value(index) {
                return index;
            }

            let next = self.chain[index];
            if next == 0 {
                let i = self.push(value);
                self.chain[index] = i;
                return i;
            }
            index = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc() {
        let mut table = Table::<u32>::new(2);
        assert_eq!(table.alloc(), 1);
        assert_eq!(table.alloc(), 2);
        assert_eq!(table.size(), 2);
    }

    #[test]
    fn test_put_dedup() {
        let mut table = Table::new(2);
        let a = table.put(42);
        let b = table.put(43);
        let c = table.put(42);
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(*table.value(a), 42);
        assert_eq!(*table.value(b), 43);
    }

    #[test]
    fn test_put_many_collisions() {
        // Two buckets, plenty of values: chains must still dedup correctly.
        let mut table = Table::new(1);
        let indices: Vec<_> = (0..100).map(|i| table.put(i)).collect();
        for (i, &index) in indices.iter().enumerate() {
            assert_eq!(table.put(i as i32), index);
        }
        assert_eq!(table.size(), 100);
    }
}
