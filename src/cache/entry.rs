//! Cache Entry Module
//!
//! Defines the value slot stored for each (region, key) pair.

use std::sync::Arc;

// == Stored Value ==
/// A cached value together with the write that produced it.
///
/// The cache holds a shared reference to the value; readers receive clones of
/// the same `Arc`. `seq` orders writes so a sweep pass can tell whether an
/// entry was rewritten after the pass began.
#[derive(Debug)]
pub struct StoredValue<V: ?Sized> {
    value: Arc<V>,
    seq: u64,
}

impl<V: ?Sized> StoredValue<V> {
    // == Constructor ==
    pub fn new(value: Arc<V>, seq: u64) -> Self {
        Self { value, seq }
    }

    /// Returns a shared reference to the stored value
    pub fn value(&self) -> Arc<V> {
        Arc::clone(&self.value)
    }

    /// Write sequence number assigned when the value was stored
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// True when this value was written at or before `seq`
    pub fn written_before(&self, seq: u64) -> bool {
        self.seq <= seq
    }

    pub(crate) fn into_value(self) -> Arc<V> {
        self.value
    }
}

impl<V: ?Sized> Clone for StoredValue<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            seq: self.seq,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_shared() {
        let stored = StoredValue::new(Arc::new("v".to_string()), 1);
        let a = stored.value();
        let b = stored.value();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_written_before_boundary() {
        let stored = StoredValue::new(Arc::new(1u32), 5);
        assert!(stored.written_before(5));
        assert!(stored.written_before(6));
        assert!(!stored.written_before(4));
    }

    #[test]
    fn test_unsized_value() {
        let stored: StoredValue<str> = StoredValue::new(Arc::from("slice"), 0);
        assert_eq!(&*stored.value(), "slice");
    }
}
