//
// cache.rs
//
// Compute-once cell for lazily memoized derived values (symbol tables,
// child scopes, reference maps). First access computes; every later
// access returns the same value. Never recomputed: documents and scopes
// are immutable snapshots of one parse.
//

use std::sync::OnceLock;

pub struct CachedValue<T> {
    cell: OnceLock<T>,
}

impl<T> CachedValue<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Return the cached value, computing it with `init` on first access.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(init)
    }

    /// The value, if it has been computed.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }
}

impl<T> Default for CachedValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CachedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cell.get() {
            Some(v) => f.debug_tuple("CachedValue").field(v).finish(),
            None => f.write_str("CachedValue(<uncomputed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_computes_once() {
        let calls = Cell::new(0u32);
        let cached: CachedValue<u32> = CachedValue::new();

        let first = *cached.get_or_init(|| {
            calls.set(calls.get() + 1);
            42
        });
        let second = *cached.get_or_init(|| {
            calls.set(calls.get() + 1);
            99
        });

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_get_before_init() {
        let cached: CachedValue<String> = CachedValue::new();
        assert!(cached.get().is_none());
        cached.get_or_init(|| "x".to_string());
        assert_eq!(cached.get().map(String::as_str), Some("x"));
    }
}
