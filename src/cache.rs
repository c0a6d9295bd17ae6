// src/cache.rs
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::{debug, info};

use crate::{error::Result, table::Table};

/// Most recently loaded table per logical source.
///
/// Entries are whole `Arc<Table>` values: a reader sees either the old or the
/// new table for a key, never a partial one. The lock is never held while a
/// loader runs, so two forced refreshes of one key may both load; the last
/// one to finish wins.
#[derive(Default)]
pub struct TableCache {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the table cached under `key`, calling `loader` only on a miss or
    /// when `force_refresh` is set. A failed load keeps the previous entry.
    pub fn get<F>(&self, key: &str, loader: F, force_refresh: bool) -> Result<Arc<Table>>
    where
        F: FnOnce() -> Result<Table>,
    {
        // 1) Fast path: cached and not forced
        if !force_refresh {
            let map_r = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(table) = map_r.get(key) {
                debug!(key, "table cache hit");
                return Ok(Arc::clone(table));
            }
        }

        // 2) Load with no lock held
        let fresh = Arc::new(loader()?);

        // 3) Replace the entry wholesale
        let mut map_w = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        map_w.insert(key.to_string(), Arc::clone(&fresh));
        info!(key, rows = fresh.num_rows(), forced = force_refresh, "table cached");
        Ok(fresh)
    }

    /// Drop the entry for `key`; the next `get` loads it again.
    pub fn invalidate(&self, key: &str) -> bool {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use std::{
        cell::Cell,
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    fn rows(n: usize) -> Table {
        Table::from_rows(vec!["v".into()], vec![vec![Some("1".into())]; n]).unwrap()
    }

    #[test]
    fn second_get_does_not_reload() -> Result<()> {
        let cache = TableCache::new();
        let calls = Cell::new(0);
        let loader = || {
            calls.set(calls.get() + 1);
            Ok(rows(2))
        };

        cache.get("page", loader, false)?;
        let again = cache.get("page", loader, false)?;
        assert_eq!(calls.get(), 1);
        assert_eq!(again.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn forced_get_always_reloads_latest() -> Result<()> {
        let cache = TableCache::new();
        cache.get("posts", || Ok(rows(1)), false)?;

        let fresh = cache.get("posts", || Ok(rows(3)), true)?;
        assert_eq!(fresh.num_rows(), 3);

        let cached = cache.get("posts", || Ok(rows(9)), false)?;
        assert_eq!(cached.num_rows(), 3);
        assert_eq!(cache.len(), 1);
        Ok(())
    }

    #[test]
    fn failed_reload_keeps_previous_table() -> Result<()> {
        let cache = TableCache::new();
        cache.get("page", || Ok(rows(2)), false)?;

        let err = cache
            .get("page", || Err(ReportError::unavailable("page.csv", "gone")), true)
            .unwrap_err();
        assert!(matches!(err, ReportError::SourceUnavailable { .. }));
        assert_eq!(cache.get("page", || Ok(rows(5)), false)?.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn keys_are_independent_and_invalidate() -> Result<()> {
        let cache = TableCache::new();
        cache.get("a", || Ok(rows(1)), false)?;
        cache.get("b", || Ok(rows(2)), false)?;
        assert_eq!(cache.len(), 2);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.get("a", || Ok(rows(4)), false)?.num_rows(), 4);
        Ok(())
    }

    #[test]
    fn concurrent_forced_refreshes_leave_one_whole_entry() {
        let cache = Arc::new(TableCache::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (1..=4)
            .map(|n| {
                let cache = Arc::clone(&cache);
                let loads = Arc::clone(&loads);
                thread::spawn(move || {
                    cache
                        .get(
                            "page",
                            || {
                                loads.fetch_add(1, Ordering::SeqCst);
                                Ok(rows(n))
                            },
                            true,
                        )
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 4);
        assert_eq!(cache.len(), 1);
        let kept = cache.get("page", || Ok(rows(99)), false).unwrap();
        assert!((1..=4).contains(&kept.num_rows()));
    }
}
