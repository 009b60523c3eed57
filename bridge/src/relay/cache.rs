/// Template Cache - single slot holding the most recently fetched template
///
/// The lock only ever guards an `Arc` swap or clone. Callers serialize, log
/// and await after the guard is gone.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::blockchain::BlockTemplate;

#[derive(Debug, Default)]
pub struct TemplateCache {
    slot: Mutex<Option<Arc<BlockTemplate>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached template unconditionally
    pub fn set(&self, template: Arc<BlockTemplate>) {
        let previous = self.slot.lock().replace(template);
        // Last reference to an old template is released outside the lock
        drop(previous);
    }

    pub fn get(&self) -> Option<Arc<BlockTemplate>> {
        self.slot.lock().clone()
    }

    pub fn is_populated(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Read-only handle for tasks that must never write
    pub fn reader(self: &Arc<Self>) -> CacheReader {
        CacheReader { cache: self.clone() }
    }
}

/// Read-only view of a [`TemplateCache`]
#[derive(Debug, Clone)]
pub struct CacheReader {
    cache: Arc<TemplateCache>,
}

impl CacheReader {
    pub fn get(&self) -> Option<Arc<BlockTemplate>> {
        self.cache.get()
    }

    pub fn is_populated(&self) -> bool {
        self.cache.is_populated()
    }
}
