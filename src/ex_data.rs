//! Extra-data slots.
//!
//! OpenSSL lets callers hang arbitrary values off its structures through
//! registered slot indices. The bridge uses one slot to attach the host's
//! verification closure to a store or to a single store context. Indices are
//! registered once on an [`ExDataRegistry`]; each native object carries its
//! own [`ExData`] table keyed by those indices.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::verify::VerifyCallback;

/// A registered slot index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExDataIndex(usize);

impl ExDataIndex {
    pub fn as_raw(&self) -> usize {
        self.0
    }
}

/// Process-wide allocator of slot indices.
#[derive(Debug, Default)]
pub struct ExDataRegistry {
    labels: Mutex<Vec<String>>,
}

impl ExDataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new slot; `label` is only used for diagnostics.
    pub fn new_index(&self, label: &str) -> ExDataIndex {
        let mut labels = self.labels.lock().unwrap_or_else(PoisonError::into_inner);
        labels.push(label.to_string());
        let index = ExDataIndex(labels.len() - 1);
        tracing::debug!(index = index.0, label, "registered ex_data slot");
        index
    }

    pub fn label(&self, index: ExDataIndex) -> Option<String> {
        let labels = self.labels.lock().unwrap_or_else(PoisonError::into_inner);
        labels.get(index.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.labels.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Value stored in a verification slot.
#[derive(Clone)]
pub enum CallbackSlot {
    /// A closure was registered, but as nil.
    Nil,
    Callback(Arc<dyn VerifyCallback>),
}

impl CallbackSlot {
    pub fn callback<C>(callback: C) -> Self
    where
        C: VerifyCallback + 'static,
    {
        CallbackSlot::Callback(Arc::new(callback))
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackSlot::Nil => f.write_str("Nil"),
            CallbackSlot::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Extra-data table of one native object.
#[derive(Clone, Debug, Default)]
pub struct ExData {
    slots: HashMap<ExDataIndex, CallbackSlot>,
}

impl ExData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: ExDataIndex, slot: CallbackSlot) {
        self.slots.insert(index, slot);
    }

    pub fn get(&self, index: ExDataIndex) -> Option<&CallbackSlot> {
        self.slots.get(&index)
    }

    pub fn remove(&mut self, index: ExDataIndex) -> Option<CallbackSlot> {
        self.slots.remove(&index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::StoreContextHandle;

    #[test]
    fn test_indices_are_distinct() {
        let registry = ExDataRegistry::new();
        let a = registry.new_index("ossl_verify_cb_idx");
        let b = registry.new_index("other");
        assert_ne!(a, b);
        assert_eq!(registry.label(a).as_deref(), Some("ossl_verify_cb_idx"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_table_set_get_remove() {
        let registry = ExDataRegistry::new();
        let idx = registry.new_index("verify");
        let other = registry.new_index("unused");

        let mut data = ExData::new();
        assert!(data.get(idx).is_none());

        data.set(idx, CallbackSlot::callback(|ok: bool, _: &StoreContextHandle| anyhow::Ok(ok)));
        assert!(matches!(data.get(idx), Some(CallbackSlot::Callback(_))));
        assert!(data.get(other).is_none());

        data.set(idx, CallbackSlot::Nil);
        assert!(matches!(data.remove(idx), Some(CallbackSlot::Nil)));
        assert!(data.get(idx).is_none());
    }
}
