use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Memoized definitions keyed by name, with a lock per name.
///
/// The map lock is held only long enough to fetch or create a name's slot;
/// the definition itself runs under the slot lock. Concurrent requests for
/// one name therefore serialize through a single definition, while requests
/// for different names never wait on each other. Failed definitions leave the
/// slot empty so a later request may retry.
pub(crate) struct DefinitionCache<V> {
    slots: Mutex<HashMap<String, Arc<Mutex<Option<V>>>>>,
}

impl<V: Clone> DefinitionCache<V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The cached value for `name`, without waiting on an in-flight definition.
    pub(crate) fn peek(&self, name: &str) -> Option<V> {
        let slot = self.slots.lock().get(name).cloned()?;
        let value = slot.try_lock()?.clone();
        value
    }

    pub(crate) fn get_or_define<E>(
        &self,
        name: &str,
        define: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        let slot = self
            .slots
            .lock()
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut guard = slot.lock();
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }
        let value = define()?;
        *guard = Some(value.clone());
        Ok(value)
    }

    /// Number of names with a completed definition. Slots that are mid-
    /// definition are not counted.
    pub(crate) fn defined(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().values().cloned().collect();
        slots
            .iter()
            .filter(|slot| slot.try_lock().is_some_and(|value| value.is_some()))
            .count()
    }
}
