use serde_json::{Map, Value};

/// A resolved location inside a document, handed out while a path is being
/// evaluated. Slots live only for the duration of the visit callback.
pub trait Slot {
    /// The current value, or `None` when the location is an absent map key.
    fn get(&self) -> Option<&Value>;
    fn get_mut(&mut self) -> Option<&mut Value>;
    /// Store `value` at this location, inserting the key if it is absent.
    fn set(&mut self, value: Value);
    /// Remove the location. Only map entries can be removed.
    fn delete(&mut self) -> Result<(), UnsupportedDelete>;
}

/// Returned when deleting a location that is not a map entry (an array
/// element or the document root).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedDelete;

/// A key within a map. The key may be absent.
pub struct EntrySlot<'a> {
    map: &'a mut Map<String, Value>,
    key: String,
}

impl<'a> EntrySlot<'a> {
    pub(crate) fn new(map: &'a mut Map<String, Value>, key: String) -> Self {
        Self { map, key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Slot for EntrySlot<'_> {
    fn get(&self) -> Option<&Value> {
        self.map.get(&self.key)
    }

    fn get_mut(&mut self) -> Option<&mut Value> {
        self.map.get_mut(&self.key)
    }

    fn set(&mut self, value: Value) {
        self.map.insert(self.key.clone(), value);
    }

    fn delete(&mut self) -> Result<(), UnsupportedDelete> {
        self.map.remove(&self.key);
        Ok(())
    }
}

/// A literal value: an array element or the root.
pub struct ValueSlot<'a> {
    value: &'a mut Value,
}

impl<'a> ValueSlot<'a> {
    pub(crate) fn new(value: &'a mut Value) -> Self {
        Self { value }
    }
}

impl Slot for ValueSlot<'_> {
    fn get(&self) -> Option<&Value> {
        Some(&*self.value)
    }

    fn get_mut(&mut self) -> Option<&mut Value> {
        Some(&mut *self.value)
    }

    fn set(&mut self, value: Value) {
        *self.value = value;
    }

    fn delete(&mut self) -> Result<(), UnsupportedDelete> {
        Err(UnsupportedDelete)
    }
}
