use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Reserved key holding pending flash messages.
pub const FLASHES_KEY: &str = "_flashes";

/// Per-client key/value store persisted in a signed cookie.
///
/// Every mutating call marks the session modified; only modified sessions
/// are written back to the client.
#[derive(Debug, Clone, Default)]
pub struct Session {
    data: BTreeMap<String, Value>,
    modified: bool,
    new: bool,
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Session {
    /// An empty session that did not come from a cookie.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
            modified: false,
            new: true,
        }
    }

    pub(crate) fn from_data(data: BTreeMap<String, Value>) -> Self {
        Self {
            data,
            modified: false,
            new: false,
        }
    }

    pub(crate) fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Deserialize a value; `None` when absent or of the wrong shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Store any serializable value.
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be represented as JSON.
    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.to_string(), value);
        self.modified = true;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let old = self.data.remove(key);
        if old.is_some() {
            self.modified = true;
        }
        old
    }

    /// Remove and return a value, or `default` when absent.
    pub fn pop_or(&mut self, key: &str, default: Value) -> Value {
        self.remove(key).unwrap_or(default)
    }

    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.modified = true;
        }
        self.data.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.new
    }

    #[must_use]
    pub fn modified(&self) -> bool {
        self.modified
    }

    /// Mark the session dirty after mutating a value in place.
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    #[must_use]
    pub fn should_save(&self) -> bool {
        self.modified
    }

    /// Append a message to the flash list.
    pub fn push_flash(&mut self, message: &str) {
        let mut flashes = match self.data.remove(FLASHES_KEY) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        flashes.push(Value::String(message.to_string()));
        self.data.insert(FLASHES_KEY.to_string(), Value::Array(flashes));
        self.modified = true;
    }

    /// Remove the whole flash list, keeping string entries only.
    pub fn take_flashes(&mut self) -> Vec<String> {
        match self.remove(FLASHES_KEY) {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Serialize for Session {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}
