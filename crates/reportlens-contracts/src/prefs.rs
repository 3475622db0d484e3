use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Per-user key-value persistence that survives restarts.
pub trait PreferenceStore: Send {
    fn get(&mut self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Key under which a locally chosen avatar image is stored.
pub fn avatar_key(principal_id: &str) -> String {
    format!("user_photo_{principal_id}")
}

/// Preferences kept in one JSON object on disk.
///
/// Reads refresh from disk so several instances pointed at the same file see
/// each other's writes; a flush only rewrites the keys this instance touched.
#[derive(Debug, Clone)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    payload: Option<Map<String, Value>>,
    dirty_keys: Vec<String>,
}

impl JsonPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: None,
            dirty_keys: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if self.dirty_keys.is_empty() {
            return Ok(());
        }
        let Some(payload) = &self.payload else {
            return Ok(());
        };

        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        for key in &self.dirty_keys {
            if let Some(value) = payload.get(key) {
                on_disk.insert(key.clone(), value.clone());
            }
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = Some(on_disk);
        self.dirty_keys.clear();
        Ok(())
    }

    fn reload(&mut self) -> &mut Map<String, Value> {
        self.payload.insert(read_json_object(&self.path).unwrap_or_default())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get(&mut self, key: &str) -> Option<String> {
        self.reload()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let payload = self.reload();
        let snapshot = Value::String(value.to_string());
        if payload.get(key) == Some(&snapshot) {
            return Ok(());
        }
        payload.insert(key.to_string(), snapshot);
        if !self.dirty_keys.iter().any(|existing| existing == key) {
            self.dirty_keys.push(key.to_string());
        }
        self.flush()
    }
}

/// Process-local store, mostly for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: BTreeMap<String, String>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&mut self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{avatar_key, JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore};

    #[test]
    fn avatar_key_is_scoped_by_principal() {
        assert_eq!(avatar_key("uid-42"), "user_photo_uid-42");
    }

    #[test]
    fn json_store_roundtrips_values() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = JsonPreferenceStore::new(temp.path().join("preferences.json"));
        assert_eq!(store.get("user_photo_a"), None);
        store.set("user_photo_a", "data:image/png;base64,AAAA")?;
        assert_eq!(
            store.get("user_photo_a").as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        Ok(())
    }

    #[test]
    fn json_store_survives_reload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("preferences.json");
        let mut store = JsonPreferenceStore::new(&path);
        store.set("user_photo_a", "one")?;
        store.set("user_photo_a", "two")?;

        let mut reloaded = JsonPreferenceStore::new(path);
        assert_eq!(reloaded.get("user_photo_a").as_deref(), Some("two"));
        Ok(())
    }

    #[test]
    fn json_store_merges_with_concurrent_writer() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("preferences.json");
        let mut store_a = JsonPreferenceStore::new(&path);
        let mut store_b = JsonPreferenceStore::new(&path);

        store_a.set("user_photo_a", "a")?;
        store_b.set("user_photo_b", "b")?;
        store_a.set("user_photo_c", "c")?;

        let mut reloaded = JsonPreferenceStore::new(path);
        assert_eq!(reloaded.get("user_photo_a").as_deref(), Some("a"));
        assert_eq!(reloaded.get("user_photo_b").as_deref(), Some("b"));
        assert_eq!(reloaded.get("user_photo_c").as_deref(), Some("c"));
        Ok(())
    }

    #[test]
    fn json_store_does_not_noop_on_stale_snapshot() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("preferences.json");
        let mut store_a = JsonPreferenceStore::new(&path);
        let mut store_b = JsonPreferenceStore::new(&path);

        store_a.set("key", "1")?;
        store_b.set("key", "2")?;
        store_a.set("key", "1")?;

        let mut reloaded = JsonPreferenceStore::new(path);
        assert_eq!(reloaded.get("key").as_deref(), Some("1"));
        Ok(())
    }

    #[test]
    fn corrupt_file_reads_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("preferences.json");
        std::fs::write(&path, "not json")?;
        let mut store = JsonPreferenceStore::new(&path);
        assert_eq!(store.get("key"), None);
        store.set("key", "value")?;
        assert_eq!(store.get("key").as_deref(), Some("value"));
        Ok(())
    }

    #[test]
    fn memory_store_roundtrips_values() -> anyhow::Result<()> {
        let mut store = MemoryPreferenceStore::new();
        store.set("user_photo_a", "x")?;
        assert_eq!(store.get("user_photo_a").as_deref(), Some("x"));
        Ok(())
    }
}
