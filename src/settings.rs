use crate::error::SettingsError;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Token,
    Api,
    Payload,
}

impl SettingKey {
    pub const ALL: [SettingKey; 3] = [SettingKey::Token, SettingKey::Api, SettingKey::Payload];

    /// Name the value is stored under.
    pub fn storage_name(&self) -> &'static str {
        match self {
            SettingKey::Token => "geoTiffCesiumToken",
            SettingKey::Api => "geoTiffCatalogApi",
            SettingKey::Payload => "geoTiffCatalogPayload",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettingKey::Token => "token",
            SettingKey::Api => "API URL",
            SettingKey::Payload => "catalog payload",
        }
    }
}

pub trait SettingsBackend: Send + Sync {
    fn read(&self, name: &str) -> Result<Option<String>, SettingsError>;
    fn write(&self, name: &str, value: &str) -> Result<(), SettingsError>;
    fn remove(&self, name: &str) -> Result<(), SettingsError>;
}

#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl SettingsBackend for MemoryBackend {
    fn read(&self, name: &str) -> Result<Option<String>, SettingsError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(name).cloned())
    }

    fn write(&self, name: &str, value: &str) -> Result<(), SettingsError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), SettingsError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(name);
        Ok(())
    }
}

/// JSON object on disk, rewritten on every change.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        Ok(())
    }
}

impl SettingsBackend for FileBackend {
    fn read(&self, name: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.load()?.get(name).cloned())
    }

    fn write(&self, name: &str, value: &str) -> Result<(), SettingsError> {
        let mut values = self.load()?;
        values.insert(name.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, name: &str) -> Result<(), SettingsError> {
        let mut values = self.load()?;
        if values.remove(name).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

pub struct SettingsStore {
    backend: Box<dyn SettingsBackend>,
}

impl SettingsStore {
    pub fn new(backend: Box<dyn SettingsBackend>) -> Self {
        Self { backend }
    }

    pub fn persistent<P: AsRef<Path>>(path: P) -> Self {
        Self::new(Box::new(FileBackend::new(path)))
    }

    pub fn session() -> Self {
        Self::new(Box::new(MemoryBackend::default()))
    }

    /// Unreadable storage reads as "not set".
    pub fn get(&self, key: SettingKey) -> Option<String> {
        match self.backend.read(key.storage_name()) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Unable to read stored setting {}: {}", key.storage_name(), e);
                None
            }
        }
    }

    /// An empty value removes the key rather than storing "".
    pub fn set(&self, key: SettingKey, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        if value.is_empty() {
            return self.backend.remove(key.storage_name());
        }
        self.backend.write(key.storage_name(), value)
    }

    /// Stores a pasted catalog. Returns whether a payload is now stored.
    /// Anything other than a JSON array is refused and the previous payload
    /// stays as it was.
    pub fn set_payload(&self, raw: &str) -> Result<bool, SettingsError> {
        let raw = raw.trim();
        if raw.is_empty() {
            self.backend.remove(SettingKey::Payload.storage_name())?;
            return Ok(false);
        }
        let parsed: Value =
            serde_json::from_str(raw).map_err(|_| SettingsError::PayloadNotArray)?;
        if !parsed.is_array() {
            return Err(SettingsError::PayloadNotArray);
        }
        self.backend
            .write(SettingKey::Payload.storage_name(), &parsed.to_string())?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), SettingsError> {
        for key in SettingKey::ALL {
            self.backend.remove(key.storage_name())?;
        }
        Ok(())
    }

    pub fn saved_summary(&self) -> String {
        let saved: Vec<&str> = SettingKey::ALL
            .iter()
            .filter(|k| self.get(**k).is_some())
            .map(|k| k.label())
            .collect();
        if saved.is_empty() {
            return "No saved settings found yet.".to_string();
        }
        format!("Saved settings loaded for {}.", saved.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_value_removes_key() {
        let store = SettingsStore::session();
        store.set(SettingKey::Api, "https://example.com/catalog").unwrap();
        assert_eq!(
            store.get(SettingKey::Api).as_deref(),
            Some("https://example.com/catalog")
        );
        store.set(SettingKey::Api, "   ").unwrap();
        assert_eq!(store.get(SettingKey::Api), None);
    }

    #[test]
    fn test_payload_must_be_array() {
        let store = SettingsStore::session();
        assert!(store.set_payload(r#"[ {"url": "a", "date": "2020-01-01"} ]"#).unwrap());
        assert_eq!(
            store.get(SettingKey::Payload).as_deref(),
            Some(r#"[{"date":"2020-01-01","url":"a"}]"#)
        );

        assert!(matches!(
            store.set_payload(r#"{"url": "a"}"#),
            Err(SettingsError::PayloadNotArray)
        ));
        assert!(matches!(
            store.set_payload("nope"),
            Err(SettingsError::PayloadNotArray)
        ));
        // the earlier payload survives a rejected one
        assert!(store.get(SettingKey::Payload).is_some());

        assert!(!store.set_payload("").unwrap());
        assert_eq!(store.get(SettingKey::Payload), None);
    }

    #[test]
    fn test_saved_summary() {
        let store = SettingsStore::session();
        assert_eq!(store.saved_summary(), "No saved settings found yet.");
        store.set(SettingKey::Token, "abc").unwrap();
        store.set_payload("[]").unwrap();
        assert_eq!(
            store.saved_summary(),
            "Saved settings loaded for token, catalog payload."
        );
        store.clear().unwrap();
        assert_eq!(store.saved_summary(), "No saved settings found yet.");
    }

    #[test]
    fn test_file_backend_persists_between_stores() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.json");

        SettingsStore::persistent(&path)
            .set(SettingKey::Token, "secret")
            .unwrap();

        let reopened = SettingsStore::persistent(&path);
        assert_eq!(reopened.get(SettingKey::Token).as_deref(), Some("secret"));
        reopened.set(SettingKey::Token, "").unwrap();
        assert_eq!(SettingsStore::persistent(&path).get(SettingKey::Token), None);
    }

    #[test]
    fn test_corrupt_file_reads_as_unset() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::persistent(&path);
        assert_eq!(store.get(SettingKey::Api), None);
        assert!(store.set(SettingKey::Api, "x").is_err());
    }
}
