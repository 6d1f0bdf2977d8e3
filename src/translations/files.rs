//! On-disk translation files, laid out as `<root>/<locale>/<namespace>.json`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::errors::AppError;

/// Key/value strings of one namespace. Values may nest.
pub type Messages = Map<String, Value>;

/// Access to the per-locale, per-namespace JSON files.
#[derive(Debug, Clone)]
pub struct LocaleFiles {
    root: PathBuf,
}

impl LocaleFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of one namespace file. Both names are validated first.
    pub fn path_for(&self, locale: &str, namespace: &str) -> Result<PathBuf, AppError> {
        validate_name("locale", locale)?;
        validate_name("namespace", namespace)?;
        Ok(self.root.join(locale).join(format!("{}.json", namespace)))
    }

    /// Read a namespace file; `None` when it does not exist.
    pub async fn read(&self, locale: &str, namespace: &str) -> Result<Option<Messages>, AppError> {
        let path = self.path_for(locale, namespace)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(messages)) => Ok(Some(messages)),
            Ok(_) => Err(AppError::Internal(format!(
                "{} does not contain a JSON object",
                path.display()
            ))),
            Err(e) => Err(AppError::Internal(format!(
                "{} is not valid JSON: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Write a namespace file as pretty JSON with sorted keys.
    pub async fn write(
        &self,
        locale: &str,
        namespace: &str,
        messages: &Messages,
    ) -> Result<PathBuf, AppError> {
        let path = self.path_for(locale, namespace)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut body = serde_json::to_vec_pretty(messages)?;
        body.push(b'\n');
        tokio::fs::write(&path, body).await?;
        tracing::debug!("Wrote translation file {}", path.display());
        Ok(path)
    }

    /// Locale directories present under the root, sorted.
    pub async fn locales(&self) -> Result<Vec<String>, AppError> {
        let mut locales = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(locales),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name("locale", name).is_ok() {
                    locales.push(name.to_string());
                }
            }
        }
        locales.sort();
        Ok(locales)
    }

    /// Namespace files of one locale, sorted.
    pub async fn namespaces(&self, locale: &str) -> Result<Vec<String>, AppError> {
        validate_name("locale", locale)?;
        let mut namespaces = Vec::new();
        let mut entries = match tokio::fs::read_dir(self.root.join(locale)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(namespaces),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name("namespace", stem).is_ok() {
                    namespaces.push(stem.to_string());
                }
            }
        }
        namespaces.sort();
        Ok(namespaces)
    }

    /// Every locale with its namespaces.
    pub async fn inventory(&self) -> Result<BTreeMap<String, Vec<String>>, AppError> {
        let mut inventory = BTreeMap::new();
        for locale in self.locales().await? {
            let namespaces = self.namespaces(&locale).await?;
            inventory.insert(locale, namespaces);
        }
        Ok(inventory)
    }
}

/// Locale and namespace names are single path components of `[A-Za-z0-9_-]`.
pub fn validate_name(kind: &str, name: &str) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid {} name: {:?}", kind, name)))
    }
}

/// Copy keys of `fallback` that are missing from `target`, recursing into objects.
pub fn fill_missing(target: &mut Messages, fallback: &Messages) {
    for (key, fallback_value) in fallback {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), fallback_value.clone());
            }
            Some(Value::Object(nested)) => {
                if let Value::Object(fallback_nested) = fallback_value {
                    fill_missing(nested, fallback_nested);
                }
            }
            Some(_) => {}
        }
    }
}
