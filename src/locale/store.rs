//! Translation loading for server-rendered pages.

use std::collections::BTreeMap;

use serde_json::Value;

use super::LocaleConfig;
use crate::errors::AppError;
use crate::translations::{fill_missing, LocaleFiles};

/// Loads the namespaces a page needs, falling back to the default locale per key.
#[derive(Debug, Clone)]
pub struct TranslationStore {
    files: LocaleFiles,
    locales: LocaleConfig,
}

impl TranslationStore {
    pub fn new(files: LocaleFiles, locales: LocaleConfig) -> Self {
        Self { files, locales }
    }

    pub fn files(&self) -> &LocaleFiles {
        &self.files
    }

    pub fn locales(&self) -> &LocaleConfig {
        &self.locales
    }

    /// Load `namespaces` for `locale`.
    ///
    /// Keys missing in `locale` come from the default locale; a namespace absent
    /// from both yields an empty object.
    pub async fn load_namespaces(
        &self,
        locale: &str,
        namespaces: &[String],
    ) -> Result<BTreeMap<String, Value>, AppError> {
        let default = self.locales.default_locale();
        let mut loaded = BTreeMap::new();

        for namespace in namespaces {
            let mut messages = self
                .files
                .read(locale, namespace)
                .await?
                .unwrap_or_default();

            if locale != default {
                match self.files.read(default, namespace).await? {
                    Some(fallback) => fill_missing(&mut messages, &fallback),
                    None => tracing::debug!(
                        "No default-locale file for namespace {} ({})",
                        namespace,
                        default
                    ),
                }
            }

            loaded.insert(namespace.clone(), Value::Object(messages));
        }

        Ok(loaded)
    }
}

/// Parse a `ns=common,home` style list. Blank entries are ignored, duplicates removed.
pub fn parse_namespace_list(raw: &str) -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let ns = part.trim();
        if !ns.is_empty() && !namespaces.iter().any(|n| n == ns) {
            namespaces.push(ns.to_string());
        }
    }
    namespaces
}
