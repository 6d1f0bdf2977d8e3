//! Translation sync operations.
//!
//! Callers name the operation explicitly; every run is bounded by the
//! configured timeout.

use std::collections::BTreeSet;
use std::future::Future;
use std::io::{Cursor, Write};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::{validate_name, LocaleFiles, TranslationApi};
use crate::config::TranslationConfig;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationOperation {
    /// Upload local namespace files
    Push,
    /// Download namespaces and overwrite local files
    Pull,
    /// Build a zip of all local files
    Package,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub operation: TranslationOperation,
    #[serde(default)]
    pub locales: Option<Vec<String>>,
    #[serde(default)]
    pub namespaces: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub operation: TranslationOperation,
    /// `<locale>/<namespace>` entries touched by the run
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_bytes: Option<usize>,
    pub elapsed_ms: u64,
}

/// Moves translation files between disk and the translation service.
pub struct TranslationSync {
    files: LocaleFiles,
    config: TranslationConfig,
    supported_locales: Vec<String>,
}

impl TranslationSync {
    pub fn new(files: LocaleFiles, config: TranslationConfig, supported_locales: Vec<String>) -> Self {
        Self {
            files,
            config,
            supported_locales,
        }
    }

    /// Run one operation under the configured time bound.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, AppError> {
        let started = Instant::now();
        tracing::info!(operation = ?request.operation, "Translation operation started");

        let (files, archive_bytes) = self
            .bounded(async {
                match request.operation {
                    TranslationOperation::Push => self
                        .push(request.locales.as_deref(), request.namespaces.as_deref())
                        .await
                        .map(|files| (files, None)),
                    TranslationOperation::Pull => self
                        .pull(request.locales.as_deref(), request.namespaces.as_deref())
                        .await
                        .map(|files| (files, None)),
                    TranslationOperation::Package => {
                        let (files, archive) = self.build_package().await?;
                        Ok((files, Some(archive.len())))
                    }
                }
            })
            .await?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            operation = ?request.operation,
            files = files.len(),
            elapsed_ms,
            "Translation operation finished"
        );

        Ok(RunReport {
            operation: request.operation,
            files,
            archive_bytes,
            elapsed_ms,
        })
    }

    /// Zip of every local translation file, as `<locale>/<namespace>.json`.
    pub async fn package(&self) -> Result<Vec<u8>, AppError> {
        self.bounded(async { self.build_package().await.map(|(_, archive)| archive) })
            .await
    }

    async fn bounded<T>(
        &self,
        work: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.config.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.timeout.as_secs(),
                    "Translation operation timed out"
                );
                Err(AppError::Timeout(format!(
                    "Translation operation exceeded {} s",
                    self.config.timeout.as_secs()
                )))
            }
        }
    }

    async fn push(
        &self,
        locales: Option<&[String]>,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<String>, AppError> {
        let api = TranslationApi::from_config(&self.config)?;
        let inventory = self.files.inventory().await?;
        let mut pushed = Vec::new();

        for (locale, local_namespaces) in &inventory {
            if !selected(locales, locale) {
                continue;
            }
            for namespace in local_namespaces {
                if !selected(namespaces, namespace) {
                    continue;
                }
                let Some(messages) = self.files.read(locale, namespace).await? else {
                    continue;
                };
                api.push(locale, namespace, &messages).await?;
                tracing::debug!("Pushed {}/{}", locale, namespace);
                pushed.push(format!("{}/{}", locale, namespace));
            }
        }

        Ok(pushed)
    }

    async fn pull(
        &self,
        locales: Option<&[String]>,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<String>, AppError> {
        let api = TranslationApi::from_config(&self.config)?;

        let locales: Vec<String> = match locales {
            Some(list) => list.to_vec(),
            None => self.supported_locales.clone(),
        };
        let namespaces: Vec<String> = match namespaces {
            Some(list) => list.to_vec(),
            None => self
                .files
                .inventory()
                .await?
                .into_values()
                .flatten()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        if namespaces.is_empty() {
            return Err(AppError::Validation(
                "No namespaces given and none found locally".to_string(),
            ));
        }

        let mut pulled = Vec::new();
        for locale in &locales {
            validate_name("locale", locale)?;
            for namespace in &namespaces {
                validate_name("namespace", namespace)?;
                match api.pull(locale, namespace).await? {
                    Some(messages) => {
                        self.files.write(locale, namespace, &messages).await?;
                        pulled.push(format!("{}/{}", locale, namespace));
                    }
                    None => tracing::warn!("{}/{} does not exist upstream", locale, namespace),
                }
            }
        }

        Ok(pulled)
    }

    async fn build_package(&self) -> Result<(Vec<String>, Vec<u8>), AppError> {
        let mut names = Vec::new();
        let mut entries = Vec::new();
        for (locale, namespaces) in self.files.inventory().await? {
            for namespace in namespaces {
                let path = self.files.path_for(&locale, &namespace)?;
                let bytes = tokio::fs::read(&path).await?;
                names.push(format!("{}/{}", locale, namespace));
                entries.push((format!("{}/{}.json", locale, namespace), bytes));
            }
        }

        let archive = tokio::task::spawn_blocking(move || build_zip(entries))
            .await
            .map_err(|e| AppError::Internal(format!("Packaging task failed: {}", e)))??;

        Ok((names, archive))
    }
}

fn selected(filter: Option<&[String]>, name: &str) -> bool {
    filter.map_or(true, |list| list.iter().any(|n| n == name))
}

fn build_zip(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>, AppError> {
    let zip_error = |e: zip::result::ZipError| AppError::Internal(format!("Zip error: {}", e));

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in entries {
        writer.start_file(name, options).map_err(zip_error)?;
        writer.write_all(&bytes)?;
    }

    Ok(writer.finish().map_err(zip_error)?.into_inner())
}
