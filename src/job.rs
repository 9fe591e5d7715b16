//! # Integration Job
//!
//! Drives one workbook through object storage: upload, preview for column selection,
//! consolidation into an output object and a download URL for it.
use crate::consolidate::consolidate_workbook;
use crate::consolidate::ConsolidationCriteria;
use crate::consolidate::ConsolidationReport;
use crate::preview::HeaderResolver;
use crate::preview::Preview;
use crate::spreadsheet::Workbook;
use crate::storage::naming;
use crate::storage::AccessMethod;
use crate::storage::ObjectStore;
use crate::storage::PresignedUrl;
use crate::writer;
use anyhow::Context;
use anyhow::Result;
use log::info;

pub struct IntegrationJob<S: ObjectStore> {
    store: S,
}

impl<S: ObjectStore> IntegrationJob<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// URL a client may use to upload `file_name` directly, with the key it will land under.
    pub fn upload_url(&self, file_name: &str) -> Result<(String, PresignedUrl)> {
        let key = naming::input_key(file_name);
        let url = self
            .store
            .presign(&key, AccessMethod::Put, None)
            .with_context(|| format!("Failed to issue upload URL for '{}'", key))?;
        Ok((key, url))
    }

    /// Stores an uploaded workbook and returns its input key.
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        let key = naming::input_key(file_name);
        self.store
            .put(&key, bytes)
            .with_context(|| format!("Failed to upload '{}'", key))?;
        info!("Uploaded {} bytes to '{}'", bytes.len(), key);
        Ok(key)
    }

    fn load(&self, input_key: &str) -> Result<Workbook> {
        let bytes = self
            .store
            .get(input_key)
            .with_context(|| format!("Failed to download '{}'", input_key))?;
        Workbook::from_bytes(&bytes).with_context(|| format!("Failed to read workbook '{}'", input_key))
    }

    /// Leading rows of the first sheet of an uploaded workbook.
    pub fn preview(&self, input_key: &str) -> Result<Preview> {
        let workbook = self.load(input_key)?;
        HeaderResolver::new(&workbook)
            .preview()
            .with_context(|| format!("Workbook '{}' has no sheet", input_key))
    }

    /// Consolidates an uploaded workbook and stores the result. Returns the output key.
    pub fn process(&self, input_key: &str, criteria: &ConsolidationCriteria) -> Result<(String, ConsolidationReport)> {
        let workbook = self.load(input_key)?;
        let (table, report) = consolidate_workbook(&workbook, criteria);
        let bytes = writer::write(&table).with_context(|| format!("Failed to write consolidated workbook for '{}'", input_key))?;
        let output_key = naming::output_key(input_key);
        self.store
            .put(&output_key, &bytes)
            .with_context(|| format!("Failed to upload '{}'", output_key))?;
        info!(
            "Stored '{}': {} row(s) from {} sheet(s), {} sheet(s) skipped",
            output_key,
            report.rows_included(),
            report.sheets_included(),
            report.sheets_skipped()
        );
        Ok((output_key, report))
    }

    pub fn download_url(&self, output_key: &str) -> Result<PresignedUrl> {
        self.store
            .presign(output_key, AccessMethod::Get, None)
            .with_context(|| format!("Failed to issue download URL for '{}'", output_key))
    }
}
