//! Report export to disk

use super::render_markdown;
use crate::error::ResearchError;
use crate::models::Report;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes `{SYMBOL}_report.md` and `{SYMBOL}_report.json` into a directory
pub struct ReportExporter {
    output_dir: PathBuf,
}

impl ReportExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn markdown_path(&self, symbol: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_report.md", symbol.to_uppercase()))
    }

    pub fn json_path(&self, symbol: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_report.json", symbol.to_uppercase()))
    }

    /// Write both documents, returning the Markdown path
    pub async fn export(&self, report: &Report) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                ResearchError::ExportError(format!(
                    "Cannot create {}: {}",
                    self.output_dir.display(),
                    e
                ))
            })?;

        let markdown_path = self.markdown_path(&report.symbol);
        tokio::fs::write(&markdown_path, render_markdown(report))
            .await
            .map_err(|e| {
                ResearchError::ExportError(format!("{}: {}", markdown_path.display(), e))
            })?;

        let json_path = self.json_path(&report.symbol);
        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&json_path, json)
            .await
            .map_err(|e| ResearchError::ExportError(format!("{}: {}", json_path.display(), e)))?;

        info!(
            symbol = %report.symbol,
            markdown = %markdown_path.display(),
            json = %json_path.display(),
            "Report exported"
        );

        Ok(markdown_path)
    }
}
