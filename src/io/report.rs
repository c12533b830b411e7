// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! JSON report export

use anyhow::{Context, Result};
use std::path::Path;

use crate::recognition::AnalysisReport;

/// Serialize a report as pretty-printed JSON
pub fn report_to_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize analysis report")
}

/// Write a report as JSON to `path`
pub fn export_report_json(report: &AnalysisReport, path: impl AsRef<Path>) -> Result<()> {
    let json = report_to_json(report)?;
    std::fs::write(path.as_ref(), json)
        .with_context(|| format!("Failed to write report: {:?}", path.as_ref()))?;
    Ok(())
}
