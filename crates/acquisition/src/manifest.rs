//! Job manifest: the per-job record written next to the outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use geo_common::BoundingBox;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::catalog::DatasetKind;
use crate::error::Result;
use crate::pipeline::DatasetOutput;
use crate::validator::ValidationRecord;

/// Overall job result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// At least one dataset produced an output.
    Completed,
    Failed,
}

/// What was produced for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub source: String,
    pub resolution: String,
    pub crs: String,
    pub bbox: BoundingBox,
    pub year: i32,
    pub validation: ValidationRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParameters {
    pub target_crs: String,
    pub target_resolution: f64,
    /// True when every validated output is in the target CRS.
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    pub job_id: String,
    pub location: String,
    pub aoi_bbox: BoundingBox,
    pub timestamp: DateTime<Utc>,
    pub datasets: BTreeMap<DatasetKind, DatasetEntry>,
    pub validation: BTreeMap<DatasetKind, ValidationRecord>,
    pub processing_parameters: ProcessingParameters,
    pub outputs: BTreeMap<DatasetKind, PathBuf>,
    /// Datasets not attempted, with the reason.
    pub skipped: BTreeMap<DatasetKind, String>,
    /// Datasets that failed, with the error text.
    pub failures: BTreeMap<DatasetKind, String>,
    pub status: JobStatus,
}

/// Everything a job produced, before it is summarized.
#[derive(Debug, Default)]
pub struct JobOutcome {
    pub outputs: Vec<DatasetOutput>,
    pub skipped: BTreeMap<DatasetKind, String>,
    pub failures: BTreeMap<DatasetKind, String>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        !self.outputs.is_empty()
    }
}

/// `data_{YYYYmmdd_HHMMSS}_{8 hex chars}`
pub fn generate_job_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("data_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// Summarize a finished job. Pure: no I/O.
pub fn build_manifest(
    job_id: &str,
    location: &str,
    aoi_bbox: BoundingBox,
    timestamp: DateTime<Utc>,
    outcome: &JobOutcome,
    target_crs: &str,
    target_resolution: f64,
) -> JobManifest {
    let mut datasets = BTreeMap::new();
    let mut validation = BTreeMap::new();
    let mut outputs = BTreeMap::new();

    for out in &outcome.outputs {
        datasets.insert(
            out.dataset,
            DatasetEntry {
                source: out.source_name.clone(),
                resolution: format!("{target_resolution}m"),
                crs: target_crs.to_string(),
                bbox: out.bbox,
                year: out.year,
                validation: out.validation.clone(),
            },
        );
        validation.insert(out.dataset, out.validation.clone());
        outputs.insert(out.dataset, out.path.clone());
    }

    let success = validation.values().all(|v| v.crs_match);
    let status = if outcome.is_success() {
        JobStatus::Completed
    } else {
        JobStatus::Failed
    };

    JobManifest {
        job_id: job_id.to_string(),
        location: location.to_string(),
        aoi_bbox,
        timestamp,
        datasets,
        validation,
        processing_parameters: ProcessingParameters {
            target_crs: target_crs.to_string(),
            target_resolution,
            success,
        },
        outputs,
        skipped: outcome.skipped.clone(),
        failures: outcome.failures.clone(),
        status,
    }
}

impl JobManifest {
    pub fn file_name(&self) -> String {
        format!("{}_manifest.json", self.job_id)
    }

    /// Write as pretty JSON to `{dir}/{job_id}_manifest.json`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&path, json)?;
        info!(path = %path.display(), status = ?self.status, "Manifest written");
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
