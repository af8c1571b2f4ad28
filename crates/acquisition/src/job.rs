//! Job orchestration: geocode, fan out datasets, align, write the manifest.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::catalog::DatasetKind;
use crate::error::Result;
use crate::geocode::Geocoder;
use crate::manifest::{build_manifest, generate_job_id, JobManifest, JobOutcome};
use crate::metrics::DatasetStatus;
use crate::pipeline::{AcquisitionPipeline, DatasetRequest};
use crate::request::ParsedRequest;

/// A structured job request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub location: String,
    /// Dataset identifiers. Unknown ids are ignored.
    pub datasets: Vec<String>,
    /// Defaults to the configured year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Dataset whose grid every other output is resampled onto.
    #[serde(default)]
    pub align_to: Option<String>,
}

impl From<ParsedRequest> for JobRequest {
    fn from(parsed: ParsedRequest) -> Self {
        Self {
            location: parsed.location,
            datasets: parsed
                .datasets
                .iter()
                .map(|d| d.as_str().to_string())
                .collect(),
            year: None,
            align_to: None,
        }
    }
}

/// Resolve dataset ids, dropping unknown ones and duplicates.
pub fn resolve_datasets(ids: &[String]) -> Vec<DatasetKind> {
    let mut kinds = Vec::with_capacity(ids.len());
    for id in ids {
        match DatasetKind::parse(id) {
            Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
            Some(_) => {}
            None => warn!(dataset = %id, "Unknown dataset identifier, ignoring"),
        }
    }
    kinds
}

/// Runs whole jobs against one pipeline and geocoder.
#[derive(Clone)]
pub struct JobRunner {
    pipeline: AcquisitionPipeline,
    geocoder: Arc<dyn Geocoder>,
}

impl JobRunner {
    pub fn new(pipeline: AcquisitionPipeline, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { pipeline, geocoder }
    }

    pub fn pipeline(&self) -> &AcquisitionPipeline {
        &self.pipeline
    }

    /// Run one job and write its manifest.
    ///
    /// Only a geocoding failure fails the call; dataset failures are
    /// recorded in the manifest.
    #[instrument(skip(self, request), fields(location = %request.location))]
    pub async fn run(&self, request: &JobRequest) -> Result<JobManifest> {
        let started = Utc::now();
        let job_id = generate_job_id(started);
        let config = self.pipeline.config();

        let place = self.geocoder.geocode(&request.location).await?;
        info!(job_id = %job_id, name = %place.name, bbox = %place.bbox, "Starting job");

        let year = request.year.unwrap_or(config.default_year);
        let mut outcome = JobOutcome::default();

        let mut todo = Vec::new();
        for kind in resolve_datasets(&request.datasets) {
            if kind.covers(&place.bbox) {
                todo.push(kind);
            } else {
                info!(dataset = %kind, "Region outside dataset coverage, skipping");
                self.pipeline
                    .metrics()
                    .record_dataset(DatasetStatus::Skipped, Duration::ZERO);
                outcome
                    .skipped
                    .insert(kind, "region outside continental US coverage".to_string());
            }
        }

        let results = stream::iter(todo)
            .map(|dataset| {
                let request = DatasetRequest {
                    dataset,
                    bbox: place.bbox,
                    year,
                    job_id: job_id.clone(),
                };
                async move { (dataset, self.pipeline.run(&request).await) }
            })
            .buffer_unordered(config.max_concurrent_datasets)
            .collect::<Vec<_>>()
            .await;

        for (dataset, result) in results {
            match result {
                Ok(output) => outcome.outputs.push(output),
                Err(e) => {
                    outcome.failures.insert(dataset, e.to_string());
                }
            }
        }
        outcome.outputs.sort_by_key(|o| o.dataset);

        if let Some(base) = &request.align_to {
            self.align_outputs(base, &mut outcome).await;
        }

        let manifest = build_manifest(
            &job_id,
            &request.location,
            place.bbox,
            started,
            &outcome,
            &config.target_crs.to_string(),
            config.target_resolution,
        );
        manifest.write(&config.output_dir)?;

        info!(
            job_id = %job_id,
            outputs = manifest.outputs.len(),
            skipped = manifest.skipped.len(),
            failed = manifest.failures.len(),
            status = ?manifest.status,
            "Job finished"
        );
        Ok(manifest)
    }

    /// Resample every output onto the grid of `base`. Failures leave the
    /// output unaligned.
    async fn align_outputs(&self, base: &str, outcome: &mut JobOutcome) {
        let Some(base_kind) = DatasetKind::parse(base) else {
            warn!(align_to = %base, "Unknown alignment dataset, skipping alignment");
            return;
        };
        let Some(base_path) = outcome
            .outputs
            .iter()
            .find(|o| o.dataset == base_kind)
            .map(|o| o.path.clone())
        else {
            warn!(align_to = %base_kind, "Alignment dataset was not produced, skipping alignment");
            return;
        };

        for output in outcome.outputs.iter_mut().filter(|o| o.dataset != base_kind) {
            match self.pipeline.align_output(&base_path, &output.path).await {
                Ok(validation) => {
                    info!(dataset = %output.dataset, align_to = %base_kind, "Output aligned");
                    output.validation = validation;
                }
                Err(e) => {
                    warn!(dataset = %output.dataset, error = %e, "Alignment failed, keeping output as is");
                }
            }
        }
    }
}
