//! Batch resolution of input records.
//!
//! Every record is resolved independently: its coordinate is moved into the
//! canonical system, the most specific known adcode seeds the chain, and the
//! resolved levels are written back into the record next to a `geometry`
//! point. Records run concurrently up to a fixed limit.

mod crs;
mod record;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use geo::{Coord, Point};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub use crs::{
    bd09_to_gcj02, gcj02_to_wgs84, web_mercator_to_wgs84, wgs84_to_gcj02, CoordSystem,
    CoordTransform, StandardTransform,
};
pub use record::{is_blank, parse_coordinate, point_geometry, CodeFields};

use crate::models::{AdminLevel, ResolvedChain, COUNTRY_ADCODE};
use crate::pip::{ResolveOptions, SpatialResolver};

/// Region filter applied to the whole batch.
#[derive(Debug, Clone)]
pub enum IncludeCode {
    /// Exact adcode; its chain seeds every record without a code of its own
    Code(String),
    /// Advisory pattern over tile file names and feature adcodes
    Pattern(Regex),
}

impl Default for IncludeCode {
    fn default() -> Self {
        IncludeCode::Code(COUNTRY_ADCODE.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub include: IncludeCode,
    pub center_point: bool,
    /// Record field holding the coordinate
    pub latlng_field: String,
    pub latlng_type: CoordSystem,
    pub code_fields: CodeFields,
    /// Maximum number of records resolved at once
    pub concurrency: usize,
    /// Records that take longer are reported and left unresolved
    pub record_timeout: Option<Duration>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            include: IncludeCode::default(),
            center_point: false,
            latlng_field: "latlng".to_string(),
            latlng_type: CoordSystem::Wgs84,
            code_fields: CodeFields::default(),
            concurrency: default_concurrency(),
            record_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Four in-flight records per available core.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 4)
        .unwrap_or(16)
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Resolved {
        index: usize,
        deepest: AdminLevel,
    },
    Skipped {
        index: usize,
        reason: String,
    },
    TimedOut {
        index: usize,
    },
}

impl RecordOutcome {
    pub fn index(&self) -> usize {
        match self {
            RecordOutcome::Resolved { index, .. }
            | RecordOutcome::Skipped { index, .. }
            | RecordOutcome::TimedOut { index } => *index,
        }
    }
}

/// Counts for a finished batch, plus one diagnostic per record that did not
/// resolve.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub timed_out: usize,
    /// Number of records whose chain ends at each level
    pub deepest: BTreeMap<AdminLevel, usize>,
    pub diagnostics: Vec<RecordOutcome>,
}

impl BatchSummary {
    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Resolved { deepest, .. } => {
                self.resolved += 1;
                *self.deepest.entry(*deepest).or_default() += 1;
            }
            RecordOutcome::Skipped { .. } => {
                self.skipped += 1;
                self.diagnostics.push(outcome.clone());
            }
            RecordOutcome::TimedOut { .. } => {
                self.timed_out += 1;
                self.diagnostics.push(outcome.clone());
            }
        }
    }
}

/// One record ready for resolution.
struct Job {
    index: usize,
    point: Coord<f64>,
    known: Option<String>,
}

/// Drives [`SpatialResolver`] over a batch of JSON records.
pub struct BatchResolver {
    resolver: Arc<SpatialResolver>,
    options: BatchOptions,
    transform: Arc<dyn CoordTransform>,
}

impl BatchResolver {
    pub fn new(resolver: Arc<SpatialResolver>, options: BatchOptions) -> Self {
        Self {
            resolver,
            options,
            transform: Arc::new(StandardTransform),
        }
    }

    pub fn with_transform(mut self, transform: Arc<dyn CoordTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            center_point: self.options.center_point,
            pattern: match &self.options.include {
                IncludeCode::Pattern(re) => Some(re.clone()),
                IncludeCode::Code(_) => None,
            },
        }
    }

    /// Chain shared by every record that carries no code of its own.
    async fn include_seed(&self) -> Option<ResolvedChain> {
        let IncludeCode::Code(code) = &self.options.include else {
            return None;
        };
        let seed = self
            .resolver
            .resolve_code(code, self.options.center_point)
            .await;
        info!(
            "Include code {} resolves down to {}",
            code,
            seed.deepest().unwrap_or(AdminLevel::Country)
        );
        Some(seed)
    }

    /// Pull the coordinate and known code out of a record.
    fn prepare(&self, index: usize, record: &Value) -> Result<Job, RecordOutcome> {
        let skip = |reason: String| RecordOutcome::Skipped { index, reason };

        let Some(object) = record.as_object() else {
            return Err(skip("record is not an object".to_string()));
        };
        let raw = object
            .get(&self.options.latlng_field)
            .filter(|v| !is_blank(Some(*v)));
        let Some(raw) = raw else {
            return Err(skip(format!("missing '{}'", self.options.latlng_field)));
        };
        let coord = parse_coordinate(raw).map_err(|e| skip(e.to_string()))?;

        Ok(Job {
            index,
            point: self
                .transform
                .to_canonical(coord, self.options.latlng_type),
            known: self.options.code_fields.known_code(object),
        })
    }

    /// Resolve every record in place.
    ///
    /// Records without a usable coordinate are left untouched. `progress` is
    /// called once per record as it settles, in completion order.
    pub async fn run<P>(&self, records: &mut [Value], progress: P) -> BatchSummary
    where
        P: Fn(&RecordOutcome),
    {
        let mut summary = BatchSummary {
            total: records.len(),
            ..Default::default()
        };

        let seed = self.include_seed().await;
        let options = self.resolve_options();

        let mut jobs = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match self.prepare(index, record) {
                Ok(job) => jobs.push(job),
                Err(outcome) => {
                    debug!("Skipping record {}: {:?}", index, outcome);
                    summary.record(&outcome);
                    progress(&outcome);
                }
            }
        }

        info!(
            "Resolving {} records ({} skipped) with concurrency {}",
            jobs.len(),
            summary.skipped,
            self.options.concurrency
        );

        let resolver = &self.resolver;
        let seed = seed.as_ref();
        let options = &options;
        let timeout = self.options.record_timeout;

        let mut settled = stream::iter(jobs)
            .map(|job| async move {
                let fut = resolver.resolve(
                    Point::from(job.point),
                    job.known.as_deref(),
                    seed,
                    options,
                );
                let chain = match timeout {
                    Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
                    None => Some(fut.await),
                };
                (job, chain)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        while let Some((job, chain)) = settled.next().await {
            let Some(object) = records[job.index].as_object_mut() else {
                continue;
            };

            let outcome = match chain {
                Some(chain) => {
                    chain.write_into(object);
                    RecordOutcome::Resolved {
                        index: job.index,
                        deepest: chain.deepest().unwrap_or(AdminLevel::Country),
                    }
                }
                None => {
                    warn!("Record {} timed out", job.index);
                    // Keep what was known before resolution started.
                    let fallback = match (&job.known, seed) {
                        (None, Some(seed)) => seed.clone(),
                        _ => ResolvedChain::with_country(),
                    };
                    fallback.write_into(object);
                    RecordOutcome::TimedOut { index: job.index }
                }
            };
            object.insert("geometry".to_string(), point_geometry(job.point));

            summary.record(&outcome);
            progress(&outcome);
        }

        info!(
            "Batch complete: {} resolved, {} skipped, {} timed out",
            summary.resolved, summary.skipped, summary.timed_out
        );
        summary
    }
}
