// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Recognition pipeline
//!
//! One analysis walks `Idle → Ingest → Segment → BuildTopology → Classify →
//! Resolve → Validate → Done`; any stage may end in `Failed`. Cancellation is
//! cooperative and checked after ingestion, segmentation and topology.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::compound::CompoundResolver;
use super::detectors::{DetectionContext, FeatureClassifier};
use super::segment::SurfaceSegmenter;
use super::topology::Topology;
use super::validate::{rank, FeatureValidator};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult, ConfigError};
use crate::features::{Feature, FeatureId, FeatureKind};
use crate::geometry::{Mesh, MeshAdjacency, MeshBuffers};
use crate::stats::FeatureStatistics;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Ingest,
    Segment,
    BuildTopology,
    Classify,
    Resolve,
    Validate,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Ingest => "ingest",
            Stage::Segment => "segment",
            Stage::BuildTopology => "build_topology",
            Stage::Classify => "classify",
            Stage::Resolve => "resolve",
            Stage::Validate => "validate",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooperative cancellation flag with an optional deadline
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail with `Cancelled` or `DeadlineExceeded` once `stage` has completed
    pub fn check(&self, stage: Stage) -> AnalysisResult<()> {
        if self.is_cancelled() {
            return Err(AnalysisError::Cancelled { stage });
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(AnalysisError::DeadlineExceeded { stage });
        }
        Ok(())
    }
}

/// Wall time spent in one stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub millis: f64,
}

/// Result of one analysis
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Ranked features, most confident first.
    pub features: Vec<Feature>,
    pub statistics: FeatureStatistics,
    pub timings: Vec<StageTiming>,
    pub face_count: usize,
    pub skipped_degenerate: usize,
    pub surface_count: usize,
    pub noise_face_count: usize,
    pub edge_count: usize,
    pub min_feature_size: f64,
    pub confidence_threshold: f64,
}

impl AnalysisReport {
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn features_of(&self, kind: FeatureKind) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(move |f| f.kind == kind)
    }

    pub fn total_millis(&self) -> f64 {
        self.timings.iter().map(|t| t.millis).sum()
    }
}

/// Stage bookkeeping for one run
struct Run {
    stage: Stage,
    entered: Instant,
    timings: Vec<StageTiming>,
}

impl Run {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            entered: Instant::now(),
            timings: Vec::new(),
        }
    }

    fn advance(&mut self, next: Stage) {
        let now = Instant::now();
        if self.stage != Stage::Idle {
            let millis = now.duration_since(self.entered).as_secs_f64() * 1000.0;
            debug!(stage = %self.stage, millis, "stage finished");
            self.timings.push(StageTiming {
                stage: self.stage,
                millis,
            });
        }
        self.stage = next;
        self.entered = now;
    }

    fn fail(&mut self, error: AnalysisError) -> AnalysisError {
        warn!(stage = %self.stage, %error, "analysis failed");
        self.stage = Stage::Failed;
        error
    }
}

/// Feature recognition engine, built per configuration
#[derive(Debug, Clone)]
pub struct FeatureRecognizer {
    config: AnalysisConfig,
    cancellation: CancellationToken,
}

impl FeatureRecognizer {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Run the full pipeline over one mesh
    pub fn analyze(&self, buffers: &MeshBuffers) -> AnalysisResult<AnalysisReport> {
        let config = &self.config;
        let min_feature_size = config.min_feature_size();
        info!(
            triangles = buffers.triangle_count(),
            threshold = config.confidence_threshold,
            min_feature_size,
            "feature recognition started"
        );

        let mut run = Run::new();

        run.advance(Stage::Ingest);
        let mesh = Mesh::ingest(buffers).map_err(|e| run.fail(e.into()))?;
        let adjacency = MeshAdjacency::build(&mesh);
        self.cancellation.check(Stage::Ingest).map_err(|e| run.fail(e))?;

        run.advance(Stage::Segment);
        let segmentation =
            SurfaceSegmenter::new(config.surface_grouping_tolerance).segment(&mesh, &adjacency);
        segmentation
            .check_partition(mesh.face_count())
            .map_err(|detail| {
                run.fail(AnalysisError::Invariant {
                    stage: Stage::Segment,
                    detail,
                })
            })?;
        self.cancellation.check(Stage::Segment).map_err(|e| run.fail(e))?;

        run.advance(Stage::BuildTopology);
        let topology = Topology::build(&mesh, &adjacency, &segmentation, min_feature_size);
        self.cancellation
            .check(Stage::BuildTopology)
            .map_err(|e| run.fail(e))?;

        run.advance(Stage::Classify);
        let ctx = DetectionContext::new(&mesh, &segmentation, &topology, min_feature_size);
        let features: Vec<Feature> = FeatureClassifier::new()
            .classify(&ctx)
            .into_iter()
            .zip(1u32..)
            .map(|(draft, id)| Feature::from_draft(FeatureId(id), draft))
            .collect();

        run.advance(Stage::Resolve);
        let validator = FeatureValidator::new(min_feature_size, mesh.bounds().max_extent());
        let plausible = validator.check_plausibility(features);
        let resolved = CompoundResolver::new(min_feature_size, config.detect_compound_features)
            .resolve(plausible);

        run.advance(Stage::Validate);
        let features = rank(resolved, config.confidence_threshold);
        if let Some(bad) = features
            .iter()
            .find(|f| !(0.0..=1.0).contains(&f.confidence) || !f.dimensions.all_valid())
        {
            let detail = format!("feature {} left validation out of range", bad.id);
            return Err(run.fail(AnalysisError::Invariant {
                stage: Stage::Validate,
                detail,
            }));
        }
        let statistics = FeatureStatistics::compute(&features);

        run.advance(Stage::Done);
        let report = AnalysisReport {
            features,
            statistics,
            timings: run.timings,
            face_count: mesh.face_count(),
            skipped_degenerate: mesh.skipped_degenerate(),
            surface_count: segmentation.surfaces.len(),
            noise_face_count: segmentation.noise_face_count(),
            edge_count: topology.edge_count(),
            min_feature_size,
            confidence_threshold: config.confidence_threshold,
        };

        info!(
            features = report.feature_count(),
            surfaces = report.surface_count,
            millis = report.total_millis(),
            "feature recognition finished"
        );
        Ok(report)
    }

    /// Analyze independent meshes in parallel; results keep the input order
    pub fn analyze_batch(&self, meshes: &[MeshBuffers]) -> Vec<AnalysisResult<AnalysisReport>> {
        meshes.par_iter().map(|buffers| self.analyze(buffers)).collect()
    }
}

/// Handle to an analysis running on a background thread
#[derive(Debug)]
pub struct AnalysisHandle {
    receiver: mpsc::Receiver<AnalysisResult<AnalysisReport>>,
    cancellation: CancellationToken,
}

impl AnalysisHandle {
    /// Block until the analysis reports
    pub fn wait(self) -> AnalysisResult<AnalysisReport> {
        self.receiver.recv().map_err(|_| AnalysisError::WorkerLost)?
    }

    /// The result, if the analysis has already finished
    pub fn try_result(&self) -> Option<AnalysisResult<AnalysisReport>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(AnalysisError::WorkerLost)),
        }
    }

    /// Ask the analysis to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

/// Run one analysis on a background thread
pub fn spawn_analysis(recognizer: FeatureRecognizer, buffers: MeshBuffers) -> AnalysisHandle {
    let (sender, receiver) = mpsc::channel();
    let cancellation = recognizer.cancellation().clone();
    thread::spawn(move || {
        let result = recognizer.analyze(&buffers);
        // The receiver may have been dropped; nobody is left to tell.
        let _ = sender.send(result);
    });
    AnalysisHandle {
        receiver,
        cancellation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Part;
    use nalgebra::Vector3;

    fn bore() -> MeshBuffers {
        Part::bored_block(Vector3::new(30.0, 30.0, 15.0), 6.0).to_buffers()
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::BuildTopology.to_string(), "build_topology");
        assert_eq!(Stage::Segment.to_string(), "segment");
    }

    #[test]
    fn test_report_records_every_stage() {
        let report = FeatureRecognizer::new(AnalysisConfig::default())
            .unwrap()
            .analyze(&bore())
            .unwrap();
        let stages: Vec<Stage> = report.timings.iter().map(|t| t.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Ingest,
                Stage::Segment,
                Stage::BuildTopology,
                Stage::Classify,
                Stage::Resolve,
                Stage::Validate,
            ]
        );
        assert_eq!(report.surface_count, 7);
    }

    #[test]
    fn test_cancelled_token_stops_after_ingest() {
        let token = CancellationToken::new();
        token.cancel();
        let err = FeatureRecognizer::new(AnalysisConfig::default())
            .unwrap()
            .with_cancellation(token)
            .analyze(&bore())
            .unwrap_err();
        assert_eq!(err, AnalysisError::Cancelled { stage: Stage::Ingest });
    }

    #[test]
    fn test_expired_deadline() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        let err = FeatureRecognizer::new(AnalysisConfig::default())
            .unwrap()
            .with_cancellation(token)
            .analyze(&bore())
            .unwrap_err();
        assert_eq!(err, AnalysisError::DeadlineExceeded { stage: Stage::Ingest });
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig::default().with_threshold(2.0);
        assert!(FeatureRecognizer::new(config).is_err());
    }

    #[test]
    fn test_background_analysis() {
        let recognizer = FeatureRecognizer::new(AnalysisConfig::default()).unwrap();
        let report = spawn_analysis(recognizer, bore()).wait().unwrap();
        assert_eq!(report.feature_count(), 1);
    }
}
