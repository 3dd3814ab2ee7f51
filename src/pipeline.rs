//! Orchestration of a complete placement plan.
//!
//! Runs the stages in order: plan the base layer, stack it, check every
//! level, annotate picks, compute metrics and finally project all
//! coordinates through the requested frame. Each stage is pure, so a failure
//! simply aborts the remaining ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::annotate::{ApproachOverride, ApproachSettings, PlacementAnnotation, PlacementAnnotator};
use crate::collision::{CollisionChecker, Violation};
use crate::error::PlanResult;
use crate::frame::{CoordinateFrame, ProjectedLayer};
use crate::metrics::{SequenceMetrics, compute_sequence_metrics};
use crate::model::{
    BlockId, Box3D, BoxOverride, Corner, LayerSequence, LayerStatus, OrientationMode, Pallet, Tool,
};
use crate::planner::{LayerRequest, PlannerConfig, RecursiveFiveBlockPlanner};
use crate::sequence::{LayerSequencePlanner, SequenceEvent, SequenceRequest};
use crate::types::Vec3;

/// Everything needed to compute one plan.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanJob {
    pub pallet: Pallet,
    pub box_spec: Box3D,
    pub box_override: Option<BoxOverride>,
    pub tool: Tool,
    pub corner: Corner,
    pub orientation_mode: OrientationMode,
    pub overhang_x: Option<f64>,
    pub overhang_y: Option<f64>,
    pub block_offsets: BTreeMap<BlockId, Vec3>,
    pub sequence: SequenceRequest,
    pub frame: CoordinateFrame,
    /// Replaces the pipeline's approach defaults when set.
    pub approach: Option<ApproachSettings>,
    pub approach_overrides: BTreeMap<BlockId, ApproachOverride>,
    /// Replaces the pipeline's approach sweep setting when set.
    pub check_approach: Option<bool>,
}

impl PlanJob {
    /// Single-level job from the SW corner in the native frame.
    pub fn new(pallet: Pallet, box_spec: Box3D, tool: Tool) -> Self {
        Self {
            pallet,
            box_spec,
            box_override: None,
            tool,
            corner: Corner::SW,
            orientation_mode: OrientationMode::Both,
            overhang_x: None,
            overhang_y: None,
            block_offsets: BTreeMap::new(),
            sequence: SequenceRequest::new(1, Vec::new()),
            frame: CoordinateFrame::native(),
            approach: None,
            approach_overrides: BTreeMap::new(),
            check_approach: None,
        }
    }

    fn layer_request(&self) -> PlanResult<LayerRequest> {
        let box_spec = match &self.box_override {
            Some(changes) => self.box_spec.with_overrides(changes)?,
            None => self.box_spec.clone(),
        };
        Ok(LayerRequest {
            pallet: self.pallet.clone(),
            box_spec,
            tool: self.tool.clone(),
            corner: self.corner,
            orientation_mode: self.orientation_mode,
            overhang_x: self.overhang_x,
            overhang_y: self.overhang_y,
            block_offsets: self.block_offsets.clone(),
        })
    }
}

/// Check results of one level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LevelReport {
    pub elevation_index: usize,
    pub corner: Corner,
    pub status: LayerStatus,
    pub violations: Vec<Violation>,
}

/// Result of a plan. `sequence` stays in the native frame; every other
/// coordinate is expressed in `frame`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanOutcome {
    pub frame: CoordinateFrame,
    pub sequence: LayerSequence,
    pub layers: Vec<ProjectedLayer>,
    pub annotations: Vec<PlacementAnnotation>,
    pub reports: Vec<LevelReport>,
    pub metrics: SequenceMetrics,
}

impl PlanOutcome {
    pub fn violation_count(&self) -> usize {
        self.reports.iter().map(|r| r.violations.len()).sum()
    }
}

/// Planning stages with their service-wide defaults.
#[derive(Clone, Debug, Default)]
pub struct PlanningPipeline {
    planner: RecursiveFiveBlockPlanner,
    checker: CollisionChecker,
    annotator: PlacementAnnotator,
    check_approach: bool,
}

impl PlanningPipeline {
    pub fn new(
        planner: PlannerConfig,
        checker: CollisionChecker,
        annotator: PlacementAnnotator,
        check_approach: bool,
    ) -> Self {
        Self {
            planner: RecursiveFiveBlockPlanner::new(planner),
            checker,
            annotator,
            check_approach,
        }
    }

    pub fn checker(&self) -> &CollisionChecker {
        &self.checker
    }

    pub fn run(&self, job: &PlanJob) -> PlanResult<PlanOutcome> {
        self.run_with_progress(job, |_| {})
    }

    /// Runs all stages and forwards sequence progress to `on_event`.
    pub fn run_with_progress(
        &self,
        job: &PlanJob,
        on_event: impl FnMut(&SequenceEvent),
    ) -> PlanResult<PlanOutcome> {
        let annotator = match job.approach {
            Some(settings) => PlacementAnnotator::new(settings)?,
            None => self.annotator,
        };
        let check_approach = job.check_approach.unwrap_or(self.check_approach);

        let request = job.layer_request()?;
        let base = self.planner.plan_layer(&request)?;
        if base.status == LayerStatus::Unfillable {
            warn!(
                pallet = %request.pallet.id,
                box_id = %request.box_spec.id,
                "no admissible orientation fits the pallet footprint"
            );
        }

        let sequence =
            LayerSequencePlanner.plan_with_progress(&base, &job.sequence, on_event)?;

        let mut annotations = Vec::new();
        let mut reports = Vec::with_capacity(sequence.levels());
        for layer in &sequence.layers {
            let layer_annotations = annotator.annotate(layer, &job.approach_overrides)?;

            let mut violations = self.checker.check_layer(layer, &request.tool);
            if check_approach {
                violations.extend(self.checker.check_approach(layer, &request.tool, |pick| {
                    layer_annotations
                        .iter()
                        .find(|a| a.pick == pick.id)
                        .map(|a| a.approach_vector)
                        .unwrap_or_default()
                }));
            }
            if !violations.is_empty() {
                warn!(
                    level = layer.elevation_index,
                    count = violations.len(),
                    "constraint violations found"
                );
            }

            reports.push(LevelReport {
                elevation_index: layer.elevation_index,
                corner: layer.corner,
                status: layer.status,
                violations,
            });
            annotations.extend(layer_annotations);
        }

        let metrics = compute_sequence_metrics(&sequence)?;
        let transform = job.frame.transform(&request.pallet);
        debug!(
            origin = ?job.frame.origin,
            rotation = transform.rotation.degrees(),
            "projecting into output frame"
        );

        let outcome = PlanOutcome {
            frame: job.frame,
            layers: transform.project_sequence(&sequence),
            annotations: annotations
                .iter()
                .map(|a| a.projected(&transform))
                .collect(),
            reports,
            metrics: metrics.projected(&transform),
            sequence,
        };

        info!(
            levels = outcome.sequence.levels(),
            boxes = outcome.metrics.box_count,
            mass = outcome.metrics.total_mass,
            violations = outcome.violation_count(),
            "plan computed"
        );
        Ok(outcome)
    }
}
