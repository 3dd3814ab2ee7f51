//! Mass, center of gravity and extents of layers and stacks.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{PlanError, PlanResult};
use crate::frame::FrameTransform;
use crate::model::{Layer, LayerSequence};
use crate::types::{BoundingBox, CenterOfMassCalculator, Vec3, Weighted};

/// Metrics of a single layer in layer-local coordinates (Z from the layer base).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LayerMetrics {
    pub elevation_index: usize,
    pub box_count: u32,
    /// Boxes plus the interleaf directly beneath, in kg.
    pub mass: f64,
    pub center_of_gravity: Vec3,
    pub bounding_box: BoundingBox,
    pub fill_ratio: f64,
}

/// Aggregated metrics of a stack in absolute coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SequenceMetrics {
    pub layer_count: usize,
    pub box_count: u32,
    pub total_mass: f64,
    pub center_of_gravity: Vec3,
    pub bounding_box: BoundingBox,
    /// Top of the highest layer above the deck.
    pub stack_height: f64,
    /// Stack height plus pallet height.
    pub overall_height: f64,
    pub per_layer: Vec<LayerMetrics>,
}

impl LayerMetrics {
    /// Copy with the planar coordinates expressed in an external frame.
    pub fn projected(&self, transform: &FrameTransform) -> Self {
        Self {
            center_of_gravity: transform.apply_point(self.center_of_gravity),
            bounding_box: transform.apply_bounds(&self.bounding_box),
            ..self.clone()
        }
    }
}

impl SequenceMetrics {
    pub fn projected(&self, transform: &FrameTransform) -> Self {
        Self {
            center_of_gravity: transform.apply_point(self.center_of_gravity),
            bounding_box: transform.apply_bounds(&self.bounding_box),
            per_layer: self
                .per_layer
                .iter()
                .map(|layer| layer.projected(transform))
                .collect(),
            ..self.clone()
        }
    }
}

/// Computes the metrics of one layer.
///
/// Boxes contribute at their mid-height; an interleaf beneath the layer sits
/// at the pallet center half its thickness below the layer base. A massless
/// layer reports the pallet center as its center of gravity.
pub fn compute_layer_metrics(layer: &Layer) -> LayerMetrics {
    let mut com = CenterOfMassCalculator::new();
    let unit_weight = layer.box_spec.weight();
    let (cx, cy) = layer.pallet.center_xy();

    let deck_z = layer
        .interleaf_below
        .as_ref()
        .map_or(0.0, |sheet| -sheet.interleaf.thickness);
    let deck = layer.pallet.deck();
    let mut bounds = BoundingBox::from_position_and_dims(
        Vec3::new(deck.min_x(), deck.min_y(), deck_z),
        Vec3::new(deck.width, deck.depth, 0.0),
    );

    for pick in &layer.picks {
        com.add_point(pick.center, unit_weight * pick.box_count as f64);
        let footprint = pick.footprint();
        bounds = bounds.union(&BoundingBox::from_position_and_dims(
            Vec3::new(footprint.min_x(), footprint.min_y(), 0.0),
            Vec3::new(footprint.width, footprint.depth, layer.box_spec.height),
        ));
    }

    if let Some(sheet) = &layer.interleaf_below {
        com.add_point(
            Vec3::new(cx, cy, -sheet.interleaf.thickness / 2.0),
            sheet.interleaf.weight(),
        );
    }

    LayerMetrics {
        elevation_index: layer.elevation_index,
        box_count: layer.box_count(),
        mass: com.total_weight(),
        center_of_gravity: com.compute().unwrap_or(Vec3::new(cx, cy, 0.0)),
        bounding_box: bounds,
        fill_ratio: layer.fill_ratio,
    }
}

/// Aggregates layer metrics over a stack, lifting each layer by its base height.
///
/// Fails with [`PlanError::EmptySequence`] for a sequence without layers.
pub fn compute_sequence_metrics(sequence: &LayerSequence) -> PlanResult<SequenceMetrics> {
    let first = sequence.layers.first().ok_or(PlanError::EmptySequence)?;
    let (cx, cy) = first.pallet.center_xy();

    let mut com = CenterOfMassCalculator::new();
    let mut bounds: Option<BoundingBox> = None;
    let mut per_layer = Vec::with_capacity(sequence.layers.len());

    for layer in &sequence.layers {
        let metrics = compute_layer_metrics(layer);
        let lifted = metrics.center_of_gravity + Vec3::new(0.0, 0.0, layer.base_z);
        com.add_point(lifted, metrics.mass);

        let layer_bounds = metrics.bounding_box.lifted(layer.base_z);
        bounds = Some(match bounds {
            Some(existing) => existing.union(&layer_bounds),
            None => layer_bounds,
        });
        per_layer.push(metrics);
    }

    let stack_height = sequence.stack_height();
    Ok(SequenceMetrics {
        layer_count: sequence.levels(),
        box_count: sequence.total_boxes(),
        total_mass: com.total_weight(),
        center_of_gravity: com.compute().unwrap_or(Vec3::new(cx, cy, 0.0)),
        bounding_box: bounds.unwrap_or_else(|| {
            BoundingBox::new(Vec3::zero(), Vec3::new(cx * 2.0, cy * 2.0, 0.0))
        }),
        stack_height,
        overall_height: stack_height + first.pallet.height,
        per_layer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Box3D, Corner, Interleaf, LabelFace, OrientationMode, Pallet, Tool};
    use crate::planner::{LayerRequest, RecursiveFiveBlockPlanner};
    use crate::sequence::{LayerSequencePlanner, SequenceRequest};
    use approx::assert_relative_eq;

    fn layer(weight: f64) -> Layer {
        let request = LayerRequest::new(
            Pallet::new("P", 1200.0, 800.0, 144.0, 0.0, 0.0).unwrap(),
            Box3D::new("BX", 400.0, 300.0, 150.0, weight, LabelFace::Front).unwrap(),
            Tool::new("T", 100.0, 100.0).unwrap(),
        )
        .with_orientation_mode(OrientationMode::Width);
        RecursiveFiveBlockPlanner::default()
            .plan_layer(&request)
            .unwrap()
    }

    #[test]
    fn layer_metrics_sum_boxes_at_mid_height() {
        let metrics = compute_layer_metrics(&layer(5.0));

        assert_eq!(metrics.box_count, 6);
        assert_relative_eq!(metrics.mass, 30.0);
        assert_relative_eq!(metrics.center_of_gravity.x, 600.0);
        assert_relative_eq!(metrics.center_of_gravity.y, 300.0);
        assert_relative_eq!(metrics.center_of_gravity.z, 75.0);
        assert_eq!(metrics.bounding_box.min, Vec3::zero());
        assert_eq!(metrics.bounding_box.max, Vec3::new(1200.0, 800.0, 150.0));
    }

    #[test]
    fn massless_layer_falls_back_to_pallet_center() {
        let metrics = compute_layer_metrics(&layer(0.0));
        assert_relative_eq!(metrics.mass, 0.0);
        assert_eq!(metrics.center_of_gravity, Vec3::new(600.0, 400.0, 0.0));
    }

    #[test]
    fn three_identical_layers_weight_centroid_by_elevation() {
        let sequence = LayerSequencePlanner
            .plan(&layer(5.0), &SequenceRequest::new(3, vec![Corner::SW]))
            .unwrap();
        let metrics = compute_sequence_metrics(&sequence).unwrap();

        assert_eq!(metrics.layer_count, 3);
        assert_eq!(metrics.box_count, 18);
        assert_relative_eq!(metrics.total_mass, 90.0);
        // (75 + 225 + 375) / 3, not the single-layer 75
        assert_relative_eq!(metrics.center_of_gravity.z, 225.0);
        assert_relative_eq!(metrics.stack_height, 450.0);
        assert_relative_eq!(metrics.overall_height, 594.0);
        assert_relative_eq!(metrics.bounding_box.max.z, 450.0);
        assert_eq!(metrics.per_layer.len(), 3);
    }

    #[test]
    fn interleaf_adds_mass_below_its_layer() {
        let sheet = Interleaf {
            id: "SHEET".into(),
            thickness: 10.0,
            weight: 30.0,
            material: "wood".into(),
        };
        let sequence = LayerSequencePlanner
            .plan(
                &layer(5.0),
                &SequenceRequest::new(2, vec![Corner::SW]).with_interleaf(sheet, 1),
            )
            .unwrap();
        let metrics = compute_sequence_metrics(&sequence).unwrap();

        let upper = &metrics.per_layer[1];
        assert_relative_eq!(upper.mass, 60.0);
        // 30 kg at z = 75 and 30 kg at z = -5
        assert_relative_eq!(upper.center_of_gravity.z, 35.0);
        assert_relative_eq!(upper.bounding_box.min.z, -10.0);
        assert_relative_eq!(metrics.total_mass, 90.0);
        assert_relative_eq!(metrics.stack_height, 310.0);
    }

    #[test]
    fn empty_sequence_is_reported() {
        let mut sequence = LayerSequencePlanner
            .plan(&layer(5.0), &SequenceRequest::new(1, vec![Corner::SW]))
            .unwrap();
        sequence.layers.clear();
        assert!(matches!(
            compute_sequence_metrics(&sequence),
            Err(PlanError::EmptySequence)
        ));
    }
}
