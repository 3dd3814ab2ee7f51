//! Multi-level stacking.
//!
//! The base layer is planned once. Every level is a clone of it with its own
//! elevation, base height and starting corner. Levels that start from a
//! different corner are derived by mirroring the base layer about the pallet
//! center, so all levels share the same fill ratio.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::{PlanError, PlanResult};
use crate::model::{Corner, Interleaf, InterleafPlacement, Layer, LayerSequence, Pick};
use crate::types::Vec3;
use crate::types::validation::validate_dimension;

/// Stacking parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SequenceRequest {
    pub layers: usize,
    /// Starting corners, cycled per level. Empty keeps the base layer's corner.
    #[serde(default)]
    pub corners: Vec<Corner>,
    #[serde(default)]
    pub interleaf: Option<Interleaf>,
    /// An interleaf goes on top of every `interleaf_frequency`-th level.
    #[serde(default = "SequenceRequest::default_frequency")]
    pub interleaf_frequency: usize,
    /// Places an interleaf directly on the deck below level 0.
    #[serde(default)]
    pub base_interleaf: bool,
    /// Vertical pitch between levels. Defaults to the box height.
    #[serde(default)]
    #[schema(nullable = true)]
    pub z_step: Option<f64>,
}

impl SequenceRequest {
    /// Largest number of levels a single request may stack.
    pub const MAX_LAYERS: usize = 1_000;

    fn default_frequency() -> usize {
        1
    }

    pub fn new(layers: usize, corners: Vec<Corner>) -> Self {
        Self {
            layers,
            corners,
            interleaf: None,
            interleaf_frequency: 1,
            base_interleaf: false,
            z_step: None,
        }
    }

    pub fn with_z_step(mut self, z_step: f64) -> Self {
        self.z_step = Some(z_step);
        self
    }

    pub fn with_interleaf(mut self, interleaf: Interleaf, frequency: usize) -> Self {
        self.interleaf = Some(interleaf);
        self.interleaf_frequency = frequency;
        self
    }

    pub fn validate(&self) -> PlanResult<()> {
        if self.layers == 0 {
            return Err(PlanError::EmptySequence);
        }
        if self.layers > Self::MAX_LAYERS {
            return Err(PlanError::invalid_parameter(format!(
                "sequence of {} levels exceeds the limit of {}",
                self.layers,
                Self::MAX_LAYERS
            )));
        }
        if let Some(z_step) = self.z_step {
            validate_dimension(z_step, "z_step")?;
        }
        if let Some(interleaf) = &self.interleaf {
            interleaf.validate()?;
            if self.interleaf_frequency == 0 {
                return Err(PlanError::invalid_parameter(
                    "interleaf frequency must be at least 1",
                ));
            }
        }
        Ok(())
    }
}

/// Progress of a sequence computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum SequenceEvent {
    Started {
        levels: usize,
    },
    LayerPlaced {
        index: usize,
        corner: Corner,
        base_z: f64,
        picks: usize,
        fill_ratio: f64,
    },
    InterleafPlaced {
        below_level: usize,
        z: f64,
        thickness: f64,
    },
    Finished {
        levels: usize,
        total_boxes: u32,
        stack_height: f64,
    },
}

/// Replicates a base layer across stacking levels.
#[derive(Clone, Copy, Debug, Default)]
pub struct LayerSequencePlanner;

impl LayerSequencePlanner {
    pub fn plan(&self, base: &Layer, request: &SequenceRequest) -> PlanResult<LayerSequence> {
        self.plan_with_progress(base, request, |_| {})
    }

    /// Builds the sequence and reports each placed layer and interleaf.
    pub fn plan_with_progress(
        &self,
        base: &Layer,
        request: &SequenceRequest,
        mut on_event: impl FnMut(&SequenceEvent),
    ) -> PlanResult<LayerSequence> {
        request.validate()?;

        let corners = if request.corners.is_empty() {
            vec![base.corner]
        } else {
            request.corners.clone()
        };
        on_event(&SequenceEvent::Started {
            levels: request.layers,
        });

        let z_step = request.z_step.unwrap_or(base.box_spec.height);
        let mut layers = Vec::with_capacity(request.layers);
        let mut interleaves = Vec::new();
        let mut z = 0.0;

        if let (true, Some(interleaf)) = (request.base_interleaf, &request.interleaf) {
            interleaves.push(place_interleaf(0, &mut z, interleaf, &mut on_event));
        }

        for index in 0..request.layers {
            let corner = corners[index % corners.len()];
            let mut layer = mirror_layer(base, corner);
            layer.elevation_index = index;
            layer.base_z = z;
            layer.interleaf_below = interleaves
                .last()
                .filter(|p| p.below_level == index)
                .cloned();
            z += z_step;

            debug!(index, corner = %corner, base_z = layer.base_z, "level placed");
            on_event(&SequenceEvent::LayerPlaced {
                index,
                corner,
                base_z: layer.base_z,
                picks: layer.picks.len(),
                fill_ratio: layer.fill_ratio,
            });
            layers.push(layer);

            let next = index + 1;
            if let Some(interleaf) = &request.interleaf {
                if next < request.layers && next % request.interleaf_frequency == 0 {
                    interleaves.push(place_interleaf(next, &mut z, interleaf, &mut on_event));
                }
            }
        }

        let sequence = LayerSequence {
            layers,
            interleaves,
            corners,
            z_step,
            interleaf_frequency: request
                .interleaf
                .as_ref()
                .map(|_| request.interleaf_frequency),
        };

        on_event(&SequenceEvent::Finished {
            levels: sequence.levels(),
            total_boxes: sequence.total_boxes(),
            stack_height: sequence.stack_height(),
        });
        info!(
            levels = sequence.levels(),
            interleaves = sequence.interleaves.len(),
            stack_height = sequence.stack_height(),
            "sequence planned"
        );
        Ok(sequence)
    }
}

fn place_interleaf(
    below_level: usize,
    z: &mut f64,
    interleaf: &Interleaf,
    on_event: &mut impl FnMut(&SequenceEvent),
) -> InterleafPlacement {
    on_event(&SequenceEvent::InterleafPlaced {
        below_level,
        z: *z,
        thickness: interleaf.thickness,
    });
    let placement = InterleafPlacement {
        below_level,
        z: *z,
        interleaf: interleaf.clone(),
    };
    *z += interleaf.thickness;
    placement
}

/// Clone of `base` rebuilt from `corner` by mirroring about the footprint center.
pub fn mirror_layer(base: &Layer, corner: Corner) -> Layer {
    let flip_x = base.corner.is_east() != corner.is_east();
    let flip_y = base.corner.is_north() != corner.is_north();
    let mut layer = base.clone();
    layer.corner = corner;
    if !flip_x && !flip_y {
        return layer;
    }

    let (axis_x, axis_y) = base.footprint.center();

    for block in &mut layer.blocks {
        if flip_x {
            block.rect = block.rect.mirrored_x(axis_x);
        }
        if flip_y {
            block.rect = block.rect.mirrored_y(axis_y);
        }
        block.role = block.role.mirrored(flip_x, flip_y);
    }

    layer.decompositions = base
        .decompositions
        .iter()
        .map(|step| step.mirrored(flip_x, flip_y, axis_x, axis_y))
        .collect();

    layer.picks = base
        .picks
        .iter()
        .map(|pick| mirror_pick(pick, flip_x, flip_y, axis_x, axis_y))
        .collect();

    layer
}

fn mirror_pick(pick: &Pick, flip_x: bool, flip_y: bool, axis_x: f64, axis_y: f64) -> Pick {
    let reflect = |value: f64, axis: f64, flip: bool| if flip { 2.0 * axis - value } else { value };
    // The pickup offset follows the pick rotation, which mirroring keeps.
    Pick {
        center: Vec3::new(
            reflect(pick.center.x, axis_x, flip_x),
            reflect(pick.center.y, axis_y, flip_y),
            pick.center.z,
        ),
        ..pick.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockId, Box3D, LabelFace, OrientationMode, Pallet, Tool};
    use crate::planner::{LayerRequest, RecursiveFiveBlockPlanner, verify_tiling};
    use approx::assert_relative_eq;

    fn request() -> LayerRequest {
        LayerRequest::new(
            Pallet::new("P", 1200.0, 800.0, 144.0, 0.0, 0.0).unwrap(),
            Box3D::new("BX", 400.0, 300.0, 150.0, 5.0, LabelFace::Front).unwrap(),
            Tool::new("T", 100.0, 100.0).unwrap(),
        )
        .with_orientation_mode(OrientationMode::Width)
    }

    fn base_layer() -> Layer {
        RecursiveFiveBlockPlanner::default()
            .plan_layer(&request())
            .unwrap()
    }

    fn sheet(thickness: f64) -> Interleaf {
        Interleaf {
            id: "SHEET".into(),
            thickness,
            weight: 0.5,
            material: "cardboard".into(),
        }
    }

    #[test]
    fn corners_alternate_and_elevation_grows_by_box_height() {
        let sequence = LayerSequencePlanner
            .plan(&base_layer(), &SequenceRequest::new(4, vec![Corner::SW, Corner::NE]))
            .unwrap();

        let corners: Vec<Corner> = sequence.layers.iter().map(|l| l.corner).collect();
        assert_eq!(corners, vec![Corner::SW, Corner::NE, Corner::SW, Corner::NE]);

        for (i, layer) in sequence.layers.iter().enumerate() {
            assert_eq!(layer.elevation_index, i);
            assert_relative_eq!(layer.base_z, 150.0 * i as f64);
        }
        assert_relative_eq!(sequence.stack_height(), 600.0);
        assert!(sequence.interleaves.is_empty());
        assert_eq!(sequence.interleaf_frequency, None);
    }

    #[test]
    fn interleaf_is_inserted_at_frequency() {
        let sequence = LayerSequencePlanner
            .plan(
                &base_layer(),
                &SequenceRequest::new(4, vec![Corner::SW]).with_interleaf(sheet(5.0), 2),
            )
            .unwrap();

        let base: Vec<f64> = sequence.layers.iter().map(|l| l.base_z).collect();
        assert_eq!(base, vec![0.0, 150.0, 305.0, 455.0]);
        assert_eq!(sequence.interleaves.len(), 1);
        assert_eq!(sequence.interleaves[0].below_level, 2);
        assert_relative_eq!(sequence.interleaves[0].z, 300.0);
        assert!(sequence.layers[2].interleaf_below.is_some());
        assert!(sequence.layers[1].interleaf_below.is_none());

        for pair in sequence.layers.windows(2) {
            assert!(pair[1].base_z > pair[0].base_z);
        }
    }

    #[test]
    fn base_interleaf_lifts_first_level() {
        let mut request = SequenceRequest::new(2, vec![]).with_interleaf(sheet(5.0), 1);
        request.base_interleaf = true;
        let sequence = LayerSequencePlanner.plan(&base_layer(), &request).unwrap();

        let base: Vec<f64> = sequence.layers.iter().map(|l| l.base_z).collect();
        assert_eq!(base, vec![5.0, 160.0]);
        assert_eq!(sequence.interleaves.len(), 2);
        assert_eq!(sequence.interleaves[0].below_level, 0);
        assert_relative_eq!(sequence.interleaves[0].z, 0.0);
        assert_eq!(sequence.corners, vec![Corner::SW]);
    }

    #[test]
    fn mirrored_layer_matches_layer_planned_from_that_corner() {
        let mut offset_request = request();
        offset_request.tool.pickup_offset = Vec3::new(10.0, 0.0, 5.0);
        offset_request
            .block_offsets
            .insert(BlockId(0), Vec3::new(3.0, -4.0, 2.0));

        let planner = RecursiveFiveBlockPlanner::default();
        let base = planner.plan_layer(&offset_request).unwrap();
        let mirrored = mirror_layer(&base, Corner::NE);
        let planned = planner
            .plan_layer(&offset_request.clone().with_corner(Corner::NE))
            .unwrap();

        assert_eq!(mirrored.picks[0].pickup_offset, Vec3::new(13.0, -4.0, 7.0));
        assert_eq!(mirrored.picks, planned.picks);
        assert_eq!(mirrored.blocks, planned.blocks);
        assert_eq!(mirrored.decompositions, planned.decompositions);
        assert_relative_eq!(mirrored.fill_ratio, base.fill_ratio);
        assert!(verify_tiling(&mirrored, 1e-4).is_ok());
    }

    #[test]
    fn base_layer_is_not_modified() {
        let base = base_layer();
        let snapshot = base.clone();
        let _ = LayerSequencePlanner
            .plan(&base, &SequenceRequest::new(3, vec![Corner::SE, Corner::NW]))
            .unwrap();
        assert_eq!(base, snapshot);
    }

    #[test]
    fn invalid_requests_are_configuration_errors() {
        let base = base_layer();
        let err = LayerSequencePlanner
            .plan(&base, &SequenceRequest::new(0, vec![Corner::SW]))
            .unwrap_err();
        assert!(matches!(err, PlanError::EmptySequence));

        let err = LayerSequencePlanner
            .plan(
                &base,
                &SequenceRequest::new(2, vec![Corner::SW]).with_interleaf(sheet(5.0), 0),
            )
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter(_)));

        let err = LayerSequencePlanner
            .plan(&base, &SequenceRequest::new(usize::MAX / 2, vec![]))
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);

        let err = LayerSequencePlanner
            .plan(&base, &SequenceRequest::new(2, vec![]).with_z_step(0.0))
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidDimension { field: "z_step", .. }));
    }

    #[test]
    fn largest_allowed_sequence_is_planned() {
        let sequence = LayerSequencePlanner
            .plan(&base_layer(), &SequenceRequest::new(SequenceRequest::MAX_LAYERS, vec![]))
            .unwrap();
        assert_eq!(sequence.levels(), SequenceRequest::MAX_LAYERS);
    }

    #[test]
    fn z_step_overrides_level_pitch() {
        let sequence = LayerSequencePlanner
            .plan(&base_layer(), &SequenceRequest::new(3, vec![]).with_z_step(160.0))
            .unwrap();

        let base: Vec<f64> = sequence.layers.iter().map(|l| l.base_z).collect();
        assert_eq!(base, vec![0.0, 160.0, 320.0]);
        assert_relative_eq!(sequence.z_step, 160.0);
        assert_relative_eq!(sequence.stack_height(), 470.0);

        let request: SequenceRequest =
            serde_json::from_str(r#"{"layers": 2, "z_step": 155.5}"#).unwrap();
        assert_eq!(request.z_step, Some(155.5));
        assert_eq!(request.interleaf_frequency, 1);
    }

    #[test]
    fn progress_reports_every_level() {
        let mut events = Vec::new();
        LayerSequencePlanner
            .plan_with_progress(
                &base_layer(),
                &SequenceRequest::new(3, vec![Corner::SW]).with_interleaf(sheet(2.0), 1),
                |event| events.push(event.clone()),
            )
            .unwrap();

        assert!(matches!(events[0], SequenceEvent::Started { levels: 3 }));
        let placed = events
            .iter()
            .filter(|e| matches!(e, SequenceEvent::LayerPlaced { .. }))
            .count();
        let sheets = events
            .iter()
            .filter(|e| matches!(e, SequenceEvent::InterleafPlaced { .. }))
            .count();
        assert_eq!(placed, 3);
        assert_eq!(sheets, 2);
        assert!(matches!(
            events.last(),
            Some(SequenceEvent::Finished {
                levels: 3,
                total_boxes: 18,
                ..
            })
        ));
    }
}
