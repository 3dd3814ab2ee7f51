//! Approach vectors and label anchors for every pick of a layer.
//!
//! Settings resolve per field: a block override wins when it sets the field,
//! otherwise the annotator default applies.

use std::collections::BTreeMap;
use std::f64::consts::FRAC_1_SQRT_2;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{PlanError, PlanResult};
use crate::frame::FrameTransform;
use crate::model::{BlockId, Corner, LabelFace, Layer, Pick, PickId};
use crate::types::Vec3;
use crate::types::validation::{validate_dimension, validate_non_negative};

/// Compass direction the tool travels in during the final approach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Compass {
    /// Unit vector in the deck plane.
    pub fn unit(self) -> Vec3 {
        let d = FRAC_1_SQRT_2;
        let (x, y) = match self {
            Compass::N => (0.0, 1.0),
            Compass::NE => (d, d),
            Compass::E => (1.0, 0.0),
            Compass::SE => (d, -d),
            Compass::S => (0.0, -1.0),
            Compass::SW => (-d, -d),
            Compass::W => (-1.0, 0.0),
            Compass::NW => (-d, d),
        };
        Vec3::new(x, y, 0.0)
    }
}

impl From<Corner> for Compass {
    fn from(corner: Corner) -> Self {
        match corner {
            Corner::SW => Compass::SW,
            Corner::SE => Compass::SE,
            Corner::NW => Compass::NW,
            Corner::NE => Compass::NE,
        }
    }
}

/// Default approach settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApproachSettings {
    /// `None` travels towards the layer's starting corner.
    #[serde(default)]
    pub direction: Option<Compass>,
    pub distance: f64,
    pub label_offset: f64,
}

impl ApproachSettings {
    pub const DEFAULT_DISTANCE: f64 = 75.0;
    pub const DEFAULT_LABEL_OFFSET: f64 = 5.0;
}

impl Default for ApproachSettings {
    fn default() -> Self {
        Self {
            direction: None,
            distance: Self::DEFAULT_DISTANCE,
            label_offset: Self::DEFAULT_LABEL_OFFSET,
        }
    }
}

/// Per-block replacement of individual approach settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApproachOverride {
    pub direction: Option<Compass>,
    pub distance: Option<f64>,
    pub label_offset: Option<f64>,
}

/// Approach and label data for one pick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlacementAnnotation {
    pub pick: PickId,
    pub block: BlockId,
    pub elevation_index: usize,
    pub direction: Compass,
    pub distance: f64,
    /// Travel over the approach; it starts at the deposit position minus this vector.
    pub approach_vector: Vec3,
    pub label_face: LabelFace,
    /// Absolute label position on the outside of the labelled face.
    pub label_anchor: Vec3,
}

impl PlacementAnnotation {
    /// Copy expressed in an external frame. The compass tag keeps its
    /// native meaning; only the vectors are transformed.
    pub fn projected(&self, transform: &FrameTransform) -> Self {
        Self {
            approach_vector: transform.apply_vector(self.approach_vector),
            label_anchor: transform.apply_point(self.label_anchor),
            ..self.clone()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlacementAnnotator {
    defaults: ApproachSettings,
}

impl PlacementAnnotator {
    pub fn new(defaults: ApproachSettings) -> PlanResult<Self> {
        validate_dimension(defaults.distance, "approach distance")?;
        validate_non_negative(defaults.label_offset, "label offset")?;
        Ok(Self { defaults })
    }

    pub fn defaults(&self) -> &ApproachSettings {
        &self.defaults
    }

    /// Annotates every pick of `layer` in deposit order.
    ///
    /// Fails when an override names a block the layer does not contain or a
    /// resolved distance is not positive.
    pub fn annotate(
        &self,
        layer: &Layer,
        overrides: &BTreeMap<BlockId, ApproachOverride>,
    ) -> PlanResult<Vec<PlacementAnnotation>> {
        if let Some(unknown) = overrides.keys().find(|id| !layer.has_block(**id)) {
            return Err(PlanError::unknown_block(
                unknown.to_string(),
                "approach overrides",
            ));
        }

        layer
            .picks
            .iter()
            .map(|pick| -> PlanResult<PlacementAnnotation> {
                let custom = overrides.get(&pick.block).copied().unwrap_or_default();
                let direction = custom
                    .direction
                    .or(self.defaults.direction)
                    .unwrap_or_else(|| Compass::from(layer.corner));
                let distance = custom.distance.unwrap_or(self.defaults.distance);
                let label_offset = custom.label_offset.unwrap_or(self.defaults.label_offset);
                validate_dimension(distance, "approach distance")?;
                validate_non_negative(label_offset, "label offset")?;

                Ok(PlacementAnnotation {
                    pick: pick.id,
                    block: pick.block,
                    elevation_index: layer.elevation_index,
                    direction,
                    distance,
                    approach_vector: direction.unit() * distance,
                    label_face: layer.box_spec.label_face,
                    label_anchor: label_anchor(layer, pick, label_offset),
                })
            })
            .collect()
    }
}

/// Center of the labelled face pushed out by `offset`, after the pick rotation.
fn label_anchor(layer: &Layer, pick: &Pick, offset: f64) -> Vec3 {
    let face = layer.box_spec.label_face;
    let normal = face.normal();
    let (nx, ny) = pick.rotation.rotate_xy(normal.x, normal.y);
    let half = match face {
        LabelFace::Top | LabelFace::Bottom => layer.box_spec.height / 2.0,
        _ if nx.abs() > ny.abs() => pick.width / 2.0,
        _ => pick.depth / 2.0,
    };
    layer.world_center(pick) + Vec3::new(nx, ny, normal.z) * (half + offset)
}
