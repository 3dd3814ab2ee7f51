//! Coordinate frame projection for exported and queried coordinates.
//!
//! Plans are stored in the native frame: origin at the south-west deck
//! corner, X along the pallet width, Y along the depth, Z up from the deck.
//! A [`CoordinateFrame`] maps native coordinates to an external convention.
//! Projection never touches the stored plan; it produces new values.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geometry::{Orientation, QuarterTurn, Rect};
use crate::model::{BlockId, Corner, Layer, LayerSequence, Pallet, PickId};
use crate::snap::SnapPoint;
use crate::types::{BoundingBox, Vec3};

/// Origin of an external coordinate frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum FrameOrigin {
    #[default]
    SW,
    SE,
    NW,
    NE,
    #[serde(alias = "center", alias = "CENTER", alias = "C")]
    Center,
}

impl FrameOrigin {
    pub const ALL: [FrameOrigin; 5] = [
        FrameOrigin::SW,
        FrameOrigin::SE,
        FrameOrigin::NW,
        FrameOrigin::NE,
        FrameOrigin::Center,
    ];

    /// Native position of this origin on the given pallet deck.
    pub fn position(self, pallet: &Pallet) -> (f64, f64) {
        match self {
            FrameOrigin::SW => (0.0, 0.0),
            FrameOrigin::SE => (pallet.width, 0.0),
            FrameOrigin::NW => (0.0, pallet.depth),
            FrameOrigin::NE => (pallet.width, pallet.depth),
            FrameOrigin::Center => pallet.center_xy(),
        }
    }
}

/// Requested origin and axis rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CoordinateFrame {
    #[serde(default)]
    pub origin: FrameOrigin,
    #[serde(default)]
    pub rotation: QuarterTurn,
}

impl CoordinateFrame {
    pub fn new(origin: FrameOrigin, rotation: QuarterTurn) -> Self {
        Self { origin, rotation }
    }

    /// The native frame; its transform is the identity.
    pub fn native() -> Self {
        Self::default()
    }

    /// Computes the affine transform for a pallet: translate the origin to
    /// zero, then rotate the axes.
    pub fn transform(&self, pallet: &Pallet) -> FrameTransform {
        let (ox, oy) = self.origin.position(pallet);
        let (tx, ty) = self.rotation.rotate_xy(-ox, -oy);
        FrameTransform {
            rotation: self.rotation,
            translation: (tx, ty),
        }
    }
}

/// Planar affine map `p' = R·p + t`; Z passes through unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameTransform {
    pub rotation: QuarterTurn,
    pub translation: (f64, f64),
}

impl FrameTransform {
    pub fn apply_point(&self, point: Vec3) -> Vec3 {
        let (x, y) = self.rotation.rotate_xy(point.x, point.y);
        Vec3::new(x + self.translation.0, y + self.translation.1, point.z)
    }

    /// Rotates a direction without translating it.
    pub fn apply_vector(&self, vector: Vec3) -> Vec3 {
        let (x, y) = self.rotation.rotate_xy(vector.x, vector.y);
        Vec3::new(x, y, vector.z)
    }

    pub fn apply_rect(&self, rect: &Rect) -> Rect {
        let (x0, y0) = self.rotation.rotate_xy(rect.min_x(), rect.min_y());
        let (x1, y1) = self.rotation.rotate_xy(rect.max_x(), rect.max_y());
        Rect::new(
            x0.min(x1) + self.translation.0,
            y0.min(y1) + self.translation.1,
            (x1 - x0).abs(),
            (y1 - y0).abs(),
        )
    }

    pub fn apply_bounds(&self, bounds: &BoundingBox) -> BoundingBox {
        let a = self.apply_point(bounds.min);
        let b = self.apply_point(bounds.max);
        BoundingBox::new(
            Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        )
    }

    /// Box orientation as seen in the target frame.
    pub fn apply_orientation(&self, orientation: Orientation) -> Orientation {
        if self.rotation.swaps_axes() {
            orientation.toggled()
        } else {
            orientation
        }
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        let (tx, ty) = rotation.rotate_xy(-self.translation.0, -self.translation.1);
        Self {
            rotation,
            translation: (tx, ty),
        }
    }

    pub fn project_layer(&self, layer: &Layer) -> ProjectedLayer {
        ProjectedLayer {
            elevation_index: layer.elevation_index,
            corner: layer.corner,
            base_z: layer.base_z,
            fill_ratio: layer.fill_ratio,
            footprint: self.apply_rect(&layer.footprint),
            picks: layer
                .picks
                .iter()
                .map(|pick| {
                    let (width, depth) = if self.rotation.swaps_axes() {
                        (pick.depth, pick.width)
                    } else {
                        (pick.width, pick.depth)
                    };
                    ProjectedPick {
                        id: pick.id,
                        block: pick.block,
                        center: self.apply_point(layer.world_center(pick)),
                        tool_position: self
                            .apply_point(layer.world_center(pick) + pick.pickup_offset),
                        rotation: self.apply_orientation(pick.rotation),
                        box_count: pick.box_count,
                        width,
                        depth,
                    }
                })
                .collect(),
        }
    }

    pub fn project_sequence(&self, sequence: &LayerSequence) -> Vec<ProjectedLayer> {
        sequence
            .layers
            .iter()
            .map(|layer| self.project_layer(layer))
            .collect()
    }

    pub fn project_snap_points(&self, points: &[SnapPoint]) -> Vec<SnapPoint> {
        points
            .iter()
            .map(|point| SnapPoint {
                position: self.apply_point(point.position),
                ..*point
            })
            .collect()
    }
}

/// Pick in external coordinates; `center` is absolute (base elevation applied).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProjectedPick {
    pub id: PickId,
    pub block: BlockId,
    pub center: Vec3,
    pub tool_position: Vec3,
    pub rotation: Orientation,
    pub box_count: u32,
    pub width: f64,
    pub depth: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProjectedLayer {
    pub elevation_index: usize,
    pub corner: Corner,
    pub base_z: f64,
    pub fill_ratio: f64,
    pub footprint: Rect,
    pub picks: Vec<ProjectedPick>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Box3D, LabelFace, OrientationMode, Tool};
    use crate::planner::{LayerRequest, RecursiveFiveBlockPlanner};
    use approx::assert_relative_eq;

    fn pallet() -> Pallet {
        Pallet::new("P", 1200.0, 800.0, 144.0, 0.0, 0.0).unwrap()
    }

    #[test]
    fn forward_then_inverse_restores_points_for_every_frame() {
        let pallet = pallet();
        let samples = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1200.0, 800.0, 150.0),
            Vec3::new(123.4, 567.8, 9.0),
            Vec3::new(-25.0, 810.5, 300.0),
        ];
        for origin in FrameOrigin::ALL {
            for rotation in QuarterTurn::ALL {
                let transform = CoordinateFrame::new(origin, rotation).transform(&pallet);
                let inverse = transform.inverse();
                for point in samples {
                    let back = inverse.apply_point(transform.apply_point(point));
                    assert!(
                        back.approx_eq(&point, 1e-9),
                        "{origin:?}/{rotation:?}: {point:?} -> {back:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn center_origin_accepts_common_spellings() {
        for raw in [r#""Center""#, r#""center""#, r#""CENTER""#, r#""C""#] {
            let origin: FrameOrigin = serde_json::from_str(raw).unwrap();
            assert_eq!(origin, FrameOrigin::Center, "{raw}");
        }
        assert!(serde_json::from_str::<FrameOrigin>(r#""middle""#).is_err());
    }

    #[test]
    fn origins_map_to_zero() {
        let pallet = pallet();
        let ne = CoordinateFrame::new(FrameOrigin::NE, QuarterTurn::Deg0).transform(&pallet);
        assert_eq!(
            ne.apply_point(Vec3::new(1200.0, 800.0, 5.0)),
            Vec3::new(0.0, 0.0, 5.0)
        );

        let center =
            CoordinateFrame::new(FrameOrigin::Center, QuarterTurn::Deg90).transform(&pallet);
        assert_eq!(
            center.apply_point(Vec3::new(600.0, 400.0, 0.0)),
            Vec3::zero()
        );
        // +X of the deck becomes +Y after a quarter turn
        assert_eq!(
            center.apply_point(Vec3::new(700.0, 400.0, 0.0)),
            Vec3::new(0.0, 100.0, 0.0)
        );
    }

    #[test]
    fn transform_is_idempotent_and_projection_is_read_only() {
        let pallet = pallet();
        let request = LayerRequest::new(
            pallet.clone(),
            Box3D::new("BX", 400.0, 300.0, 150.0, 5.0, LabelFace::Front).unwrap(),
            Tool::new("T", 100.0, 100.0).unwrap(),
        )
        .with_orientation_mode(OrientationMode::Width);
        let layer = RecursiveFiveBlockPlanner::default()
            .plan_layer(&request)
            .unwrap();
        let snapshot = layer.clone();

        let frame = CoordinateFrame::new(FrameOrigin::SE, QuarterTurn::Deg270);
        let first = frame.transform(&pallet);
        let second = frame.transform(&pallet);
        assert_eq!(first, second);
        assert_eq!(first.project_layer(&layer), second.project_layer(&layer));
        assert_eq!(layer, snapshot);
    }

    #[test]
    fn projected_picks_swap_extents_on_quarter_turns() {
        let pallet = pallet();
        let request = LayerRequest::new(
            pallet.clone(),
            Box3D::new("BX", 400.0, 300.0, 150.0, 5.0, LabelFace::Front).unwrap(),
            Tool::new("T", 100.0, 100.0).unwrap(),
        )
        .with_orientation_mode(OrientationMode::Width);
        let layer = RecursiveFiveBlockPlanner::default()
            .plan_layer(&request)
            .unwrap();

        let projected = CoordinateFrame::new(FrameOrigin::SW, QuarterTurn::Deg90)
            .transform(&pallet)
            .project_layer(&layer);
        let pick = &projected.picks[0];
        assert_eq!(pick.rotation, Orientation::Deg90);
        assert_eq!((pick.width, pick.depth), (300.0, 400.0));
        assert_relative_eq!(pick.center.x, -150.0);
        assert_relative_eq!(pick.center.y, 200.0);
        assert_relative_eq!(pick.center.z, 75.0);
        assert_eq!(projected.footprint, Rect::new(-800.0, 0.0, 800.0, 1200.0));
    }

    #[test]
    fn bounds_stay_ordered_after_rotation() {
        let transform =
            CoordinateFrame::new(FrameOrigin::SW, QuarterTurn::Deg90).transform(&pallet());
        let bounds = BoundingBox::new(Vec3::zero(), Vec3::new(1200.0, 800.0, 300.0));
        let projected = transform.apply_bounds(&bounds);
        assert_eq!(projected.min, Vec3::new(-800.0, 0.0, 0.0));
        assert_eq!(projected.max, Vec3::new(0.0, 1200.0, 300.0));
    }

    #[test]
    fn vectors_ignore_translation() {
        let transform =
            CoordinateFrame::new(FrameOrigin::NE, QuarterTurn::Deg180).transform(&pallet());
        assert_eq!(
            transform.apply_vector(Vec3::new(1.0, 0.0, -2.0)),
            Vec3::new(-1.0, 0.0, -2.0)
        );
    }
}
