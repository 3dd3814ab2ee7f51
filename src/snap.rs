//! Snap point enumeration for interactive alignment.
//!
//! The generator does not snap anything itself. It lists candidate points in a
//! fixed order and leaves the nearest-match decision to the caller.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geometry::{Orientation, Rect};
use crate::model::{Layer, Pallet, PickId, Tool};
use crate::types::Vec3;

/// Geometric origin of a snap point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SnapKind {
    Vertex,
    Midpoint,
    Center,
}

/// Entity a snap point belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SnapOwner {
    Pallet,
    Tool,
    Pick(PickId),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SnapPoint {
    pub position: Vec3,
    pub kind: SnapKind,
    pub owner: SnapOwner,
}

/// Current tool position on the deck.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolPose {
    pub center: Vec3,
    #[serde(default)]
    pub rotation: Orientation,
}

/// Enumerates snap points for pallet, tool and picks.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnapPointGenerator;

impl SnapPointGenerator {
    /// Lists snap points: pallet first, then the tool (if posed), then every
    /// pick in layer order. Each owner yields its corners (SW, SE, NE, NW),
    /// then edge midpoints (S, E, N, W), then its center.
    ///
    /// Pallet points lie on the deck (z = 0); pick and tool points sit at the
    /// absolute elevation of the pick tops.
    pub fn generate(
        &self,
        layer: &Layer,
        pallet: &Pallet,
        tool: &Tool,
        pose: Option<&ToolPose>,
    ) -> Vec<SnapPoint> {
        let mut points = Vec::with_capacity(9 * (layer.picks.len() + 2));
        push_rect(&mut points, &pallet.deck(), 0.0, SnapOwner::Pallet);

        let top = layer.top_z();
        if let Some(pose) = pose {
            let rect = tool.footprint_at((pose.center.x, pose.center.y), pose.rotation);
            push_rect(&mut points, &rect, pose.center.z, SnapOwner::Tool);
        }

        for pick in &layer.picks {
            push_rect(&mut points, &pick.footprint(), top, SnapOwner::Pick(pick.id));
        }
        points
    }
}

fn push_rect(points: &mut Vec<SnapPoint>, rect: &Rect, z: f64, owner: SnapOwner) {
    let (cx, cy) = rect.center();
    let vertices = rect
        .corners()
        .into_iter()
        .map(|p| (p, SnapKind::Vertex));
    let midpoints = rect
        .edge_midpoints()
        .into_iter()
        .map(|p| (p, SnapKind::Midpoint));
    let center = std::iter::once(((cx, cy), SnapKind::Center));

    points.extend(
        vertices
            .chain(midpoints)
            .chain(center)
            .map(|((x, y), kind)| SnapPoint {
                position: Vec3::new(x, y, z),
                kind,
                owner,
            }),
    );
}
