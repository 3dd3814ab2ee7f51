//! Collision and overhang verification for planned layers.
//!
//! The checker only reads its inputs. Every finding is returned as a
//! [`Violation`]; an empty list means the layer is valid. Footprints are
//! always derived from the box dimensions after the pick rotation is applied.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geometry::{Axis, Rect};
use crate::model::{Layer, Pick, PickId, Tool};
use crate::types::Vec3;

/// Phase of the deposit motion in which the tool collided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DepositPhase {
    /// Straight-line approach towards the deposit position.
    Approach,
    /// Tool resting at the deposit position.
    Final,
}

/// A constraint violation found by the [`CollisionChecker`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Two pick footprints share `area` mm².
    Overlap { a: PickId, b: PickId, area: f64 },
    /// A pick exceeds the overhang allowance along `axis` by `amount` mm.
    Overhang { pick: PickId, axis: Axis, amount: f64 },
    /// The tool carrying `pick` hits the already deposited `other`.
    ///
    /// `excess` is the overlap area for [`DepositPhase::Final`] and the swept
    /// length inside the obstacle for [`DepositPhase::Approach`].
    ToolCollision {
        pick: PickId,
        other: PickId,
        phase: DepositPhase,
        excess: f64,
    },
    /// The multi-grip envelope is wider along `axis` than the deck plus
    /// twice the overhang allowance.
    GripEnvelope { axis: Axis, envelope: f64, limit: f64 },
    /// Fingers `a` and `b` of the multi-grip layout share `area` mm².
    FingerOverlap { a: usize, b: usize, area: f64 },
    /// The multi-grip envelope does not fit inside the tool along `axis`.
    GripExceedsTool { axis: Axis, envelope: f64, limit: f64 },
}

/// Validates pick placements and tool motion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionChecker {
    clearance: f64,
}

impl Default for CollisionChecker {
    fn default() -> Self {
        Self {
            clearance: Self::DEFAULT_CLEARANCE,
        }
    }
}

impl CollisionChecker {
    /// Overlaps and excursions up to this size are treated as contact.
    pub const DEFAULT_CLEARANCE: f64 = 1e-3;

    pub fn new(clearance: f64) -> Self {
        Self {
            clearance: clearance.max(0.0),
        }
    }

    pub fn clearance(&self) -> f64 {
        self.clearance
    }

    /// Runs the placement checks on a layer: pick overlaps, overhang, the
    /// tool at every deposit position and the multi-grip head geometry.
    pub fn check_layer(&self, layer: &Layer, tool: &Tool) -> Vec<Violation> {
        let mut violations = self.check_overlaps(layer);
        violations.extend(self.check_overhang(layer));
        violations.extend(self.check_tool_at_deposit(layer, tool));
        violations.extend(self.check_multi_grip(layer, tool));
        violations
    }

    /// Multi-grip envelope against the deck and the tool, and finger overlaps.
    ///
    /// Tools without a multi-grip head never produce findings here.
    pub fn check_multi_grip(&self, layer: &Layer, tool: &Tool) -> Vec<Violation> {
        let Some(grip) = &tool.multi_grip else {
            return Vec::new();
        };
        let (width, depth) = grip.envelope();
        let mut violations = Vec::new();

        let deck_limits = [
            (Axis::X, width, layer.pallet.width + 2.0 * layer.overhang_x),
            (Axis::Y, depth, layer.pallet.depth + 2.0 * layer.overhang_y),
        ];
        violations.extend(
            deck_limits
                .into_iter()
                .filter(|(_, envelope, limit)| envelope - limit > self.clearance)
                .map(|(axis, envelope, limit)| Violation::GripEnvelope {
                    axis,
                    envelope,
                    limit,
                }),
        );

        let fingers = grip.layout(Vec3::zero());
        for (i, finger) in fingers.iter().enumerate() {
            let rect = finger.footprint();
            for other in &fingers[i + 1..] {
                let other_rect = other.footprint();
                if rect.intersects(&other_rect, self.clearance) {
                    violations.push(Violation::FingerOverlap {
                        a: finger.index,
                        b: other.index,
                        area: rect.overlap_area(&other_rect),
                    });
                }
            }
        }

        let tool_limits = [(Axis::X, width, tool.width), (Axis::Y, depth, tool.depth)];
        violations.extend(
            tool_limits
                .into_iter()
                .filter(|(_, envelope, limit)| envelope - limit > self.clearance)
                .map(|(axis, envelope, limit)| Violation::GripExceedsTool {
                    axis,
                    envelope,
                    limit,
                }),
        );
        violations
    }

    /// Pairwise pick footprint intersection.
    pub fn check_overlaps(&self, layer: &Layer) -> Vec<Violation> {
        let footprints: Vec<(PickId, Rect)> = layer
            .picks
            .iter()
            .map(|p| (p.id, deposited_footprint(layer, p)))
            .collect();

        let mut violations = Vec::new();
        for (i, (a, rect_a)) in footprints.iter().enumerate() {
            for (b, rect_b) in &footprints[i + 1..] {
                if let Some(violation) = self.overlap(*a, rect_a, *b, rect_b) {
                    violations.push(violation);
                }
            }
        }
        violations
    }

    /// Pick footprints against the deck enlarged by the layer's overhang allowance.
    pub fn check_overhang(&self, layer: &Layer) -> Vec<Violation> {
        layer
            .picks
            .iter()
            .flat_map(|pick| self.overhang(layer, pick))
            .collect()
    }

    /// Tool footprint at each deposit position against the picks placed before it.
    pub fn check_tool_at_deposit(&self, layer: &Layer, tool: &Tool) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (index, pick) in layer.picks.iter().enumerate() {
            let held = pick.tool_position();
            let tool_rect = tool.footprint_at((held.x, held.y), pick.rotation);
            for placed in &layer.picks[..index] {
                let rect = deposited_footprint(layer, placed);
                if tool_rect.intersects(&rect, self.clearance) {
                    violations.push(Violation::ToolCollision {
                        pick: pick.id,
                        other: placed.id,
                        phase: DepositPhase::Final,
                        excess: tool_rect.overlap_area(&rect),
                    });
                }
            }
        }
        violations
    }

    /// Sweeps the tool along each pick's approach and reports hits on earlier picks.
    ///
    /// `approach` returns the travel vector of the final straight-line
    /// approach, which therefore starts at the deposit position minus that
    /// vector. The sweep is tested as a segment against the deposited
    /// footprints grown by half the tool extents.
    pub fn check_approach<F>(&self, layer: &Layer, tool: &Tool, approach: F) -> Vec<Violation>
    where
        F: Fn(&Pick) -> Vec3,
    {
        let mut violations = Vec::new();
        for (index, pick) in layer.picks.iter().enumerate() {
            let end = pick.tool_position();
            let start = end - approach(pick);
            let tool_rect = tool.footprint_at((end.x, end.y), pick.rotation);
            let length = start.distance_2d(&end);

            for placed in &layer.picks[..index] {
                let obstacle = deposited_footprint(layer, placed)
                    .expanded(tool_rect.width / 2.0, tool_rect.depth / 2.0);
                if let Some((enter, exit)) =
                    obstacle.segment_clip((start.x, start.y), (end.x, end.y), self.clearance)
                {
                    violations.push(Violation::ToolCollision {
                        pick: pick.id,
                        other: placed.id,
                        phase: DepositPhase::Approach,
                        excess: (exit - enter) * length,
                    });
                }
            }
        }
        violations
    }

    /// Validates a pick being dragged to a new position or rotation.
    ///
    /// The candidate keeps its id; the stationary pick with the same id is
    /// ignored.
    pub fn check_moving_pick(&self, layer: &Layer, candidate: &Pick) -> Vec<Violation> {
        let moving = deposited_footprint(layer, candidate);
        let mut violations: Vec<Violation> = layer
            .picks
            .iter()
            .filter(|p| p.id != candidate.id)
            .filter_map(|p| {
                self.overlap(candidate.id, &moving, p.id, &deposited_footprint(layer, p))
            })
            .collect();
        violations.extend(self.overhang(layer, candidate));
        violations
    }

    fn overlap(&self, a: PickId, rect_a: &Rect, b: PickId, rect_b: &Rect) -> Option<Violation> {
        rect_a
            .intersects(rect_b, self.clearance)
            .then(|| Violation::Overlap {
                a,
                b,
                area: rect_a.overlap_area(rect_b),
            })
    }

    fn overhang(&self, layer: &Layer, pick: &Pick) -> Vec<Violation> {
        let deck = layer.pallet.deck();
        let rect = deposited_footprint(layer, pick);

        let excess_x = (deck.min_x() - rect.min_x()).max(rect.max_x() - deck.max_x());
        let excess_y = (deck.min_y() - rect.min_y()).max(rect.max_y() - deck.max_y());

        [
            (Axis::X, excess_x - layer.overhang_x),
            (Axis::Y, excess_y - layer.overhang_y),
        ]
        .into_iter()
        .filter(|(_, amount)| *amount > self.clearance)
        .map(|(axis, amount)| Violation::Overhang {
            pick: pick.id,
            axis,
            amount,
        })
        .collect()
    }
}

/// Footprint of a pick with its rotation applied to the layer's box.
fn deposited_footprint(layer: &Layer, pick: &Pick) -> Rect {
    let (box_width, box_depth) = layer.box_spec.footprint(pick.rotation);
    Rect::from_center(
        pick.center.x,
        pick.center.y,
        box_width * pick.box_count as f64,
        box_depth,
    )
}
