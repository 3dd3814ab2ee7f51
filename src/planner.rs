//! Recursive five-block layer planner.
//!
//! A layer is built by carving a block of whole boxes out of the footprint at
//! the starting corner, then recursing into the rectangular residuals left on
//! the sides away from that corner. Every recursion step is recorded as a
//! [`Decomposition`] with a filled block and up to four residual slots.
//!
//! Heuristic:
//! - the orientation fitting the most boxes in the region wins
//! - on equal counts the orientation with the narrower leftover strip wins
//! - on a complete tie the 0° orientation wins
//! - the residual L-shape is cut so that the larger of the two strips is as
//!   large as possible

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{PlanError, PlanResult};
use crate::geometry::{Orientation, Rect};
use crate::model::{
    Block, BlockId, BlockRole, Box3D, Corner, Decomposition, Layer, LayerStatus, OrientationMode,
    Pallet, Pick, PickId, Slot, Tool,
};
use crate::types::Vec3;
use crate::types::validation::validate_non_negative;

/// Configuration for the layer planner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlannerConfig {
    /// Numerical tolerance for fit and tiling comparisons
    pub tolerance: f64,
    /// Maximum recursion depth; deeper regions become waste
    pub max_depth: usize,
    /// Upper bound on the boxes a single layer may hold
    pub max_boxes: u64,
}

impl PlannerConfig {
    pub const DEFAULT_TOLERANCE: f64 = 1e-4;
    pub const DEFAULT_MAX_DEPTH: usize = 16;
    pub const DEFAULT_MAX_BOXES: u64 = 10_000;

    /// Creates a builder for custom configuration.
    pub fn builder() -> PlannerConfigBuilder {
        PlannerConfigBuilder::default()
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_boxes: Self::DEFAULT_MAX_BOXES,
        }
    }
}

/// Builder for [`PlannerConfig`].
#[derive(Clone, Debug, Default)]
pub struct PlannerConfigBuilder {
    config: PlannerConfig,
}

impl PlannerConfigBuilder {
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn max_boxes(mut self, limit: u64) -> Self {
        self.config.max_boxes = limit;
        self
    }

    pub fn build(self) -> PlannerConfig {
        self.config
    }
}

/// Inputs for planning one layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerRequest {
    pub pallet: Pallet,
    pub box_spec: Box3D,
    pub tool: Tool,
    pub corner: Corner,
    pub orientation_mode: OrientationMode,
    /// Overrides the pallet's X overhang allowance.
    pub overhang_x: Option<f64>,
    /// Overrides the pallet's Y overhang allowance.
    pub overhang_y: Option<f64>,
    /// Extra pickup offsets for the picks of specific blocks.
    pub block_offsets: BTreeMap<BlockId, Vec3>,
}

impl LayerRequest {
    pub fn new(pallet: Pallet, box_spec: Box3D, tool: Tool) -> Self {
        Self {
            pallet,
            box_spec,
            tool,
            corner: Corner::SW,
            orientation_mode: OrientationMode::Both,
            overhang_x: None,
            overhang_y: None,
            block_offsets: BTreeMap::new(),
        }
    }

    pub fn with_corner(mut self, corner: Corner) -> Self {
        self.corner = corner;
        self
    }

    pub fn with_orientation_mode(mut self, mode: OrientationMode) -> Self {
        self.orientation_mode = mode;
        self
    }

    /// Effective overhang allowance along X.
    pub fn overhang_x(&self) -> f64 {
        self.overhang_x.unwrap_or(self.pallet.max_overhang_x)
    }

    /// Effective overhang allowance along Y.
    pub fn overhang_y(&self) -> f64 {
        self.overhang_y.unwrap_or(self.pallet.max_overhang_y)
    }

    /// Deck enlarged by the overhang allowance on every side.
    pub fn usable_footprint(&self) -> Rect {
        self.pallet
            .deck()
            .expanded(self.overhang_x(), self.overhang_y())
    }

    pub fn validate(&self) -> PlanResult<()> {
        self.pallet.validate()?;
        self.box_spec.validate()?;
        self.tool.validate()?;
        if let Some(value) = self.overhang_x {
            validate_non_negative(value, "overhang x")?;
        }
        if let Some(value) = self.overhang_y {
            validate_non_negative(value, "overhang y")?;
        }
        if let Some((id, _)) = self.block_offsets.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PlanError::invalid_parameter(format!(
                "pickup offset for {id} must be finite"
            )));
        }
        Ok(())
    }
}

/// Orientation choice for one region.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    orientation: Orientation,
    columns: u32,
    rows: u32,
    box_width: f64,
    box_depth: f64,
    leftover: f64,
}

impl Candidate {
    fn count(&self) -> u64 {
        u64::from(self.columns) * u64::from(self.rows)
    }
}

/// Whole boxes of `size` along `extent`, saturating at `u32::MAX`.
fn fit_count(extent: f64, size: f64, tolerance: f64) -> u32 {
    let count = ((extent + tolerance) / size).floor();
    if count >= 1.0 {
        count.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// Rejects footprints whose area admits more boxes than `limit`.
fn check_box_limit(
    footprint: &Rect,
    box_spec: &Box3D,
    tolerance: f64,
    limit: u64,
) -> PlanResult<()> {
    let bound = (footprint.width + tolerance) * (footprint.depth + tolerance)
        / (box_spec.width * box_spec.depth);
    if !bound.is_finite() || bound.floor() > limit as f64 {
        return Err(PlanError::invalid_parameter(format!(
            "footprint {:.1} x {:.1} admits up to {:.0} boxes of {} x {} (limit {limit})",
            footprint.width,
            footprint.depth,
            bound.floor(),
            box_spec.width,
            box_spec.depth
        )));
    }
    Ok(())
}

/// Picks the orientation for a region, or `None` if no box fits.
fn choose_orientation(
    region: &Rect,
    box_spec: &Box3D,
    allowed: &[Orientation],
    tolerance: f64,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for &orientation in allowed {
        let (box_width, box_depth) = box_spec.footprint(orientation);
        let columns = fit_count(region.width, box_width, tolerance);
        let rows = fit_count(region.depth, box_depth, tolerance);
        if columns == 0 || rows == 0 {
            continue;
        }

        let leftover_x = (region.width - columns as f64 * box_width).max(0.0);
        let leftover_y = (region.depth - rows as f64 * box_depth).max(0.0);
        let candidate = Candidate {
            orientation,
            columns,
            rows,
            box_width,
            box_depth,
            leftover: leftover_x.max(leftover_y),
        };

        best = match best {
            None => Some(candidate),
            Some(current) if candidate.count() > current.count() => Some(candidate),
            Some(current)
                if candidate.count() == current.count()
                    && candidate.leftover + tolerance < current.leftover =>
            {
                Some(candidate)
            }
            keep => keep,
        };
    }

    best
}

/// Plans single layers with the five-way recursive decomposition.
#[derive(Clone, Debug, Default)]
pub struct RecursiveFiveBlockPlanner {
    config: PlannerConfig,
}

impl RecursiveFiveBlockPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plans the layer described by `request`.
    ///
    /// An unfillable footprint yields an empty layer with
    /// [`LayerStatus::Unfillable`]; only invalid inputs and internal
    /// decomposition faults are errors.
    pub fn plan_layer(&self, request: &LayerRequest) -> PlanResult<Layer> {
        request.validate()?;

        let footprint = request.usable_footprint();
        check_box_limit(
            &footprint,
            &request.box_spec,
            self.config.tolerance,
            self.config.max_boxes,
        )?;
        let mut builder = LayerBuilder {
            request,
            config: &self.config,
            blocks: Vec::new(),
            decompositions: Vec::new(),
            picks: Vec::new(),
        };
        let root = builder.decompose(footprint, None, BlockRole::Filled, 0);

        let LayerBuilder {
            blocks,
            decompositions,
            picks,
            ..
        } = builder;

        if let Some(unknown) = request
            .block_offsets
            .keys()
            .find(|id| !blocks.iter().any(|b| b.id == **id))
        {
            return Err(PlanError::unknown_block(unknown.to_string(), "pickup offsets"));
        }

        let status = match root {
            Slot::Waste(_) => LayerStatus::Unfillable,
            Slot::Split(_) => LayerStatus::Filled,
        };

        let occupied: f64 = picks.iter().map(|p| p.footprint().area()).sum();
        let layer = Layer {
            elevation_index: 0,
            base_z: 0.0,
            corner: request.corner,
            status,
            pallet: request.pallet.clone(),
            box_spec: request.box_spec.clone(),
            footprint,
            overhang_x: request.overhang_x(),
            overhang_y: request.overhang_y(),
            fill_ratio: occupied / request.pallet.area(),
            blocks,
            decompositions,
            picks,
            interleaf_below: None,
        };

        verify_tiling(&layer, self.config.tolerance)?;

        info!(
            corner = %layer.corner,
            picks = layer.picks.len(),
            boxes = layer.box_count(),
            blocks = layer.blocks.len(),
            fill_ratio = layer.fill_ratio,
            "layer planned"
        );
        Ok(layer)
    }
}

struct LayerBuilder<'a> {
    request: &'a LayerRequest,
    config: &'a PlannerConfig,
    blocks: Vec<Block>,
    decompositions: Vec<Decomposition>,
    picks: Vec<Pick>,
}

impl LayerBuilder<'_> {
    fn push_block(&mut self, block: impl FnOnce(BlockId) -> Block) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(block(id));
        id
    }

    fn decompose(
        &mut self,
        region: Rect,
        parent: Option<BlockId>,
        role: BlockRole,
        depth: usize,
    ) -> Slot {
        let tolerance = self.config.tolerance;
        let candidate = if depth > self.config.max_depth {
            None
        } else {
            choose_orientation(
                &region,
                &self.request.box_spec,
                self.request.orientation_mode.allowed(),
                tolerance,
            )
        };

        let Some(candidate) = candidate else {
            let id = self.push_block(|id| Block {
                id,
                parent,
                role,
                depth,
                rect: region,
                orientation: None,
                columns: 0,
                rows: 0,
            });
            return Slot::Waste(id);
        };

        let corner = self.request.corner;
        let filled_width = candidate.columns as f64 * candidate.box_width;
        let filled_depth = candidate.rows as f64 * candidate.box_depth;
        let x0 = if corner.is_east() {
            region.max_x() - filled_width
        } else {
            region.min_x()
        };
        let y0 = if corner.is_north() {
            region.max_y() - filled_depth
        } else {
            region.min_y()
        };
        let filled = Rect::new(x0, y0, filled_width, filled_depth);

        let filled_id = self.push_block(|id| Block {
            id,
            parent,
            role: BlockRole::Filled,
            depth,
            rect: filled,
            orientation: Some(candidate.orientation),
            columns: candidate.columns,
            rows: candidate.rows,
        });
        self.layout_picks(filled_id, &filled, &candidate);

        debug!(
            depth,
            block = %filled_id,
            degrees = candidate.orientation.degrees(),
            columns = candidate.columns,
            rows = candidate.rows,
            "carved filled block"
        );

        let index = self.decompositions.len();
        self.decompositions.push(Decomposition {
            depth,
            region,
            filled: filled_id,
            north: None,
            south: None,
            east: None,
            west: None,
        });

        for (residual_role, rect) in residual_strips(&region, &filled, corner) {
            if rect.is_degenerate(tolerance) {
                continue;
            }
            let slot = self.decompose(rect, Some(filled_id), residual_role, depth + 1);
            let step = &mut self.decompositions[index];
            match residual_role {
                BlockRole::North => step.north = Some(slot),
                BlockRole::South => step.south = Some(slot),
                BlockRole::East => step.east = Some(slot),
                BlockRole::West => step.west = Some(slot),
                BlockRole::Filled => {}
            }
        }

        Slot::Split(index)
    }

    /// Lays out the picks of a filled block row by row from the starting corner.
    fn layout_picks(&mut self, block: BlockId, rect: &Rect, candidate: &Candidate) {
        let corner = self.request.corner;
        let tool = &self.request.tool;
        let extra_offset = self
            .request
            .block_offsets
            .get(&block)
            .copied()
            .unwrap_or_default();
        let (off_x, off_y) = candidate
            .orientation
            .rotate_xy(tool.pickup_offset.x, tool.pickup_offset.y);
        let pickup_offset = Vec3::new(off_x, off_y, tool.pickup_offset.z) + extra_offset;
        let z = self.request.box_spec.height / 2.0;

        for row in 0..candidate.rows {
            let row_center = (row as f64 + 0.5) * candidate.box_depth;
            let y = if corner.is_north() {
                rect.max_y() - row_center
            } else {
                rect.min_y() + row_center
            };

            let mut column = 0;
            while column < candidate.columns {
                let capacity = tool.capacity_for(self.picks.len());
                let count = capacity.min(candidate.columns - column);
                let group_center = (column as f64 + count as f64 / 2.0) * candidate.box_width;
                let x = if corner.is_east() {
                    rect.max_x() - group_center
                } else {
                    rect.min_x() + group_center
                };

                self.picks.push(Pick {
                    id: PickId(self.picks.len()),
                    block,
                    center: Vec3::new(x, y, z),
                    rotation: candidate.orientation,
                    box_count: count,
                    width: count as f64 * candidate.box_width,
                    depth: candidate.box_depth,
                    pickup_offset,
                });
                column += count;
            }
        }
    }
}

/// Splits the L-shaped residual of `region` around `filled`.
///
/// The strip along the side opposite the starting corner in Y spans the full
/// region width when that makes it the larger piece; otherwise the X strip
/// spans the full depth.
fn residual_strips(region: &Rect, filled: &Rect, corner: Corner) -> [(BlockRole, Rect); 2] {
    let leftover_x = region.width - filled.width;
    let leftover_y = region.depth - filled.depth;

    let x_strip_x = if corner.is_east() {
        region.min_x()
    } else {
        filled.max_x()
    };
    let y_strip_y = if corner.is_north() {
        region.min_y()
    } else {
        filled.max_y()
    };

    let (y_strip, x_strip) = if region.width * leftover_y >= leftover_x * region.depth {
        (
            Rect::new(region.min_x(), y_strip_y, region.width, leftover_y),
            Rect::new(x_strip_x, filled.min_y(), leftover_x, filled.depth),
        )
    } else {
        (
            Rect::new(filled.min_x(), y_strip_y, filled.width, leftover_y),
            Rect::new(x_strip_x, region.min_y(), leftover_x, region.depth),
        )
    };

    let y_role = if corner.is_north() {
        BlockRole::South
    } else {
        BlockRole::North
    };
    let x_role = if corner.is_east() {
        BlockRole::West
    } else {
        BlockRole::East
    };

    [(y_role, y_strip), (x_role, x_strip)]
}

/// Checks that the blocks tile the footprint and that no picks overlap.
pub fn verify_tiling(layer: &Layer, tolerance: f64) -> PlanResult<()> {
    let footprint = &layer.footprint;

    for block in &layer.blocks {
        if !footprint.contains(&block.rect, tolerance) {
            return Err(PlanError::invariant_breach(format!(
                "block {} leaves the usable footprint",
                block.id
            )));
        }
    }

    for (i, a) in layer.blocks.iter().enumerate() {
        for b in &layer.blocks[i + 1..] {
            if a.rect.intersects(&b.rect, tolerance) {
                return Err(PlanError::invariant_breach(format!(
                    "blocks {} and {} overlap",
                    a.id, b.id
                )));
            }
        }
    }

    for step in &layer.decompositions {
        for (role, slot) in step.residuals() {
            let consistent = match slot {
                None => true,
                Some(Slot::Waste(id)) => layer.block(id).is_some_and(|b| b.role == role),
                Some(Slot::Split(index)) => layer
                    .decompositions
                    .get(index)
                    .and_then(|nested| layer.block(nested.filled))
                    .is_some_and(|b| b.parent == Some(step.filled)),
            };
            if !consistent {
                return Err(PlanError::invariant_breach(format!(
                    "{role:?} residual of block {} is dangling",
                    step.filled
                )));
            }
        }
    }

    let covered: f64 = layer.blocks.iter().map(|b| b.rect.area()).sum();
    let slack = tolerance * (footprint.width + footprint.depth) * layer.blocks.len().max(1) as f64;
    if (covered - footprint.area()).abs() > slack {
        return Err(PlanError::invariant_breach(format!(
            "blocks cover {covered:.3} of {:.3} footprint area",
            footprint.area()
        )));
    }

    for (i, a) in layer.picks.iter().enumerate() {
        for b in &layer.picks[i + 1..] {
            if a.footprint().intersects(&b.footprint(), tolerance) {
                return Err(PlanError::invariant_breach(format!(
                    "picks {} and {} overlap",
                    a.id, b.id
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LabelFace;
    use approx::assert_relative_eq;

    fn request(pallet: (f64, f64), box_dims: (f64, f64)) -> LayerRequest {
        LayerRequest::new(
            Pallet::new("P", pallet.0, pallet.1, 144.0, 0.0, 0.0).unwrap(),
            Box3D::new("BX", box_dims.0, box_dims.1, 150.0, 5.0, LabelFace::Front).unwrap(),
            Tool::new("T", 100.0, 100.0).unwrap(),
        )
    }

    fn plan(request: &LayerRequest) -> Layer {
        RecursiveFiveBlockPlanner::default()
            .plan_layer(request)
            .unwrap()
    }

    fn waste_area(layer: &Layer) -> f64 {
        layer
            .blocks
            .iter()
            .filter(|b| b.is_waste())
            .map(|b| b.rect.area())
            .sum()
    }

    #[test]
    fn euro_pallet_is_tiled_completely() {
        let layer = plan(&request((1200.0, 800.0), (400.0, 300.0)));

        assert_eq!(layer.status, LayerStatus::Filled);
        assert_eq!(layer.picks.len(), 8);
        assert!(layer.picks.iter().all(|p| p.rotation == Orientation::Deg90));
        assert!(layer.picks.iter().all(|p| p.width == 300.0 && p.depth == 400.0));
        assert_relative_eq!(layer.fill_ratio, 1.0);
        assert_relative_eq!(waste_area(&layer), 0.0);
        assert_eq!(layer.blocks.len(), 1);
    }

    #[test]
    fn width_only_mode_leaves_north_waste_strip() {
        let layer = plan(
            &request((1200.0, 800.0), (400.0, 300.0)).with_orientation_mode(OrientationMode::Width),
        );

        assert_eq!(layer.picks.len(), 6);
        assert!(layer.picks.iter().all(|p| p.rotation == Orientation::Deg0));
        assert_relative_eq!(layer.fill_ratio, 0.75);

        let waste: Vec<_> = layer.blocks.iter().filter(|b| b.is_waste()).collect();
        assert_eq!(waste.len(), 1);
        assert_eq!(waste[0].role, BlockRole::North);
        assert_eq!(waste[0].rect, Rect::new(0.0, 600.0, 1200.0, 200.0));
        assert_eq!(waste[0].parent, Some(BlockId(0)));
        assert_eq!(layer.decompositions[0].north, Some(Slot::Waste(waste[0].id)));
    }

    #[test]
    fn oversized_box_yields_unfillable_empty_layer() {
        let layer = plan(&request((600.0, 400.0), (700.0, 500.0)));

        assert_eq!(layer.status, LayerStatus::Unfillable);
        assert!(layer.picks.is_empty());
        assert_eq!(layer.blocks.len(), 1);
        assert_eq!(layer.blocks[0].rect, layer.footprint);
        assert_relative_eq!(layer.fill_ratio, 0.0);
    }

    #[test]
    fn residual_region_is_filled_recursively() {
        let layer = plan(&request((600.0, 1100.0), (400.0, 300.0)));

        // 90° block of 2 × 2 boxes, one 0° box in the north strip, east waste
        assert_eq!(layer.blocks.len(), 3);
        assert_eq!(layer.blocks[0].rect, Rect::new(0.0, 0.0, 600.0, 800.0));
        assert_eq!(layer.blocks[0].orientation, Some(Orientation::Deg90));

        let nested = &layer.blocks[1];
        assert_eq!(nested.depth, 1);
        assert_eq!(nested.parent, Some(BlockId(0)));
        assert_eq!(nested.orientation, Some(Orientation::Deg0));
        assert_eq!(nested.rect, Rect::new(0.0, 800.0, 400.0, 300.0));

        let waste = &layer.blocks[2];
        assert!(waste.is_waste());
        assert_eq!(waste.role, BlockRole::East);
        assert_eq!(waste.rect, Rect::new(400.0, 800.0, 200.0, 300.0));

        assert_eq!(layer.decompositions[0].north, Some(Slot::Split(1)));
        assert_eq!(layer.decompositions[1].east, Some(Slot::Waste(BlockId(2))));
        assert_eq!(layer.box_count(), 5);
        assert_eq!(layer.picks.len(), 5);
    }

    #[test]
    fn equal_counts_prefer_narrower_leftover() {
        let region = Rect::new(0.0, 0.0, 1000.0, 1100.0);
        let spec = Box3D::new("BX", 400.0, 300.0, 100.0, 1.0, LabelFace::Front).unwrap();
        let chosen = choose_orientation(&region, &spec, &Orientation::ALL, 1e-4).unwrap();
        // 0°: 2 × 3 boxes, leftovers 200/200; 90°: 3 × 2 boxes, leftovers 100/300
        assert_eq!(chosen.orientation, Orientation::Deg0);
        assert_eq!(chosen.count(), 6);

        let region = Rect::new(0.0, 0.0, 1100.0, 1000.0);
        let chosen = choose_orientation(&region, &spec, &Orientation::ALL, 1e-4).unwrap();
        // 0°: 2 × 3 boxes, leftovers 300/100; 90°: 3 × 2 boxes, leftovers 200/200
        assert_eq!(chosen.orientation, Orientation::Deg90);
        assert_eq!(chosen.count(), 6);
    }

    #[test]
    fn exact_tie_prefers_zero_degrees() {
        let region = Rect::new(0.0, 0.0, 600.0, 600.0);
        let spec = Box3D::new("BX", 300.0, 200.0, 100.0, 1.0, LabelFace::Front).unwrap();
        let chosen = choose_orientation(&region, &spec, &Orientation::ALL, 1e-4).unwrap();
        assert_eq!(chosen.orientation, Orientation::Deg0);
        assert_eq!(chosen.count(), 6);
    }

    #[test]
    fn north_east_start_anchors_at_max_corner() {
        let layer = plan(
            &request((1200.0, 800.0), (400.0, 300.0))
                .with_orientation_mode(OrientationMode::Width)
                .with_corner(Corner::NE),
        );

        let first = &layer.picks[0];
        assert_relative_eq!(first.center.x, 1000.0);
        assert_relative_eq!(first.center.y, 650.0);
        assert_eq!(layer.blocks[0].rect, Rect::new(0.0, 200.0, 1200.0, 600.0));
        let waste = layer.blocks.iter().find(|b| b.is_waste()).unwrap();
        assert_eq!(waste.role, BlockRole::South);
    }

    #[test]
    fn picks_are_row_major_from_start_corner() {
        let layer = plan(
            &request((1200.0, 800.0), (400.0, 300.0)).with_orientation_mode(OrientationMode::Width),
        );
        let centers: Vec<(f64, f64)> = layer
            .picks
            .iter()
            .map(|p| (p.center.x, p.center.y))
            .collect();
        assert_eq!(
            centers,
            vec![
                (200.0, 150.0),
                (600.0, 150.0),
                (1000.0, 150.0),
                (200.0, 450.0),
                (600.0, 450.0),
                (1000.0, 450.0),
            ]
        );
        assert!(layer.picks.iter().all(|p| p.center.z == 75.0));
    }

    #[test]
    fn multi_box_tool_groups_adjacent_boxes() {
        let mut req =
            request((1200.0, 800.0), (400.0, 300.0)).with_orientation_mode(OrientationMode::Width);
        req.tool.max_boxes = 2;
        let layer = plan(&req);

        assert_eq!(layer.box_count(), 6);
        assert_eq!(layer.picks.len(), 4);
        assert_eq!(layer.picks[0].box_count, 2);
        assert_relative_eq!(layer.picks[0].width, 800.0);
        assert_relative_eq!(layer.picks[0].center.x, 400.0);
        assert_eq!(layer.picks[1].box_count, 1);
        assert_relative_eq!(layer.picks[1].center.x, 1000.0);
        for pick in &layer.picks {
            let (bw, bd) = layer.box_spec.footprint(pick.rotation);
            assert!(pick.footprint().area() <= bw * bd * pick.box_count as f64 + 1e-6);
        }
    }

    #[test]
    fn overhang_enlarges_usable_footprint() {
        let mut req =
            request((1180.0, 800.0), (400.0, 300.0)).with_orientation_mode(OrientationMode::Width);
        req.overhang_x = Some(10.0);
        let layer = plan(&req);

        assert_eq!(layer.footprint, Rect::new(-10.0, 0.0, 1200.0, 800.0));
        assert_eq!(layer.picks.len(), 6);
        assert_relative_eq!(layer.picks[0].center.x, 190.0);
    }

    #[test]
    fn block_offsets_apply_and_unknown_keys_fail() {
        let mut req = request((1200.0, 800.0), (400.0, 300.0));
        req.tool.pickup_offset = Vec3::new(10.0, 0.0, 5.0);
        req.block_offsets.insert(BlockId(0), Vec3::new(0.0, 0.0, 2.0));
        let layer = plan(&req);
        // tool offset is rotated with the 90° picks
        assert_eq!(layer.picks[0].pickup_offset, Vec3::new(0.0, 10.0, 7.0));

        req.block_offsets.insert(BlockId(42), Vec3::zero());
        let err = RecursiveFiveBlockPlanner::default()
            .plan_layer(&req)
            .unwrap_err();
        assert!(matches!(err, PlanError::UnknownBlock { .. }));
    }

    #[test]
    fn invalid_dimensions_are_rejected() {
        let mut req = request((1200.0, 800.0), (400.0, 300.0));
        req.box_spec.width = 0.0;
        let err = RecursiveFiveBlockPlanner::default()
            .plan_layer(&req)
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidDimension { .. }));
    }

    #[test]
    fn tiling_is_complete_for_mixed_inputs() {
        let cases = [
            ((1200.0, 800.0), (400.0, 300.0)),
            ((1200.0, 1000.0), (370.0, 260.0)),
            ((1000.0, 700.0), (400.0, 300.0)),
            ((800.0, 600.0), (333.0, 215.0)),
            ((1140.0, 1140.0), (410.0, 290.0)),
        ];
        for corner in [Corner::SW, Corner::SE, Corner::NW, Corner::NE] {
            for (pallet, dims) in cases {
                let layer = plan(&request(pallet, dims).with_corner(corner));
                let covered: f64 = layer.blocks.iter().map(|b| b.rect.area()).sum();
                assert_relative_eq!(covered, layer.footprint.area(), epsilon = 1e-3);
                assert!(verify_tiling(&layer, 1e-4).is_ok());
                let pick_boxes: u32 = layer.picks.iter().map(|p| p.box_count).sum();
                let block_boxes: u32 = layer.blocks.iter().map(Block::box_count).sum();
                assert_eq!(pick_boxes, block_boxes);
            }
        }
    }

    #[test]
    fn verify_tiling_detects_overlapping_blocks() {
        let mut layer = plan(
            &request((1200.0, 800.0), (400.0, 300.0)).with_orientation_mode(OrientationMode::Width),
        );
        layer.blocks[1].rect = Rect::new(0.0, 500.0, 1200.0, 300.0);
        let err = verify_tiling(&layer, 1e-4).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvariantBreach);
    }

    #[test]
    fn verify_tiling_detects_dangling_residual() {
        let mut layer = plan(
            &request((1200.0, 800.0), (400.0, 300.0)).with_orientation_mode(OrientationMode::Width),
        );
        layer.decompositions[0].north = Some(Slot::Waste(BlockId(0)));
        let err = verify_tiling(&layer, 1e-4).unwrap_err();
        assert!(matches!(err, PlanError::InvariantBreach(_)));

        layer.decompositions[0].north = Some(Slot::Split(9));
        assert!(verify_tiling(&layer, 1e-4).is_err());
    }

    #[test]
    fn tiny_boxes_on_huge_pallet_exceed_box_limit() {
        let err = RecursiveFiveBlockPlanner::default()
            .plan_layer(&request((1e6, 1e6), (0.01, 0.02)))
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidParameter(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn box_limit_is_configurable() {
        let req = request((1200.0, 800.0), (400.0, 300.0));

        let strict = RecursiveFiveBlockPlanner::new(PlannerConfig::builder().max_boxes(7).build());
        assert!(matches!(
            strict.plan_layer(&req),
            Err(PlanError::InvalidParameter(_))
        ));

        let exact = RecursiveFiveBlockPlanner::new(PlannerConfig::builder().max_boxes(8).build());
        assert_eq!(exact.plan_layer(&req).unwrap().box_count(), 8);
    }

    #[test]
    fn fit_count_saturates_instead_of_wrapping() {
        assert_eq!(fit_count(1200.0, 400.0, 1e-4), 3);
        assert_eq!(fit_count(399.0, 400.0, 1e-4), 0);
        assert_eq!(fit_count(1e12, 1e-3, 1e-4), u32::MAX);
    }
}
