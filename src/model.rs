//! Data models for pallet placement planning.
//!
//! This module defines the catalog values consumed by the planner and the
//! immutable plan structures it produces:
//! - `Pallet`, `Box3D`, `Tool`, `Interleaf`: read-only inputs
//! - `Block`, `Decomposition`, `Pick`: the contents of one layer
//! - `Layer`, `LayerSequence`: planned stacking levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{PlanError, PlanResult};
use crate::geometry::{Orientation, Rect};
use crate::types::validation::{validate_dimension, validate_non_negative, validate_weight};
use crate::types::{Vec3, Weighted};

/// Pallet with deck dimensions and permitted overhang per axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Pallet {
    #[serde(default)]
    pub id: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    #[serde(default)]
    pub max_overhang_x: f64,
    #[serde(default)]
    pub max_overhang_y: f64,
}

impl Pallet {
    /// Creates a validated pallet.
    ///
    /// # Examples
    /// ```
    /// use stack_it_now::model::Pallet;
    ///
    /// assert!(Pallet::new("EUR", 1200.0, 800.0, 144.0, 0.0, 0.0).is_ok());
    /// assert!(Pallet::new("EUR", -1.0, 800.0, 144.0, 0.0, 0.0).is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        width: f64,
        depth: f64,
        height: f64,
        max_overhang_x: f64,
        max_overhang_y: f64,
    ) -> PlanResult<Self> {
        let pallet = Self {
            id: id.into(),
            width,
            depth,
            height,
            max_overhang_x,
            max_overhang_y,
        };
        pallet.validate()?;
        Ok(pallet)
    }

    /// Checks the geometric invariants of a catalog record.
    pub fn validate(&self) -> PlanResult<()> {
        validate_dimension(self.width, "pallet width")?;
        validate_dimension(self.depth, "pallet depth")?;
        validate_non_negative(self.height, "pallet height")?;
        validate_non_negative(self.max_overhang_x, "pallet overhang x")?;
        validate_non_negative(self.max_overhang_y, "pallet overhang y")?;
        Ok(())
    }

    /// Deck rectangle with the origin at the south-west corner.
    pub fn deck(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.depth)
    }

    pub fn area(&self) -> f64 {
        self.width * self.depth
    }

    /// Geometric center of the deck.
    pub fn center_xy(&self) -> (f64, f64) {
        (self.width / 2.0, self.depth / 2.0)
    }
}

/// Face of a box carrying the label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LabelFace {
    #[default]
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
}

impl LabelFace {
    /// Outward normal of the face in box-local coordinates.
    pub fn normal(self) -> Vec3 {
        match self {
            LabelFace::Front => Vec3::new(0.0, 1.0, 0.0),
            LabelFace::Back => Vec3::new(0.0, -1.0, 0.0),
            LabelFace::Right => Vec3::new(1.0, 0.0, 0.0),
            LabelFace::Left => Vec3::new(-1.0, 0.0, 0.0),
            LabelFace::Top => Vec3::new(0.0, 0.0, 1.0),
            LabelFace::Bottom => Vec3::new(0.0, 0.0, -1.0),
        }
    }
}

/// A box type to be stacked.
///
/// # Fields
/// * `width`, `depth`, `height` - Dimensions in mm at orientation 0°
/// * `weight` - Unit weight in kg
/// * `label_face` - Face that carries the shipping label
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Box3D {
    #[serde(default)]
    pub id: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    pub weight: f64,
    #[serde(default)]
    pub label_face: LabelFace,
}

impl Box3D {
    /// Creates a new box type with validation.
    ///
    /// # Examples
    /// ```
    /// use stack_it_now::model::{Box3D, LabelFace};
    ///
    /// let box_ok = Box3D::new("BX", 400.0, 300.0, 150.0, 5.0, LabelFace::Front);
    /// assert!(box_ok.is_ok());
    ///
    /// let box_invalid = Box3D::new("BX", 400.0, 0.0, 150.0, 5.0, LabelFace::Front);
    /// assert!(box_invalid.is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        width: f64,
        depth: f64,
        height: f64,
        weight: f64,
        label_face: LabelFace,
    ) -> PlanResult<Self> {
        let spec = Self {
            id: id.into(),
            width,
            depth,
            height,
            weight,
            label_face,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> PlanResult<()> {
        validate_dimension(self.width, "box width")?;
        validate_dimension(self.depth, "box depth")?;
        validate_dimension(self.height, "box height")?;
        validate_weight(self.weight, "box weight")?;
        Ok(())
    }

    /// Footprint (x extent, y extent) in the given orientation.
    #[inline]
    pub fn footprint(&self, orientation: Orientation) -> (f64, f64) {
        orientation.footprint(self.width, self.depth)
    }

    /// Applies request-level overrides and validates the result.
    pub fn with_overrides(&self, overrides: &BoxOverride) -> PlanResult<Self> {
        let spec = Self {
            id: self.id.clone(),
            width: overrides.width.unwrap_or(self.width),
            depth: overrides.depth.unwrap_or(self.depth),
            height: overrides.height.unwrap_or(self.height),
            weight: overrides.weight.unwrap_or(self.weight),
            label_face: overrides.label_face.unwrap_or(self.label_face),
        };
        spec.validate()?;
        Ok(spec)
    }
}

impl Weighted for Box3D {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Per-request replacement values for a catalog box.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoxOverride {
    pub width: Option<f64>,
    pub depth: Option<f64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub label_face: Option<LabelFace>,
}

/// Gripping tool.
///
/// The tool footprint is centered on the pickup point; `orientation` is
/// relative to the pick it carries. `capacity_pattern` lists the number of
/// boxes taken by consecutive picks and repeats cyclically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tool {
    #[serde(default)]
    pub id: String,
    pub width: f64,
    pub depth: f64,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub pickup_offset: Vec3,
    #[serde(default = "Tool::default_max_boxes")]
    pub max_boxes: u32,
    #[serde(default)]
    pub capacity_pattern: Vec<u32>,
    /// Finger grid of a multi-grip head, if the tool has one.
    #[serde(default)]
    #[schema(nullable = true)]
    pub multi_grip: Option<MultiGrip>,
}

impl Tool {
    fn default_max_boxes() -> u32 {
        1
    }

    /// Creates a single-box tool with no offset.
    pub fn new(id: impl Into<String>, width: f64, depth: f64) -> PlanResult<Self> {
        let tool = Self {
            id: id.into(),
            width,
            depth,
            orientation: Orientation::Deg0,
            pickup_offset: Vec3::zero(),
            max_boxes: 1,
            capacity_pattern: Vec::new(),
            multi_grip: None,
        };
        tool.validate()?;
        Ok(tool)
    }

    pub fn validate(&self) -> PlanResult<()> {
        validate_dimension(self.width, "tool width")?;
        validate_dimension(self.depth, "tool depth")?;
        if !self.pickup_offset.is_finite() {
            return Err(PlanError::invalid_parameter("tool pickup offset must be finite"));
        }
        if self.max_boxes == 0 {
            return Err(PlanError::invalid_parameter("tool max_boxes must be at least 1"));
        }
        if self.capacity_pattern.contains(&0) {
            return Err(PlanError::invalid_parameter(
                "tool capacity pattern entries must be at least 1",
            ));
        }
        if let Some(grip) = &self.multi_grip {
            grip.validate()?;
        }
        Ok(())
    }

    /// Number of boxes the `index`-th pick of a layer may carry.
    pub fn capacity_for(&self, index: usize) -> u32 {
        let raw = if self.capacity_pattern.is_empty() {
            self.max_boxes
        } else {
            self.capacity_pattern[index % self.capacity_pattern.len()]
        };
        raw.clamp(1, self.max_boxes.max(1))
    }

    /// Tool footprint when centered on `center` while carrying a pick in `rotation`.
    pub fn footprint_at(&self, center: (f64, f64), rotation: Orientation) -> Rect {
        let (w, d) = rotation
            .compose(self.orientation)
            .footprint(self.width, self.depth);
        Rect::from_center(center.0, center.1, w, d)
    }
}

/// Rectangular finger grid of a multi-grip tool head.
///
/// Spacing is the center-to-center pitch between neighbouring fingers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MultiGrip {
    pub rows: u32,
    pub columns: u32,
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub finger_width: f64,
    pub finger_depth: f64,
    pub finger_height: f64,
    #[serde(default = "MultiGrip::default_boxes_per_finger")]
    pub boxes_per_finger: u32,
}

impl MultiGrip {
    fn default_boxes_per_finger() -> u32 {
        1
    }

    pub fn validate(&self) -> PlanResult<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(PlanError::invalid_parameter(
                "multi-grip rows and columns must be at least 1",
            ));
        }
        validate_non_negative(self.spacing_x, "multi-grip spacing_x")?;
        validate_non_negative(self.spacing_y, "multi-grip spacing_y")?;
        validate_dimension(self.finger_width, "finger width")?;
        validate_dimension(self.finger_depth, "finger depth")?;
        validate_dimension(self.finger_height, "finger height")?;
        if self.boxes_per_finger == 0 {
            return Err(PlanError::invalid_parameter(
                "multi-grip boxes_per_finger must be at least 1",
            ));
        }
        Ok(())
    }

    /// Width and depth of the rectangle enclosing every finger.
    pub fn envelope(&self) -> (f64, f64) {
        (
            self.finger_width + f64::from(self.columns.saturating_sub(1)) * self.spacing_x,
            self.finger_depth + f64::from(self.rows.saturating_sub(1)) * self.spacing_y,
        )
    }

    /// Fingers laid out row-major, with the envelope centered on `center`.
    pub fn layout(&self, center: Vec3) -> Vec<GripperFinger> {
        let (width, depth) = self.envelope();
        let start_x = center.x - width / 2.0 + self.finger_width / 2.0;
        let start_y = center.y - depth / 2.0 + self.finger_depth / 2.0;

        (0..self.rows)
            .flat_map(|row| (0..self.columns).map(move |column| (row, column)))
            .enumerate()
            .map(|(index, (row, column))| GripperFinger {
                index,
                row,
                column,
                center: Vec3::new(
                    start_x + f64::from(column) * self.spacing_x,
                    start_y + f64::from(row) * self.spacing_y,
                    center.z,
                ),
                width: self.finger_width,
                depth: self.finger_depth,
                height: self.finger_height,
            })
            .collect()
    }
}

/// One finger of a [`MultiGrip`] layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GripperFinger {
    pub index: usize,
    pub row: u32,
    pub column: u32,
    pub center: Vec3,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl GripperFinger {
    pub fn footprint(&self) -> Rect {
        Rect::from_center(self.center.x, self.center.y, self.width, self.depth)
    }
}

/// Separator sheet placed between layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Interleaf {
    #[serde(default)]
    pub id: String,
    pub thickness: f64,
    pub weight: f64,
    #[serde(default)]
    pub material: String,
}

impl Interleaf {
    pub fn validate(&self) -> PlanResult<()> {
        validate_dimension(self.thickness, "interleaf thickness")?;
        validate_weight(self.weight, "interleaf weight")?;
        Ok(())
    }
}

impl Weighted for Interleaf {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Pallet corner from which a layer is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Corner {
    #[default]
    SW,
    SE,
    NW,
    NE,
}

impl Corner {
    /// True for the corners on the east (max X) side.
    #[inline]
    pub fn is_east(self) -> bool {
        matches!(self, Corner::SE | Corner::NE)
    }

    /// True for the corners on the north (max Y) side.
    #[inline]
    pub fn is_north(self) -> bool {
        matches!(self, Corner::NW | Corner::NE)
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Corner::SW => "SW",
            Corner::SE => "SE",
            Corner::NW => "NW",
            Corner::NE => "NE",
        };
        f.write_str(label)
    }
}

/// Orientations the planner may use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrientationMode {
    /// Box width along X only.
    Width,
    /// Box depth along X only.
    Depth,
    #[default]
    Both,
}

impl OrientationMode {
    pub fn allowed(self) -> &'static [Orientation] {
        match self {
            OrientationMode::Width => &[Orientation::Deg0],
            OrientationMode::Depth => &[Orientation::Deg90],
            OrientationMode::Both => &Orientation::ALL,
        }
    }
}

/// Arena index of a block within its layer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

impl FromStr for BlockId {
    type Err = PlanError;

    /// Accepts `B3`, `b3` or `3`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix('B')
            .or_else(|| trimmed.strip_prefix('b'))
            .unwrap_or(trimmed);
        digits
            .parse::<usize>()
            .map(BlockId)
            .map_err(|_| PlanError::invalid_parameter(format!("'{raw}' is not a block id")))
    }
}

/// Index of a pick in its layer's deposit order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct PickId(pub usize);

impl fmt::Display for PickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Slot of a block within one recursion step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BlockRole {
    Filled,
    North,
    South,
    East,
    West,
}

impl BlockRole {
    /// Role after mirroring the layer across the given axes.
    pub fn mirrored(self, flip_x: bool, flip_y: bool) -> Self {
        match self {
            BlockRole::Filled => BlockRole::Filled,
            BlockRole::North if flip_y => BlockRole::South,
            BlockRole::South if flip_y => BlockRole::North,
            BlockRole::East if flip_x => BlockRole::West,
            BlockRole::West if flip_x => BlockRole::East,
            other => other,
        }
    }
}

/// Rectangular sub-region of a layer with one orientation.
///
/// Blocks without an orientation are waste: no admissible box fits them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    pub id: BlockId,
    /// Filled block of the enclosing recursion step.
    pub parent: Option<BlockId>,
    pub role: BlockRole,
    pub depth: usize,
    pub rect: Rect,
    pub orientation: Option<Orientation>,
    pub columns: u32,
    pub rows: u32,
}

impl Block {
    pub fn box_count(&self) -> u32 {
        self.columns * self.rows
    }

    pub fn is_waste(&self) -> bool {
        self.orientation.is_none()
    }
}

/// Content of one residual slot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Terminal waste block.
    Waste(BlockId),
    /// Index of the nested decomposition in `Layer::decompositions`.
    Split(usize),
}

/// One five-way recursion step: the filled block and up to four residuals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Decomposition {
    pub depth: usize,
    pub region: Rect,
    pub filled: BlockId,
    pub north: Option<Slot>,
    pub south: Option<Slot>,
    pub east: Option<Slot>,
    pub west: Option<Slot>,
}

impl Decomposition {
    /// Residual slots in N, S, E, W order.
    pub fn residuals(&self) -> [(BlockRole, Option<Slot>); 4] {
        [
            (BlockRole::North, self.north),
            (BlockRole::South, self.south),
            (BlockRole::East, self.east),
            (BlockRole::West, self.west),
        ]
    }

    /// Mirrors the step, swapping the affected residual slots.
    pub fn mirrored(&self, flip_x: bool, flip_y: bool, axis_x: f64, axis_y: f64) -> Self {
        let mut region = self.region;
        if flip_x {
            region = region.mirrored_x(axis_x);
        }
        if flip_y {
            region = region.mirrored_y(axis_y);
        }
        let (north, south) = if flip_y {
            (self.south, self.north)
        } else {
            (self.north, self.south)
        };
        let (east, west) = if flip_x {
            (self.west, self.east)
        } else {
            (self.east, self.west)
        };
        Self {
            depth: self.depth,
            region,
            filled: self.filled,
            north,
            south,
            east,
            west,
        }
    }
}

/// One gripper placement.
///
/// `center` is layer-local: Z is measured from the layer base to the
/// mid-height of the boxes. Boxes of a multi-box pick are lined up along X.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Pick {
    pub id: PickId,
    pub block: BlockId,
    pub center: Vec3,
    pub rotation: Orientation,
    pub box_count: u32,
    /// Footprint extent along X.
    pub width: f64,
    /// Footprint extent along Y.
    pub depth: f64,
    #[serde(default)]
    pub pickup_offset: Vec3,
}

impl Pick {
    pub fn footprint(&self) -> Rect {
        Rect::from_center(self.center.x, self.center.y, self.width, self.depth)
    }

    /// Point where the tool holds the pick.
    pub fn tool_position(&self) -> Vec3 {
        self.center + self.pickup_offset
    }

    /// Copy of the pick moved to a new center; used for drag validation.
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Self {
            center: Vec3::new(x, y, self.center.z),
            ..self.clone()
        }
    }
}

/// Outcome of planning a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LayerStatus {
    Filled,
    /// No admissible orientation fits the footprint; the layer has no picks.
    Unfillable,
}

/// Interleaf sheet lying directly below a level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InterleafPlacement {
    pub below_level: usize,
    /// Absolute elevation of the sheet's underside.
    pub z: f64,
    pub interleaf: Interleaf,
}

/// Complete set of picks covering one stacking level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Layer {
    pub elevation_index: usize,
    /// Absolute elevation of the layer base above the pallet deck.
    pub base_z: f64,
    pub corner: Corner,
    pub status: LayerStatus,
    pub pallet: Pallet,
    #[serde(rename = "box")]
    pub box_spec: Box3D,
    /// Usable footprint: the deck enlarged by the overhang allowance.
    pub footprint: Rect,
    pub overhang_x: f64,
    pub overhang_y: f64,
    pub fill_ratio: f64,
    pub blocks: Vec<Block>,
    pub decompositions: Vec<Decomposition>,
    pub picks: Vec<Pick>,
    #[serde(default)]
    pub interleaf_below: Option<InterleafPlacement>,
}

impl Layer {
    pub fn box_count(&self) -> u32 {
        self.picks.iter().map(|p| p.box_count).sum()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn has_block(&self, id: BlockId) -> bool {
        self.block(id).is_some()
    }

    /// Pick center in absolute stack coordinates.
    pub fn world_center(&self, pick: &Pick) -> Vec3 {
        pick.center + Vec3::new(0.0, 0.0, self.base_z)
    }

    /// Absolute elevation of the top of the boxes.
    pub fn top_z(&self) -> f64 {
        self.base_z + self.box_spec.height
    }
}

/// Ordered stack of layers with the interleaves between them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LayerSequence {
    pub layers: Vec<Layer>,
    pub interleaves: Vec<InterleafPlacement>,
    pub corners: Vec<Corner>,
    pub z_step: f64,
    pub interleaf_frequency: Option<usize>,
}

impl LayerSequence {
    pub fn levels(&self) -> usize {
        self.layers.len()
    }

    pub fn total_boxes(&self) -> u32 {
        self.layers.iter().map(Layer::box_count).sum()
    }

    /// Elevation of the top of the highest layer.
    pub fn stack_height(&self) -> f64 {
        self.layers.iter().map(Layer::top_z).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_parses_common_spellings() {
        assert_eq!("B3".parse::<BlockId>().unwrap(), BlockId(3));
        assert_eq!("b12".parse::<BlockId>().unwrap(), BlockId(12));
        assert_eq!(" 7 ".parse::<BlockId>().unwrap(), BlockId(7));
        assert!("north".parse::<BlockId>().is_err());
        assert_eq!(BlockId(4).to_string(), "B4");
    }

    #[test]
    fn tool_capacity_cycles_and_clamps() {
        let mut tool = Tool::new("T", 100.0, 100.0).unwrap();
        tool.max_boxes = 3;
        assert_eq!(tool.capacity_for(0), 3);

        tool.capacity_pattern = vec![2, 1, 5];
        assert_eq!(tool.capacity_for(0), 2);
        assert_eq!(tool.capacity_for(1), 1);
        assert_eq!(tool.capacity_for(2), 3);
        assert_eq!(tool.capacity_for(3), 2);
    }

    #[test]
    fn tool_rejects_zero_capacity() {
        let mut tool = Tool::new("T", 100.0, 100.0).unwrap();
        tool.max_boxes = 0;
        assert!(tool.validate().is_err());
    }

    fn grip(rows: u32, columns: u32, spacing: (f64, f64)) -> MultiGrip {
        MultiGrip {
            rows,
            columns,
            spacing_x: spacing.0,
            spacing_y: spacing.1,
            finger_width: 40.0,
            finger_depth: 30.0,
            finger_height: 120.0,
            boxes_per_finger: 2,
        }
    }

    #[test]
    fn multi_grip_layout_is_centered_and_row_major() {
        let grip = grip(2, 3, (50.0, 40.0));
        assert_eq!(grip.envelope(), (140.0, 70.0));

        let fingers = grip.layout(Vec3::new(100.0, 200.0, 10.0));
        assert_eq!(fingers.len(), 6);
        assert_eq!((fingers[0].row, fingers[0].column), (0, 0));
        assert_eq!((fingers[1].row, fingers[1].column), (0, 1));
        assert_eq!((fingers[3].row, fingers[3].column), (1, 0));
        assert_eq!(fingers[0].center, Vec3::new(50.0, 180.0, 10.0));
        assert_eq!(fingers[5].center, Vec3::new(150.0, 220.0, 10.0));

        let first = fingers[0].footprint();
        let last = fingers[5].footprint();
        assert_eq!((first.min_x(), first.min_y()), (30.0, 165.0));
        assert_eq!((last.max_x(), last.max_y()), (170.0, 235.0));
    }

    #[test]
    fn multi_grip_is_validated_with_the_tool() {
        let mut tool = Tool::new("T", 200.0, 100.0).unwrap();
        tool.multi_grip = Some(grip(1, 2, (60.0, 0.0)));
        assert!(tool.validate().is_ok());

        tool.multi_grip = Some(grip(0, 2, (60.0, 0.0)));
        assert!(tool.validate().is_err());
        tool.multi_grip = Some(grip(1, 2, (-1.0, 0.0)));
        assert!(tool.validate().is_err());
        tool.multi_grip = Some(MultiGrip {
            boxes_per_finger: 0,
            ..grip(1, 2, (60.0, 0.0))
        });
        assert!(tool.validate().is_err());
    }

    #[test]
    fn multi_grip_deserializes_with_default_boxes_per_finger() {
        let tool: Tool = serde_json::from_str(
            r#"{"width": 200, "depth": 100, "multi_grip": {
                "rows": 1, "columns": 2, "spacing_x": 60, "spacing_y": 0,
                "finger_width": 40, "finger_depth": 30, "finger_height": 120}}"#,
        )
        .unwrap();
        let grip = tool.multi_grip.unwrap();
        assert_eq!(grip.boxes_per_finger, 1);
        assert_eq!(grip.envelope(), (100.0, 30.0));

        let plain: Tool = serde_json::from_str(r#"{"width": 200, "depth": 100}"#).unwrap();
        assert!(plain.multi_grip.is_none());
    }

    #[test]
    fn tool_footprint_follows_pick_rotation() {
        let tool = Tool::new("T", 200.0, 100.0).unwrap();
        let fp = tool.footprint_at((0.0, 0.0), Orientation::Deg90);
        assert_eq!((fp.width, fp.depth), (100.0, 200.0));
    }

    #[test]
    fn box_overrides_are_validated() {
        let spec = Box3D::new("BX", 400.0, 300.0, 150.0, 5.0, LabelFace::Front).unwrap();
        let changed = spec
            .with_overrides(&BoxOverride {
                weight: Some(7.5),
                ..BoxOverride::default()
            })
            .unwrap();
        assert_eq!(changed.weight, 7.5);
        assert_eq!(changed.width, 400.0);

        let invalid = spec.with_overrides(&BoxOverride {
            height: Some(-1.0),
            ..BoxOverride::default()
        });
        assert!(invalid.is_err());
    }

    #[test]
    fn corner_sides_and_names() {
        assert!(Corner::SE.is_east() && !Corner::SE.is_north());
        assert!(Corner::NW.is_north() && !Corner::NW.is_east());
        assert!(!Corner::SW.is_east() && !Corner::SW.is_north());
        assert_eq!(Corner::NE.to_string(), "NE");
    }

    #[test]
    fn roles_swap_when_mirrored() {
        assert_eq!(BlockRole::North.mirrored(false, true), BlockRole::South);
        assert_eq!(BlockRole::North.mirrored(true, false), BlockRole::North);
        assert_eq!(BlockRole::West.mirrored(true, true), BlockRole::East);
        assert_eq!(BlockRole::Filled.mirrored(true, true), BlockRole::Filled);
    }

    #[test]
    fn orientation_mode_limits_orientations() {
        assert_eq!(OrientationMode::Width.allowed(), &[Orientation::Deg0]);
        assert_eq!(OrientationMode::Depth.allowed(), &[Orientation::Deg90]);
        assert_eq!(OrientationMode::Both.allowed().len(), 2);
    }
}
