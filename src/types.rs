//! Common types for 3D placement geometry.
//!
//! This module defines the reusable vector and bounding box types shared by
//! the planner, the checker and the metrics engine.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Represents a 3D vector or point in space.
///
/// Used for positions, offsets and approach vectors. X runs along the pallet
/// width, Y along the pallet depth and Z upwards from the pallet deck.
///
/// # Examples
/// ```
/// use stack_it_now::types::Vec3;
///
/// let position = Vec3::new(1.0, 2.0, 3.0);
/// let offset = Vec3::new(10.0, 20.0, 30.0);
/// let target = position + offset * 0.5;
/// assert_eq!(target, Vec3::new(6.0, 12.0, 18.0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Creates from tuple format.
    #[inline]
    pub const fn from_tuple(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }

    /// Calculates the Euclidean distance to another point.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Calculates the 2D distance (XY plane only).
    #[inline]
    pub fn distance_2d(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Length of the vector.
    #[inline]
    pub fn length(&self) -> f64 {
        self.distance_to(&Self::zero())
    }

    /// Component-wise comparison with a tolerance.
    #[inline]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    /// Checks that all components are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::from_tuple(tuple)
    }
}

impl From<Vec3> for (f64, f64, f64) {
    #[inline]
    fn from(vec: Vec3) -> Self {
        vec.as_tuple()
    }
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the weight in kg.
    fn weight(&self) -> f64;
}

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// Used by the metrics engine to report the extents of a layer or stack.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from position and dimensions.
    #[inline]
    pub fn from_position_and_dims(position: Vec3, dims: Vec3) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Moves the box along Z.
    #[inline]
    pub fn lifted(&self, dz: f64) -> Self {
        let offset = Vec3::new(0.0, 0.0, dz);
        Self::new(self.min + offset, self.max + offset)
    }

    /// Checks if a point is inside the bounding box.
    #[inline]
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Returns the center point.
    #[inline]
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }

    /// Returns the dimensions (width, depth, height).
    #[inline]
    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Validation helpers shared by the data model and the request layer.
pub mod validation {
    use crate::error::{PlanError, PlanResult};

    /// Validates a strictly positive, finite dimension.
    pub fn validate_dimension(value: f64, field: &'static str) -> PlanResult<()> {
        if value <= 0.0 || !value.is_finite() {
            return Err(PlanError::InvalidDimension { field, value });
        }
        Ok(())
    }

    /// Validates a non-negative, finite quantity (overhang, thickness offsets).
    pub fn validate_non_negative(value: f64, field: &'static str) -> PlanResult<()> {
        if value < 0.0 || !value.is_finite() {
            return Err(PlanError::InvalidDimension { field, value });
        }
        Ok(())
    }

    /// Validates a weight. Zero is allowed for massless separators.
    pub fn validate_weight(value: f64, field: &'static str) -> PlanResult<()> {
        validate_non_negative(value, field)
    }
}

/// Center of mass calculation helper.
///
/// Accumulates weighted positions for the center of gravity of a layer or stack.
#[derive(Clone, Debug, Default)]
pub struct CenterOfMassCalculator {
    weighted: Vec3,
    total_weight: f64,
}

impl CenterOfMassCalculator {
    /// Creates a new calculator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a weighted point.
    pub fn add_point(&mut self, point: Vec3, weight: f64) {
        self.weighted = self.weighted + point * weight;
        self.total_weight += weight;
    }

    /// Total weight accumulated so far.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Calculates the center of mass.
    ///
    /// # Returns
    /// `Some(point)` for a valid center of mass, `None` if no weight is present
    pub fn compute(&self) -> Option<Vec3> {
        if self.total_weight <= 0.0 {
            None
        } else {
            Some(self.weighted * (1.0 / self.total_weight))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
    }

    #[test]
    fn test_vec3_distances() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 12.0);
        assert_relative_eq!(a.distance_2d(&b), 5.0);
        assert_relative_eq!(a.distance_to(&b), 13.0);
        assert_relative_eq!(b.length(), 13.0);
    }

    #[test]
    fn test_vec3_deserializes_without_z() {
        let v: Vec3 = serde_json::from_str(r#"{"x": 1.0, "y": 2.0}"#).unwrap();
        assert_eq!(v, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_bounding_box_union_and_lift() {
        let a = BoundingBox::from_position_and_dims(Vec3::zero(), Vec3::new(10.0, 10.0, 10.0));
        let b = BoundingBox::from_position_and_dims(
            Vec3::new(5.0, -5.0, 0.0),
            Vec3::new(10.0, 10.0, 20.0),
        );
        let merged = a.union(&b);
        assert_eq!(merged.min, Vec3::new(0.0, -5.0, 0.0));
        assert_eq!(merged.max, Vec3::new(15.0, 10.0, 20.0));

        let lifted = a.lifted(5.0);
        assert_eq!(lifted.min.z, 5.0);
        assert_eq!(lifted.max.z, 15.0);
        assert!(lifted.contains_point(&Vec3::new(5.0, 5.0, 14.0)));
        assert_eq!(lifted.center(), Vec3::new(5.0, 5.0, 10.0));
    }

    #[test]
    fn test_center_of_mass_calculator() {
        let mut calc = CenterOfMassCalculator::new();
        assert!(calc.compute().is_none());

        calc.add_point(Vec3::new(0.0, 0.0, 0.0), 10.0);
        calc.add_point(Vec3::new(10.0, 0.0, 4.0), 10.0);

        let center = calc.compute().unwrap();
        assert_relative_eq!(center.x, 5.0);
        assert_relative_eq!(center.y, 0.0);
        assert_relative_eq!(center.z, 2.0);
        assert_relative_eq!(calc.total_weight(), 20.0);
    }

    #[test]
    fn test_validation_dimension() {
        assert!(validation::validate_dimension(10.0, "width").is_ok());
        assert!(validation::validate_dimension(0.0, "width").is_err());
        assert!(validation::validate_dimension(-1.0, "width").is_err());
        assert!(validation::validate_dimension(f64::NAN, "width").is_err());
        assert!(validation::validate_dimension(f64::INFINITY, "width").is_err());
    }

    #[test]
    fn test_validation_weight() {
        assert!(validation::validate_weight(10.0, "weight").is_ok());
        assert!(validation::validate_weight(0.0, "weight").is_ok());
        assert!(validation::validate_weight(-1.0, "weight").is_err());
    }
}
