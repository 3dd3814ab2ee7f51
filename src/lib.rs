//! Pallet placement engine: recursive five-block layer planning, stacking,
//! collision checks, snap points, coordinate frames, approach annotations
//! and load metrics.

pub mod annotate;
pub mod api;
pub mod collision;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod planner;
pub mod sequence;
pub mod snap;
pub mod types;

pub use error::{ErrorKind, PlanError, PlanResult};
