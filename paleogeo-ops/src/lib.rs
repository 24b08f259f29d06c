//! Operation engine for paleogeography editing.
//!
//! The crate wires four pieces together:
//!
//! - [`plan`]: operations expressed as weighted step sequences,
//! - [`controller`]: a lifecycle controller that runs one plan at a time
//!   on a background thread with cooperative cancellation,
//! - [`geoprocess`]: the vector/raster toolbox contract plus a planar
//!   in-memory implementation,
//! - [`ops`]: the editing operations themselves, as plan builders.
//!
//! Hosts plug in through the seams in [`env`]: layer access, artifact
//! writing, and output-path validation are all traits.

pub mod controller;
pub mod env;
pub mod error;
pub mod geoprocess;
pub mod ops;
pub mod plan;

pub use controller::{
    Controller, DiscardArtifacts, EngineConfig, PlanSource, ResultConsumer, StartOutcome,
    ABORT_LINE_1, ABORT_LINE_2,
};
pub use env::{ArtifactKind, ArtifactWriter, LayerProvider, OpEnv, OutputPathValidator};
pub use error::{OpsError, Result};
pub use geoprocess::{GeoProcessing, MaskLayer, Polygon};
pub use plan::{OperationKind, OperationPlan, ProcessingStep, StepCtx};
