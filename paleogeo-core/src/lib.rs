//! paleogeo-core: Core types for paleogeography raster editing.
//!
//! This crate provides the foundational abstractions shared by every
//! editing operation: the elevation grid, the feedback/progress channel,
//! cooperative cancellation, run outcomes, and the parameter model.
//!

pub mod cancel;
pub mod error;
pub mod feedback;
pub mod formula;
pub mod grid;
pub mod params;
pub mod run;

pub use cancel::CancelToken;
pub use error::{Error, ParameterError, Result};
pub use feedback::{FeedbackChannel, FeedbackMessage, FeedbackSink, Severity};
pub use formula::Formula;
pub use grid::{GeoTransform, Grid};
pub use params::{
    AcceptAllLayers, LayerResolver, ParamDef, ParamForm, ParamGroup, ParamKind, ParamValue,
    ParameterSnapshot,
};
pub use run::{RunResult, RunState};
