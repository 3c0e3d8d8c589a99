//! Procedures extracted from demonstration videos
//!
//! - [`types`]: the [`Procedure`] and [`Step`] data model
//! - [`timestamps`]: fitting model-reported windows to the real video
//! - [`pipeline`]: video in, annotated procedure out

pub mod pipeline;
pub mod timestamps;
pub mod types;

pub use pipeline::{ExtractionReport, PipelineError, StepExtractionPipeline};
pub use timestamps::{ReconcileSummary, TimestampReconciler, MIN_WINDOW_SECS};
pub use types::{MistakePattern, MotionType, Procedure, Step};
