//! Corrective overlays
//!
//! When live verification reports a mistake, the [`OverlayGenerator`] asks the
//! model for a diagram-style correction and always hands back something the
//! client can render.

pub mod generator;
pub mod instruction;

pub use generator::{OverlayGenerator, OverlayResult};
pub use instruction::{
    ArrowElement, CircleElement, LabelElement, OverlayElement, OverlayInstruction, Point,
    RectangleElement,
};
