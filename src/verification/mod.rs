//! Live step verification
//!
//! A learner's client sends short bursts of camera frames while working on a
//! step. [`VerificationClassifier`] debounces those bursts per lesson through a
//! [`RateGate`] and classifies the rest as in progress, complete, or a mistake.

pub mod classifier;
pub mod gate;
pub mod outcome;

pub use classifier::{VerificationClassifier, VerificationRequest};
pub use gate::{RateGate, DEFAULT_MIN_INTERVAL};
pub use outcome::{clamp_confidence, VerificationOutcome, VerificationStatus};
