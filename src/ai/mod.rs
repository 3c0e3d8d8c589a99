//! Vision model backends
//!
//! - [`backend`]: the [`ModelBackend`] trait, configuration and error types
//! - [`cloud`]: hosted OpenAI-compatible backend
//! - [`local`]: Ollama backend
//! - [`mock`]: scripted backend for tests
//! - [`factory`]: config-driven backend selection

pub mod backend;
pub mod cloud;
pub mod factory;
pub mod local;
pub mod mock;
pub mod types;

pub use backend::{BackendConfig, BackendError, ModelBackend};
pub use cloud::CloudBackend;
pub use factory::create_backend;
pub use local::LocalBackend;
pub use mock::{MockBackend, MockResponse};
pub use types::VisionRequest;
