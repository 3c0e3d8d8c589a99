use crate::ai::backend::{BackendConfig, BackendError, ModelBackend};
use crate::ai::cloud::CloudBackend;
use crate::ai::local::LocalBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Builds the backend variant described by `config`
///
/// The cloud variant fails immediately when its credential is missing, so a
/// misconfigured deployment is caught at startup rather than on the first call.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn ModelBackend>, BackendError> {
    let timeout = Duration::from_secs(config.timeout_seconds());

    match config {
        BackendConfig::Cloud {
            api_key,
            model,
            api_endpoint,
            max_tokens,
            ..
        } => {
            let mut backend =
                CloudBackend::with_timeout(api_key.clone(), model.clone(), api_endpoint.clone(), timeout)
                    .map_err(|e| {
                        warn!("Cloud backend unavailable: {}", e);
                        e
                    })?;
            if let Some(max_tokens) = max_tokens {
                backend = backend.with_max_tokens(*max_tokens);
            }
            info!("Using cloud backend ({}, timeout {:?})", model, timeout);
            Ok(Arc::new(backend))
        }
        BackendConfig::Local {
            model,
            endpoint,
            max_tokens,
            ..
        } => {
            let mut backend = LocalBackend::with_timeout(endpoint.clone(), model.clone(), timeout)?;
            if let Some(max_tokens) = max_tokens {
                backend = backend.with_max_tokens(*max_tokens);
            }
            info!(
                "Using local backend ({} @ {}, timeout {:?})",
                model, endpoint, timeout
            );
            Ok(Arc::new(backend))
        }
    }
}
