//! Resource error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::handle::ResourceKind;
use crate::pool::PoolCategory;

/// Errors that can occur while creating, tracking or tearing down GPU resources.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The pool budget cannot fit the request, even after eviction.
    #[error(
        "{category} budget exhausted: requested {requested} bytes, {usage} of {maximum} bytes in use"
    )]
    AllocationRejected {
        category: PoolCategory,
        requested: u64,
        usage: u64,
        maximum: u64,
    },

    /// The native layer returned a null handle.
    #[error("native {kind} creation failed: {reason}")]
    NativeCreationFailed { kind: ResourceKind, reason: String },

    /// A native operation on a live resource failed.
    #[error("native {operation} on {kind} failed")]
    NativeOperationFailed {
        kind: ResourceKind,
        operation: &'static str,
    },

    /// The resource has already been released.
    #[error("{0} has been disposed")]
    Disposed(ResourceKind),

    /// A context or registry was torn down from a thread that did not create it.
    #[error("{operation} is not permitted on thread [{current}], owner is [{owner}]")]
    CrossThreadTeardown {
        operation: &'static str,
        owner: String,
        current: String,
    },

    /// The context has already been torn down.
    #[error("context has been disposed")]
    ContextDisposed,

    /// No usable device exists for the adapter ordinal.
    #[error("adapter {0} is not available")]
    AdapterUnavailable(usize),

    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The background disposer thread could not be started.
    #[error("failed to start disposer thread: {0}")]
    DisposerSpawn(#[source] std::io::Error),

    /// The settings file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file could not be parsed.
    #[error("failed to parse {}: {message}", path.display())]
    SettingsParse { path: PathBuf, message: String },
}

impl ResourceError {
    /// Returns true for failures the caller should treat as "retry later or degrade".
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AllocationRejected { .. } | Self::NativeCreationFailed { .. }
        )
    }

    pub(crate) fn native(kind: ResourceKind, reason: impl Into<String>) -> Self {
        Self::NativeCreationFailed {
            kind,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type ResourceResult<T> = Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResourceError::AllocationRejected {
            category: PoolCategory::Textures,
            requested: 10,
            usage: 95,
            maximum: 100,
        };
        assert_eq!(
            err.to_string(),
            "texture budget exhausted: requested 10 bytes, 95 of 100 bytes in use"
        );

        let err = ResourceError::native(ResourceKind::Shader, "null handle");
        assert_eq!(err.to_string(), "native shader creation failed: null handle");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ResourceError::native(ResourceKind::Mesh, "device lost").is_transient());
        assert!(!ResourceError::ContextDisposed.is_transient());
        assert!(
            !ResourceError::CrossThreadTeardown {
                operation: "Context::dispose",
                owner: "main".into(),
                current: "worker".into(),
            }
            .is_transient()
        );
    }
}
