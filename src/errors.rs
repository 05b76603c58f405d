//! Error types for tracker construction and per-frame filtering
//!
//! Construction errors (parameters, resources, backend) are fatal to building a
//! tracker. Per-frame errors abort only the failing predict/update call and leave
//! the belief untouched, except [`TrackerError::DegenerateCovariance`], which
//! faults the filter instance.

use std::fmt;

/// Errors raised by the builder, the filter and its components
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// A parameter is outside its admissible range
    InvalidParameter {
        /// Dotted parameter path, e.g. `observation.tail_weight`
        field: String,
        /// What is wrong with the value
        reason: String,
    },

    /// The object resource identifier does not resolve to a loadable mesh
    ResourceNotFound {
        /// Resolved path or registry key that was looked up
        resource: String,
    },

    /// The resource exists but could not be parsed into an object model
    MalformedResource {
        /// Offending file
        path: String,
        /// Parser message
        reason: String,
    },

    /// The requested rendering backend is not available in this build or on this host
    UnsupportedBackend {
        /// Backend name
        backend: String,
        /// Why it is unavailable
        reason: String,
    },

    /// Prediction time step is not strictly positive and finite
    InvalidTimestep {
        /// The offending time step in seconds
        dt: f64,
    },

    /// Dimension mismatch between expected and actual
    DimensionMismatch {
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
        /// Context (e.g. "observation streams", "depth image rows")
        context: String,
    },

    /// Covariance is not symmetric positive semi-definite
    DegenerateCovariance {
        /// Where the covariance was checked
        context: String,
    },

    /// Predict/update called before an initial belief was supplied
    NotInitialized,

    /// The filter hit a degenerate covariance earlier and must be reinitialized
    Faulted,

    /// The rendering backend failed to produce an image
    Render {
        /// Backend message
        reason: String,
    },
}

impl TrackerError {
    /// Shorthand for [`TrackerError::InvalidParameter`]
    pub fn invalid_parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TrackerError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TrackerError::DimensionMismatch`]
    pub fn dimension_mismatch(expected: usize, actual: usize, context: impl Into<String>) -> Self {
        TrackerError::DimensionMismatch {
            expected,
            actual,
            context: context.into(),
        }
    }

    /// Name of the offending parameter, if this is a parameter error
    pub fn parameter_field(&self) -> Option<&str> {
        match self {
            TrackerError::InvalidParameter { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether the error invalidates the filter instance
    pub fn is_fatal_to_filter(&self) -> bool {
        matches!(
            self,
            TrackerError::DegenerateCovariance { .. } | TrackerError::Faulted
        )
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::InvalidParameter { field, reason } => {
                write!(f, "Invalid parameter `{}`: {}", field, reason)
            }
            TrackerError::ResourceNotFound { resource } => {
                write!(f, "Object resource not found: {}", resource)
            }
            TrackerError::MalformedResource { path, reason } => {
                write!(f, "Malformed object resource {}: {}", path, reason)
            }
            TrackerError::UnsupportedBackend { backend, reason } => {
                write!(f, "Unsupported backend `{}`: {}", backend, reason)
            }
            TrackerError::InvalidTimestep { dt } => {
                write!(f, "Invalid time step: {} (must be > 0)", dt)
            }
            TrackerError::DimensionMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            TrackerError::DegenerateCovariance { context } => {
                write!(f, "Covariance is not positive semi-definite: {}", context)
            }
            TrackerError::NotInitialized => write!(f, "Filter has no initial belief"),
            TrackerError::Faulted => {
                write!(f, "Filter is faulted and must be reinitialized")
            }
            TrackerError::Render { reason } => write!(f, "Rendering failed: {}", reason),
        }
    }
}

impl std::error::Error for TrackerError {}
