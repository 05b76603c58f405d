//! Common utilities shared by the filter components.
//!
//! Linear algebra helpers (log-domain arithmetic, PSD conditioning) and a
//! deterministic random source.

pub mod linalg;
pub mod rng;
