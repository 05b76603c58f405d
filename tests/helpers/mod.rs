//! Shared fixtures and tolerance assertions for integration tests

#![allow(dead_code)]

pub mod assertions;
pub mod scene;
