//! Shared test utilities for barramento integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a `Processor` to an in-memory store, a temp
//!   package root and in-process fakes of both HTTP collaborators
//! - Builders for items and preservation configuration

pub mod builders;
pub mod fakes;
pub mod harness;

// Each test binary uses a different subset.
#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use harness::TestHarness;
