//! Domain models for roar.
//!
//! Canonical definitions for the core entities:
//! - `Application`: a resolved sub-application of the app-of-apps chart
//! - `EnvVar`: a werf plugin variable
//! - `RoarError`: the error taxonomy shared by every module

pub mod application;
pub mod error;

// Re-export main types and errors
pub use application::{Application, EnvVar};
pub use error::{IdentityField, Result, RoarError};
