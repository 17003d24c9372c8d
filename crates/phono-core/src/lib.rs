//! Core domain model for phono.
//!
//! This crate defines the raw record and catalog entity types
//! (artist, album, track), the provider result shapes, and the
//! naming rules used for grouping and identifier generation.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod naming;

pub use error::{Error, Result};
