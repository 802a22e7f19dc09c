#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// `GeoJSON` geometry and feature conversion.
pub mod geometry;

pub mod catalog;

/// OGC API Features client.
pub mod remote;

pub mod sync;

pub mod upload;

pub mod styles;

mod error;
pub use error::{GeosyncCoreError, GeosyncCoreResult};
