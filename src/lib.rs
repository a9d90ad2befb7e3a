//! Cached inventory tree and date-range availability for rental equipment.
//!
//! Items are grouped category → subcategory → sub-subcategory. The tree is
//! built from a [`source::RecordSource`] and held in a [`cache::TtlCache`];
//! availability is always computed fresh against the source.

pub mod cache;
pub mod config;
pub mod engine;
pub mod model;
pub mod observability;
pub mod source;

pub use engine::{EngineError, Inventory};
