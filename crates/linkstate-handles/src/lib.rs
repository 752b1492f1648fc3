//! Linkstate Handles - Filter-set aggregation and consumer-facing handles
//!
//! This crate implements the linking layer on top of `linkstate-core`:
//! - Sorted-list diffing (the primitive every filter update depends on)
//! - `FilterSet`, the incremental multi-writer intersection aggregator
//! - `FilterHandle` and `SelectionHandle`, the contracts input and output
//!   adapters are expected to use

pub mod id;
pub mod diff;
pub mod filterset;
pub mod filter;
pub mod selection;

pub use id::*;
pub use diff::*;
pub use filterset::*;
pub use filter::*;
pub use selection::*;
