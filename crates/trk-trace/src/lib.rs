//! trk-trace
//!
//! Statement -> trace normalization. Pure: no I/O, no storage, no tagging
//! (the batch splitter injects the tracking tag before normalization).

pub mod normalizer;
pub mod uri;

pub use normalizer::{
    normalize, normalize_batch, NormalizeOptions, StatementError, StructuralError,
};
pub use uri::{ends_with_separator, uri_tail};
