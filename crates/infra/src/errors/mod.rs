//! Error mapping from infrastructure crates into the pipeline taxonomy.

mod conversions;

pub use conversions::{from_io, from_reqwest};
