//! Persistent inverted similarity index for ISCC codes, components and
//! granular features.
//!
//! Four layers, bottom-up: [`bitcodec`] (ISCC text codec, component
//! decomposition, Hamming distance), [`keycodec`] (user key ⇄ storage byte
//! encoding), [`store`] (a thin wrapper over an embedded, memory-mapped,
//! ordered KV engine), and [`index`], the public [`Index`] type.

pub mod bitcodec;
pub mod envelope;
pub mod error;
pub mod index;
pub mod keycodec;
pub mod store;
pub mod types;

pub use bitcodec::{BitCodec, Comparison, Component, MainType};
pub use error::IndexError;
pub use index::{ComponentScanner, Index, LinearComponentScanner};
pub use keycodec::{Key, KeyCodec};
pub use types::{FeatureGroup, FeatureMatch, IndexOptions, IsccMatch, IsccObj, Metadata, MetadataValue, Position, QueryResult, Stats};
