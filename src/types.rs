//! Public request/response types.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::keycodec::Key;

/// A single granular feature group attached to an ISCC on `add` or `query`:
/// a `kind` (`"text"`, `"image"`, `"audio"`, `"video"`), parallel arrays of
/// feature hashes and the content-length each hash covers (used to derive
/// cumulative positions), and optional explicit positions overriding the
/// cumulative-sum derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub kind: String,
    pub features: Vec<Vec<u8>>,
    pub sizes: Vec<Position>,
    pub positions: Option<Vec<Position>>,
}

/// A feature's position within a content stream; the original may supply
/// either an integer offset (frame/char count) or a fractional one (e.g.
/// seconds into a video).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Int(i64),
    Float(f64),
}

/// Opaque structured metadata payload: a mapping from string to scalar or
/// list of scalars, preserved faithfully through the envelope.
pub type Metadata = std::collections::BTreeMap<String, MetadataValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<MetadataValue>),
}

/// The different shapes a caller may hand to [`Index::add`](crate::index::Index::add)
/// or [`Index::query`](crate::index::Index::query). A strongly typed stand-in
/// for the original's dynamically-typed `str | dict | Code` input.
#[derive(Debug, Clone)]
pub enum IsccObj {
    /// Base32 ISCC text, optionally prefixed with `ISCC:`.
    Text(String),
    /// Already-decomposed component codes.
    Components(Vec<crate::bitcodec::Component>),
    /// Raw canonical ISCC bytes.
    Bytes(Vec<u8>),
    /// A structured object carrying the ISCC text plus optional granular
    /// features and metadata.
    Rich { iscc: String, features: Option<Vec<FeatureGroup>>, metadata: Option<Metadata> },
}

impl From<&str> for IsccObj {
    fn from(s: &str) -> Self { IsccObj::Text(s.to_string()) }
}

impl From<String> for IsccObj {
    fn from(s: String) -> Self { IsccObj::Text(s) }
}

/// Options recognized by [`Index::open`](crate::index::Index::open).
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Directory containing sub-directories named by index name.
    pub index_root: PathBuf,
    /// Skip writes and scans of `components` when `false`.
    pub index_components: bool,
    /// Populate per-kind feature sub-stores when `true`.
    pub index_features: bool,
    /// Store metadata envelopes when `true`.
    pub index_metadata: bool,
    /// Initial LMDB map size, doubled on `MapFull`.
    pub initial_map_size: usize,
    /// Maximum concurrent reader slots.
    pub max_readers: u32,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            index_root: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".iscc-index"),
            index_components: true,
            index_features: false,
            index_metadata: false,
            initial_map_size: 1 << 20,
            max_readers: 126,
        }
    }
}

/// One nearest-neighbour match against a query's canonical ISCC.
#[derive(Debug, Clone, PartialEq)]
pub struct IsccMatch {
    pub key: Key,
    pub matched_iscc: String,
    pub distance: u32,
    pub mdist: Option<u32>,
    pub cdist: Option<u32>,
    pub ddist: Option<u32>,
    pub imatch: Option<bool>,
}

/// One feature-level match against a query's granular features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatch {
    pub matched_iscc: String,
    pub kind: String,
    pub source_feature: String,
    pub source_pos: Option<Position>,
    pub matched_feature: String,
    pub matched_position: Position,
    pub distance: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub iscc_matches: Vec<IsccMatch>,
    pub feature_matches: Vec<FeatureMatch>,
}

/// Per-sub-store entry counts, as returned by [`Index::stats`](crate::index::Index::stats).
pub type Stats = std::collections::BTreeMap<String, u64>;
