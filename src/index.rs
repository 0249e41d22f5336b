//! The public surface of the ISCC similarity index.
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use crate::bitcodec::{BitCodec, Component, MainType};
use crate::envelope;
use crate::error::IndexError;
use crate::keycodec::{Key, KeyCodec};
use crate::store::Store;
use crate::types::{FeatureGroup, FeatureMatch, IndexOptions, IsccMatch, IsccObj, Metadata, Position, QueryResult, Stats};

const FEATURE_KINDS: [&str; 4] = ["text", "image", "audio", "video"];

/// A feature's similarity distance from a query feature, replaceable the
/// same way [`ComponentScanner`] is — see module docs.
#[derive(Debug, Clone, PartialEq)]
struct FeatureCandidate {
    fkey: Vec<u8>,
    matched_feature: Vec<u8>,
    matched_position: Position,
    distance: u32,
}

/// Near-neighbour scan over the `components` sub-store. The default,
/// [`LinearComponentScanner`], implements the exact algorithm in the index
/// design doc (§4.5): every implementation MUST return a superset of the
/// exact matching `fkey` set within `ct`, since ranking re-filters on full
/// ISCC distance.
pub trait ComponentScanner: Send + Sync {
    fn scan(&self, store: &Store, components_db: &crate::store::Db, code: &Component, ct: u32) -> Result<HashSet<Vec<u8>>, IndexError>;
}

pub struct LinearComponentScanner;

impl ComponentScanner for LinearComponentScanner {
    fn scan(&self, store: &Store, components_db: &crate::store::Db, code: &Component, ct: u32) -> Result<HashSet<Vec<u8>>, IndexError> {
        let rtxn = store.read_txn()?;
        let mut fkeys = HashSet::new();

        if code.main_type() == MainType::Instance {
            for entry in store.prefix_iter(&rtxn, components_db, code.bytes())? {
                let (_, fkey) = entry?;
                fkeys.insert(fkey.to_vec());
            }
            return Ok(fkeys);
        }

        let mut current_key: Option<Vec<u8>> = None;
        let mut current_matches = false;
        for entry in store.prefix_iter(&rtxn, components_db, code.header_bytes())? {
            let (key, fkey) = entry?;
            if current_key.as_deref() != Some(key) {
                current_key = Some(key.to_vec());
                current_matches = BitCodec::distance(code.bytes(), key)? <= ct;
            }
            if current_matches {
                fkeys.insert(fkey.to_vec());
            }
        }
        Ok(fkeys)
    }
}

/// Persistent similarity index over ISCC codes, their components and
/// granular features.
///
/// Integer and text keys may coexist, but mixing the two modes within one
/// index is not recommended: autoincrement only ever considers integer
/// keys, so a text-keyed entry can never collide with it, but callers that
/// rely on `next_key()` producing a dense integer sequence should pick one
/// mode and stick to it.
pub struct Index {
    name: String,
    store: Store,
    options: IndexOptions,
    scanner: Box<dyn ComponentScanner>,
}

impl Index {
    pub fn open(name: &str, options: IndexOptions) -> Result<Self, IndexError> {
        let path = options.index_root.join(name);
        tracing::debug!(name, path = %path.display(), "opening iscc index");
        let store = Store::open(&path, options.initial_map_size, 8, options.max_readers)?;
        let index = Index { name: name.to_string(), store, options, scanner: Box::new(LinearComponentScanner) };
        // isccs is always needed; open it eagerly so stats()/len() see it immediately.
        index.db_isccs()?;
        Ok(index)
    }

    /// Replaces the near-neighbour scan strategy (see [`ComponentScanner`]).
    pub fn with_scanner(mut self, scanner: impl ComponentScanner + 'static) -> Self {
        self.scanner = Box::new(scanner);
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn path(&self) -> &std::path::Path { self.store.path() }

    pub fn map_size(&self) -> usize { self.store.map_size() }

    fn db_isccs(&self) -> Result<crate::store::Db, IndexError> { self.store.database("isccs", false) }

    fn db_components(&self) -> Result<crate::store::Db, IndexError> { self.store.database("components", true) }

    fn db_metadata(&self) -> Result<crate::store::Db, IndexError> { self.store.database("metadata", false) }

    fn db_feat(&self, kind: &str) -> Result<crate::store::Db, IndexError> { self.store.database(&format!("feat_{kind}"), true) }

    /// Adds an ISCC to the index, returning its internal key. Adding an
    /// already-present ISCC is a no-op that returns the existing key.
    pub fn add(&self, obj: impl Into<IsccObj>, key: Option<Key>) -> Result<Key, IndexError> {
        let (iscc_bytes, features, metadata) = Self::parse_iscc_obj(obj.into())?;
        let components = BitCodec::decompose(&iscc_bytes)?;
        let canonical = BitCodec::compose(&components)?;

        if let Some(existing) = self.get_key_for(&components, &canonical)? {
            return Ok(existing);
        }

        let key = match key {
            Some(k) => k,
            None => self.next_key()?,
        };
        let fkey = KeyCodec::encode(&key);

        let isccs_db = self.db_isccs()?;
        let components_db = if self.options.index_components { Some(self.db_components()?) } else { None };
        let metadata_db =
            if self.options.index_metadata && metadata.is_some() { Some(self.db_metadata()?) } else { None };
        let feat_dbs: Option<Vec<(String, crate::store::Db)>> = if self.options.index_features && features.is_some() {
            let groups = features.as_ref().unwrap();
            let mut dbs = Vec::with_capacity(groups.len());
            for g in groups {
                validate_feature_kind(&g.kind)?;
                dbs.push((g.kind.clone(), self.db_feat(&g.kind)?));
            }
            Some(dbs)
        } else {
            None
        };

        self.store.write(|wtxn| {
            if let Some(existing) = self.store.get(wtxn, &isccs_db, &fkey)? {
                if existing != canonical {
                    return Err(IndexError::KeyAlreadyUsed);
                }
            } else {
                self.store.put(wtxn, &isccs_db, &fkey, &canonical, false, true)?;
            }

            if let Some(components_db) = &components_db {
                for c in &components {
                    self.store.put(wtxn, components_db, c.bytes(), &fkey, true, true)?;
                }
            }

            if let (Some(groups), Some(feat_dbs)) = (&features, &feat_dbs) {
                for (group, (_, db)) in groups.iter().zip(feat_dbs.iter()) {
                    let mut pos = Position::Int(0);
                    for (i, feat) in group.features.iter().enumerate() {
                        let this_pos = group.positions.as_ref().and_then(|p| p.get(i).copied()).unwrap_or(pos);
                        let value = envelope::encode(&(fkey.clone(), this_pos))?;
                        self.store.put(wtxn, db, feat, &value, true, true)?;
                        if let Some(size) = group.sizes.get(i) {
                            pos = add_position(pos, *size);
                        }
                    }
                }
            }

            if let (Some(db), Some(metadata)) = (&metadata_db, &metadata) {
                let value = envelope::encode(metadata)?;
                self.store.put(wtxn, db, &fkey, &value, false, true)?;
            }

            Ok(())
        })?;

        Ok(key)
    }

    /// Inserts a single component pointing at `fkey`, bypassing `add`'s
    /// parsing and dedup. Mirrors the original's `_add_component`.
    pub fn add_component(&self, code: &Component, fkey: &Key) -> Result<(), IndexError> {
        let db = self.db_components()?;
        let encoded = KeyCodec::encode(fkey);
        self.store.write(|wtxn| self.store.put(wtxn, &db, code.bytes(), &encoded, true, true))
    }

    /// Inserts a single feature hash pointing at `(fkey, position)`,
    /// bypassing `add`'s parsing. Mirrors the original's `_add_feature`.
    pub fn add_feature(&self, kind: &str, feature: &[u8], fkey: &Key, position: Position) -> Result<(), IndexError> {
        validate_feature_kind(kind)?;
        let db = self.db_feat(kind)?;
        let encoded = KeyCodec::encode(fkey);
        let value = envelope::encode(&(encoded, position))?;
        self.store.write(|wtxn| self.store.put(wtxn, &db, feature, &value, true, true))
    }

    /// Near-neighbour `fkey`s for one component, within Hamming distance `ct`.
    pub fn match_component(&self, code: &Component, ct: u32) -> Result<HashSet<Vec<u8>>, IndexError> {
        let db = self.db_components()?;
        self.scanner.scan(&self.store, &db, code, ct)
    }

    /// Near-neighbour `(fkey, position, matched_feature, distance)` for one
    /// feature hash of the given `kind`, within Hamming distance `ft`.
    fn match_feature(&self, kind: &str, feature: &[u8], ft: u32) -> Result<Vec<FeatureCandidate>, IndexError> {
        let db = self.db_feat(kind)?;
        let rtxn = self.store.read_txn()?;
        let mut out = Vec::new();
        for entry in self.store.iter(&rtxn, &db)? {
            let (f, value) = entry?;
            let distance = match BitCodec::distance(feature, f) {
                Ok(d) => d,
                Err(_) => continue,
            };
            if distance <= ft {
                let (fkey, position): (Vec<u8>, Position) = envelope::decode(value)?;
                out.push(FeatureCandidate { fkey, matched_feature: f.to_vec(), matched_position: position, distance });
            }
        }
        Ok(out)
    }

    /// Returns the internal key for an ISCC if one is already stored,
    /// `None` otherwise.
    pub fn get_key(&self, obj: impl Into<IsccObj>) -> Result<Option<Key>, IndexError> {
        let (iscc_bytes, _, _) = Self::parse_iscc_obj(obj.into())?;
        let components = BitCodec::decompose(&iscc_bytes)?;
        let canonical = BitCodec::compose(&components)?;
        self.get_key_for(&components, &canonical)
    }

    fn get_key_for(&self, components: &[Component], canonical: &[u8]) -> Result<Option<Key>, IndexError> {
        let isccs_db = self.db_isccs()?;
        let rtxn = self.store.read_txn()?;

        if self.options.index_components {
            let components_db = self.db_components()?;
            for c in components {
                if let Some(fkey) = self.store.get(&rtxn, &components_db, c.bytes())? {
                    if let Some(stored) = self.store.get(&rtxn, &isccs_db, fkey)? {
                        if stored == canonical {
                            return Ok(Some(KeyCodec::decode(fkey)?));
                        }
                    }
                }
            }
            return Ok(None);
        }

        tracing::debug!(name = %self.name, "get_key falling back to a full scan: index_components is disabled");
        for entry in self.store.iter(&rtxn, &isccs_db)? {
            let (fkey, stored) = entry?;
            if stored == canonical {
                return Ok(Some(KeyCodec::decode(fkey)?));
            }
        }
        Ok(None)
    }

    pub fn contains(&self, obj: impl Into<IsccObj>) -> Result<bool, IndexError> { Ok(self.get_key(obj)?.is_some()) }

    /// Canonical ISCC bytes stored under `key`, if any.
    pub fn get_iscc(&self, key: &Key) -> Result<Option<Vec<u8>>, IndexError> {
        let db = self.db_isccs()?;
        let fkey = KeyCodec::encode(key);
        let rtxn = self.store.read_txn()?;
        Ok(self.store.get(&rtxn, &db, &fkey)?.map(|b| b.to_vec()))
    }

    /// Same as [`Index::get_iscc`] but rendered as `ISCC:`-prefixed text.
    pub fn get_iscc_text(&self, key: &Key) -> Result<Option<String>, IndexError> {
        Ok(self.get_iscc(key)?.map(|b| BitCodec::encode_prefixed(&b)))
    }

    fn next_key(&self) -> Result<Key, IndexError> {
        let db = self.db_isccs()?;
        let rtxn = self.store.read_txn()?;
        match self.store.last_in_prefix(&rtxn, &db, &KeyCodec::int_prefix())? {
            Some((k, _)) => match KeyCodec::decode(k)? {
                Key::Int(n) => Ok(Key::Int(n + 1)),
                Key::Text(_) => unreachable!("prefix scan only yields integer-tagged keys"),
            },
            None => Ok(Key::Int(0)),
        }
    }

    /// Nearest neighbours of `obj`'s ISCC (and, if it carries features,
    /// nearest neighbours of each feature hash).
    pub fn query(&self, obj: impl Into<IsccObj>, k: usize, ct: u32, ft: u32) -> Result<QueryResult, IndexError> {
        let (query_bytes, features, _metadata) = Self::parse_iscc_obj(obj.into())?;
        let components = BitCodec::decompose(&query_bytes)?;

        let iscc_matches = self.query_iscc_matches(&query_bytes, &components, k, ct)?;
        let feature_matches = match features {
            Some(groups) if self.options.index_features => self.query_feature_matches(&groups, ft)?,
            _ => Vec::new(),
        };

        Ok(QueryResult { iscc_matches, feature_matches })
    }

    fn query_iscc_matches(&self, query_bytes: &[u8], components: &[Component], k: usize, ct: u32) -> Result<Vec<IsccMatch>, IndexError> {
        if !self.options.index_components {
            tracing::debug!(name = %self.name, "query found no candidates: index_components is disabled");
            return Ok(Vec::new());
        }

        let mut candidates: BTreeSet<Vec<u8>> = BTreeSet::new();
        for c in components {
            candidates.extend(self.match_component(c, ct)?);
        }

        let isccs_db = self.db_isccs()?;
        let rtxn = self.store.read_txn()?;
        let mut matches = Vec::with_capacity(candidates.len());
        for fkey in candidates {
            let Some(matched) = self.store.get(&rtxn, &isccs_db, &fkey)? else { continue };
            let distance = match BitCodec::distance(query_bytes, matched) {
                Ok(d) => d,
                Err(_) => continue, // canonical lengths differ: not a meaningful similarity pair, skip
            };
            let comparison = BitCodec::compare(query_bytes, matched)?;
            matches.push(IsccMatch {
                key: KeyCodec::decode(&fkey)?,
                matched_iscc: BitCodec::encode_prefixed(matched),
                distance,
                mdist: comparison.mdist,
                cdist: comparison.cdist,
                ddist: comparison.ddist,
                imatch: comparison.imatch,
            });
        }

        matches.sort_by_key(|m| m.distance);
        matches.truncate(k);
        Ok(matches)
    }

    fn query_feature_matches(&self, groups: &[FeatureGroup], ft: u32) -> Result<Vec<FeatureMatch>, IndexError> {
        let isccs_db = self.db_isccs()?;
        let rtxn = self.store.read_txn()?;
        let mut matches = Vec::new();

        for group in groups {
            for (i, source_feature) in group.features.iter().enumerate() {
                let source_pos = group.positions.as_ref().and_then(|p| p.get(i).copied());
                for candidate in self.match_feature(&group.kind, source_feature, ft)? {
                    let Some(matched) = self.store.get(&rtxn, &isccs_db, &candidate.fkey)? else { continue };
                    matches.push(FeatureMatch {
                        matched_iscc: BitCodec::encode_prefixed(matched),
                        kind: group.kind.clone(),
                        source_feature: BitCodec::encode(source_feature),
                        source_pos,
                        matched_feature: BitCodec::encode(&candidate.matched_feature),
                        matched_position: candidate.matched_position,
                        distance: candidate.distance,
                    });
                }
            }
        }

        matches.sort_by_key(|m| m.distance);
        Ok(matches)
    }

    /// Stored ISCC byte values in `fkey` ascending order.
    pub fn iter_isccs(&self) -> Result<Vec<Vec<u8>>, IndexError> {
        let db = self.db_isccs()?;
        let rtxn = self.store.read_txn()?;
        self.store.iter(&rtxn, &db)?.map(|r| r.map(|(_, v)| v.to_vec())).collect()
    }

    /// Each distinct component key, once.
    pub fn iter_components(&self) -> Result<Vec<Vec<u8>>, IndexError> {
        let db = self.db_components()?;
        let rtxn = self.store.read_txn()?;
        let mut out = Vec::new();
        let mut last: Option<Vec<u8>> = None;
        for entry in self.store.iter(&rtxn, &db)? {
            let (k, _) = entry?;
            if last.as_deref() != Some(k) {
                out.push(k.to_vec());
                last = Some(k.to_vec());
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<u64, IndexError> {
        let db = self.db_isccs()?;
        let rtxn = self.store.read_txn()?;
        self.store.len(&rtxn, &db)
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> { Ok(self.len()? == 0) }

    /// Per-sub-store entry counts, limited to sub-stores actually opened so far.
    pub fn stats(&self) -> Result<Stats, IndexError> {
        let rtxn = self.store.read_txn()?;
        let mut stats = Stats::new();
        for name in self.store.known_names() {
            let dup_sort = name == "components" || name.starts_with("feat_");
            let db = self.store.database(&name, dup_sort)?;
            stats.insert(name, self.store.len(&rtxn, &db)?);
        }
        Ok(stats)
    }

    pub fn close(self) { self.store.close() }

    pub fn destroy(self) -> Result<(), IndexError> { self.store.destroy() }

    fn parse_iscc_obj(obj: IsccObj) -> Result<(Vec<u8>, Option<Vec<FeatureGroup>>, Option<Metadata>), IndexError> {
        match obj {
            IsccObj::Text(text) => Ok((BitCodec::decode(&text)?, None, None)),
            IsccObj::Bytes(bytes) => Ok((bytes, None, None)),
            IsccObj::Components(components) => Ok((BitCodec::compose(&components)?, None, None)),
            IsccObj::Rich { iscc, features, metadata } => Ok((BitCodec::decode(&iscc)?, features, metadata)),
        }
    }
}

fn add_position(a: Position, b: Position) -> Position {
    match (a, b) {
        (Position::Int(a), Position::Int(b)) => Position::Int(a + b),
        (a, b) => Position::Float(as_f64(a) + as_f64(b)),
    }
}

fn as_f64(p: Position) -> f64 {
    match p {
        Position::Int(n) => n as f64,
        Position::Float(f) => f,
    }
}

/// Rejects a feature group `kind` outside the four documented kinds
/// (spec.md §3/§6: `feat_<kind>` with `<kind>` drawn from `{text, image,
/// audio, video}`), so a typo'd kind is surfaced as `MalformedCode` instead
/// of silently opening a new, permanent `feat_<kind>` sub-store.
fn validate_feature_kind(kind: &str) -> Result<(), IndexError> {
    if FEATURE_KINDS.contains(&kind) {
        Ok(())
    } else {
        Err(IndexError::MalformedCode(format!("unrecognized feature kind {kind:?}, expected one of {FEATURE_KINDS:?}")))
    }
}
