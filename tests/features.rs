mod common;
use common::*;

use iscc_index::{IndexError, Key, Position};
use tempfile::tempdir;

fn feature_options(dir: &std::path::Path) -> iscc_index::IndexOptions {
    iscc_index::IndexOptions { index_features: true, ..options(dir) }
}

/// A feature group whose `kind` isn't one of the four documented kinds
/// (`text`/`image`/`audio`/`video`) is rejected up front, rather than
/// silently opening a new, permanently-recorded `feat_<kind>` sub-store.
#[test]
fn add_rejects_unrecognized_feature_kind() {
    let dir = tempdir().unwrap();
    let index = open(dir.path(), "feature-bad-kind", feature_options(dir.path()));

    let add = iscc_index::IsccObj::Rich {
        iscc: code(0, 0, 0, 0),
        features: Some(vec![iscc_index::FeatureGroup {
            kind: "vido".into(), // typo
            features: vec![[1u8; 8].to_vec()],
            sizes: vec![Position::Int(1)],
            positions: None,
        }]),
        metadata: None,
    };

    let err = index.add(add, None).unwrap_err();
    assert!(matches!(err, IndexError::MalformedCode(_)));
    assert_eq!(index.len().unwrap(), 0);
}

/// Same rejection applies to the low-level `add_feature` primitive.
#[test]
fn add_feature_rejects_unrecognized_kind() {
    let dir = tempdir().unwrap();
    let index = open(dir.path(), "feature-bad-kind-primitive", feature_options(dir.path()));
    let key = index.add(code(0, 0, 0, 0).as_str(), None).unwrap();

    let err = index.add_feature("subtitles", &[0u8; 8], &key, Position::Int(0)).unwrap_err();
    assert!(matches!(err, IndexError::MalformedCode(_)));
}

/// Scenario C: an exact feature match (`ft=0`) returns the one stored
/// feature hash, resolved back to the ISCC it was attached to.
#[test]
fn feature_exact_match() {
    let dir = tempdir().unwrap();
    let index = open(dir.path(), "feature-exact", feature_options(dir.path()));

    for i in 0..13u64 {
        index.add(code(i, 0, 0, 0).as_str(), None).unwrap();
    }

    let feature = [0u8; 8];
    index.add_feature("video", &feature, &Key::Int(0), Position::Int(100)).unwrap();

    let query = iscc_index::IsccObj::Rich {
        iscc: code(0, 0, 0, 0),
        features: Some(vec![iscc_index::FeatureGroup {
            kind: "video".into(),
            features: vec![feature.to_vec()],
            sizes: vec![Position::Int(100)],
            positions: None,
        }]),
        metadata: None,
    };

    let result = index.query(query, 10, 0, 0).unwrap();
    assert_eq!(result.feature_matches.len(), 1);
    assert_eq!(result.feature_matches[0].distance, 0);
    assert_eq!(result.feature_matches[0].matched_iscc, index.get_iscc_text(&Key::Int(0)).unwrap().unwrap());
    assert_eq!(result.feature_matches[0].kind, "video");
}

/// Scenario D: a feature 2 bits away is found when `ft=2` but not `ft=1`.
#[test]
fn feature_near_match_within_threshold() {
    let dir = tempdir().unwrap();
    let index = open(dir.path(), "feature-near", feature_options(dir.path()));

    index.add(code(0, 0, 0, 0).as_str(), None).unwrap();
    index.add_feature("video", &[0u8; 8], &Key::Int(0), Position::Int(100)).unwrap();

    let probe = [0, 0, 0, 0, 0, 0, 0, 0b0000_0011u8]; // 2 bits set relative to stored feature

    let query_at = |_ft: u32| {
        iscc_index::IsccObj::Rich {
            iscc: code(0, 0, 0, 0),
            features: Some(vec![iscc_index::FeatureGroup {
                kind: "video".into(),
                features: vec![probe.to_vec()],
                sizes: vec![Position::Int(100)],
                positions: None,
            }]),
            metadata: None,
        }
    };

    assert_eq!(index.query(query_at(2), 10, 0, 2).unwrap().feature_matches.len(), 1);
    assert_eq!(index.query(query_at(2), 10, 0, 2).unwrap().feature_matches[0].distance, 2);
    assert!(index.query(query_at(1), 10, 0, 1).unwrap().feature_matches.is_empty());
}

/// `query_features` is a no-op when `index_features` is disabled, even if
/// the query object carries features.
#[test]
fn feature_matches_are_empty_when_feature_indexing_disabled() {
    let dir = tempdir().unwrap();
    let index = open(dir.path(), "feature-disabled", options(dir.path()));
    index.add(code(0, 0, 0, 0).as_str(), None).unwrap();

    let query = iscc_index::IsccObj::Rich {
        iscc: code(0, 0, 0, 0),
        features: Some(vec![iscc_index::FeatureGroup { kind: "video".into(), features: vec![vec![0; 8]], sizes: vec![Position::Int(1)], positions: None }]),
        metadata: None,
    };

    let result = index.query(query, 10, 0, 64).unwrap();
    assert!(result.feature_matches.is_empty());
}

/// Cumulative position derivation: successive features in a group without
/// explicit positions accumulate `sizes` starting from 0.
#[test]
fn feature_positions_accumulate_from_sizes() {
    let dir = tempdir().unwrap();
    let index = open(dir.path(), "feature-positions", feature_options(dir.path()));
    index.add(code(0, 0, 0, 0).as_str(), None).unwrap();

    let add = iscc_index::IsccObj::Rich {
        iscc: code(1, 0, 0, 0),
        features: Some(vec![iscc_index::FeatureGroup {
            kind: "video".into(),
            features: vec![[1u8; 8].to_vec(), [2u8; 8].to_vec(), [3u8; 8].to_vec()],
            sizes: vec![Position::Int(10), Position::Int(20), Position::Int(30)],
            positions: None,
        }]),
        metadata: None,
    };
    index.add(add, None).unwrap();

    let query = iscc_index::IsccObj::Rich {
        iscc: code(0, 0, 0, 0),
        features: Some(vec![iscc_index::FeatureGroup { kind: "video".into(), features: vec![[2u8; 8].to_vec()], sizes: vec![Position::Int(20)], positions: None }]),
        metadata: None,
    };
    let result = index.query(query, 10, 0, 0).unwrap();
    assert_eq!(result.feature_matches.len(), 1);
    assert_eq!(result.feature_matches[0].matched_position, Position::Int(10));
}
