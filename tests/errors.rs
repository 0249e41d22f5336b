mod common;
use common::*;

use iscc_index::{BitCodec, Component};
use tempfile::tempdir;

/// `get_iscc`/`get_key` on an absent key return `None`, never an error —
/// spec.md §7 names this explicitly as not an error condition.
#[test]
fn absent_lookups_return_none_not_error() {
    let dir = tempdir().unwrap();
    let index = open(dir.path(), "absent", options(dir.path()));

    assert!(index.get_iscc(&iscc_index::Key::Int(0)).unwrap().is_none());
    assert!(index.get_key(code(1, 2, 3, 4).as_str()).unwrap().is_none());
}

/// Candidates whose stored ISCC has a different canonical byte length than
/// the query (a different set of present component kinds) are skipped
/// rather than erroring the whole query — the documented resolution of the
/// "mismatched length" design note.
#[test]
fn query_skips_candidates_of_different_canonical_length() {
    let dir = tempdir().unwrap();
    let index = open(dir.path(), "mismatched-length", options(dir.path()));

    // A meta-only code (one 9-byte component)...
    let meta_only = BitCodec::compose(&[Component::meta(&[0u8; 8])]).unwrap();
    let meta_only_text = BitCodec::encode_prefixed(&meta_only);
    index.add(meta_only_text.as_str(), None).unwrap();

    // ...coexists with a full four-component code of a different byte length.
    let full = code(0, 0, 0, 0);
    index.add(full.as_str(), None).unwrap();

    // Querying with the full code must not error even though `components`
    // holds a meta entry whose owning ISCC is a different total length.
    let result = index.query(full.as_str(), 10, 64, 0).unwrap();
    assert!(result.iscc_matches.iter().any(|m| m.matched_iscc == BitCodec::encode_prefixed(&BitCodec::decode(&full).unwrap())));
}

#[test]
fn distance_on_mismatched_length_is_an_error() {
    let err = BitCodec::distance(&[0, 0, 0], &[0, 0]).unwrap_err();
    assert!(matches!(err, iscc_index::IndexError::MismatchedLength(3, 2)));
}

#[test]
fn compose_rejects_duplicate_component_kind() {
    let a = Component::meta(&[0; 8]);
    let b = Component::meta(&[1; 8]);
    let err = BitCodec::compose(&[a, b]).unwrap_err();
    assert!(matches!(err, iscc_index::IndexError::DuplicateKind(_)));
}
