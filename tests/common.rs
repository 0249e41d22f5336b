use std::path::Path;
use std::sync::Once;

use iscc_index::{BitCodec, Component, Index, IndexOptions};

static INIT: Once = Once::new();

/// Initializes a test-scoped `tracing` subscriber exactly once per process,
/// mirroring the teacher's `init_tracing` test fixture.
#[allow(dead_code)]
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).with_test_writer().init();
    });
}

#[allow(dead_code)]
pub fn options(dir: &Path) -> IndexOptions { IndexOptions { index_root: dir.to_path_buf(), ..Default::default() } }

#[allow(dead_code)]
pub fn open(dir: &Path, name: &str, opts: IndexOptions) -> Index { Index::open(name, opts).expect("open index") }

/// Builds a canonical ISCC (as `ISCC:`-prefixed text) from four 64-bit
/// component bodies, letting tests control Hamming distance between codes
/// by picking the `meta` body.
#[allow(dead_code)]
pub fn code(meta: u64, content: u64, data: u64, instance: u64) -> String {
    let components = vec![
        Component::meta(&meta.to_be_bytes()),
        Component::content(0, &content.to_be_bytes()),
        Component::data(&data.to_be_bytes()),
        Component::instance(&instance.to_be_bytes()),
    ];
    let bytes = BitCodec::compose(&components).expect("compose is infallible for distinct kinds");
    BitCodec::encode_prefixed(&bytes)
}
