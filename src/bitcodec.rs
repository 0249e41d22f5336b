//! ISCC text codec, component decomposition/composition and bit distance.
use data_encoding::{Encoding, Specification};
use std::sync::LazyLock;

use crate::error::IndexError;

/// Upper-case RFC4648 base32 without padding, the textual encoding ISCC uses.
static BASE32: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str("ABCDEFGHIJKLMNOPQRSTUVWXYZ234567");
    spec.encoding().expect("static base32 spec is valid")
});

const HEADER_LEN: usize = 2;
const BODY_LEN: usize = 8;
const COMPONENT_LEN: usize = HEADER_LEN + BODY_LEN;

/// The four component kinds a canonical ISCC code is composed of, in
/// canonical ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MainType {
    Meta = 0,
    Content = 1,
    Data = 2,
    Instance = 3,
}

impl MainType {
    fn from_header_byte(b: u8) -> Result<Self, IndexError> {
        match b >> 4 {
            0 => Ok(MainType::Meta),
            1 => Ok(MainType::Content),
            2 => Ok(MainType::Data),
            3 => Ok(MainType::Instance),
            other => Err(IndexError::MalformedCode(format!("reserved main-type {other}"))),
        }
    }

    fn header_nibble(self) -> u8 { (self as u8) << 4 }
}

/// One typed sub-code of an ISCC, including its 2-byte header. The `bytes`
/// field is private: every path that produces a `Component` — the typed
/// constructors below, `decompose`, or the public `TryFrom<Vec<u8>>` — runs
/// header validation first, so `main_type()` can assume a valid header
/// without re-checking it on every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    bytes: Vec<u8>,
}

impl Component {
    pub fn main_type(&self) -> MainType { MainType::from_header_byte(self.bytes[0]).expect("validated on construction") }

    /// The full component bytes, header included.
    pub fn bytes(&self) -> &[u8] { &self.bytes }

    /// Consumes the component, returning its full bytes.
    pub fn into_bytes(self) -> Vec<u8> { self.bytes }

    /// The bytes that identify this component's (main-type, sub-type) bucket,
    /// i.e. the leading header. Used as the seek prefix for the component scan.
    pub fn header_bytes(&self) -> &[u8] { &self.bytes[..HEADER_LEN] }

    /// Validates `bytes` as a complete component: exactly [`COMPONENT_LEN`]
    /// long with a recognized main-type nibble. The sole gate a `Component`
    /// must pass through before it exists.
    fn from_validated(bytes: Vec<u8>) -> Result<Self, IndexError> {
        if bytes.len() != COMPONENT_LEN {
            return Err(IndexError::MalformedCode(format!("component length {} != {COMPONENT_LEN}", bytes.len())));
        }
        MainType::from_header_byte(bytes[0])?;
        Ok(Component { bytes })
    }

    fn new(main_type: MainType, sub_type: u8, body: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(COMPONENT_LEN);
        bytes.push(main_type.header_nibble() | (sub_type & 0x0f));
        bytes.push(0); // version/length nibble, fixed at 0 for the 64-bit body width this index supports
        bytes.extend_from_slice(body);
        Component { bytes }
    }

    pub fn meta(body: &[u8; BODY_LEN]) -> Self { Component::new(MainType::Meta, 0, body) }
    pub fn content(sub_type: u8, body: &[u8; BODY_LEN]) -> Self { Component::new(MainType::Content, sub_type, body) }
    pub fn data(body: &[u8; BODY_LEN]) -> Self { Component::new(MainType::Data, 0, body) }
    pub fn instance(body: &[u8; BODY_LEN]) -> Self { Component::new(MainType::Instance, 0, body) }
}

/// Parses raw bytes (e.g. a single component-width slice pulled from storage)
/// into a validated component. This is the only public entry point for building a
/// `Component` from untrusted bytes outside of `decompose`, so callers going
/// through `IsccObj::Components` can never hand `compose`/`main_type` a
/// component with a reserved main-type or the wrong length.
impl TryFrom<Vec<u8>> for Component {
    type Error = IndexError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, IndexError> { Component::from_validated(bytes) }
}

/// Per-kind distances between two ISCCs, and byte-equality for Instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Comparison {
    pub mdist: Option<u32>,
    pub cdist: Option<u32>,
    pub ddist: Option<u32>,
    pub imatch: Option<bool>,
}

/// Decodes/encodes ISCC text, decomposes/composes canonical byte strings and
/// computes Hamming distance. Stateless; all operations are pure functions.
pub struct BitCodec;

impl BitCodec {
    pub fn decode(text: &str) -> Result<Vec<u8>, IndexError> {
        let stripped = text.strip_prefix("ISCC:").unwrap_or(text);
        BASE32.decode(stripped.as_bytes()).map_err(|e| IndexError::MalformedCode(e.to_string()))
    }

    pub fn encode(bytes: &[u8]) -> String { BASE32.encode(bytes) }

    pub fn encode_prefixed(bytes: &[u8]) -> String { format!("ISCC:{}", BASE32.encode(bytes)) }

    /// Splits a canonical ISCC byte string into its component codes.
    pub fn decompose(code: &[u8]) -> Result<Vec<Component>, IndexError> {
        let mut components = Vec::new();
        let mut offset = 0;
        while offset < code.len() {
            if code.len() - offset < COMPONENT_LEN {
                return Err(IndexError::MalformedCode(format!(
                    "declared component length exceeds remaining {} bytes",
                    code.len() - offset
                )));
            }
            let bytes = code[offset..offset + COMPONENT_LEN].to_vec();
            components.push(Component::try_from(bytes)?);
            offset += COMPONENT_LEN;
        }
        Ok(components)
    }

    /// Concatenates components in canonical order (Meta < Content < Data < Instance).
    pub fn compose(components: &[Component]) -> Result<Vec<u8>, IndexError> {
        let mut seen = [false; 4];
        let mut ordered: Vec<&Component> = components.iter().collect();
        ordered.sort_by_key(|c| c.main_type());
        for c in &ordered {
            let idx = c.main_type() as usize;
            if seen[idx] {
                return Err(IndexError::DuplicateKind(format!("{:?}", c.main_type())));
            }
            seen[idx] = true;
        }
        Ok(ordered.into_iter().flat_map(|c| c.bytes().iter().copied()).collect())
    }

    /// Hamming distance between two equal-length byte strings.
    pub fn distance(a: &[u8], b: &[u8]) -> Result<u32, IndexError> {
        if a.len() != b.len() {
            return Err(IndexError::MismatchedLength(a.len(), b.len()));
        }
        Ok(a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum())
    }

    /// Per-kind distances between two canonical ISCC codes. A kind missing on
    /// either side leaves the corresponding field `None`.
    pub fn compare(a: &[u8], b: &[u8]) -> Result<Comparison, IndexError> {
        let ca = Self::decompose(a)?;
        let cb = Self::decompose(b)?;
        let find = |comps: &[Component], mt: MainType| comps.iter().find(|c| c.main_type() == mt).cloned();

        let mut out = Comparison::default();
        if let (Some(x), Some(y)) = (find(&ca, MainType::Meta), find(&cb, MainType::Meta)) {
            out.mdist = Some(Self::distance(x.bytes(), y.bytes())?);
        }
        if let (Some(x), Some(y)) = (find(&ca, MainType::Content), find(&cb, MainType::Content)) {
            out.cdist = Some(Self::distance(x.bytes(), y.bytes())?);
        }
        if let (Some(x), Some(y)) = (find(&ca, MainType::Data), find(&cb, MainType::Data)) {
            out.ddist = Some(Self::distance(x.bytes(), y.bytes())?);
        }
        if let (Some(x), Some(y)) = (find(&ca, MainType::Instance), find(&cb, MainType::Instance)) {
            out.imatch = Some(x.bytes() == y.bytes());
        }
        Ok(out)
    }
}
