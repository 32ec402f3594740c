//! Blob and framing payloads.

use bytes::Bytes;
use std::fmt;
use std::ops::Deref;

/// Immutable byte buffer exchanged with domain collaborators.
///
/// Cloning is cheap; chunk slices share the same allocation.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(Bytes);

impl Blob {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Number of chunks of at most `chunk_size` bytes needed to carry this blob.
    ///
    /// # Panics
    /// Panics if `chunk_size` is zero.
    pub fn chunk_count(&self, chunk_size: usize) -> usize {
        assert!(chunk_size > 0, "chunk size must be at least 1");
        self.len().div_ceil(chunk_size)
    }

    /// Ordered chunk slices. Empty for an empty blob.
    pub fn chunks(&self, chunk_size: usize) -> impl Iterator<Item = Bytes> + '_ {
        let count = self.chunk_count(chunk_size);
        (0..count).map(move |i| {
            let start = i * chunk_size;
            let end = (start + chunk_size).min(self.len());
            self.0.slice(start..end)
        })
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(v: Vec<u8>) -> Self {
        Self(Bytes::from(v))
    }
}

impl From<Bytes> for Blob {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

impl From<&'static [u8]> for Blob {
    fn from(b: &'static [u8]) -> Self {
        Self(Bytes::from_static(b))
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.len())
    }
}

/// Advisory metadata carried by a `Heading` packet.
///
/// Encoded as ASCII `size:<n>`, with `;request:<id>` appended when the
/// transfer answers a correlated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadingInfo {
    pub size: Option<u64>,
    pub request: Option<u64>,
}

impl HeadingInfo {
    pub fn encode(size: u64, request: Option<u64>) -> Bytes {
        match request {
            Some(id) => Bytes::from(format!("size:{size};request:{id}")),
            None => Bytes::from(format!("size:{size}")),
        }
    }

    /// Lenient parse. Unknown or malformed fields are ignored.
    pub fn parse(payload: &[u8]) -> Self {
        let mut info = Self::default();
        let Ok(text) = std::str::from_utf8(payload) else {
            return info;
        };
        for field in text.split(';') {
            match field.split_once(':') {
                Some(("size", v)) => info.size = v.trim().parse().ok(),
                Some(("request", v)) => info.request = v.trim().parse().ok(),
                _ => {}
            }
        }
        info
    }
}

/// Payload of `Request` and `NotFound` packets: `request:<id>` or empty.
pub fn encode_request_id(id: Option<u64>) -> Bytes {
    match id {
        Some(id) => Bytes::from(format!("request:{id}")),
        None => Bytes::new(),
    }
}

pub fn parse_request_id(payload: &[u8]) -> Option<u64> {
    std::str::from_utf8(payload)
        .ok()?
        .strip_prefix("request:")?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count() {
        assert_eq!(Blob::empty().chunk_count(1024), 0);
        assert_eq!(Blob::from(vec![0; 1]).chunk_count(1024), 1);
        assert_eq!(Blob::from(vec![0; 1024]).chunk_count(1024), 1);
        assert_eq!(Blob::from(vec![0; 1025]).chunk_count(1024), 2);
        assert_eq!(Blob::from(vec![0; 5000]).chunk_count(1024), 5);
    }

    #[test]
    fn test_chunk_sizes_non_multiple() {
        let blob = Blob::from(vec![7u8; 5000]);
        let sizes: Vec<usize> = blob.chunks(1024).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1024, 1024, 1024, 1024, 904]);
    }

    #[test]
    fn test_chunk_sizes_exact_multiple() {
        let blob = Blob::from(vec![1u8; 5 * 64]);
        let sizes: Vec<usize> = blob.chunks(64).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![64; 5]);
    }

    #[test]
    #[should_panic(expected = "chunk size must be at least 1")]
    fn test_zero_chunk_size_panics() {
        Blob::from(vec![1]).chunk_count(0);
    }

    #[test]
    fn test_heading_text() {
        assert_eq!(&HeadingInfo::encode(5000, None)[..], b"size:5000");
        assert_eq!(&HeadingInfo::encode(0, Some(3))[..], b"size:0;request:3");
    }

    #[test]
    fn test_heading_parse_lenient() {
        assert_eq!(
            HeadingInfo::parse(b"size:12;request:4"),
            HeadingInfo {
                size: Some(12),
                request: Some(4)
            }
        );
        assert_eq!(HeadingInfo::parse(b"size:abc").size, None);
        assert_eq!(HeadingInfo::parse(&[0xFF, 0xFE]), HeadingInfo::default());
        assert_eq!(HeadingInfo::parse(b"").request, None);
    }

    #[test]
    fn test_request_id_payload() {
        assert_eq!(parse_request_id(&encode_request_id(Some(42))), Some(42));
        assert_eq!(parse_request_id(&encode_request_id(None)), None);
        assert_eq!(parse_request_id(b"garbage"), None);
    }
}
