//! Length-prefixed SHA-256 feeding shared by every fingerprint type.

use kiln_snapshot::EntryContent;
use sha2::{Digest, Sha256};

/// Streams typed fields into SHA-256 so that adjacent fields can never
/// run together (every string is length-prefixed).
pub(crate) struct FingerprintHasher {
    inner: Sha256,
}

impl FingerprintHasher {
    pub(crate) fn new(domain: &str) -> Self {
        let mut hasher = Self {
            inner: Sha256::new(),
        };
        hasher.put_str(domain);
        hasher
    }

    pub(crate) fn put_str(&mut self, value: &str) {
        self.put_u64(value.len() as u64);
        self.inner.update(value.as_bytes());
    }

    pub(crate) fn put_u64(&mut self, value: u64) {
        self.inner.update(value.to_le_bytes());
    }

    pub(crate) fn put_bytes(&mut self, value: &[u8]) {
        self.put_u64(value.len() as u64);
        self.inner.update(value);
    }

    pub(crate) fn put_content(&mut self, content: &EntryContent) {
        match content {
            EntryContent::File(signature) => {
                self.put_str("file");
                self.put_str(&signature.hash);
                self.put_u64(signature.length);
            }
            EntryContent::Directory => self.put_str("dir"),
            EntryContent::Missing => self.put_str("missing"),
        }
    }

    pub(crate) fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix_separates_fields() {
        let mut a = FingerprintHasher::new("t");
        a.put_str("ab");
        a.put_str("c");
        let mut b = FingerprintHasher::new("t");
        b.put_str("a");
        b.put_str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn domain_separates_hashes() {
        assert_ne!(
            FingerprintHasher::new("value").finish(),
            FingerprintHasher::new("fileset").finish()
        );
    }
}
