use arbor_types::Key;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so keys minted by Arbor never collide with digests of the
/// same bytes computed elsewhere.
#[derive(Clone, Copy, Debug)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for encoded blocks. Every key in a store is minted by it.
    pub const BLOCK: Self = Self {
        domain: "arbor-block-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Key {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Key::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected key.
    pub fn verify(&self, data: &[u8], expected: &Key) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
