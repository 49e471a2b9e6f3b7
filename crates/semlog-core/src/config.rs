//! Compression configuration.
//!
//! A plain struct with a `Default` impl and builder-style setters, the same
//! shape the dialect configuration in the teacher takes rather than a
//! parsed file format — this system has no on-disk config of its own.

/// Knobs accepted by [`crate::encoder::Encoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionConfig {
    /// Minimum number of structurally-similar lines required to promote a
    /// group into a template. Groups smaller than this are encoded as
    /// unmatched lines.
    pub min_support: usize,
    /// Store IPv4 addresses as 4 raw bytes instead of dotted strings.
    pub binary_ip: bool,
    /// Build a per-template word-substitution dictionary for message text.
    pub word_dictionaries: bool,
    /// Apply a block-wise Burrows-Wheeler transform before entropy coding.
    pub bwt: bool,
    /// Shared entropy-coder dictionary, injected by the caller. The same
    /// bytes must be supplied on read as were supplied on write.
    pub entropy_dict: Option<Vec<u8>>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_support: 3,
            binary_ip: false,
            word_dictionaries: false,
            bwt: false,
            entropy_dict: None,
        }
    }
}

impl CompressionConfig {
    pub fn with_min_support(mut self, min_support: usize) -> Self {
        self.min_support = min_support;
        self
    }

    pub fn with_binary_ip(mut self, binary_ip: bool) -> Self {
        self.binary_ip = binary_ip;
        self
    }

    pub fn with_word_dictionaries(mut self, word_dictionaries: bool) -> Self {
        self.word_dictionaries = word_dictionaries;
        self
    }

    pub fn with_bwt(mut self, bwt: bool) -> Self {
        self.bwt = bwt;
        self
    }

    pub fn with_entropy_dict(mut self, dict: Vec<u8>) -> Self {
        self.entropy_dict = Some(dict);
        self
    }
}
