//! Kernel configuration.

/// Configuration for the Kernel.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Check declared payload schemas on gateway writes.
    pub validate_payloads: bool,
    /// Words in a generated recovery phrase.
    pub mnemonic_words: usize,
    /// Base URL of the advisory model endpoint.
    ///
    /// Handed to the advisor built by `Kernel::open`. The built-in
    /// `OfflineAdvisor` only records it and never connects; an
    /// `AdvisoryService` that talks to a model server reads it from here and
    /// is passed in through `Kernel::open_with`.
    pub advisory_endpoint: String,
    /// Pulses returned by `latest` when no count is given.
    pub default_latest: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            validate_payloads: false,
            mnemonic_words: xhe_core::mnemonic::DEFAULT_WORD_COUNT,
            advisory_endpoint: "http://localhost:11434".to_owned(),
            default_latest: 10,
        }
    }
}
