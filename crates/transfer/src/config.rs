//! Transfer configuration assembled by front ends.

use bandwidth::BandwidthLimiter;
use compress::algorithm::CompressionAlgorithm;
use compress::{CodecEngine, EngineParams, Mode};

use crate::buffer::MIN_CAPACITY;
use crate::error::TransferError;

/// Buffer capacity used when none is configured.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1_000_000;

/// Compression quality used when none is configured.
pub const DEFAULT_QUALITY: u8 = 90;

/// Everything needed to build the engine and size the buffer for one transfer.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransferConfig {
    buffer_capacity: usize,
    mode: Mode,
    algorithm: CompressionAlgorithm,
    quality: u8,
    bandwidth_limit: Option<u64>,
    bandwidth_burst: Option<u64>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            mode: Mode::Decompress,
            algorithm: CompressionAlgorithm::default(),
            quality: DEFAULT_QUALITY,
            bandwidth_limit: None,
            bandwidth_burst: None,
        }
    }
}

impl TransferConfig {
    /// Starts a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> TransferConfigBuilder {
        TransferConfigBuilder::default()
    }

    /// Capacity of the shared buffer. Never below two bytes.
    #[must_use]
    pub const fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Engine direction.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Compression format.
    #[must_use]
    pub const fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Compression quality in `0..=100`.
    #[must_use]
    pub const fn quality(&self) -> u8 {
        self.quality
    }

    /// Bandwidth cap in bytes per second, if any.
    #[must_use]
    pub const fn bandwidth_limit(&self) -> Option<u64> {
        self.bandwidth_limit
    }

    /// Engine parameters derived from the algorithm and quality.
    pub fn engine_params(&self) -> Result<EngineParams, TransferError> {
        EngineParams::new(self.algorithm)
            .with_quality(self.quality)
            .map_err(|error| TransferError::Config(error.to_string()))
    }

    /// Builds the engine this configuration describes.
    pub fn build_engine(&self) -> Result<CodecEngine, TransferError> {
        Ok(CodecEngine::new(self.mode, self.engine_params()?)?)
    }

    /// Builds the limiter for the configured cap, if any.
    #[must_use]
    pub fn build_limiter(&self) -> Option<BandwidthLimiter> {
        let limit = std::num::NonZeroU64::new(self.bandwidth_limit?)?;
        let burst = self.bandwidth_burst.and_then(std::num::NonZeroU64::new);
        Some(BandwidthLimiter::with_burst(limit, burst))
    }
}

/// Builder for [`TransferConfig`].
#[derive(Clone, Debug, Default)]
pub struct TransferConfigBuilder {
    config: TransferConfig,
}

impl TransferConfigBuilder {
    /// Sets the shared buffer capacity. Values below two are clamped up.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(MIN_CAPACITY);
        self
    }

    /// Sets the engine direction.
    #[must_use]
    pub const fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the compression format.
    #[must_use]
    pub const fn algorithm(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Sets the compression quality. Checked by [`build`](Self::build).
    #[must_use]
    pub const fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality;
        self
    }

    /// Caps the transfer at `bytes_per_second`; `None` removes the cap.
    #[must_use]
    pub const fn bandwidth_limit(mut self, bytes_per_second: Option<u64>) -> Self {
        self.config.bandwidth_limit = bytes_per_second;
        self
    }

    /// Sets the limiter burst size in bytes.
    #[must_use]
    pub const fn bandwidth_burst(mut self, burst: Option<u64>) -> Self {
        self.config.bandwidth_burst = burst;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<TransferConfig, TransferError> {
        self.config.engine_params()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.buffer_capacity(), 1_000_000);
        assert_eq!(config.quality(), 90);
        assert_eq!(config.mode(), Mode::Decompress);
        assert_eq!(config.algorithm(), CompressionAlgorithm::Zlib);
        assert!(config.build_limiter().is_none());
    }

    #[test]
    fn builder_clamps_tiny_buffers() {
        let config = TransferConfig::builder()
            .buffer_capacity(1)
            .build()
            .expect("config");
        assert_eq!(config.buffer_capacity(), 2);
    }

    #[test]
    fn quality_above_100_is_a_usage_error() {
        let error = TransferConfig::builder().quality(101).build().unwrap_err();
        assert!(matches!(error, TransferError::Config(_)));
        assert_eq!(error.class(), crate::FailureClass::Usage);
    }

    #[test]
    fn limiter_uses_configured_rate() {
        let config = TransferConfig::builder()
            .bandwidth_limit(Some(64 * 1024))
            .build()
            .expect("config");
        let limiter = config.build_limiter().expect("limiter");
        assert_eq!(limiter.limit_bytes().get(), 64 * 1024);

        let unlimited = TransferConfig::builder()
            .bandwidth_limit(Some(0))
            .build()
            .expect("config");
        assert!(unlimited.build_limiter().is_none());
    }

    #[test]
    fn builds_engine_in_configured_mode() {
        let engine = TransferConfig::builder()
            .mode(Mode::Compress)
            .quality(95)
            .build()
            .expect("config")
            .build_engine()
            .expect("engine");
        assert_eq!(engine.mode(), Mode::Compress);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let config = TransferConfig::builder()
            .mode(Mode::Compress)
            .quality(40)
            .bandwidth_limit(Some(2048))
            .build()
            .expect("config");
        let json = serde_json::to_string(&config).expect("serialize");
        let restored: TransferConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, config);

        let partial: TransferConfig = serde_json::from_str(r#"{"quality":10}"#).expect("partial");
        assert_eq!(partial.quality(), 10);
        assert_eq!(partial.buffer_capacity(), DEFAULT_BUFFER_CAPACITY);
    }
}
