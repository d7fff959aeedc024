use crate::RingError;

/// Configuration for a ring buffer and its sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of slots; must be a positive power of two (default: 64K)
    pub buffer_size: usize,
}

impl Config {
    /// Creates a configuration with an explicit slot count.
    ///
    /// The size is checked by [`validate`](Self::validate) when the sequencer
    /// is built, not here, so this stays usable in `const` context.
    pub const fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Creates a configuration with `1 << ring_bits` slots.
    pub const fn with_ring_bits(ring_bits: u8) -> Self {
        Self {
            buffer_size: 1 << ring_bits,
        }
    }

    /// Fails fast on a zero or non-power-of-two size. Never rounds.
    pub fn validate(&self) -> Result<(), RingError> {
        if self.buffer_size == 0 || !self.buffer_size.is_power_of_two() {
            return Err(RingError::InvalidBufferSize(self.buffer_size));
        }
        if i64::try_from(self.buffer_size).is_err() {
            return Err(RingError::InvalidBufferSize(self.buffer_size));
        }
        Ok(())
    }

    /// Returns the mask for index wrapping.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.buffer_size - 1
    }

    /// log2 of the buffer size; a sequence shifted right by this is its lap.
    #[inline]
    pub const fn index_shift(&self) -> u32 {
        self.buffer_size.trailing_zeros()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_ring_bits(16)
    }
}

/// Low latency configuration (4K slots, fits in L1 cache for small events)
pub const LOW_LATENCY_CONFIG: Config = Config::with_ring_bits(12);

/// High throughput configuration (256K slots)
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::with_ring_bits(18);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(Config::new(1).validate().is_ok());
        assert!(Config::new(1024).validate().is_ok());
        assert!(matches!(
            Config::new(0).validate(),
            Err(RingError::InvalidBufferSize(0))
        ));
        assert!(matches!(
            Config::new(1023).validate(),
            Err(RingError::InvalidBufferSize(1023))
        ));
    }

    #[test]
    fn test_config_derived_values() {
        let config = Config::new(8);
        assert_eq!(config.mask(), 7);
        assert_eq!(config.index_shift(), 3);
        assert_eq!(Config::default().buffer_size, 65_536);
        assert_eq!(LOW_LATENCY_CONFIG.buffer_size, 4_096);
        assert_eq!(HIGH_THROUGHPUT_CONFIG.buffer_size, 262_144);
    }
}
