//! Configuration types for a [`Context`](crate::Context).
//!
//! A pairing engine is configured once: the curve to initialize, the
//! serialization format, the hash-to-curve flavour and the two
//! order-verification flags. They are plain serde-derived data so a context
//! can be described in a config file.
//!
//! # Example
//!
//! ```rust
//! use pairing_arena::{ContextConfig, CurveId, SerializationMode};
//!
//! let config = ContextConfig {
//!     serialization: SerializationMode::Ethereum,
//!     ..ContextConfig::new(CurveId::Bls12_381)
//! };
//! config.validate().expect("valid config");
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Error};

/// Default size of the engine's linear memory.
pub const DEFAULT_MEMORY_SIZE: usize = 2 * 1024 * 1024;

/// Heap bytes a context keeps free below the stack region, enough for a few
/// precomputed `G2` tables.
pub const MIN_HEAP_SIZE: usize = 64 * 1024;

/// Default size of the per-call stack region inside engine memory.
pub const DEFAULT_STACK_SIZE: usize = 512 * 1024;

/// Smallest stack region a context accepts. One region must at least hold a
/// handful of `Gt` operands.
pub const MIN_STACK_SIZE: usize = 4 * 1024;

/// Supported pairing-friendly elliptic curves.
///
/// - **BLS12-381**: A 381-bit curve providing ~128 bits of security.
/// - **BN254**: A 254-bit curve providing ~100 bits of security. Reserved for
///   engines that implement it; the bundled arkworks engine rejects it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CurveId {
    /// BN254 curve (~100-bit security)
    Bn254,
    /// BLS12-381 curve (~128-bit security, recommended)
    Bls12_381,
}

impl CurveId {
    pub fn name(self) -> &'static str {
        match self {
            CurveId::Bn254 => "bn254",
            CurveId::Bls12_381 => "bls12-381",
        }
    }
}

/// Byte format used by `serialize`/`deserialize`.
///
/// | Mode       | `Fr`/`Fp`     | `Fp2`             | points     |
/// |------------|---------------|-------------------|------------|
/// | `Standard` | little-endian | `a ‖ b`           | compressed |
/// | `Ethereum` | big-endian    | `be(b) ‖ be(a)`   | compressed |
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SerializationMode {
    #[default]
    Standard,
    Ethereum,
}

/// How `set_hash_of` maps a message onto `G1`/`G2`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum MapToMode {
    /// Hash the message into `Fp` (or `Fp2` with a zero second half) and map
    /// the result onto the curve.
    #[default]
    Legacy,
    /// IETF hash-to-curve with the BLS signature domain separation tags.
    HashToCurve,
}

/// Everything a context fixes at construction time.
///
/// `serialization`, `map_to` and the verify flags can still be changed on a
/// live context through its `&mut self` setters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// The pairing-friendly curve the engine is initialized with
    pub curve: CurveId,
    #[serde(default)]
    pub serialization: SerializationMode,
    #[serde(default)]
    pub map_to: MapToMode,
    /// Require subgroup membership when validating/deserializing `G1` points
    #[serde(default)]
    pub verify_order_g1: bool,
    /// Require subgroup membership when validating/deserializing `G2` points
    #[serde(default)]
    pub verify_order_g2: bool,
    /// Bytes of engine linear memory, heap and stack regions together
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
    /// Bytes of engine memory reserved for per-call marshaling
    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
}

fn default_memory_size() -> usize {
    DEFAULT_MEMORY_SIZE
}

fn default_stack_size() -> usize {
    DEFAULT_STACK_SIZE
}

impl ContextConfig {
    /// Default configuration for `curve`.
    pub fn new(curve: CurveId) -> Self {
        Self {
            curve,
            serialization: SerializationMode::default(),
            map_to: MapToMode::default(),
            verify_order_g1: false,
            verify_order_g2: false,
            memory_size: DEFAULT_MEMORY_SIZE,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Validates the configuration.
    ///
    /// This checks that the stack region is large enough, that both sizes are
    /// 8-byte aligned and that the memory leaves at least [`MIN_HEAP_SIZE`]
    /// bytes of heap below the stack. Whether the curve is available is
    /// decided by the engine at initialization.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pairing_arena::{ContextConfig, CurveId};
    ///
    /// let config = ContextConfig { stack_size: 12, ..ContextConfig::new(CurveId::Bls12_381) };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), Error> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "stack region of {} bytes is below the minimum of {MIN_STACK_SIZE}",
                self.stack_size
            )));
        }
        if self.stack_size % 8 != 0 {
            return Err(Error::InvalidConfig(
                "stack region size must be a multiple of 8".into(),
            ));
        }
        if self.memory_size % 8 != 0 {
            return Err(Error::InvalidConfig(
                "engine memory size must be a multiple of 8".into(),
            ));
        }
        let heap = self.memory_size.saturating_sub(self.stack_size);
        if heap < MIN_HEAP_SIZE {
            return Err(Error::InvalidConfig(format!(
                "{} bytes of engine memory leave {heap} bytes of heap next to a {} byte stack, \
                 below the minimum of {MIN_HEAP_SIZE}",
                self.memory_size, self.stack_size
            )));
        }
        Ok(())
    }

    /// Checks the configured curve against the curves an engine provides.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pairing_arena::{ContextConfig, CurveId};
    ///
    /// let config = ContextConfig::new(CurveId::Bn254);
    /// assert!(config.ensure_supported(&[CurveId::Bls12_381]).is_err());
    /// ```
    pub fn ensure_supported(&self, available: &[CurveId]) -> Result<(), Error> {
        if available.contains(&self.curve) {
            Ok(())
        } else {
            Err(EngineError::UnsupportedCurve(self.curve.name()).into())
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new(CurveId::Bls12_381)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_standard_and_unverified() {
        let config = ContextConfig::default();
        assert_eq!(config.curve, CurveId::Bls12_381);
        assert_eq!(config.serialization, SerializationMode::Standard);
        assert_eq!(config.map_to, MapToMode::Legacy);
        assert!(!config.verify_order_g1 && !config.verify_order_g2);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_small_or_unaligned_stack() {
        let mut config = ContextConfig::default();
        config.stack_size = 1024;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        config.stack_size = MIN_STACK_SIZE + 4;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn memory_must_leave_room_for_the_heap() {
        let mut config = ContextConfig::default();
        config.memory_size = config.stack_size;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        config.memory_size = config.stack_size + MIN_HEAP_SIZE + 4;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        config.memory_size = config.stack_size + MIN_HEAP_SIZE;
        config.validate().unwrap();
        config.memory_size = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unsupported_curve_is_an_engine_error() {
        let config = ContextConfig::new(CurveId::Bn254);
        assert!(matches!(
            config.ensure_supported(&[CurveId::Bls12_381]),
            Err(Error::Engine(EngineError::UnsupportedCurve("bn254")))
        ));
        config.ensure_supported(&[CurveId::Bn254]).unwrap();
    }

    #[test]
    fn json_fills_missing_fields() {
        let config: ContextConfig =
            serde_json::from_str(r#"{"curve":"Bls12_381","map_to":"HashToCurve"}"#).unwrap();
        assert_eq!(config.map_to, MapToMode::HashToCurve);
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(config.memory_size, DEFAULT_MEMORY_SIZE);

        let text = serde_json::to_string(&config).unwrap();
        let back: ContextConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
