//! Engine configuration
//!
//! Limits and defaults that apply to every evaluation run performed by a
//! [`CqlEngine`](crate::CqlEngine).
//!
//! ```rust
//! use cqlpath_eval::EngineConfig;
//!
//! let config = EngineConfig::default()
//!     .with_max_recursion_depth(128)
//!     .with_definition_cache(false);
//! assert_eq!(config.max_recursion_depth, 128);
//! ```

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum nesting of `evaluate` calls before `StackOverflow` is raised.
    /// Default: 64
    pub max_recursion_depth: usize,

    /// Maximum number of points `expand` may materialise. Default: 100 000
    pub max_expansion_size: usize,

    /// Offset, in minutes east of UTC, of the evaluation clock when the
    /// context does not fix one. Default: 0
    pub default_timezone_offset: i32,

    /// Cache definition results per context. Cycle detection stays active
    /// when disabled. Default: true
    pub enable_definition_cache: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_max_expansion_size(mut self, size: usize) -> Self {
        self.max_expansion_size = size;
        self
    }

    /// Set the default clock offset in minutes
    pub fn with_timezone_offset(mut self, minutes: i32) -> Self {
        self.default_timezone_offset = minutes;
        self
    }

    pub fn with_definition_cache(mut self, enabled: bool) -> Self {
        self.enable_definition_cache = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 64,
            max_expansion_size: 100_000,
            default_timezone_offset: 0,
            enable_definition_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_recursion_depth, 64);
        assert_eq!(config.max_expansion_size, 100_000);
        assert_eq!(config.default_timezone_offset, 0);
        assert!(config.enable_definition_cache);
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::new()
            .with_max_recursion_depth(32)
            .with_max_expansion_size(10)
            .with_timezone_offset(-300)
            .with_definition_cache(false);
        assert_eq!(config.max_recursion_depth, 32);
        assert_eq!(config.max_expansion_size, 10);
        assert_eq!(config.default_timezone_offset, -300);
        assert!(!config.enable_definition_cache);
    }
}
