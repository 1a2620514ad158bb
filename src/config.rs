//! Configuration for the table codec and the decompiler
//!
//! Both cores work with sensible defaults; the presets below cover the common
//! alternatives.

/// Configuration for reading and writing SLB tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Containers are zero padded to a multiple of this many bytes after writing (default: 4)
    pub footer_alignment: u64,

    /// Treat a duplicated list count that disagrees with the first copy as malformed input
    /// When disabled a warning is logged and the first copy wins
    pub strict_duplicate_counts: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            footer_alignment: 4,
            strict_duplicate_counts: false,
        }
    }
}

impl CodecConfig {
    /// Creates a configuration that rejects inconsistent duplicated counts
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_duplicate_counts: true,
            ..Self::default()
        }
    }
}

/// Configuration for bytecode decompilation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct DecompilerConfig {
    /// Fold reconstructed blocks into `if`, `if`/`else` and `while` statements
    /// When disabled the reconstructed graph is returned unreduced
    pub enable_folding: bool,

    /// Also fold branches whose body sits on the false edge, negating the condition
    pub fold_inverted_if: bool,

    /// Drop blocks that cannot be reached from the entry point before reconstruction
    pub prune_unreachable: bool,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            enable_folding: true,
            fold_inverted_if: true,
            prune_unreachable: true,
        }
    }
}

impl DecompilerConfig {
    /// Creates a configuration that only rebuilds statements per block
    ///
    /// Useful for inspecting the block structure a fold gets stuck on.
    #[must_use]
    pub fn raw() -> Self {
        Self {
            enable_folding: false,
            fold_inverted_if: false,
            prune_unreachable: true,
        }
    }

    /// Creates a configuration that folds only the patterns the compiler emits directly
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            fold_inverted_if: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_config_presets() {
        let default = CodecConfig::default();
        assert_eq!(default.footer_alignment, 4);
        assert!(!default.strict_duplicate_counts);

        let strict = CodecConfig::strict();
        assert_eq!(strict.footer_alignment, 4);
        assert!(strict.strict_duplicate_counts);
    }

    #[test]
    fn test_decompiler_config_presets() {
        let default = DecompilerConfig::default();
        assert!(default.enable_folding);
        assert!(default.fold_inverted_if);
        assert!(default.prune_unreachable);

        let raw = DecompilerConfig::raw();
        assert!(!raw.enable_folding);
        assert!(raw.prune_unreachable);

        let conservative = DecompilerConfig::conservative();
        assert!(conservative.enable_folding);
        assert!(!conservative.fold_inverted_if);
    }
}
