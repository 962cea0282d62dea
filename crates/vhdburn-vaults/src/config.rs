//! Classification settings

/// Configuration for classifying an image
#[derive(Debug, Clone, Default)]
pub struct VaultConfig {
    /// Also require the footer disk type to be Dynamic or Differencing
    /// before reporting an image as dynamic.
    ///
    /// Off by default: a verified "cxsparse" header is enough on its own.
    /// Turning it on changes which images count as dynamic.
    pub strict_dynamic: bool,
}
