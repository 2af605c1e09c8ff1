use burn::record::RecorderError;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, VaeError>;

/// Errors surfaced by the VAE core and its artifact plumbing.
///
/// Shape and configuration errors are raised eagerly (at construction or on the
/// first offending call) and are never retried. Numeric instability is reported
/// with the offending value so the caller can apply its own stability policy.
#[derive(Debug, Error)]
pub enum VaeError {
    /// Tensor rank or dimension does not match the configured image shape or latent size.
    #[error("shape error: {0}")]
    Shape(String),

    /// A loss scalar (or tensor reduction) came out NaN or infinite.
    #[error("numeric instability in {context}: got {value}")]
    NumericInstability { context: String, value: f64 },

    /// A hyperparameter or generation setting is out of its valid range.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("record error: {0}")]
    Record(#[from] RecorderError),

    #[error("config file error: {0}")]
    ConfigFile(#[from] burn::config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image export error: {0}")]
    Image(#[from] image::ImageError),

    /// Tensor data could not be read back to the host.
    #[error("tensor data error: {0}")]
    TensorData(String),
}

impl VaeError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        VaeError::Shape(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        VaeError::Configuration(msg.into())
    }
}
