// THEORY:
// Decoding is all-or-nothing. Any error raised here aborts the decode and no
// partial graph is ever published. Evaluation has no error type at all: a graph
// that survived decoding is well-formed by construction, so `StepEngine` is a
// total function over it.

use thiserror::Error;

/// Everything that can stop an image from becoming a `WireGraph`.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A traversal reached a neighbour or turn configuration the tracer does not
    /// define. The coordinates are interior image coordinates (no border).
    #[error("invalid wire topology at ({x}, {y}): {reason}")]
    InvalidTopology { x: u32, y: u32, reason: &'static str },

    /// Dimensions or channel layout the classifier cannot interpret.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// A `DecoderConfig` value outside its legal range.
    #[error("invalid decoder configuration: {0}")]
    InvalidConfig(String),

    /// The decode was cancelled between two yield points.
    #[error("decode cancelled")]
    Cancelled,

    /// The background decode task died before producing a result.
    #[error("decode worker failed: {0}")]
    Worker(String),

    /// Loading or saving an image through the `image` crate failed.
    #[error("image i/o failed: {0}")]
    Image(#[from] image::ImageError),
}

impl DecodeError {
    pub(crate) fn topology(x: u32, y: u32, reason: &'static str) -> Self {
        DecodeError::InvalidTopology { x, y, reason }
    }
}
