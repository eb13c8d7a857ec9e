use crate::Channel;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The `WAVEDESC` token was not found anywhere in the input.
    #[error("WAVEDESC descriptor marker not found")]
    MissingMarker,

    /// An enumerated descriptor field holds a code outside its known table.
    #[error("invalid {field} code {code}")]
    InvalidCode { field: &'static str, code: i16 },

    /// Descriptor values that cannot describe a valid waveform.
    #[error("invalid descriptor: {0}")]
    Format(String),

    /// A section ended before its declared length.
    #[error("truncated {section}: expected {expected} bytes, got {actual}")]
    Truncated {
        section: &'static str,
        /// Number of bytes declared by the descriptor
        expected: usize,
        /// Number of bytes actually available
        actual: usize,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("trace must have a channel number")]
    MissingChannel,
    #[error("channel {0} already exists in trace group")]
    DuplicateChannel(Channel),
    #[error("trace group is empty")]
    EmptyGroup,
    #[error("trace group does not contain channel {0}")]
    ChannelNotFound(Channel),

    #[error("traces do not share a common time axis")]
    NoCommonTime,
    #[error("traces do not share a common segment count")]
    SegmentMismatch,
}

pub type Result<T> = std::result::Result<T, Error>;
