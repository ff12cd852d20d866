use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use rand_distr::uniform::Error as UniformError;

/// The result type used across the crate.
pub type Result<T> = std::result::Result<T, FmErr>;

/// The crate's error type.
///
/// Every variant but `Io` signals a caller bug (bad configuration or a broken
/// precondition), not a condition worth retrying.
#[derive(Debug)]
pub enum FmErr {
    InvalidConfig {
        key: &'static str,
        reason: String,
    },
    MalformedConfig(serde_json::Error),
    InvalidDistribution(String),
    InvalidGroupBits {
        bits: u32,
        max: u32,
    },
    TagOutOfRange {
        tag: u64,
        bits: u32,
    },
    ZeroPartitions {
        tag: u64,
    },
    EmptySegment {
        tag: u64,
        idx: usize,
        parts: usize,
    },
    InvalidBlock {
        idx: usize,
        begin: u64,
        end: u64,
    },
    OverlappingBlocks {
        idx: usize,
        end: u64,
        next_begin: u64,
    },
    InvalidRowBlock(String),
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidLength {
        idx: usize,
        got: usize,
    },
    Io(io::Error),
}

impl Display for FmErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FmErr::InvalidConfig { key, reason } => {
                write!(f, "invalid configuration for `{key}`: {reason}")
            }
            FmErr::MalformedConfig(e) => write!(f, "malformed configuration: {e}"),
            FmErr::InvalidDistribution(reason) => {
                write!(f, "invalid initialization distribution: {reason}")
            }
            FmErr::InvalidGroupBits { bits, max } => write!(
                f,
                "feature group bits must be a multiple of 4 and at most {max}, got {bits}"
            ),
            FmErr::TagOutOfRange { tag, bits } => {
                write!(f, "feature group tag {tag} doesn't fit in {bits} bits")
            }
            FmErr::ZeroPartitions { tag } => {
                write!(f, "feature group {tag} asked for zero partitions")
            }
            FmErr::EmptySegment { tag, idx, parts } => write!(
                f,
                "segment {idx} of {parts} of feature group {tag} is empty, too many partitions"
            ),
            FmErr::InvalidBlock { idx, begin, end } => {
                write!(f, "block {idx} is invalid: begin {begin:#x} > end {end:#x}")
            }
            FmErr::OverlappingBlocks {
                idx,
                end,
                next_begin,
            } => write!(
                f,
                "block {idx} ends at {end:#x} past the next block's begin {next_begin:#x}"
            ),
            FmErr::InvalidRowBlock(reason) => write!(f, "malformed row block: {reason}"),
            FmErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "there's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            FmErr::InvalidLength { idx, got } => {
                write!(f, "feature at position {idx} carries an invalid value count {got}")
            }
            FmErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for FmErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FmErr::Io(e) => Some(e),
            FmErr::MalformedConfig(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FmErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for FmErr {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedConfig(value)
    }
}

impl From<UniformError> for FmErr {
    fn from(value: UniformError) -> Self {
        Self::InvalidDistribution(value.to_string())
    }
}

/// Boundary conversion for transports speaking `io::Result`.
impl From<FmErr> for io::Error {
    fn from(value: FmErr) -> Self {
        match value {
            FmErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
