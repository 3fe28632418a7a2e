use thiserror::Error;

/// Failures raised while turning input records into analysable contigs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContigError {
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Read {read} in contig {contig} has no placement (AF) line")]
    MissingPlacement { contig: String, read: String },

    #[error("Clip of {clip} bases exceeds sequence of length {len} in read {read}")]
    ClipOutOfRange {
        read: String,
        clip: usize,
        len: usize,
    },

    #[error("No minor allele at position {pos} of contig {contig}")]
    DegenerateAllele { contig: String, pos: usize },

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ContigError {
    fn from(err: std::io::Error) -> Self {
        ContigError::Io(err.to_string())
    }
}
