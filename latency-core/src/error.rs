use thiserror::Error;

/// Échec d'un appel vers une source de latence amont
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Violation des invariants d'une arête (indices hors catalogue, boucle)
#[derive(Debug, Error, PartialEq)]
pub enum EdgeError {
    #[error("host index {index} out of range (catalog has {host_count} hosts)")]
    IndexOutOfRange { index: usize, host_count: usize },
    #[error("edge {0} -> {0} loops on itself")]
    SelfLoop(usize),
}

#[derive(Debug, Error, PartialEq)]
pub enum ViewError {
    #[error("unknown host: {0}")]
    UnknownHost(String),
    #[error("invalid pair {0} -> {1}")]
    InvalidPair(usize, usize),
}
