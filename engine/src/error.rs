//! Error types for the mirror engine.

use thiserror::Error;

/// All possible errors from the mirror engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Pager input errors
    #[error("`{0}` must be a finite integer")]
    NotFiniteInteger(String),

    #[error("`pageSize` must be >= 1")]
    InvalidPageSize,

    #[error("`firstPage` must be 0 or 1, got {0}")]
    InvalidFirstPage(usize),

    #[error("`currentPage` must be firstPage <= currentPage {bound} totalPages if {first_page}-based, got {page}")]
    PageOutOfRange {
        page: usize,
        first_page: usize,
        bound: &'static str,
    },

    #[error("no page before page {0}")]
    NoPreviousPage(usize),

    #[error("last page is unknown until the total record count is known")]
    UnknownLastPage,

    #[error("no link found for page {0}")]
    MissingLink(usize),

    #[error("`mode` must be one of \"server\", \"client\" or \"infinite\", got {0:?}")]
    InvalidMode(String),

    #[error("`order` must be one of \"ascending\", \"descending\" or \"none\", got {0:?}")]
    InvalidOrder(String),

    #[error("malformed server state: {0}")]
    MalformedState(String),

    // Collection errors
    #[error("cannot sort a collection without a comparator")]
    NoComparator,

    // Synchronization errors
    #[error("no transport configured")]
    NoTransport,

    #[error("no url configured")]
    MissingUrl,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Why a set of attributes was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("{0}")]
    Rejected(String),
}

/// A failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// Status code reported by the remote side, when there is one
    pub status: Option<u16>,
    /// Human readable description
    pub message: String,
}

impl TransportError {
    /// Create an error without a status code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Create an error carrying a remote status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
