/// Error taxonomy, by category rather than by concrete type. The HTTP
/// dispatcher is the single "catch" site (§7): it picks a status code from
/// the kind alone, never from string matching on `context`.
#[derive(Debug)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    InvalidArgument,
    Internal,
    InvalidInput,
    OutOfMemory,
    InvalidState,
    UnsupportedQuery,

    /// Malformed request, unknown field, wrong type. HTTP 400.
    Client,
    /// Strict schema refused auto-detection for an untyped field. HTTP 412.
    MissingType,
    /// Deadline exceeded while waiting on a pool queue or socket. HTTP 408.
    TimeOut,
    /// Bytes → value failed; usually an internal bug. HTTP 500.
    Serialisation,
    /// Underlying index library failed after exhausting retries. HTTP 500.
    Database,
    /// Value cannot be coerced to the field's frozen concrete type. HTTP 400.
    Cast,
    /// Pool refused the checkout (finished, or backpressure cap hit). HTTP 503.
    Unavailable,
}

#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
    status_override: Option<u16>,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context, status_override: None }
    }

    /// Pin the HTTP status to an exact code regardless of `kind` — used by
    /// the dispatcher for statuses the taxonomy doesn't otherwise produce
    /// (406, 405, 501).
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_override = Some(status);
        self
    }

    pub fn client(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Client, context.into())
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context.into())
    }

    pub fn missing_type(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::MissingType, context.into())
    }

    pub fn timeout(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::TimeOut, context.into())
    }

    pub fn cast(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Cast, context.into())
    }

    pub fn database(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Database, context.into())
    }

    pub fn unavailable(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Unavailable, context.into())
    }

    /// HTTP status this error maps to, per the status policy in §7/§4.5.
    pub fn http_status(&self) -> u16 {
        if let Some(status) = self.status_override {
            return status;
        }
        match self.kind {
            ErrorKind::Client
            | ErrorKind::Parse
            | ErrorKind::InvalidArgument
            | ErrorKind::InvalidInput
            | ErrorKind::Cast
            | ErrorKind::UnsupportedQuery => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::MissingType => 412,
            ErrorKind::TimeOut => 408,
            ErrorKind::Unavailable => 503,
            ErrorKind::Serialisation
            | ErrorKind::Database
            | ErrorKind::Io
            | ErrorKind::Internal
            | ErrorKind::OutOfMemory
            | ErrorKind::InvalidState => 500,
        }
    }

    /// Whether this error category is retriable by DatabaseHandler (§4.1).
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, ErrorKind::Database | ErrorKind::Io)
    }

    /// Client-caused errors log at `info`; everything else needs a
    /// traceback at `error`, per §7 propagation rules.
    pub fn is_client_caused(&self) -> bool {
        self.http_status() < 500
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
            status_override: None,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
            status_override: None,
        }
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error {
            kind: ErrorKind::Internal,
            context: format!("FST error: {}", err),
            status_override: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Serialisation,
            context: err.to_string(),
            status_override: None,
        }
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Error {
            kind: ErrorKind::Serialisation,
            context: err.to_string(),
            status_override: None,
        }
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Error {
            kind: ErrorKind::Serialisation,
            context: err.to_string(),
            status_override: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(Error::client("bad").http_status(), 400);
        assert_eq!(Error::not_found("missing").http_status(), 404);
        assert_eq!(Error::missing_type("strict").http_status(), 412);
        assert_eq!(Error::timeout("slow").http_status(), 408);
        assert_eq!(Error::unavailable("busy").http_status(), 503);
        assert_eq!(Error::database("xapian").http_status(), 500);
        assert_eq!(Error::cast("oops").http_status(), 400);
    }

    #[test]
    fn only_database_and_io_are_retriable() {
        assert!(Error::database("x").is_retriable());
        assert!(!Error::client("x").is_retriable());
        assert!(!Error::cast("x").is_retriable());
    }
}
