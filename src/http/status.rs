//! HTTP status policy (spec.md §4.5 "Status policy"). `core::error::Error`
//! already maps its taxonomy to a status via `http_status()`; this module
//! covers the statuses that don't come from an `Error` at all — success
//! codes, 406/405/501, and the 100-continue handshake.

/// 201 for document creation, 200 for everything else that succeeds with a
/// body, 204 for a success with no body (spec.md "200/201/204 for success").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessStatus {
    Ok,
    Created,
    NoContent,
}

impl SuccessStatus {
    pub fn code(self) -> u16 {
        match self {
            SuccessStatus::Ok => 200,
            SuccessStatus::Created => 201,
            SuccessStatus::NoContent => 204,
        }
    }
}

/// 406: neither the `Accept` nor `Accept-Encoding` negotiation produced an
/// acceptable match (spec.md "406 when no acceptable content or encoding").
pub const NOT_ACCEPTABLE: u16 = 406;
/// 501: the dispatcher received a method it has never heard of at all, as
/// opposed to one that's simply not wired to this command (405).
pub const NOT_IMPLEMENTED: u16 = 501;
/// 405: method understood, but not allowed for the resolved `Command`
/// (spec.md "405 on method-not-allowed-for-command").
pub const METHOD_NOT_ALLOWED: u16 = 405;
/// Informational continue response to an `Expect: 100-continue` request
/// header (spec.md "100-continue on `Expect: 100-continue`").
pub const CONTINUE: u16 = 100;

pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        412 => "Precondition Failed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_statuses_map_to_the_right_code() {
        assert_eq!(SuccessStatus::Ok.code(), 200);
        assert_eq!(SuccessStatus::Created.code(), 201);
        assert_eq!(SuccessStatus::NoContent.code(), 204);
    }

    #[test]
    fn reason_phrase_covers_every_status_this_dispatcher_emits() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(404), "Not Found");
        assert_eq!(reason_phrase(999), "Unknown");
    }
}
