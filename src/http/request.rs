//! `Request` (spec.md §3) and the incremental HTTP head parser behind it
//! (spec.md §4.5 "Parsing is incremental via a streaming HTTP parser with
//! callbacks" / §9 "named parser states, not magic numbers"). One
//! `IncrementalParser` lives per connection and folds any number of bytes
//! fed to it into zero or more complete `Request`s, so that two pipelined
//! requests arriving in a single `read()` both surface in one `feed` call,
//! in order (spec.md §5 "Within a connection: request order == response
//! order").

use std::time::Instant;

use crate::core::error::{Error, Result};
use crate::http::negotiation::{
    negotiate_encoding, parse_accept, parse_accept_encoding, pretty_level, AcceptEntry, Encoding,
};

/// Named parser states (spec.md §9 open question: the original compares
/// `p->state` against raw `http_parser` integers; this crate never does).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    MessageBegin,
    Head,
    Body,
    MessageComplete,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Merge,
    Store,
    Delete,
    Options,
}

impl Method {
    fn parse(raw: &str) -> Option<Method> {
        match raw {
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "PATCH" => Some(Method::Patch),
            "MERGE" => Some(Method::Merge),
            "STORE" => Some(Method::Store),
            "DELETE" => Some(Method::Delete),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }
}

/// A fully parsed request (spec.md §3 "Per-HTTP transaction state"). Body
/// decoding (JSON/MsgPack → `serde_json::Value`) is deliberately left to
/// the dispatcher — this struct only carries the raw bytes plus enough
/// negotiated metadata to pick a decoder.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub raw_target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,

    pub accept: Vec<AcceptEntry>,
    pub accept_encoding: Vec<(Encoding, f32)>,
    pub pretty_requested: bool,
    pub expect_continue: bool,

    /// §3 "begins/received/processing/ready/ends" lifecycle timestamps,
    /// recorded by the dispatcher as the request moves through its stages.
    pub begins: Instant,
    pub received: Option<Instant>,
    pub processing: Option<Instant>,
    pub ready: Option<Instant>,
    pub ends: Option<Instant>,
}

impl Request {
    /// Content-negotiated response MIME type, honoring `Accept`.
    pub fn negotiated_content_type(&self) -> Option<&'static str> {
        crate::http::negotiation::negotiate_content_type(&self.accept)
    }

    pub fn negotiated_encoding(&self) -> Option<Encoding> {
        negotiate_encoding(&self.accept_encoding)
    }

    /// Pretty-print indent level from `?pretty` or an `Accept; indent=N`
    /// parameter (spec.md §4.5 "Pretty-printing").
    pub fn pretty_level(&self) -> u8 {
        let indent_param = self.accept.iter().find_map(|a| a.indent);
        pretty_level(self.pretty_requested || self.raw_target.contains("pretty"), indent_param)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Effective method after applying `X-HTTP-Method-Override` /
    /// `HTTP-Method-Override` on a POST (spec.md §4.5).
    pub fn effective_method(&self) -> Method {
        if self.method != Method::Post {
            return self.method;
        }
        self.header("X-HTTP-Method-Override")
            .or_else(|| self.header("HTTP-Method-Override"))
            .and_then(|raw| Method::parse(&raw.to_ascii_uppercase()))
            .unwrap_or(Method::Post)
    }

    pub fn mark_received(&mut self, at: Instant) {
        self.received = Some(at);
    }

    pub fn mark_processing(&mut self, at: Instant) {
        self.processing = Some(at);
    }

    pub fn mark_ready(&mut self, at: Instant) {
        self.ready = Some(at);
    }

    pub fn mark_ends(&mut self, at: Instant) {
        self.ends = Some(at);
    }
}

struct PendingHead {
    method: Method,
    raw_target: String,
    headers: Vec<(String, String)>,
    content_length: usize,
}

/// Per-connection incremental parser. Owns the unconsumed byte buffer and
/// whichever head has been parsed but whose body isn't fully buffered yet.
pub struct IncrementalParser {
    state: ParserState,
    buffer: Vec<u8>,
    pending: Option<PendingHead>,
}

impl IncrementalParser {
    pub fn new() -> Self {
        IncrementalParser {
            state: ParserState::MessageBegin,
            buffer: Vec::new(),
            pending: None,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn mark_dead(&mut self) {
        self.state = ParserState::Dead;
    }

    /// Feed newly read bytes and drain as many complete requests as the
    /// buffer now contains, in arrival order (spec.md §4.5 "the worker
    /// maintains a FIFO of parsed requests").
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Request>> {
        if self.state == ParserState::Dead {
            return Err(Error::client("parser fed after reaching the dead state"));
        }
        self.buffer.extend_from_slice(bytes);
        let mut completed = Vec::new();

        loop {
            if self.pending.is_none() {
                self.state = ParserState::Head;
                match try_parse_head(&self.buffer)? {
                    Some((head, consumed)) => {
                        self.buffer.drain(..consumed);
                        self.pending = Some(head);
                        self.state = ParserState::Body;
                    }
                    None => break,
                }
            }

            let content_length = self.pending.as_ref().unwrap().content_length;
            if self.buffer.len() < content_length {
                break;
            }

            let head = self.pending.take().unwrap();
            let body: Vec<u8> = self.buffer.drain(..content_length).collect();
            self.state = ParserState::MessageComplete;

            let accept = head
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("Accept"))
                .map(|(_, v)| parse_accept(v))
                .unwrap_or_default();
            let accept_encoding = head
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("Accept-Encoding"))
                .map(|(_, v)| parse_accept_encoding(v))
                .unwrap_or_default();
            let expect_continue = head
                .headers
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case("Expect") && v.eq_ignore_ascii_case("100-continue"));
            let pretty_requested = head.raw_target.contains("pretty");

            completed.push(Request {
                method: head.method,
                raw_target: head.raw_target,
                headers: head.headers,
                body,
                accept,
                accept_encoding,
                pretty_requested,
                expect_continue,
                begins: Instant::now(),
                received: None,
                processing: None,
                ready: None,
                ends: None,
            });

            self.state = ParserState::MessageBegin;
        }

        Ok(completed)
    }
}

impl Default for IncrementalParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one request head (request line + headers) out of `buf` via
/// `httparse`, returning `(head, bytes_consumed)` or `None` if the buffer
/// doesn't hold a complete head yet.
fn try_parse_head(buf: &[u8]) -> Result<Option<(PendingHead, usize)>> {
    let mut raw_headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut raw_headers);
    let status = req
        .parse(buf)
        .map_err(|e| Error::client(format!("malformed HTTP request head: {e}")))?;

    let consumed = match status {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Ok(None),
    };

    let method_raw = req.method.ok_or_else(|| Error::client("missing HTTP method"))?;
    let method = Method::parse(method_raw).ok_or_else(|| Error::new(
        crate::core::error::ErrorKind::InvalidArgument,
        format!("unrecognized HTTP method '{method_raw}'"),
    ))?;
    let raw_target = req.path.ok_or_else(|| Error::client("missing request target"))?.to_string();

    let mut headers = Vec::with_capacity(req.headers.len());
    let mut content_length = 0usize;
    for h in req.headers.iter() {
        let name = h.name.to_string();
        let value = String::from_utf8_lossy(h.value).into_owned();
        if name.eq_ignore_ascii_case("Content-Length") {
            content_length = value.trim().parse().unwrap_or(0);
        }
        headers.push((name, value));
    }

    Ok(Some((
        PendingHead { method, raw_target, headers, content_length },
        consumed,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_complete_request() {
        let mut parser = IncrementalParser::new();
        let raw = b"GET /twitter/_search HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n";
        let reqs = parser.feed(raw).unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, Method::Get);
        assert_eq!(reqs[0].raw_target, "/twitter/_search");
    }

    #[test]
    fn waits_for_full_body_before_completing() {
        let mut parser = IncrementalParser::new();
        let head = b"POST /twitter/1 HTTP/1.1\r\nContent-Length: 10\r\n\r\n";
        let reqs = parser.feed(head).unwrap();
        assert!(reqs.is_empty());
        assert_eq!(parser.state(), ParserState::Body);

        let reqs = parser.feed(b"0123456789").unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].body, b"0123456789");
    }

    #[test]
    fn two_pipelined_requests_in_one_feed_both_surface_in_order() {
        let mut parser = IncrementalParser::new();
        let raw = b"GET /a/1 HTTP/1.1\r\nContent-Length: 0\r\n\r\nGET /a/2 HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let reqs = parser.feed(raw).unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].raw_target, "/a/1");
        assert_eq!(reqs[1].raw_target, "/a/2");
    }

    #[test]
    fn method_override_header_rewrites_post() {
        let mut parser = IncrementalParser::new();
        let raw = b"POST /a/1 HTTP/1.1\r\nX-HTTP-Method-Override: DELETE\r\nContent-Length: 0\r\n\r\n";
        let reqs = parser.feed(raw).unwrap();
        assert_eq!(reqs[0].effective_method(), Method::Delete);
    }

    #[test]
    fn expect_continue_header_is_detected() {
        let mut parser = IncrementalParser::new();
        let raw = b"PUT /a/1 HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 0\r\n\r\n";
        let reqs = parser.feed(raw).unwrap();
        assert!(reqs[0].expect_continue);
    }
}
