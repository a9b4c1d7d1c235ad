//! `Response` envelope and serialization (spec.md §6 "Response envelope" /
//! §4.5 "Content negotiation" / "Encoding negotiation" / streaming). The
//! envelope is a hash with `#`-prefixed top-level keys; it serializes to
//! whichever of JSON/MsgPack/plain-text the request negotiated, optionally
//! gzip/deflate-compressed, and — for large hit sets — as a head/hits/tail
//! chunk sequence instead of one buffered body.

use bytes::Bytes;
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use serde::Serialize;
use std::io::Write;

use crate::core::error::Result;
use crate::http::negotiation::Encoding;

/// The envelope (spec.md §6 "Response envelope"): every key a response can
/// carry, all optional except `#status`. `#query`/`#aggregations` are only
/// present on search responses; `#docid`/`#document_info` on document
/// operations; `#database_info`/`#cluster_name`/`#nodes`/`#versions` on the
/// info/nodes/metrics family.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Envelope {
    #[serde(rename = "#status")]
    pub status: u16,
    #[serde(rename = "#message", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "#took", skip_serializing_if = "Option::is_none")]
    pub took_ms: Option<u64>,
    #[serde(rename = "#query", skip_serializing_if = "Option::is_none")]
    pub query: Option<QuerySection>,
    #[serde(rename = "#aggregations", skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<serde_json::Value>,
    #[serde(rename = "#endpoint", skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<serde_json::Value>,
    #[serde(rename = "#commit", skip_serializing_if = "Option::is_none")]
    pub commit: Option<bool>,
    #[serde(rename = "#docid", skip_serializing_if = "Option::is_none")]
    pub docid: Option<u64>,
    #[serde(rename = "#document_info", skip_serializing_if = "Option::is_none")]
    pub document_info: Option<serde_json::Value>,
    #[serde(rename = "#database_info", skip_serializing_if = "Option::is_none")]
    pub database_info: Option<serde_json::Value>,
    #[serde(rename = "#cluster_name", skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(rename = "#nodes", skip_serializing_if = "Option::is_none")]
    pub nodes: Option<serde_json::Value>,
    #[serde(rename = "#versions", skip_serializing_if = "Option::is_none")]
    pub versions: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuerySection {
    #[serde(rename = "#total_count")]
    pub total_count: usize,
    #[serde(rename = "#matches_estimated")]
    pub matches_estimated: usize,
    #[serde(rename = "#hits")]
    pub hits: Vec<serde_json::Value>,
}

impl Envelope {
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Envelope {
            status,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn ok(status: u16) -> Self {
        Envelope { status, ..Default::default() }
    }
}

/// Serialize `envelope` to the negotiated wire format. `pretty` is the
/// indent level (0 = compact) for JSON; MsgPack and plain-text ignore it
/// (spec.md §4.5 "Pretty-printing" only documents it for JSON).
pub fn serialize_body(envelope: &Envelope, content_type: &str, pretty: u8) -> Result<Vec<u8>> {
    match content_type {
        "application/msgpack" | "application/x-msgpack" => {
            Ok(rmp_serde::to_vec_named(envelope)?)
        }
        "text/html" | "text/plain" => {
            let json = serde_json::to_string_pretty(envelope)?;
            Ok(format!("<pre>{json}</pre>").into_bytes())
        }
        _ => {
            if pretty == 0 {
                Ok(serde_json::to_vec(envelope)?)
            } else {
                let mut buf = Vec::new();
                let indent = " ".repeat(pretty as usize);
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                envelope.serialize(&mut ser)?;
                Ok(buf)
            }
        }
    }
}

/// Compress `body` with `encoding`, returning `None` when the compressed
/// form isn't strictly smaller (spec.md §4.5: "The compressed variant is
/// emitted only if strictly smaller than the raw").
pub fn compress(body: &[u8], encoding: Encoding) -> Option<Vec<u8>> {
    let compressed = match encoding {
        Encoding::Identity => return None,
        Encoding::Gzip => {
            let mut enc = GzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(body).ok()?;
            enc.finish().ok()?
        }
        Encoding::Deflate => {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(body).ok()?;
            enc.finish().ok()?
        }
    };
    if compressed.len() < body.len() {
        Some(compressed)
    } else {
        None
    }
}

pub fn encoding_header_value(encoding: Encoding) -> Option<&'static str> {
    match encoding {
        Encoding::Identity => None,
        Encoding::Gzip => Some("gzip"),
        Encoding::Deflate => Some("deflate"),
    }
}

/// A fully buffered response (the common case: everything except large
/// search result sets, spec.md §4.5 "Large responses ... are streamed").
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub content_encoding: Option<&'static str>,
    /// Extra response headers beyond content-type/encoding — currently only
    /// `Allow` on an `OPTIONS` reply (spec.md §4.5 "OPTIONS emits Allow
    /// header").
    pub headers: Vec<(&'static str, String)>,
}

/// Builds the three-part chunk sequence for a streamed search response
/// (spec.md §4.5 "the dispatcher writes a head chunk, N per-hit chunks,
/// and a tail chunk carrying the `took` latency"). Only JSON is streamed
/// this way — MsgPack/plain-text responses stay fully buffered since they
/// have no natural "append one more hit" boundary as cheap as a JSON comma.
pub struct SearchStream {
    pub total_count: usize,
    pub matches_estimated: usize,
    pub status: u16,
}

impl SearchStream {
    /// `{"#status":200,"#query":{"#total_count":N,"#matches_estimated":M,"#hits":[`
    pub fn head_chunk(&self) -> Bytes {
        let head = format!(
            "{{\"#status\":{},\"#query\":{{\"#total_count\":{},\"#matches_estimated\":{},\"#hits\":[",
            self.status, self.total_count, self.matches_estimated
        );
        Bytes::from(head.into_bytes())
    }

    /// One hit, comma-prefixed unless it's the first.
    pub fn hit_chunk(&self, hit: &serde_json::Value, is_first: bool) -> Result<Bytes> {
        let mut out = Vec::new();
        if !is_first {
            out.push(b',');
        }
        out.extend_from_slice(&serde_json::to_vec(hit)?);
        Ok(Bytes::from(out))
    }

    /// `]}},"#took":N}` — closes the hits array and appends the latency
    /// the dispatcher could only know once the whole query finished.
    pub fn tail_chunk(&self, took_ms: u64) -> Bytes {
        let tail = format!("]}},\"#took\":{took_ms}}}");
        Bytes::from(tail.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_hash_prefixed_keys() {
        let envelope = Envelope::ok(200);
        let body = serialize_body(&envelope, "application/json", 0).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("\"#status\":200"));
    }

    #[test]
    fn msgpack_round_trips_through_rmp_serde() {
        let mut envelope = Envelope::ok(200);
        envelope.docid = Some(42);
        let body = serialize_body(&envelope, "application/msgpack", 0).unwrap();
        let decoded: serde_json::Value = rmp_serde::from_slice(&body).unwrap();
        assert_eq!(decoded["#docid"], 42);
    }

    #[test]
    fn compression_rejected_when_not_smaller() {
        let tiny = b"{}";
        assert_eq!(compress(tiny, Encoding::Gzip), None);
    }

    #[test]
    fn gzip_compresses_a_repetitive_body() {
        let body = vec![b'a'; 4096];
        let compressed = compress(&body, Encoding::Gzip).unwrap();
        assert!(compressed.len() < body.len());
    }

    #[test]
    fn search_stream_chunks_join_into_valid_json() {
        let stream = SearchStream { total_count: 2, matches_estimated: 2, status: 200 };
        let mut out = Vec::new();
        out.extend_from_slice(&stream.head_chunk());
        out.extend_from_slice(&stream.hit_chunk(&serde_json::json!({"a": 1}), true).unwrap());
        out.extend_from_slice(&stream.hit_chunk(&serde_json::json!({"a": 2}), false).unwrap());
        out.extend_from_slice(&stream.tail_chunk(12));
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["#query"]["#hits"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["#took"], 12);
    }
}
