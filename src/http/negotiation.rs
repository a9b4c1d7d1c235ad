//! Content and encoding negotiation (spec.md §4.5 "Content negotiation" /
//! "Encoding negotiation"): `Accept`/`Accept-Encoding` headers parsed into
//! priority-ordered candidate lists and matched against what this server
//! can actually produce.

/// Response body types this server can serialize to, in the order the
/// dispatcher falls back through on a tie (spec.md "a fixed response-type
/// list").
pub const RESPONSE_TYPES: &[&str] = &[
    "application/json",
    "application/msgpack",
    "application/x-msgpack",
    "text/html",
    "text/plain",
];

/// One parsed `Accept` candidate: `type/subtype;q=0.8;indent=2`.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    pub mime_type: String,
    pub q: f32,
    pub indent: Option<u8>,
}

/// Parse an `Accept` header into candidates sorted by descending `q`
/// (ties keep header order, a stable sort). `*/*` is kept as a literal
/// entry so it only wins when nothing more specific matches.
pub fn parse_accept(header: &str) -> Vec<AcceptEntry> {
    let mut entries: Vec<AcceptEntry> = header
        .split(',')
        .filter_map(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            let mut parts = raw.split(';');
            let mime_type = parts.next()?.trim().to_string();
            let mut q = 1.0f32;
            let mut indent = None;
            for param in parts {
                let param = param.trim();
                if let Some(v) = param.strip_prefix("q=") {
                    q = v.trim().parse().unwrap_or(1.0);
                } else if let Some(v) = param.strip_prefix("indent=") {
                    indent = v.trim().parse().ok();
                }
            }
            Some(AcceptEntry { mime_type, q, indent })
        })
        .collect();
    entries.sort_by(|a, b| b.q.partial_cmp(&a.q).unwrap_or(std::cmp::Ordering::Equal));
    entries
}

/// Pick the best response MIME type for `accept` out of `RESPONSE_TYPES`.
/// Returns `None` when nothing acceptable is offered (spec.md "406 when no
/// acceptable content").
pub fn negotiate_content_type(accept: &[AcceptEntry]) -> Option<&'static str> {
    if accept.is_empty() {
        return Some(RESPONSE_TYPES[0]);
    }
    for entry in accept {
        if entry.q <= 0.0 {
            continue;
        }
        if entry.mime_type == "*/*" {
            return Some(RESPONSE_TYPES[0]);
        }
        if let Some(matched) = RESPONSE_TYPES.iter().find(|t| **t == entry.mime_type) {
            return Some(matched);
        }
        if let Some((type_part, "*")) = entry.mime_type.split_once('/') {
            if let Some(matched) = RESPONSE_TYPES.iter().find(|t| t.starts_with(type_part)) {
                return Some(matched);
            }
        }
    }
    None
}

/// Pretty-print level from `?pretty` or an `indent=N` Accept parameter,
/// clamped to the spec's 0–16 range, default 4 when requested with no
/// explicit value (spec.md "Pretty-printing").
pub fn pretty_level(requested: bool, indent_param: Option<u8>) -> u8 {
    match indent_param {
        Some(n) => n.min(16),
        None if requested => 4,
        None => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
    Identity,
}

/// Parse `Accept-Encoding` into priority order; unknown tokens are dropped
/// rather than surfaced (spec.md "gzip, deflate, identity, or unknown").
pub fn parse_accept_encoding(header: &str) -> Vec<(Encoding, f32)> {
    let mut out: Vec<(Encoding, f32)> = header
        .split(',')
        .filter_map(|raw| {
            let raw = raw.trim();
            let mut parts = raw.split(';');
            let token = parts.next()?.trim().to_lowercase();
            let mut q = 1.0f32;
            for param in parts {
                if let Some(v) = param.trim().strip_prefix("q=") {
                    q = v.trim().parse().unwrap_or(1.0);
                }
            }
            let encoding = match token.as_str() {
                "gzip" => Encoding::Gzip,
                "deflate" => Encoding::Deflate,
                "identity" => Encoding::Identity,
                _ => return None,
            };
            Some((encoding, q))
        })
        .collect();
    out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Best encoding to respond with: highest-priority non-zero-`q` candidate,
/// or `Identity` if the header was absent/empty (no `Accept-Encoding` means
/// any encoding, and the dispatcher's own preference is to not bother).
pub fn negotiate_encoding(candidates: &[(Encoding, f32)]) -> Option<Encoding> {
    if candidates.is_empty() {
        return Some(Encoding::Identity);
    }
    candidates.iter().find(|(_, q)| *q > 0.0).map(|(e, _)| *e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_candidates_sort_by_descending_q() {
        let entries = parse_accept("text/plain;q=0.5, application/json;q=0.9");
        assert_eq!(entries[0].mime_type, "application/json");
    }

    #[test]
    fn negotiate_content_type_matches_exact_mime() {
        let entries = parse_accept("application/msgpack");
        assert_eq!(negotiate_content_type(&entries), Some("application/msgpack"));
    }

    #[test]
    fn negotiate_content_type_falls_back_to_star() {
        let entries = parse_accept("*/*");
        assert_eq!(negotiate_content_type(&entries), Some(RESPONSE_TYPES[0]));
    }

    #[test]
    fn negotiate_content_type_rejects_unsupported_type() {
        let entries = parse_accept("application/pdf");
        assert_eq!(negotiate_content_type(&entries), None);
    }

    #[test]
    fn pretty_level_defaults_to_four_when_bare_flag_set() {
        assert_eq!(pretty_level(true, None), 4);
        assert_eq!(pretty_level(false, None), 0);
        assert_eq!(pretty_level(true, Some(20)), 16);
    }

    #[test]
    fn accept_encoding_prefers_highest_q() {
        let candidates = parse_accept_encoding("deflate;q=0.3, gzip;q=0.8");
        assert_eq!(negotiate_encoding(&candidates), Some(Encoding::Gzip));
    }

    #[test]
    fn empty_accept_encoding_defaults_to_identity() {
        assert_eq!(negotiate_encoding(&[]), Some(Encoding::Identity));
    }
}
