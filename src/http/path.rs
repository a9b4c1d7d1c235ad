//! URL grammar and command dispatch (spec.md §4.5 "Dispatch table" / §6
//! "HTTP surface"): `/<namespace>/<path>/<id>/<command>`, with `:`
//! separating namespace from path, `@` introducing a host override, commas
//! building a multi-endpoint query, and reserved `_`-prefixed words naming
//! commands. Command lookup is a perfect hash over `fnv1a_32` of the
//! lower-cased token (spec.md §9 "Perfect-hash dispatch"), asserted
//! collision-free at startup rather than trusted blindly.

use crate::core::error::{Error, Result};
use crate::core::utils::fnv1a_32;
use crate::endpoint::{Endpoint, Endpoints};

/// Reserved, `_`-prefixed command words (spec.md §6). `Search` also covers
/// `_count`/`_facets`/`_similar`-style sibling verbs in the original; this
/// crate keeps the set spec.md names explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Search,
    Schema,
    Info,
    Wal,
    Check,
    Metadata,
    Nodes,
    Metrics,
    Touch,
    Commit,
    Dump,
    Restore,
    Quit,
}

/// `(lower-cased token, fnv1a_32 hash, Command)` — the static table a real
/// perfect-hash dispatcher would compile; `lookup_command` hashes the input
/// and confirms the token still matches to rule out a hash collision,
/// rather than trusting the hash alone.
const COMMAND_TABLE: &[(&str, Command)] = &[
    ("_search", Command::Search),
    ("_schema", Command::Schema),
    ("_info", Command::Info),
    ("_wal", Command::Wal),
    ("_check", Command::Check),
    ("_metadata", Command::Metadata),
    ("_nodes", Command::Nodes),
    ("_metrics", Command::Metrics),
    ("_touch", Command::Touch),
    ("_commit", Command::Commit),
    ("_dump", Command::Dump),
    ("_restore", Command::Restore),
    ("_quit", Command::Quit),
];

/// Asserts `COMMAND_TABLE` has no `fnv1a_32` collision among its own
/// entries (spec.md §9 open question: "implementations must assert
/// disjointness at startup"). Cheap enough to run unconditionally rather
/// than gating behind `debug_assert!` — the table is tiny and fixed.
pub fn assert_command_table_disjoint() {
    let mut hashes: Vec<u32> = COMMAND_TABLE.iter().map(|(tok, _)| fnv1a_32(tok.as_bytes())).collect();
    hashes.sort_unstable();
    for pair in hashes.windows(2) {
        assert_ne!(pair[0], pair[1], "command perfect-hash table has a collision");
    }
}

/// Resolve a reserved command token (with or without its leading `_`) to a
/// `Command`. `None` means the token isn't a recognized command at all,
/// which the URL parser treats as a literal path segment instead.
pub fn lookup_command(token: &str) -> Option<Command> {
    let token = token.to_ascii_lowercase();
    let token = if token.starts_with('_') { token } else { format!("_{token}") };
    let hash = fnv1a_32(token.as_bytes());
    COMMAND_TABLE
        .iter()
        .find(|(tok, _)| fnv1a_32(tok.as_bytes()) == hash && *tok == token)
        .map(|(_, cmd)| *cmd)
}

/// One `namespace/path@host` segment of a (possibly comma-joined)
/// multi-endpoint URL, before being folded into an `Endpoint`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct RawEndpointSegment {
    namespace: Option<String>,
    path: String,
    host: Option<String>,
}

/// The parsed request line, independent of HTTP method (spec.md §4.5
/// "Dispatch table"): which endpoints it names, the document id (if any),
/// the trailing command (if any), and any `.field.subfield` slice selector
/// that followed the id (spec.md §6 "Sliced responses").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedPath {
    pub endpoints: Vec<RawEndpoint>,
    pub id: Option<String>,
    pub command: Option<Command>,
    pub selector: Vec<String>,
}

/// One endpoint named by the URL, pre-resolution (host/port lookup through
/// the node registry happens one layer up, in the dispatcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEndpoint {
    pub namespace: Option<String>,
    pub path: String,
    pub host: Option<String>,
}

impl RawEndpoint {
    /// Resolve into a local or remote `Endpoint`; a named host becomes a
    /// remote reference, absent host means local (spec.md §3 "Endpoint:
    /// host (empty ⇒ local)").
    pub fn to_endpoint(&self) -> Endpoint {
        let full_path = match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.path),
            None => self.path.clone(),
        };
        match &self.host {
            Some(host) => Endpoint::new(host.clone(), -1, full_path, "", "", "", ""),
            None => Endpoint::local(full_path),
        }
    }
}

/// Parse `/<namespace>/<path>/<id>/<command>` (spec.md §6). Path and
/// namespace are separated by `:`; `@host` overrides the shard's location;
/// commas build a multi-endpoint query (e.g. `a/b:ns1/i1@h1,ns2/i2@h2`);
/// `.field.subfield` after the id selects a slice of the stored document.
///
/// Id extraction only applies to a single-endpoint request: once a comma
/// has split the path into several endpoint groups there is no documented
/// rule for which group a trailing id would belong to, so a multi-endpoint
/// request is treated as naming endpoints only (optionally followed by a
/// command), matching spec.md §6's own example.
pub fn parse_path(raw: &str) -> Result<ParsedPath> {
    let trimmed = raw.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(ParsedPath::default());
    }

    let mut segments: Vec<&str> = trimmed.split('/').collect();

    // Trailing command, if the last segment is a recognized `_word`.
    let mut command = None;
    if let Some(last) = segments.last() {
        if last.starts_with('_') {
            if let Some(cmd) = lookup_command(last) {
                command = Some(cmd);
                segments.pop();
            }
        }
    }

    let is_multi_endpoint = segments.join("/").contains(',');

    // Trailing id (+ optional `.selector.chain`): only for a single-endpoint
    // request, and only when more than one segment remains so the id
    // doesn't swallow the endpoint's own path.
    let mut id = None;
    let mut selector = Vec::new();
    if !is_multi_endpoint && segments.len() > 1 {
        if let Some(last) = segments.last() {
            if !last.is_empty() && !last.contains('@') && !last.contains(':') && !last.starts_with('_') {
                let mut parts = last.splitn(2, '.');
                let id_part = parts.next().unwrap_or_default();
                id = Some(id_part.to_string());
                if let Some(rest) = parts.next() {
                    selector = rest.split('.').map(|s| s.to_string()).collect();
                }
                segments.pop();
            }
        }
    }

    let endpoint_part = segments.join("/");
    let endpoints = endpoint_part
        .split(',')
        .filter(|s| !s.is_empty())
        .map(parse_endpoint_segment)
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedPath { endpoints, id, command, selector })
}

fn parse_endpoint_segment(segment: &str) -> Result<RawEndpoint> {
    let (body, host) = match segment.split_once('@') {
        Some((b, h)) => (b, Some(h.to_string())),
        None => (segment, None),
    };
    let (namespace, path) = match body.split_once(':') {
        Some((ns, p)) => (Some(ns.to_string()), p.to_string()),
        None => (None, body.to_string()),
    };
    if path.is_empty() {
        return Err(Error::client("empty path in endpoint segment"));
    }
    Ok(RawEndpoint { namespace, path, host })
}

/// Fold a `ParsedPath`'s endpoint segments into a resolved, de-duplicated
/// `Endpoints` set (spec.md §3 "Endpoints: a set of Endpoint preserving
/// insertion order").
pub fn resolve_endpoints(parsed: &ParsedPath) -> Endpoints {
    let mut endpoints = Endpoints::new();
    for raw in &parsed.endpoints {
        endpoints.add(raw.to_endpoint());
    }
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_table_has_no_hash_collisions() {
        assert_command_table_disjoint();
    }

    #[test]
    fn lookup_command_accepts_with_or_without_underscore() {
        assert_eq!(lookup_command("_search"), Some(Command::Search));
        assert_eq!(lookup_command("search"), Some(Command::Search));
        assert_eq!(lookup_command("SEARCH"), Some(Command::Search));
        assert_eq!(lookup_command("_bogus"), None);
    }

    #[test]
    fn parses_simple_path_with_id() {
        let parsed = parse_path("/twitter/1").unwrap();
        assert_eq!(parsed.endpoints.len(), 1);
        assert_eq!(parsed.endpoints[0].path, "twitter");
        assert_eq!(parsed.id, Some("1".to_string()));
        assert_eq!(parsed.command, None);
    }

    #[test]
    fn parses_command_without_id() {
        let parsed = parse_path("/twitter/_search").unwrap();
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.command, Some(Command::Search));
    }

    #[test]
    fn parses_id_with_trailing_command() {
        let parsed = parse_path("/twitter/1/_commit").unwrap();
        assert_eq!(parsed.id, Some("1".to_string()));
        assert_eq!(parsed.command, Some(Command::Commit));
    }

    #[test]
    fn parses_multi_endpoint_query_with_namespace_and_host() {
        let parsed = parse_path("/a/b:ns1/i1@h1,ns2/i2@h2/_search").unwrap();
        assert_eq!(parsed.endpoints.len(), 2);
        assert_eq!(parsed.endpoints[0].namespace, Some("a/b".to_string()));
        assert_eq!(parsed.endpoints[0].path, "ns1/i1");
        assert_eq!(parsed.endpoints[0].host, Some("h1".to_string()));
        assert_eq!(parsed.endpoints[1].host, Some("h2".to_string()));
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.command, Some(Command::Search));
    }

    #[test]
    fn parses_slice_selector_after_id() {
        let parsed = parse_path("/twitter/1.field.subfield").unwrap();
        assert_eq!(parsed.id, Some("1".to_string()));
        assert_eq!(parsed.selector, vec!["field".to_string(), "subfield".to_string()]);
    }

    #[test]
    fn resolve_endpoints_deduplicates_and_preserves_order() {
        let parsed = parse_path("/a,b,a/_search").unwrap();
        let endpoints = resolve_endpoints(&parsed);
        assert_eq!(endpoints.len(), 2);
    }
}
