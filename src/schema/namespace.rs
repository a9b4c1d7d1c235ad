//! Namespace (path-prefix) indexing (spec.md §4.2 "Namespaces"): a field
//! declared `is_namespace=true` indexes, for each leaf value, one term at
//! every partial ancestor path up to `LIMIT_PARTIAL_PATHS_DEPTH`, so a
//! query against any ancestor path matches the leaf.

/// Deepest partial path depth a namespace field will emit terms for.
/// Matches the original's `schema.h` constant of the same name.
pub const LIMIT_PARTIAL_PATHS_DEPTH: usize = 10;

/// Every partial prefix of a dotted path, shortest first, capped at
/// `LIMIT_PARTIAL_PATHS_DEPTH` segments. `authors.name.given` yields
/// `["authors", "authors.name", "authors.name.given"]`.
pub fn partial_paths(full_meta_name: &str) -> Vec<String> {
    let segments: Vec<&str> = full_meta_name.split('.').collect();
    let depth = segments.len().min(LIMIT_PARTIAL_PATHS_DEPTH);
    (1..=depth)
        .map(|n| segments[..n].join("."))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_paths_cover_every_ancestor() {
        let paths = partial_paths("authors.name.given");
        assert_eq!(
            paths,
            vec!["authors", "authors.name", "authors.name.given"]
        );
    }

    #[test]
    fn partial_paths_cap_at_limit_depth() {
        let deep = (0..20).map(|i| i.to_string()).collect::<Vec<_>>().join(".");
        let paths = partial_paths(&deep);
        assert_eq!(paths.len(), LIMIT_PARTIAL_PATHS_DEPTH);
    }

    #[test]
    fn single_segment_path_yields_one_entry() {
        assert_eq!(partial_paths("year"), vec!["year"]);
    }
}
