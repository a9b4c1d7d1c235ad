//! The `Schema` tree itself (spec.md §3 `Schema` / §4.2 "Mutation
//! protocol"): an immutable, copy-on-write tree of property nodes rooted at
//! a single node, each holding a `Specification`. First exposure of a field
//! derives its prefix/slot/accuracy/text pipeline and freezes its concrete
//! type; later documents are checked against that frozen type.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::error::{Error, Result};
use crate::schema::accuracy::AccuracyLadder;
use crate::schema::namespace::partial_paths;
use crate::schema::prefix::{derive_slot, FieldPrefix};
use crate::schema::specification::{ConcreteType, Specification};

/// Reserved trailing path segments that address a field's meta-properties
/// rather than a subfield (spec.md §4.2 "field path grammar").
pub const RESERVED_WORDS: &[&str] = &[
    "_id", "_type", "_value", "_accuracy", "_index", "_script", "_namespace",
];

pub fn is_reserved(segment: &str) -> bool {
    RESERVED_WORDS.contains(&segment)
}

/// One node in the property tree: its own `Specification` plus named
/// children. Shared via `Arc` so the copy-on-write mutation protocol can
/// clone only the path being written, not the whole tree.
#[derive(Debug, Clone)]
pub struct PropertyNode {
    pub spec: Specification,
    pub children: BTreeMap<String, Arc<PropertyNode>>,
}

impl PropertyNode {
    fn root() -> Self {
        PropertyNode {
            spec: Specification::new(""),
            children: BTreeMap::new(),
        }
    }
}

/// An immutable tree snapshot. Readers hold an `Arc<PropertyNode>`;
/// `Schema::commit` publishes a freshly cloned-and-mutated tree atomically.
pub type Snapshot = Arc<PropertyNode>;

/// `Schema`: `schema` is the last published immutable snapshot; `mut_schema`
/// is populated lazily on the first mutation of a generation and published
/// by `commit` (spec.md §4.2 "Mutation protocol").
pub struct Schema {
    /// Foreign URL this schema was loaded from, or empty for an inline
    /// (per-index) schema — spec.md §3: "Schema's public identity is the
    /// origin".
    pub origin: String,
    schema: RwLock<Snapshot>,
    mut_schema: RwLock<Option<Snapshot>>,
}

impl Schema {
    pub fn new(origin: impl Into<String>) -> Self {
        Schema {
            origin: origin.into(),
            schema: RwLock::new(Arc::new(PropertyNode::root())),
            mut_schema: RwLock::new(None),
        }
    }

    /// Current published snapshot, for read-only callers (query compiler).
    pub fn snapshot(&self) -> Snapshot {
        self.schema.read().clone()
    }

    /// Look up a field's `Specification` by dotted path without creating
    /// it. Returns `None` for a path that has never been indexed.
    pub fn get(&self, full_meta_name: &str) -> Option<Specification> {
        let root = self.schema.read().clone();
        walk(&root, full_meta_name).map(|node| node.spec.clone())
    }

    /// Resolve or create the field at `full_meta_name`, freezing it to
    /// `concrete` on first use. Enforces the dynamic/strict contract
    /// (spec.md §4.2):
    /// - if the field exists and is concrete: must match `concrete`, else
    ///   `CastError`.
    /// - if the field exists and is still `Empty`: freezes now.
    /// - if the field doesn't exist: `dynamic=false` on an ancestor that
    ///   governs it is a `ClientError`; `strict=true` without an explicit
    ///   type on this field is a `MissingTypeError`.
    ///
    /// On success the result is staged in `mut_schema`; call `commit` to
    /// publish it. Concurrent callers serialize via the caller's own
    /// write-lock (one per pool, per spec.md §4.2).
    pub fn resolve_or_create(
        &self,
        full_meta_name: &str,
        concrete: ConcreteType,
        dynamic: bool,
        strict: bool,
    ) -> Result<Specification> {
        let base = {
            let mut staged = self.mut_schema.write();
            if staged.is_none() {
                *staged = Some(self.schema.read().clone());
            }
            staged.clone().unwrap()
        };

        let segments: Vec<&str> = full_meta_name.split('.').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(Error::client("empty field path"));
        }

        let mut path_so_far = Vec::with_capacity(segments.len());
        let mut current = base;
        let mut rebuilt_root: Option<Arc<PropertyNode>> = None;

        // Walk down, creating/validating each ancestor, then rebuild the
        // path bottom-up into a fresh immutable tree (the actual
        // copy-on-write step).
        let mut chain: Vec<(String, Arc<PropertyNode>)> = Vec::new();
        for segment in &segments {
            path_so_far.push(*segment);
            let full = path_so_far.join(".");
            let existing = current.children.get(*segment).cloned();
            let is_leaf = full == full_meta_name;

            let node = match existing {
                Some(node) => node,
                None => {
                    if !dynamic {
                        return Err(Error::client(format!(
                            "field '{full}' does not exist and dynamic=false forbids creating it"
                        )));
                    }
                    if is_leaf && strict {
                        return Err(Error::missing_type(format!(
                            "field '{full}' has no type and strict=true forbids auto-detection"
                        )));
                    }
                    Arc::new(PropertyNode {
                        spec: Specification::new(full.clone()),
                        children: BTreeMap::new(),
                    })
                }
            };

            chain.push((segment.to_string(), node.clone()));
            current = node;
        }

        // Validate/freeze the leaf.
        let mut leaf = (*chain.last().unwrap().1).clone();
        if leaf.spec.is_concrete() {
            if leaf.spec.sep_types.concrete != concrete {
                return Err(Error::cast(format!(
                    "field '{full_meta_name}' is frozen to {:?}, cannot index a {:?} value",
                    leaf.spec.sep_types.concrete, concrete
                )));
            }
        } else {
            freeze_specification(&mut leaf.spec, full_meta_name, concrete);
        }
        *chain.last_mut().unwrap() = (chain.last().unwrap().0.clone(), Arc::new(leaf));

        // Rebuild the tree bottom-up so every ancestor's `children` map
        // points at the (possibly new) node below it.
        let mut rebuilt = chain.pop().unwrap().1;
        while let Some((seg, parent_node)) = chain.pop() {
            let mut parent = (*parent_node).clone();
            parent.children.insert(seg, rebuilt);
            rebuilt = Arc::new(parent);
            let _ = &rebuilt_root; // keep clippy quiet about the shadow below
            rebuilt_root = Some(rebuilt.clone());
        }

        // Splice the rebuilt root chain back under the schema root.
        let mut root = self.mut_schema.read().clone().unwrap();
        {
            let mut root_mut = (*root).clone();
            let top_segment = segments[0].to_string();
            root_mut.children.insert(top_segment, rebuilt_root.clone().unwrap_or(rebuilt));
            root = Arc::new(root_mut);
        }
        *self.mut_schema.write() = Some(root);

        let final_spec = walk(&self.mut_schema.read().clone().unwrap(), full_meta_name)
            .map(|n| n.spec.clone())
            .ok_or_else(|| Error::new(crate::core::error::ErrorKind::Internal, "field vanished after write".into()))?;
        Ok(final_spec)
    }

    /// Publish the staged `mut_schema` atomically, per §4.2's "a successful
    /// index operation publishes `mut_schema` atomically; readers never
    /// see a torn state".
    pub fn commit(&self) {
        let staged = self.mut_schema.write().take();
        if let Some(snapshot) = staged {
            *self.schema.write() = snapshot;
        }
    }

    /// Discard staged mutations without publishing (error path).
    pub fn rollback(&self) {
        *self.mut_schema.write() = None;
    }

    /// Namespace terms (spec.md §4.2 "Namespaces") for a leaf field, if it
    /// is declared `is_namespace`.
    pub fn namespace_terms(&self, full_meta_name: &str) -> Vec<String> {
        match self.get(full_meta_name) {
            Some(spec) if spec.flags.is_namespace => partial_paths(full_meta_name),
            _ => Vec::new(),
        }
    }
}

fn freeze_specification(spec: &mut Specification, full_meta_name: &str, concrete: ConcreteType) {
    spec.freeze(concrete);
    spec.sep_types.concrete = concrete;
    spec.prefix = FieldPrefix::derive(full_meta_name, concrete);
    spec.slot = derive_slot(full_meta_name);
    if concrete.has_accuracy() {
        spec.accuracy = AccuracyLadder::for_type(full_meta_name, concrete);
    }
}

fn walk<'a>(root: &'a Arc<PropertyNode>, full_meta_name: &str) -> Option<&'a Arc<PropertyNode>> {
    let mut current = root;
    for segment in full_meta_name.split('.').filter(|s| !s.is_empty()) {
        current = current.children.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_use_freezes_type_and_derives_prefix_and_slot() {
        let schema = Schema::new("");
        let spec = schema
            .resolve_or_create("year", ConcreteType::Integer, true, false)
            .unwrap();
        assert_eq!(spec.sep_types.concrete, ConcreteType::Integer);
        assert!(!spec.prefix.field.is_empty());
        assert_ne!(spec.slot, 0);
        schema.commit();
        assert!(schema.get("year").is_some());
    }

    #[test]
    fn mismatched_second_type_is_a_cast_error() {
        let schema = Schema::new("");
        schema
            .resolve_or_create("year", ConcreteType::Integer, true, false)
            .unwrap();
        schema.commit();

        let err = schema
            .resolve_or_create("year", ConcreteType::Text, true, false)
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn strict_without_existing_type_is_missing_type_error() {
        let schema = Schema::new("");
        let err = schema
            .resolve_or_create("mystery", ConcreteType::Integer, true, true)
            .unwrap_err();
        assert_eq!(err.http_status(), 412);
    }

    #[test]
    fn dynamic_false_forbids_new_fields() {
        let schema = Schema::new("");
        let err = schema
            .resolve_or_create("brand_new", ConcreteType::Text, false, false)
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn nested_paths_create_every_ancestor() {
        let schema = Schema::new("");
        schema
            .resolve_or_create("authors.name.given", ConcreteType::Text, true, false)
            .unwrap();
        schema.commit();
        assert!(schema.get("authors").is_some());
        assert!(schema.get("authors.name").is_some());
        assert!(schema.get("authors.name.given").is_some());
    }

    #[test]
    fn rollback_discards_staged_mutation() {
        let schema = Schema::new("");
        schema
            .resolve_or_create("temp_field", ConcreteType::Text, true, false)
            .unwrap();
        schema.rollback();
        assert!(schema.get("temp_field").is_none());
    }
}
