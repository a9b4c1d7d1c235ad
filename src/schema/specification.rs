//! `specification_t`: the per-field indexing contract (spec §3, §4.2).
//! Derived once per field path and cached on the `Schema` tree node; the
//! indexing pipeline and query compiler both read it, never recompute it.

use crate::schema::accuracy::AccuracyLadder;
use crate::schema::prefix::FieldPrefix;

/// A field's concrete leaf type once it is frozen (spec.md §4.2 "type
/// model"). `Empty` is the placeholder before any document has touched the
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcreteType {
    Empty,
    Foreign,
    Object,
    Array,
    Boolean,
    Date,
    Time,
    TimeDelta,
    Float,
    Integer,
    Positive,
    Keyword,
    String,
    Text,
    Uuid,
    Geo,
    Script,
}

impl Default for ConcreteType {
    fn default() -> Self {
        ConcreteType::Empty
    }
}

impl ConcreteType {
    /// One-letter type code folded into the field prefix, matching the
    /// original's `FieldType` tag byte (`prefix.cc`).
    pub fn code(self) -> u8 {
        match self {
            ConcreteType::Empty => b'E',
            ConcreteType::Foreign => b'F',
            ConcreteType::Object => b'O',
            ConcreteType::Array => b'A',
            ConcreteType::Boolean => b'B',
            ConcreteType::Date => b'D',
            ConcreteType::Time => b'T',
            ConcreteType::TimeDelta => b'W',
            ConcreteType::Float => b'N',
            ConcreteType::Integer => b'I',
            ConcreteType::Positive => b'P',
            ConcreteType::Keyword => b'K',
            ConcreteType::String => b'S',
            ConcreteType::Text => b'X',
            ConcreteType::Uuid => b'U',
            ConcreteType::Geo => b'G',
            ConcreteType::Script => b'Z',
        }
    }

    /// Whether this type carries an accuracy ladder (§4.2 point 3).
    pub fn has_accuracy(self) -> bool {
        matches!(
            self,
            ConcreteType::Date
                | ConcreteType::Time
                | ConcreteType::TimeDelta
                | ConcreteType::Float
                | ConcreteType::Integer
                | ConcreteType::Positive
                | ConcreteType::Geo
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ConcreteType::Float | ConcreteType::Integer | ConcreteType::Positive)
    }
}

/// The three container dimensions tracked independently of the leaf type
/// (spec.md §4.2: "a field be, e.g., an array of objects of geo").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerTypes {
    pub foreign: bool,
    pub object: bool,
    pub array: bool,
}

/// `sep_types[4]`: foreign / object / array / concrete, as a fixed tuple
/// rather than a 4-element array, so callers can't index out of bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SepTypes {
    pub container: ContainerTypes,
    pub concrete: ConcreteType,
}

/// Which of the four index effects a field emits (spec.md §4.2 "index
/// modes"): field-term, field-value (slot), global-term, global-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMode(u8);

impl IndexMode {
    pub const FIELD_TERM: u8 = 0b0001;
    pub const FIELD_VALUE: u8 = 0b0010;
    pub const GLOBAL_TERM: u8 = 0b0100;
    pub const GLOBAL_VALUE: u8 = 0b1000;
    pub const ALL: u8 = Self::FIELD_TERM | Self::FIELD_VALUE | Self::GLOBAL_TERM | Self::GLOBAL_VALUE;

    pub fn new(mask: u8) -> Self {
        IndexMode(mask & Self::ALL)
    }

    pub fn all() -> Self {
        IndexMode(Self::ALL)
    }

    pub fn none() -> Self {
        IndexMode(0)
    }

    pub fn has(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn field_term(&self) -> bool {
        self.has(Self::FIELD_TERM)
    }

    pub fn field_value(&self) -> bool {
        self.has(Self::FIELD_VALUE)
    }

    pub fn global_term(&self) -> bool {
        self.has(Self::GLOBAL_TERM)
    }

    pub fn global_value(&self) -> bool {
        self.has(Self::GLOBAL_VALUE)
    }
}

impl Default for IndexMode {
    fn default() -> Self {
        IndexMode::all()
    }
}

/// How a path segment that is itself a UUID affects indexing (spec.md
/// §4.2 "UUID field indexing").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidFieldIndex {
    Uuid,
    UuidField,
    Both,
}

impl Default for UuidFieldIndex {
    fn default() -> Self {
        UuidFieldIndex::Both
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStrategy {
    None,
    All,
    Stemmed,
}

impl Default for StopStrategy {
    fn default() -> Self {
        StopStrategy::Stemmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemStrategy {
    None,
    Some,
    All,
    AllZ,
}

impl Default for StemStrategy {
    fn default() -> Self {
        StemStrategy::Some
    }
}

/// Per-field detection toggles (spec.md §4.2 "dynamic detection toggles").
/// `strict` forbids all of these regardless of their individual value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionFlags {
    pub date: bool,
    pub time: bool,
    pub timedelta: bool,
    pub numeric: bool,
    pub geo: bool,
    pub bool_: bool,
    pub text: bool,
    pub term: bool,
    pub uuid: bool,
}

impl DetectionFlags {
    pub fn all_enabled() -> Self {
        DetectionFlags {
            date: true,
            time: true,
            timedelta: true,
            numeric: true,
            geo: true,
            bool_: true,
            text: true,
            term: true,
            uuid: true,
        }
    }
}

/// The ≥25-flag bitfield spec.md §3 calls out, split into named booleans
/// rather than packed bits: nothing in this crate cares about the memory
/// layout, and named fields are far cheaper to get right than bit indices.
#[derive(Debug, Clone, Default)]
pub struct SpecificationFlags {
    pub bool_term: bool,
    pub partials: bool,
    pub store: bool,
    pub dynamic: bool,
    pub strict: bool,
    pub detection: DetectionFlagsWrap,
    pub is_namespace: bool,
    pub has_uuid_prefix: bool,
    pub concrete: bool,
    pub complete: bool,
    pub uuid_field: bool,
    pub uuid_path: bool,
    pub inside_namespace: bool,
}

/// Newtype so `SpecificationFlags` can derive `Default` even though
/// `DetectionFlags`'s "sensible default" (all enabled) isn't the zero value.
#[derive(Debug, Clone, Copy)]
pub struct DetectionFlagsWrap(pub DetectionFlags);

impl Default for DetectionFlagsWrap {
    fn default() -> Self {
        DetectionFlagsWrap(DetectionFlags::all_enabled())
    }
}

impl Default for SpecificationFlags {
    fn default() -> Self {
        SpecificationFlags {
            bool_term: false,
            partials: false,
            store: true,
            dynamic: true,
            strict: false,
            detection: DetectionFlagsWrap::default(),
            is_namespace: false,
            has_uuid_prefix: false,
            concrete: false,
            complete: false,
            uuid_field: false,
            uuid_path: false,
            inside_namespace: false,
        }
    }
}

/// Per-field contract (spec.md §3 `specification_t`). Cloned onto the
/// indexing pipeline's stack for each field it visits — §5 calls out that
/// "each invocation gets its own `specification_t` stack", so this type is
/// deliberately cheap to clone (no interior mutability).
#[derive(Debug, Clone, Default)]
pub struct Specification {
    pub sep_types: SepTypes,
    pub prefix: FieldPrefix,
    pub slot: u32,
    pub flags: SpecificationFlags,
    pub accuracy: AccuracyLadder,
    pub language: String,
    pub stop_strategy: StopStrategy,
    pub stem_strategy: StemStrategy,
    pub stem_language: String,
    /// Error radius for geo fields, in meters.
    pub error: f64,
    pub index: IndexMode,
    pub index_uuid_field: UuidFieldIndex,
    pub position: Vec<u32>,
    pub weight: Vec<u32>,
    pub spelling: Vec<bool>,
    pub positions: Vec<bool>,
    pub meta_name: String,
    pub full_meta_name: String,
}

impl Specification {
    pub fn new(full_meta_name: impl Into<String>) -> Self {
        let full_meta_name = full_meta_name.into();
        let meta_name = full_meta_name
            .rsplit('.')
            .next()
            .unwrap_or(&full_meta_name)
            .to_string();
        Specification {
            meta_name,
            full_meta_name,
            stop_strategy: StopStrategy::default(),
            stem_strategy: StemStrategy::default(),
            index: IndexMode::default(),
            ..Default::default()
        }
    }

    /// Whether this field has committed to a concrete, non-container leaf
    /// type yet — the frozen/unfrozen distinction §4.2's "write-once,
    /// detect-on-first-use" model hinges on.
    pub fn is_concrete(&self) -> bool {
        self.sep_types.concrete != ConcreteType::Empty
    }

    /// Can `new_type` be indexed into a field that already froze to
    /// `self.sep_types.concrete`? Only an exact match, unless the field is
    /// still `Empty` (first use).
    pub fn accepts(&self, new_type: ConcreteType) -> bool {
        !self.is_concrete() || self.sep_types.concrete == new_type
    }

    pub fn freeze(&mut self, concrete: ConcreteType) {
        self.sep_types.concrete = concrete;
        self.flags.concrete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_specification_accepts_any_type_once() {
        let mut spec = Specification::new("field");
        assert!(!spec.is_concrete());
        assert!(spec.accepts(ConcreteType::Integer));
        spec.freeze(ConcreteType::Integer);
        assert!(spec.is_concrete());
        assert!(spec.accepts(ConcreteType::Integer));
        assert!(!spec.accepts(ConcreteType::Text));
    }

    #[test]
    fn meta_name_is_last_path_segment() {
        let spec = Specification::new("authors.name.given");
        assert_eq!(spec.meta_name, "given");
        assert_eq!(spec.full_meta_name, "authors.name.given");
    }

    #[test]
    fn index_mode_all_sets_every_bit() {
        let mode = IndexMode::all();
        assert!(mode.field_term() && mode.field_value() && mode.global_term() && mode.global_value());
    }
}
