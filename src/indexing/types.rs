//! Shared indexing-pipeline types: the term/slot/data mutations
//! `indexing::pipeline::index` produces (spec.md §4.3 "Entry"), and the
//! sortable byte-string serializations each typed indexer normalizes its
//! value to (point 2 of the "Per-type indexing contract").

use crate::core::data::Data;
use crate::core::types::DocId;

/// One inverted-index mutation: a term, optionally boolean (no positional
/// data, spec.md GLOSSARY "Boolean term").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub prefix: Vec<u8>,
    pub value: Vec<u8>,
    pub boolean: bool,
}

impl Term {
    pub fn new(prefix: &[u8], value: Vec<u8>, boolean: bool) -> Self {
        Term { prefix: prefix.to_vec(), value, boolean }
    }

    /// The wire-form term: `prefix || value`, matching spec.md §4.3 point 3
    /// ("emits one term `prefix + serialized_value`").
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.extend_from_slice(&self.value);
        out
    }
}

/// A field's accumulated slot value(s) for one document — spec.md §4.3
/// point 4: "appends the value to the slot's value set; at end of document
/// the set is serialized as a length-prefixed string list".
#[derive(Debug, Clone, Default)]
pub struct SlotValues(pub Vec<Vec<u8>>);

impl SlotValues {
    pub fn push(&mut self, value: Vec<u8>) {
        self.0.push(value);
    }

    /// Length-prefixed concatenation, the slot payload format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for value in &self.0 {
            out.extend_from_slice(&(value.len() as u32).to_le_bytes());
            out.extend_from_slice(value);
        }
        out
    }
}

/// The result of indexing one document (spec.md §4.3 "Entry":
/// `index(obj, doc_id, old_document, handler) → (term_id, Document, data_preview)`).
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub doc_id: DocId,
    /// The boolean `Q<id>` term, always present (spec.md §4.3 "ID term").
    pub term_id: Vec<u8>,
    pub terms: Vec<Term>,
    pub slots: std::collections::HashMap<u32, SlotValues>,
    pub data: Data,
}

impl IndexedDocument {
    pub fn new(doc_id: DocId) -> Self {
        let term_id = format!("Q{}", doc_id.value()).into_bytes();
        IndexedDocument {
            doc_id,
            term_id,
            terms: Vec::new(),
            slots: std::collections::HashMap::new(),
            data: Data::new(),
        }
    }

    pub fn add_term(&mut self, term: Term) {
        self.terms.push(term);
    }

    pub fn add_slot_value(&mut self, slot: u32, value: Vec<u8>) {
        self.slots.entry(slot).or_default().push(value);
    }
}

/// Sortable byte-string serialization for a signed integer: XOR the sign
/// bit so two's-complement ordering matches byte-lexicographic ordering
/// (the library-level numeric ordering spec.md §4.3 point 2 requires).
pub fn serialize_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ (1u64 << 63)).to_be_bytes()
}

pub fn deserialize_i64(bytes: &[u8; 8]) -> i64 {
    (u64::from_be_bytes(*bytes) ^ (1u64 << 63)) as i64
}

/// Sortable byte-string serialization for `f64`: flip all bits for
/// negatives, flip only the sign bit for non-negatives, so IEEE-754 bit
/// patterns sort the same as the floats they represent.
pub fn serialize_f64(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let mapped = if value.is_sign_negative() { !bits } else { bits | (1u64 << 63) };
    mapped.to_be_bytes()
}

pub fn deserialize_f64(bytes: &[u8; 8]) -> f64 {
    let mapped = u64::from_be_bytes(*bytes);
    let bits = if mapped & (1u64 << 63) != 0 { mapped & !(1u64 << 63) } else { !mapped };
    f64::from_bits(bits)
}

pub fn serialize_bool(value: bool) -> [u8; 1] {
    [if value { 1 } else { 0 }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_serialization_round_trips() {
        for v in [-1_000_000i64, -1, 0, 1, 1_000_000] {
            assert_eq!(deserialize_i64(&serialize_i64(v)), v);
        }
    }

    #[test]
    fn integer_serialization_preserves_order() {
        let a = serialize_i64(-5);
        let b = serialize_i64(10);
        assert!(a < b);
    }

    #[test]
    fn float_serialization_round_trips_and_preserves_order() {
        let values = [-3.5f64, -0.001, 0.0, 0.001, 3.5];
        let mut serialized: Vec<[u8; 8]> = values.iter().map(|v| serialize_f64(*v)).collect();
        for (s, v) in serialized.iter().zip(values.iter()) {
            assert!((deserialize_f64(s) - v).abs() < 1e-12);
        }
        let sorted_by_bytes = {
            let mut copy = serialized.clone();
            copy.sort();
            copy
        };
        serialized.sort_by(|a, b| a.cmp(b));
        assert_eq!(serialized, sorted_by_bytes);
    }

    #[test]
    fn term_encoding_concatenates_prefix_and_value() {
        let term = Term::new(b"ab", vec![1, 2, 3], true);
        assert_eq!(term.encode(), vec![b'a', b'b', 1, 2, 3]);
    }

    #[test]
    fn id_term_is_q_prefixed() {
        let doc = IndexedDocument::new(DocId::new(42));
        assert_eq!(doc.term_id, b"Q42".to_vec());
    }
}
