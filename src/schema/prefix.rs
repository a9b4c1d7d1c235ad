//! Deterministic field prefix derivation (spec.md §4.2 point 1) and the
//! 32-bit slot derivation (point 2). Grounded on the original's
//! `schema.cc::get_prefix`/`get_slot`: a prefix is a short byte-string
//! shared by every term a field emits so range scans over one field stay
//! lexicographically contiguous; a slot is a column id for the field's
//! sortable value.

use crate::core::utils::xxhash64;
use crate::schema::specification::ConcreteType;

/// A field's prefix, in its plain and uuid-bearing variants (spec.md §3:
/// "`prefix` (field + uuid variants)").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPrefix {
    pub field: Vec<u8>,
    pub uuid: Vec<u8>,
}

impl FieldPrefix {
    /// Derive both prefix variants from a dotted path and its frozen
    /// concrete type. The plain variant is `xxhash64(path)` truncated to 4
    /// bytes with the type code appended; the uuid variant additionally
    /// folds in the literal uuid bytes of the last path segment, when that
    /// segment is a uuid (§4.2 "has_uuid_prefix").
    pub fn derive(full_meta_name: &str, concrete: ConcreteType) -> Self {
        let upper = full_meta_name.to_uppercase();
        let h = xxhash64(upper.as_bytes(), 0);
        let mut field = h.to_le_bytes()[..4].to_vec();
        field.push(concrete.code());

        let mut uuid = field.clone();
        if let Some(last) = full_meta_name.rsplit('.').next() {
            if let Ok(u) = uuid::Uuid::parse_str(last) {
                uuid.extend_from_slice(u.as_bytes());
            }
        }

        FieldPrefix { field, uuid }
    }

    /// The prefix actually used for a given indexing event: uuid variant
    /// when the field carries a uuid path segment and `has_uuid_prefix` is
    /// set, plain field prefix otherwise.
    pub fn active<'a>(&'a self, has_uuid_prefix: bool) -> &'a [u8] {
        if has_uuid_prefix && !self.uuid.is_empty() {
            &self.uuid
        } else {
            &self.field
        }
    }
}

/// Reserved slot for `_id`; every other field's slot must avoid this value.
pub const ID_SLOT: u32 = 0;

/// `0xffffffff` is reserved as a sentinel (unassigned slot) so any field
/// that would hash to it is nudged down by one, per spec.md §4.2 point 2.
const SENTINEL_SLOT: u32 = 0xffff_ffff;
const SENTINEL_REPLACEMENT: u32 = 0xffff_fffe;

/// Derive a field's 32-bit value slot from the uppercased dotted path.
/// `_id` always gets slot 0 regardless of hash.
pub fn derive_slot(full_meta_name: &str) -> u32 {
    if full_meta_name == "_id" {
        return ID_SLOT;
    }
    let upper = full_meta_name.to_uppercase();
    let h = xxhash64(upper.as_bytes(), 0x5701_u64);
    let mut slot = (h as u32) | 1; // never collide with the reserved 0 slot
    if slot == SENTINEL_SLOT {
        slot = SENTINEL_REPLACEMENT;
    }
    slot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_field_always_gets_slot_zero() {
        assert_eq!(derive_slot("_id"), ID_SLOT);
    }

    #[test]
    fn slot_derivation_is_deterministic_and_avoids_reserved_values() {
        let a = derive_slot("authors.name");
        let b = derive_slot("authors.name");
        assert_eq!(a, b);
        assert_ne!(a, ID_SLOT);
        assert_ne!(a, SENTINEL_SLOT);
    }

    #[test]
    fn prefix_derivation_is_deterministic_and_type_sensitive() {
        let a = FieldPrefix::derive("year", ConcreteType::Integer);
        let b = FieldPrefix::derive("year", ConcreteType::Integer);
        let c = FieldPrefix::derive("year", ConcreteType::Text);
        assert_eq!(a, b);
        assert_ne!(a.field, c.field);
    }

    #[test]
    fn uuid_segment_gets_a_distinct_uuid_variant() {
        let plain = FieldPrefix::derive("authors.name", ConcreteType::Text);
        let uuid_field = FieldPrefix::derive(
            "authors.550e8400-e29b-41d4-a716-446655440000",
            ConcreteType::Text,
        );
        assert!(!uuid_field.uuid.is_empty());
        assert_ne!(uuid_field.uuid, plain.field);
    }
}
