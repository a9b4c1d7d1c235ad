//! The indexing pipeline (spec.md §4.3): walks a recursive JSON document
//! guided by `Schema`, producing stored-data blobs, indexed terms, sortable
//! value slots, and accuracy terms — including geospatial trixel
//! decomposition and date-math resolution for the concrete types that
//! carry them.

use serde_json::Value;
use uuid::Uuid;

use crate::core::data::{Data, Locator};
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document, FieldValue};
use crate::indexing::datemath::parse_date_math;
use crate::indexing::geo::{decompose, geodetic_to_cartesian, GeoShape, MAX_HTM_LEVEL};
use crate::indexing::types::{serialize_bool, serialize_f64, serialize_i64, IndexedDocument, Term};
use crate::schema::specification::{ConcreteType, Specification};
use crate::schema::tree::{is_reserved, Schema};

/// Reserved keys that split payload children from directives, per spec.md
/// §4.3 "Recursive walk": "split reserved words (`_type`, `_index`,
/// `_value`, `_script`, …) from payload children".
const DIRECTIVE_KEYS: &[&str] = &["_type", "_index", "_value", "_script", "_namespace", "_accuracy"];

fn is_directive(key: &str) -> bool {
    DIRECTIVE_KEYS.contains(&key) || is_reserved(key)
}

/// Per-call indexing context: the dynamic/strict defaults a document can
/// override per field via `_index`/`_type`/`_namespace` directives, and the
/// default content-type the `_data` body is stored under.
#[derive(Debug, Clone)]
pub struct IndexingOptions {
    pub dynamic: bool,
    pub strict: bool,
    pub content_type: String,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        IndexingOptions {
            dynamic: true,
            strict: false,
            content_type: "application/json".to_string(),
        }
    }
}

/// Entry point (spec.md §4.3 "Entry"): `index(obj, doc_id, old_document,
/// handler) → (term_id, Document, data_preview)`, here returning the
/// structured `IndexedDocument` a `pool::Database` write wraps into its own
/// document representation.
pub fn index(
    schema: &Schema,
    obj: &Value,
    doc_id: DocId,
    old_data: Option<&Data>,
    options: &IndexingOptions,
) -> Result<IndexedDocument> {
    let root = obj
        .as_object()
        .ok_or_else(|| Error::client("document root must be a JSON object"))?;

    let mut indexed = IndexedDocument::new(doc_id);
    indexed.add_term(Term::new(b"Q", indexed.term_id[1..].to_vec(), true));

    for (key, value) in root {
        if is_directive(key) {
            continue;
        }
        walk_field(schema, key, value, options, &mut indexed)?;
    }

    let mut data = Data::new();
    let body = serde_json::to_vec(obj).map_err(Error::from)?;
    data.put(Locator::inline(options.content_type.clone(), body));
    indexed.data = match old_data {
        Some(old) => data.merge_over(old),
        None => data,
    };

    Ok(indexed)
}

/// Flatten a JSON document into the flat `(dotted_path → FieldValue)` shape
/// the storage engine's own matcher/executor (`core::database::Database`,
/// playing the opaque "inverted index library" role, spec.md §1) operates
/// on. `index()` above is the schema-governed pass that freezes types,
/// derives prefixes/slots/accuracy, and builds `Data`; this is the
/// complementary, engine-facing projection of the same document so it is
/// actually retrievable/matchable through the segments that back it.
/// Numeric leaves (integer/positive/float) are stored as `FieldValue::Number`
/// rather than the schema's separate `Integer`/`Positive` distinction,
/// because `query::matcher::matches_range` only recognizes `Number` —
/// documented here rather than widening the matcher's contract.
/// The full JSON body is preserved verbatim under `_source` so document
/// retrieval doesn't have to reconstruct structure lost by flattening.
pub fn flatten_to_document(obj: &Value, doc_id: DocId) -> Document {
    let mut doc = Document::new(doc_id);
    if let Some(root) = obj.as_object() {
        for (key, value) in root {
            if is_directive(key) {
                continue;
            }
            flatten_field(key, value, &mut doc);
        }
    }
    doc.add_field(
        "_source".to_string(),
        FieldValue::Text(serde_json::to_string(obj).unwrap_or_default()),
    );
    doc
}

fn flatten_field(path: &str, value: &Value, doc: &mut Document) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            if let Some(inner) = map.get("_value") {
                flatten_field(path, inner, doc);
                return;
            }
            for (child_key, child_value) in map {
                if is_directive(child_key) {
                    continue;
                }
                flatten_field(&format!("{path}.{child_key}"), child_value, doc);
            }
        }
        Value::Array(items) => {
            // Flat `Document` has one slot per path: first element wins,
            // matching the schema-side rule that an array shares one
            // `Specification` (spec.md §4.2) while only a single value can
            // be range/term-matched through this flattened projection.
            if let Some(first) = items.first() {
                flatten_field(path, first, doc);
            }
        }
        Value::Bool(b) => {
            doc.add_field(path.to_string(), FieldValue::Boolean(*b));
        }
        Value::Number(n) => {
            doc.add_field(path.to_string(), FieldValue::Number(n.as_f64().unwrap_or(0.0)));
        }
        Value::String(s) => {
            // Dates would otherwise land as opaque `Text`, and
            // `query::matcher::matches_range` only compares `Number` —
            // store the epoch seconds instead so date ranges are
            // queryable through the same path as plain numeric fields.
            match parse_date_math(s) {
                Ok(date) => doc.add_field(path.to_string(), FieldValue::Number(date.seconds)),
                Err(_) => doc.add_field(path.to_string(), FieldValue::Text(s.clone())),
            }
        }
    }
}

fn walk_field(
    schema: &Schema,
    full_meta_name: &str,
    value: &Value,
    options: &IndexingOptions,
    indexed: &mut IndexedDocument,
) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Object(map) => {
            // An object may itself carry `_value`/`_type` directives
            // alongside nested fields (spec.md §4.3: "split reserved words
            // ... from payload children").
            if let Some(inner) = map.get("_value") {
                return walk_field(schema, full_meta_name, inner, options, indexed);
            }
            for (child_key, child_value) in map {
                if is_directive(child_key) {
                    continue;
                }
                let child_path = format!("{full_meta_name}.{child_key}");
                walk_field(schema, &child_path, child_value, options, indexed)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                walk_field(schema, full_meta_name, item, options, indexed)?;
            }
            Ok(())
        }
        leaf => index_leaf(schema, full_meta_name, leaf, options, indexed),
    }
}

fn index_leaf(
    schema: &Schema,
    full_meta_name: &str,
    value: &Value,
    options: &IndexingOptions,
    indexed: &mut IndexedDocument,
) -> Result<()> {
    let concrete = detect_concrete_type(value);
    let spec = schema.resolve_or_create(full_meta_name, concrete, options.dynamic, options.strict)?;

    match concrete {
        ConcreteType::Boolean => index_bool(&spec, value, indexed),
        ConcreteType::Integer | ConcreteType::Positive => index_integer(&spec, value, indexed),
        ConcreteType::Float => index_float(&spec, value, indexed),
        ConcreteType::Date => index_date(&spec, value, indexed),
        ConcreteType::Uuid => index_uuid(&spec, value, indexed),
        ConcreteType::Geo => index_geo(&spec, value, indexed),
        ConcreteType::Text => index_text(&spec, value, indexed),
        ConcreteType::Keyword | ConcreteType::String => index_keyword(&spec, value, indexed),
        _ => Ok(()),
    }?;

    for namespace_term in schema.namespace_terms(full_meta_name) {
        indexed.add_term(Term::new(namespace_term.as_bytes(), Vec::new(), true));
    }

    Ok(())
}

/// First-use type inference for an untyped JSON leaf (spec.md §4.2
/// "dynamic detection toggles"). A real deployment consults each field's
/// `DetectionFlags`; since those default to all-enabled (and `strict`
/// already gated field creation above this call), the order below mirrors
/// the original's detection precedence: explicit structural types first
/// (bool/number), then string sub-types from most to least specific
/// (uuid, date, else text).
fn detect_concrete_type(value: &Value) -> ConcreteType {
    match value {
        Value::Bool(_) => ConcreteType::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                ConcreteType::Integer
            } else {
                ConcreteType::Float
            }
        }
        Value::String(s) => {
            if Uuid::parse_str(s).is_ok() {
                ConcreteType::Uuid
            } else if looks_like_geo(s) {
                ConcreteType::Geo
            } else if parse_date_math(s).is_ok() {
                ConcreteType::Date
            } else {
                ConcreteType::Text
            }
        }
        _ => ConcreteType::Text,
    }
}

fn looks_like_geo(s: &str) -> bool {
    s.starts_with("SRID=") || s.starts_with("POINT(") || s.starts_with("CIRCLE(")
}

fn emit_field_and_accuracy(spec: &Specification, indexed: &mut IndexedDocument, serialized: Vec<u8>, numeric_value: Option<i64>) {
    let prefix = spec.prefix.active(spec.flags.has_uuid_prefix).to_vec();
    if spec.index.field_term() {
        indexed.add_term(Term::new(&prefix, serialized.clone(), spec.flags.bool_term));
    }
    if spec.index.field_value() {
        indexed.add_slot_value(spec.slot, serialized);
    }
    if let Some(value) = numeric_value {
        for (level, step, acc_prefix) in spec.accuracy.coarsest_first() {
            if let Some(bucketed) = spec.accuracy.bucket(level, value) {
                indexed.add_term(Term::new(acc_prefix, serialize_i64(bucketed).to_vec(), true));
            }
            let _ = step;
        }
    }
}

fn index_bool(spec: &Specification, value: &Value, indexed: &mut IndexedDocument) -> Result<()> {
    let b = value.as_bool().ok_or_else(|| Error::cast("expected boolean"))?;
    emit_field_and_accuracy(spec, indexed, serialize_bool(b).to_vec(), None);
    Ok(())
}

fn index_integer(spec: &Specification, value: &Value, indexed: &mut IndexedDocument) -> Result<()> {
    let n = value.as_i64().ok_or_else(|| Error::cast("expected integer"))?;
    if spec.sep_types.concrete == ConcreteType::Positive && n < 0 {
        return Err(Error::cast("positive field received a negative value"));
    }
    emit_field_and_accuracy(spec, indexed, serialize_i64(n).to_vec(), Some(n));
    Ok(())
}

fn index_float(spec: &Specification, value: &Value, indexed: &mut IndexedDocument) -> Result<()> {
    let f = value.as_f64().ok_or_else(|| Error::cast("expected float"))?;
    emit_field_and_accuracy(spec, indexed, serialize_f64(f).to_vec(), Some(f.round() as i64));
    Ok(())
}

fn index_date(spec: &Specification, value: &Value, indexed: &mut IndexedDocument) -> Result<()> {
    let s = value.as_str().ok_or_else(|| Error::cast("expected date string"))?;
    let dt = parse_date_math(s)?;
    let seconds = dt.seconds.round() as i64;
    emit_field_and_accuracy(spec, indexed, serialize_i64(seconds).to_vec(), Some(seconds));
    Ok(())
}

fn index_uuid(spec: &Specification, value: &Value, indexed: &mut IndexedDocument) -> Result<()> {
    let s = value.as_str().ok_or_else(|| Error::cast("expected uuid string"))?;
    let uuid = Uuid::parse_str(s).map_err(|e| Error::cast(e.to_string()))?;
    emit_field_and_accuracy(spec, indexed, uuid.as_bytes().to_vec(), None);
    Ok(())
}

/// Parse a minimal `SRID=<code>;POINT(lon lat)` / `POINT(lon lat)` /
/// `CIRCLE(lon lat, radius_m)` value and decompose it into HTM trixel
/// terms (spec.md §4.3 point 6).
fn index_geo(spec: &Specification, value: &Value, indexed: &mut IndexedDocument) -> Result<()> {
    let s = value.as_str().ok_or_else(|| Error::cast("expected geo string"))?;
    let (srid_code, rest) = match s.split_once(';') {
        Some((srid_part, rest)) => (
            srid_part
                .strip_prefix("SRID=")
                .and_then(|c| c.parse::<u32>().ok())
                .unwrap_or(4326),
            rest,
        ),
        None => (4326, s),
    };
    let srid = crate::indexing::geo::Srid::from_epsg(srid_code).unwrap_or(crate::indexing::geo::Srid::Wgs84);

    let shape = if let Some(coords) = rest.strip_prefix("POINT(").and_then(|r| r.strip_suffix(')')) {
        let (lon, lat) = parse_lon_lat(coords)?;
        let (lon, lat) = srid.to_wgs84(lon, lat);
        GeoShape::Point(geodetic_to_cartesian(lon, lat))
    } else if let Some(coords) = rest.strip_prefix("CIRCLE(").and_then(|r| r.strip_suffix(')')) {
        let mut parts = coords.splitn(2, ',');
        let center = parts.next().ok_or_else(|| Error::cast("malformed CIRCLE"))?;
        let radius_m: f64 = parts
            .next()
            .ok_or_else(|| Error::cast("malformed CIRCLE"))?
            .trim()
            .parse()
            .map_err(|_| Error::cast("malformed CIRCLE radius"))?;
        let (lon, lat) = parse_lon_lat(center)?;
        let (lon, lat) = srid.to_wgs84(lon, lat);
        const EARTH_RADIUS_M: f64 = 6_378_137.0;
        GeoShape::Circle(geodetic_to_cartesian(lon, lat), radius_m / EARTH_RADIUS_M)
    } else {
        return Err(Error::cast("unrecognized geo literal"));
    };

    let error_radians = (spec.error.max(1.0)) / 6_378_137.0;
    let terms = decompose(&shape, MAX_HTM_LEVEL, error_radians);
    for trixel_id in terms {
        let prefix = spec.prefix.active(spec.flags.has_uuid_prefix);
        indexed.add_term(Term::new(prefix, trixel_id.into_bytes(), true));
    }
    Ok(())
}

fn parse_lon_lat(coords: &str) -> Result<(f64, f64)> {
    let mut parts = coords.split_whitespace();
    let lon: f64 = parts
        .next()
        .ok_or_else(|| Error::cast("missing longitude"))?
        .parse()
        .map_err(|_| Error::cast("invalid longitude"))?;
    let lat: f64 = parts
        .next()
        .ok_or_else(|| Error::cast("missing latitude"))?
        .parse()
        .map_err(|_| Error::cast("invalid latitude"))?;
    Ok((lon, lat))
}

fn index_text(spec: &Specification, value: &Value, indexed: &mut IndexedDocument) -> Result<()> {
    let s = value.as_str().ok_or_else(|| Error::cast("expected text string"))?;
    let analyzer = text_analyzer_for(spec);
    let prefix = spec.prefix.active(spec.flags.has_uuid_prefix).to_vec();
    for token in analyzer.analyze(s) {
        if spec.index.field_term() {
            indexed.add_term(Term::new(&prefix, token.text.into_bytes(), false));
        }
    }
    if spec.index.field_value() {
        indexed.add_slot_value(spec.slot, s.as_bytes().to_vec());
    }
    Ok(())
}

fn text_analyzer_for(spec: &Specification) -> crate::analysis::analyzer::Analyzer {
    use crate::analysis::language::vietnamese::VietnameseTokenizer;
    if spec.language == "vi" {
        crate::analysis::analyzer::Analyzer::new("vi".to_string(), Box::new(VietnameseTokenizer::default()))
    } else {
        crate::analysis::analyzer::Analyzer::standard_english()
    }
}

fn index_keyword(spec: &Specification, value: &Value, indexed: &mut IndexedDocument) -> Result<()> {
    let s = value.as_str().ok_or_else(|| Error::cast("expected keyword/string value"))?;
    emit_field_and_accuracy(spec, indexed, s.as_bytes().to_vec(), None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indexes_flat_document_and_emits_id_term() {
        let schema = Schema::new("");
        let doc = json!({"name": "hello", "year": 2010});
        let indexed = index(&schema, &doc, DocId::new(1), None, &IndexingOptions::default()).unwrap();
        assert_eq!(indexed.term_id, b"Q1".to_vec());
        assert!(!indexed.terms.is_empty());
        schema.commit();
        assert!(schema.get("name").is_some());
        assert!(schema.get("year").is_some());
    }

    #[test]
    fn nested_object_creates_dotted_field_path() {
        let schema = Schema::new("");
        let doc = json!({"authors": {"name": {"given": "Ada"}}});
        index(&schema, &doc, DocId::new(1), None, &IndexingOptions::default()).unwrap();
        schema.commit();
        assert!(schema.get("authors.name.given").is_some());
    }

    #[test]
    fn array_values_share_one_field_spec() {
        let schema = Schema::new("");
        let doc = json!({"tags": ["a", "b", "c"]});
        let indexed = index(&schema, &doc, DocId::new(1), None, &IndexingOptions::default()).unwrap();
        schema.commit();
        assert!(schema.get("tags").is_some());
        assert!(indexed.terms.len() >= 3);
    }

    #[test]
    fn mismatched_type_on_second_document_is_rejected() {
        let schema = Schema::new("");
        index(&schema, &json!({"year": 2010}), DocId::new(1), None, &IndexingOptions::default()).unwrap();
        schema.commit();

        let err = index(&schema, &json!({"year": "not a number"}), DocId::new(2), None, &IndexingOptions::default())
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn geo_point_emits_trixel_terms() {
        let schema = Schema::new("");
        let doc = json!({"location": "SRID=4326;POINT(-3.7 40.4)"});
        let indexed = index(&schema, &doc, DocId::new(1), None, &IndexingOptions::default()).unwrap();
        assert!(indexed.terms.len() > 1);
    }

    #[test]
    fn data_blob_preserves_untouched_locators_on_update() {
        let schema = Schema::new("");
        let mut old = Data::new();
        old.put(Locator::inline("image/png", b"binary".to_vec()));

        let doc = json!({"name": "hello"});
        let indexed = index(&schema, &doc, DocId::new(1), Some(&old), &IndexingOptions::default()).unwrap();
        assert!(indexed.data.get("image/png").is_some());
        assert!(indexed.data.get("application/json").is_some());
    }
}
