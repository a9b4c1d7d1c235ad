//! Aggregations (spec.md §4.4 "Aggregations"): a nested tree of metric and
//! bucket aggregators driven by an `AggregationMatchSpy` that consumes each
//! matched document as the query executor produces it.
//!
//! The spec's original shape is a deep `SubAggregation` →
//! `HandledSubAggregation<Handler>` class hierarchy (spec.md §9 "Deep
//! inheritance" redesign flag); this replaces it with a sum type of
//! aggregator kinds plus a plain value-extraction closure, per that flag's
//! instruction.

use std::collections::HashMap;

use serde_json::Value;

use crate::core::types::FieldValue;
use crate::search::results::ScoredDocument;

/// One aggregation request node, named the way the HTTP body names it
/// (`{"my_agg": {"terms": {"field": "tags"}}}`).
#[derive(Debug, Clone)]
pub enum AggregationSpec {
    Metric(MetricKind, String),
    Bucket(BucketSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Variance,
    Std,
    Median,
    Mode,
    Stats,
    ExtendedStats,
}

#[derive(Debug, Clone)]
pub enum BucketSpec {
    /// Splits into a single bucket of documents matching a sub-query;
    /// `filter` is evaluated by the caller (the match spy only sees the
    /// post-filter set of matched documents, per spec.md's note that the
    /// spy "consumes each matched document").
    Filter { name: String, sub: Vec<AggregationSpec> },
    /// One bucket per distinct value of `field` (spec.md "values").
    Values { name: String, field: String, sub: Vec<AggregationSpec> },
    /// Same as `Values` but with bucket ordering/top-k applied (spec.md
    /// "terms").
    Terms { name: String, field: String, order: BucketOrder, limit: usize, min_doc_count: u64, sub: Vec<AggregationSpec> },
    /// Fixed-width numeric buckets (spec.md "histogram").
    Histogram { name: String, field: String, interval: f64, sub: Vec<AggregationSpec> },
    /// Explicit `[from, to)` bucket list (spec.md "range").
    Range { name: String, field: String, ranges: Vec<(Option<f64>, Option<f64>)>, sub: Vec<AggregationSpec> },
}

/// Bucket ordering key (spec.md "Bucket ordering: `_count`/`_key`/`<field>`
/// asc/desc").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOrder {
    CountAsc,
    CountDesc,
    KeyAsc,
    KeyDesc,
}

impl Default for BucketOrder {
    fn default() -> Self {
        BucketOrder::CountDesc
    }
}

/// Default top-k cutoff per bucket aggregation (spec.md "heap-bounded
/// top-k cutoff of size `limit` (default 10)").
pub const DEFAULT_BUCKET_LIMIT: usize = 10;
/// Default `min_doc_count` filter (spec.md "default 1").
pub const DEFAULT_MIN_DOC_COUNT: u64 = 1;

/// A computed metric value, shaped close to the response envelope's
/// `#aggregations` node.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Count(u64),
    Number(f64),
    Stats { count: u64, min: f64, max: f64, avg: f64, sum: f64 },
    ExtendedStats { count: u64, min: f64, max: f64, avg: f64, sum: f64, variance: f64, std: f64 },
}

#[derive(Debug, Clone)]
pub struct BucketResult {
    pub key: String,
    pub doc_count: u64,
    pub sub_aggregations: HashMap<String, AggregationResult>,
}

#[derive(Debug, Clone)]
pub enum AggregationResult {
    Metric(MetricValue),
    Buckets(Vec<BucketResult>),
}

/// Per-field accumulated samples a metric is computed over. Kept as raw
/// `f64` samples rather than a running accumulator so `median`/`mode` (which
/// need the full distribution) and `sum`/`avg`/`variance` (which don't) can
/// share one collection pass.
#[derive(Default)]
struct Samples(Vec<f64>);

impl Samples {
    fn push(&mut self, v: f64) {
        self.0.push(v);
    }

    fn metric(&self, kind: MetricKind) -> MetricValue {
        let n = self.0.len() as u64;
        if self.0.is_empty() {
            return match kind {
                MetricKind::Count => MetricValue::Count(0),
                MetricKind::Stats => MetricValue::Stats { count: 0, min: 0.0, max: 0.0, avg: 0.0, sum: 0.0 },
                MetricKind::ExtendedStats => {
                    MetricValue::ExtendedStats { count: 0, min: 0.0, max: 0.0, avg: 0.0, sum: 0.0, variance: 0.0, std: 0.0 }
                }
                _ => MetricValue::Number(0.0),
            };
        }
        let sum: f64 = self.0.iter().sum();
        let avg = sum / n as f64;
        let min = self.0.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = self.0.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let variance = self.0.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / n as f64;

        match kind {
            MetricKind::Count => MetricValue::Count(n),
            MetricKind::Sum => MetricValue::Number(sum),
            MetricKind::Avg => MetricValue::Number(avg),
            MetricKind::Min => MetricValue::Number(min),
            MetricKind::Max => MetricValue::Number(max),
            MetricKind::Variance => MetricValue::Number(variance),
            MetricKind::Std => MetricValue::Number(variance.sqrt()),
            MetricKind::Median => MetricValue::Number(percentile(&self.0, 0.5)),
            MetricKind::Mode => MetricValue::Number(mode(&self.0)),
            MetricKind::Stats => MetricValue::Stats { count: n, min, max, avg, sum },
            MetricKind::ExtendedStats => {
                MetricValue::ExtendedStats { count: n, min, max, avg, sum, variance, std: variance.sqrt() }
            }
        }
    }
}

fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted.get(idx).copied().unwrap_or(0.0)
}

fn mode(values: &[f64]) -> f64 {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values {
        let entry = counts.entry(v.to_bits()).or_insert((v, 0));
        entry.1 += 1;
    }
    counts
        .into_values()
        .max_by_key(|(_, count)| *count)
        .map(|(v, _)| v)
        .unwrap_or(0.0)
}

/// Consumes documents as the query executor matches them and routes each
/// one through the nested aggregation tree (spec.md "An `AggregationMatchSpy`
/// ... consumes each matched document and routes its values through a
/// nested tree of sub-aggregators").
pub struct AggregationMatchSpy {
    specs: Vec<AggregationSpec>,
    docs: Vec<ScoredDocument>,
}

impl AggregationMatchSpy {
    pub fn new(specs: Vec<AggregationSpec>) -> Self {
        AggregationMatchSpy { specs, docs: Vec::new() }
    }

    /// Feed one matched document to the spy. Skipped if `document` is
    /// `None` — every hit the executor produces carries one (see
    /// `query::matcher::DocumentMatcher::matches`), but callers that build
    /// `ScoredDocument`s by hand (tests, replay tooling) aren't required to.
    pub fn collect(&mut self, doc: &ScoredDocument) {
        if doc.document.is_some() {
            self.docs.push(doc.clone());
        }
    }

    /// Run every top-level aggregation over the documents collected so far.
    pub fn finish(self) -> HashMap<String, AggregationResult> {
        let mut out = HashMap::new();
        for spec in &self.specs {
            let (name, result) = run_aggregation(spec, &self.docs);
            out.insert(name, result);
        }
        out
    }
}

fn run_aggregation(spec: &AggregationSpec, docs: &[ScoredDocument]) -> (String, AggregationResult) {
    match spec {
        AggregationSpec::Metric(kind, field) => {
            let mut samples = Samples::default();
            for doc in docs {
                if let Some(v) = field_number(doc, field) {
                    samples.push(v);
                }
            }
            (format!("{field}:{kind:?}"), AggregationResult::Metric(samples.metric(*kind)))
        }
        AggregationSpec::Bucket(bucket) => run_bucket(bucket, docs),
    }
}

fn run_bucket(bucket: &BucketSpec, docs: &[ScoredDocument]) -> (String, AggregationResult) {
    match bucket {
        BucketSpec::Filter { name, sub } => {
            let mut sub_results = HashMap::new();
            for spec in sub {
                let (sub_name, result) = run_aggregation(spec, docs);
                sub_results.insert(sub_name, result);
            }
            let bucket = BucketResult { key: name.clone(), doc_count: docs.len() as u64, sub_aggregations: sub_results };
            (name.clone(), AggregationResult::Buckets(vec![bucket]))
        }
        BucketSpec::Values { name, field, sub } => {
            let grouped = group_by_key(docs, field);
            let buckets = finish_buckets(grouped, sub, BucketOrder::KeyAsc, usize::MAX, 0);
            (name.clone(), AggregationResult::Buckets(buckets))
        }
        BucketSpec::Terms { name, field, order, limit, min_doc_count, sub } => {
            let grouped = group_by_key(docs, field);
            let buckets = finish_buckets(grouped, sub, *order, *limit, *min_doc_count);
            (name.clone(), AggregationResult::Buckets(buckets))
        }
        BucketSpec::Histogram { name, field, interval, sub } => {
            let mut grouped: HashMap<String, Vec<ScoredDocument>> = HashMap::new();
            for doc in docs {
                if let Some(v) = field_number(doc, field) {
                    let bucket_start = (v / interval).floor() * interval;
                    grouped.entry(format!("{bucket_start}")).or_default().push(doc.clone());
                }
            }
            let buckets = finish_buckets(grouped, sub, BucketOrder::KeyAsc, usize::MAX, 0);
            (name.clone(), AggregationResult::Buckets(buckets))
        }
        BucketSpec::Range { name, field, ranges, sub } => {
            let mut grouped: HashMap<String, Vec<ScoredDocument>> = HashMap::new();
            for doc in docs {
                if let Some(v) = field_number(doc, field) {
                    for (from, to) in ranges {
                        let in_range = from.map_or(true, |f| v >= f) && to.map_or(true, |t| v < t);
                        if in_range {
                            let key = format!("{}-{}", fmt_bound(*from), fmt_bound(*to));
                            grouped.entry(key).or_default().push(doc.clone());
                        }
                    }
                }
            }
            let buckets = finish_buckets(grouped, sub, BucketOrder::KeyAsc, usize::MAX, 0);
            (name.clone(), AggregationResult::Buckets(buckets))
        }
    }
}

fn fmt_bound(bound: Option<f64>) -> String {
    bound.map(|v| v.to_string()).unwrap_or_else(|| "*".to_string())
}

fn group_by_key(docs: &[ScoredDocument], field: &str) -> HashMap<String, Vec<ScoredDocument>> {
    let mut grouped: HashMap<String, Vec<ScoredDocument>> = HashMap::new();
    for doc in docs {
        if let Some(key) = field_key(doc, field) {
            grouped.entry(key).or_default().push(doc.clone());
        }
    }
    grouped
}

fn finish_buckets(
    grouped: HashMap<String, Vec<ScoredDocument>>,
    sub: &[AggregationSpec],
    order: BucketOrder,
    limit: usize,
    min_doc_count: u64,
) -> Vec<BucketResult> {
    let mut buckets: Vec<BucketResult> = grouped
        .into_iter()
        .filter(|(_, docs)| docs.len() as u64 >= min_doc_count)
        .map(|(key, docs)| {
            let mut sub_results = HashMap::new();
            for spec in sub {
                let (sub_name, result) = run_aggregation(spec, &docs);
                sub_results.insert(sub_name, result);
            }
            BucketResult { key, doc_count: docs.len() as u64, sub_aggregations: sub_results }
        })
        .collect();

    match order {
        BucketOrder::CountAsc => buckets.sort_by_key(|b| b.doc_count),
        BucketOrder::CountDesc => buckets.sort_by_key(|b| std::cmp::Reverse(b.doc_count)),
        BucketOrder::KeyAsc => buckets.sort_by(|a, b| a.key.cmp(&b.key)),
        BucketOrder::KeyDesc => buckets.sort_by(|a, b| b.key.cmp(&a.key)),
    }
    buckets.truncate(limit);
    buckets
}

fn field_value(doc: &ScoredDocument, field: &str) -> Option<FieldValue> {
    doc.document.as_ref().and_then(|d| d.fields.get(field).cloned())
}

fn field_number(doc: &ScoredDocument, field: &str) -> Option<f64> {
    match field_value(doc, field)? {
        FieldValue::Number(n) => Some(n),
        FieldValue::Integer(n) => Some(n as f64),
        FieldValue::Boolean(b) => Some(if b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn field_key(doc: &ScoredDocument, field: &str) -> Option<String> {
    match field_value(doc, field)? {
        FieldValue::Text(s) => Some(s),
        FieldValue::Number(n) => Some(n.to_string()),
        FieldValue::Integer(n) => Some(n.to_string()),
        FieldValue::Boolean(b) => Some(b.to_string()),
        FieldValue::Geo(g) => Some(g),
        FieldValue::Date(d) => Some(d.to_rfc3339()),
    }
}

/// Parse an aggregation request tree from the JSON body shape the HTTP
/// layer receives (`{"<name>": {"<kind>": {...}}}`). Unrecognized kinds are
/// rejected rather than silently dropped, so a typo in a request body
/// surfaces as a 400 instead of a quietly-empty aggregation.
pub fn parse_aggregations(body: &Value) -> crate::core::error::Result<Vec<AggregationSpec>> {
    let map = body.as_object().ok_or_else(|| crate::core::error::Error::client("aggregations must be a JSON object"))?;
    let mut specs = Vec::with_capacity(map.len());
    for (name, node) in map {
        specs.push(parse_one(name, node)?);
    }
    Ok(specs)
}

fn parse_one(name: &str, node: &Value) -> crate::core::error::Result<AggregationSpec> {
    let obj = node
        .as_object()
        .ok_or_else(|| crate::core::error::Error::client(format!("aggregation '{name}' must be an object")))?;
    let (kind, args) = obj
        .iter()
        .next()
        .ok_or_else(|| crate::core::error::Error::client(format!("aggregation '{name}' has no kind")))?;
    let field = |args: &Value| -> crate::core::error::Result<String> {
        args.get("field")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| crate::core::error::Error::client(format!("aggregation '{name}' is missing 'field'")))
    };
    let sub = match obj.get("aggregations").or_else(|| obj.get("aggs")) {
        Some(sub_node) => parse_aggregations(sub_node)?,
        None => Vec::new(),
    };

    let metric_kind = match kind.as_str() {
        "count" => Some(MetricKind::Count),
        "sum" => Some(MetricKind::Sum),
        "avg" => Some(MetricKind::Avg),
        "min" => Some(MetricKind::Min),
        "max" => Some(MetricKind::Max),
        "variance" => Some(MetricKind::Variance),
        "std" => Some(MetricKind::Std),
        "median" => Some(MetricKind::Median),
        "mode" => Some(MetricKind::Mode),
        "stats" => Some(MetricKind::Stats),
        "extended_stats" => Some(MetricKind::ExtendedStats),
        _ => None,
    };
    if let Some(metric_kind) = metric_kind {
        return Ok(AggregationSpec::Metric(metric_kind, field(args)?));
    }

    match kind.as_str() {
        "filter" => Ok(AggregationSpec::Bucket(BucketSpec::Filter { name: name.to_string(), sub })),
        "values" => Ok(AggregationSpec::Bucket(BucketSpec::Values { name: name.to_string(), field: field(args)?, sub })),
        "terms" => {
            let limit = args.get("limit").and_then(Value::as_u64).map(|v| v as usize).unwrap_or(DEFAULT_BUCKET_LIMIT);
            let min_doc_count = args.get("min_doc_count").and_then(Value::as_u64).unwrap_or(DEFAULT_MIN_DOC_COUNT);
            let order = match args.get("order").and_then(Value::as_str) {
                Some("_count") => BucketOrder::CountDesc,
                Some("_count_asc") => BucketOrder::CountAsc,
                Some("_key") => BucketOrder::KeyAsc,
                Some("_key_desc") => BucketOrder::KeyDesc,
                _ => BucketOrder::default(),
            };
            Ok(AggregationSpec::Bucket(BucketSpec::Terms { name: name.to_string(), field: field(args)?, order, limit, min_doc_count, sub }))
        }
        "histogram" => {
            let interval = args.get("interval").and_then(Value::as_f64).unwrap_or(1.0);
            Ok(AggregationSpec::Bucket(BucketSpec::Histogram { name: name.to_string(), field: field(args)?, interval, sub }))
        }
        "range" => {
            let ranges = args
                .get("ranges")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .map(|r| {
                            let from = r.get("from").and_then(Value::as_f64);
                            let to = r.get("to").and_then(Value::as_f64);
                            (from, to)
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(AggregationSpec::Bucket(BucketSpec::Range { name: name.to_string(), field: field(args)?, ranges, sub }))
        }
        // date_histogram, geo_distance, missing, ip_range, geo_trixels are
        // named as extensible stubs in spec.md but have no concrete request
        // shape defined; reject rather than guess one.
        other => Err(crate::core::error::Error::client(format!("unsupported aggregation kind '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DocId, Document};

    fn doc_with(field: &str, value: FieldValue) -> ScoredDocument {
        let mut document = Document::new(DocId::new(1));
        document.add_field(field.to_string(), value);
        ScoredDocument { doc_id: DocId::new(1), score: 1.0, document: Some(document), explanation: None }
    }

    #[test]
    fn count_metric_counts_documents_with_the_field() {
        let docs = vec![doc_with("price", FieldValue::Number(1.0)), doc_with("price", FieldValue::Number(2.0))];
        let mut spy = AggregationMatchSpy::new(vec![AggregationSpec::Metric(MetricKind::Count, "price".to_string())]);
        for d in &docs {
            spy.collect(d);
        }
        let results = spy.finish();
        match results.values().next().unwrap() {
            AggregationResult::Metric(MetricValue::Count(n)) => assert_eq!(*n, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn avg_and_sum_metrics_compute_correctly() {
        let docs = vec![doc_with("price", FieldValue::Number(10.0)), doc_with("price", FieldValue::Number(20.0))];
        let mut spy = AggregationMatchSpy::new(vec![AggregationSpec::Metric(MetricKind::Avg, "price".to_string())]);
        for d in &docs {
            spy.collect(d);
        }
        match spy.finish().values().next().unwrap() {
            AggregationResult::Metric(MetricValue::Number(n)) => assert_eq!(*n, 15.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn terms_bucket_orders_by_count_descending_by_default() {
        let docs = vec![
            doc_with("tag", FieldValue::Text("a".to_string())),
            doc_with("tag", FieldValue::Text("a".to_string())),
            doc_with("tag", FieldValue::Text("b".to_string())),
        ];
        let mut spy = AggregationMatchSpy::new(vec![AggregationSpec::Bucket(BucketSpec::Terms {
            name: "tags".to_string(),
            field: "tag".to_string(),
            order: BucketOrder::CountDesc,
            limit: DEFAULT_BUCKET_LIMIT,
            min_doc_count: DEFAULT_MIN_DOC_COUNT,
            sub: Vec::new(),
        })]);
        for d in &docs {
            spy.collect(d);
        }
        match spy.finish().remove("tags").unwrap() {
            AggregationResult::Buckets(buckets) => {
                assert_eq!(buckets[0].key, "a");
                assert_eq!(buckets[0].doc_count, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn min_doc_count_filters_sparse_buckets() {
        let docs = vec![doc_with("tag", FieldValue::Text("solo".to_string()))];
        let mut spy = AggregationMatchSpy::new(vec![AggregationSpec::Bucket(BucketSpec::Terms {
            name: "tags".to_string(),
            field: "tag".to_string(),
            order: BucketOrder::CountDesc,
            limit: DEFAULT_BUCKET_LIMIT,
            min_doc_count: 2,
            sub: Vec::new(),
        })]);
        for d in &docs {
            spy.collect(d);
        }
        match spy.finish().remove("tags").unwrap() {
            AggregationResult::Buckets(buckets) => assert!(buckets.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_aggregations_reads_terms_request_body() {
        let body = serde_json::json!({
            "by_tag": {"terms": {"field": "tag", "limit": 5}}
        });
        let specs = parse_aggregations(&body).unwrap();
        match &specs[0] {
            AggregationSpec::Bucket(BucketSpec::Terms { field, limit, .. }) => {
                assert_eq!(field, "tag");
                assert_eq!(*limit, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_aggregations_rejects_unknown_kind() {
        let body = serde_json::json!({"weird": {"not_a_kind": {"field": "x"}}});
        assert!(parse_aggregations(&body).is_err());
    }
}
