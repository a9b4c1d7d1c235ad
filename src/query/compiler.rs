//! Query compiler (spec.md §4.4): turns the HTTP-facing query string
//! (`?q=...`, sort, aggregations) into the library-level `Query` AST that
//! `core::database::Database::search_query` executes, using `Schema` to
//! resolve accuracy ladders for numeric/date range rewrites.
//!
//! This replaces the hand-rolled splitter in `query::parser` for anything
//! beyond the simplest `field:value` shape: parentheses, `AND`/`OR`/`NOT`/
//! `XOR` precedence, quoted phrases, and `[lo,hi)`-style range brackets.
//! `query::parser::QueryParser` is left in place for callers that only
//! need its narrower grammar.

use crate::core::error::{Error, Result};
use crate::core::types::FieldValue;
use crate::indexing::datemath::parse_date_math;
use crate::query::ast::{BoolQuery, PhraseQuery, Query, RangeQuery, TermQuery};
use crate::schema::accuracy::AccuracyLadder;
use crate::schema::tree::Schema;

/// A single requested sort key (spec.md §4.4 "Output"): ascending unless
/// prefixed with `-`.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => SortKey { field: field.to_string(), descending: true },
            None => SortKey { field: raw.to_string(), descending: false },
        }
    }
}

/// A fully compiled request: the `Query` tree plus the pagination/sort
/// directives that travel alongside it through the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub query: Query,
    pub sort: Vec<SortKey>,
    pub offset: usize,
    pub limit: usize,
}

/// Query strings are capped at this many accuracy-rewritten terms (spec.md
/// §4.4 "Range rewrite"); past the cap the compiler falls back to the
/// literal `Range` rather than building an unbounded term list.
pub const MAX_ACCURACY_TERMS: usize = 100;

/// Compile `input` into an executable `Query`, consulting `schema` to
/// decide whether a range clause's field carries an accuracy ladder.
pub fn compile(schema: &Schema, input: &str, sort: &[String], offset: usize, limit: usize) -> Result<CompiledQuery> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens: &tokens, pos: 0, schema };
    let query = if tokens.is_empty() { Query::MatchAll } else { parser.parse_expr()? };
    if parser.pos != tokens.len() {
        return Err(Error::client(format!("unexpected token near position {}", parser.pos)));
    }
    Ok(CompiledQuery {
        query,
        sort: sort.iter().map(|s| SortKey::parse(s)).collect(),
        offset,
        limit,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBracket(bool), // true = inclusive '['
    RBracket(bool), // true = inclusive ']'
    Comma,
    Colon,
    And,
    Or,
    Not,
    Xor,
    Word(String),
    Quoted(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket(true));
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBracket(false));
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket(true));
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBracket(false));
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '"' => {
                let mut buf = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    buf.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(Error::client("unterminated quoted phrase"));
                }
                i += 1; // closing quote
                tokens.push(Token::Quoted(buf));
            }
            _ => {
                let start = i;
                while i < chars.len() {
                    let c = chars[i];
                    if c.is_whitespace() || "()[]{}:,\"".contains(c) {
                        break;
                    }
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "XOR" => Token::Xor,
                    _ => Token::Word(word),
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    schema: &'a Schema,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// `expr := term ((AND|OR|XOR|NOT|ε) term)*`, left-associative, all
    /// operators sharing one precedence level (spec.md §4.4 grammar keeps
    /// boolean combinators flat rather than layering AND over OR). Infix
    /// `NOT` lowers to `AND NOT` (`a NOT b` == `a AND NOT b`); two terms
    /// with no operator between them lower to `AND` (spec.md §4.4 "query
    /// strings (implicit AND)").
    fn parse_expr(&mut self) -> Result<Query> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    let right = self.parse_term()?;
                    left = and_combine(left, right);
                }
                Some(Token::Or) => {
                    self.advance();
                    let right = self.parse_term()?;
                    left = or_combine(left, right);
                }
                Some(Token::Xor) => {
                    self.advance();
                    let right = self.parse_term()?;
                    left = xor_combine(left, right);
                }
                Some(Token::Not) => {
                    self.advance();
                    let right = self.parse_term()?;
                    left = and_combine(left, negate(right));
                }
                Some(Token::LParen) | Some(Token::Quoted(_)) | Some(Token::Word(_)) => {
                    let right = self.parse_term()?;
                    left = and_combine(left, right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Query> {
        if let Some(Token::Not) = self.peek() {
            self.advance();
            let inner = self.parse_term()?;
            return Ok(negate(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Query> {
        match self.advance().cloned() {
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Error::client("expected ')'")),
                }
            }
            Some(Token::Quoted(phrase)) => Ok(phrase_query("_all", &phrase)),
            Some(Token::Word(word)) => self.parse_word_or_field(word),
            other => Err(Error::client(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_word_or_field(&mut self, word: String) -> Result<Query> {
        if let Some(Token::Colon) = self.peek() {
            self.advance();
            return self.parse_value(&word);
        }
        Ok(Query::Term(TermQuery { field: "_all".to_string(), value: word, boost: None }))
    }

    fn parse_value(&mut self, field: &str) -> Result<Query> {
        match self.advance().cloned() {
            Some(Token::Quoted(phrase)) => Ok(phrase_query(field, &phrase)),
            Some(Token::LBracket(inclusive)) => self.parse_range(field, inclusive),
            Some(Token::Word(word)) => {
                if let Some(rest) = word.strip_prefix("..") {
                    // `field:..hi` shorthand, no lower bound.
                    return Ok(bound_only(field, None, Some(parse_bound(rest)?)));
                }
                if let Some((lo, hi)) = word.split_once("..") {
                    if !lo.is_empty() || !hi.is_empty() {
                        let gte = if lo.is_empty() { None } else { Some(parse_bound(lo)?) };
                        let lte = if hi.is_empty() { None } else { Some(parse_bound(hi)?) };
                        return Ok(self.rewrite_range(field, gte, lte, true, true));
                    }
                }
                Ok(Query::Term(TermQuery { field: field.to_string(), value: word, boost: None }))
            }
            other => Err(Error::client(format!("expected a value after '{field}:', got {other:?}"))),
        }
    }

    /// `[lo,hi]`, `[lo,hi)`, `(lo,hi]`, `(lo,hi)` — bracket shape sets
    /// inclusivity on each side independently (spec.md §4.4 "range
    /// syntax").
    fn parse_range(&mut self, field: &str, lower_inclusive: bool) -> Result<Query> {
        // `[lo..hi]` / `(lo..hi]` — same dotted-range shorthand as the
        // unbracketed `field:lo..hi` form (spec.md §8 S1), tried before the
        // comma-separated grammar since the tokenizer hands back `lo..hi`
        // as a single `Word`.
        if let Some(Token::Word(word)) = self.peek() {
            if word.contains("..") {
                let word = word.clone();
                self.advance();
                let upper_inclusive = match self.advance() {
                    Some(Token::RBracket(incl)) => *incl,
                    other => {
                        return Err(Error::client(format!(
                            "expected ']' or ')' to close range, got {other:?}"
                        )))
                    }
                };
                let (lo, hi) = word.split_once("..").expect("contains(\"..\") checked above");
                let gte_or_gt = if lo.is_empty() { None } else { Some(parse_bound(lo)?) };
                let lte_or_lt = if hi.is_empty() { None } else { Some(parse_bound(hi)?) };
                return Ok(self.rewrite_range(field, gte_or_gt, lte_or_lt, lower_inclusive, upper_inclusive));
            }
        }

        let lo = match self.peek() {
            Some(Token::Comma) => None,
            _ => Some(self.expect_scalar()?),
        };
        match self.advance() {
            Some(Token::Comma) => {}
            other => return Err(Error::client(format!("expected ',' in range, got {other:?}"))),
        }
        let hi = match self.peek() {
            Some(Token::RBracket(_)) => None,
            _ => Some(self.expect_scalar()?),
        };
        let upper_inclusive = match self.advance() {
            Some(Token::RBracket(incl)) => *incl,
            other => return Err(Error::client(format!("expected ']' or ')' to close range, got {other:?}"))),
        };
        let gte_or_gt = lo.map(|v| parse_bound(&v)).transpose()?;
        let lte_or_lt = hi.map(|v| parse_bound(&v)).transpose()?;
        Ok(self.rewrite_range(field, gte_or_gt, lte_or_lt, lower_inclusive, upper_inclusive))
    }

    fn expect_scalar(&mut self) -> Result<String> {
        match self.advance().cloned() {
            Some(Token::Word(w)) => Ok(w),
            Some(Token::Quoted(q)) => Ok(q),
            other => Err(Error::client(format!("expected a range bound, got {other:?}"))),
        }
    }

    /// Build the literal `Range` clause (always present, so matching stays
    /// correct against the flat document matcher) and, when the field's
    /// schema carries an accuracy ladder, fold in the coarsest-terms-first
    /// rewrite as an enrichment (spec.md §4.4 "Range rewrite"). The ladder
    /// ladder's synthetic terms describe buckets a posting-list engine
    /// would intersect; here they ride along as additional `should`
    /// clauses so a future term-based reader can use them without another
    /// compiler pass, while the `Range` filter keeps results correct today.
    fn rewrite_range(
        &self,
        field: &str,
        gte_or_gt: Option<FieldValue>,
        lte_or_lt: Option<FieldValue>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> Query {
        let mut range = RangeQuery { field: field.to_string(), gt: None, gte: None, lt: None, lte: None, boost: None };
        match (gte_or_gt, lower_inclusive) {
            (Some(v), true) => range.gte = Some(v),
            (Some(v), false) => range.gt = Some(v),
            (None, _) => {}
        }
        match (lte_or_lt, upper_inclusive) {
            (Some(v), true) => range.lte = Some(v),
            (Some(v), false) => range.lt = Some(v),
            (None, _) => {}
        }

        let spec = self.schema.get(field);
        let ladder = spec.as_ref().map(|s| &s.accuracy);
        match ladder.filter(|l| !l.is_empty()) {
            Some(ladder) => {
                let terms = accuracy_terms(ladder, &range, MAX_ACCURACY_TERMS);
                if terms.is_empty() {
                    Query::Range(range)
                } else {
                    let mut bq = BoolQuery::new();
                    bq.filter.push(Query::Range(range));
                    for term in terms {
                        bq.should.push(term);
                    }
                    Query::Bool(bq)
                }
            }
            None => Query::Range(range),
        }
    }
}

/// Greedily cover `[gte/gt, lte/lt]` with accuracy-bucket terms, coarsest
/// level first, capping at `max_terms` (spec.md §4.4 "past the cap, fall
/// back to the literal range" — here "fall back" means "contribute no
/// extra terms", since the literal `Range` filter is always present).
fn accuracy_terms(ladder: &AccuracyLadder, range: &RangeQuery, max_terms: usize) -> Vec<Query> {
    let lo = as_i64(range.gte.as_ref().or(range.gt.as_ref()));
    let hi = as_i64(range.lte.as_ref().or(range.lt.as_ref()));
    let (lo, hi) = match (lo, hi) {
        (Some(lo), Some(hi)) if lo <= hi => (lo, hi),
        _ => return Vec::new(),
    };

    for (level, step, prefix) in ladder.coarsest_first() {
        if step <= 0 {
            continue;
        }
        let first_bucket = ladder.bucket(level, lo).unwrap_or(lo);
        let last_bucket = ladder.bucket(level, hi).unwrap_or(hi);
        let bucket_count = ((last_bucket - first_bucket) / step) as i64 + 1;
        if bucket_count < 1 || bucket_count as usize > max_terms {
            continue;
        }
        let mut terms = Vec::with_capacity(bucket_count as usize);
        let mut bucket = first_bucket;
        while bucket <= last_bucket {
            let mut value = prefix.to_vec();
            value.extend_from_slice(&bucket.to_be_bytes());
            terms.push(Query::Term(TermQuery {
                field: range.field.clone(),
                value: String::from_utf8_lossy(&value).into_owned(),
                boost: None,
            }));
            bucket += step;
        }
        return terms;
    }
    Vec::new()
}

fn as_i64(value: Option<&FieldValue>) -> Option<i64> {
    match value {
        Some(FieldValue::Number(n)) => Some(*n as i64),
        _ => None,
    }
}

fn parse_bound(raw: &str) -> Result<FieldValue> {
    if let Ok(n) = raw.parse::<f64>() {
        return Ok(FieldValue::Number(n));
    }
    if let Ok(date) = parse_date_math(raw) {
        return Ok(FieldValue::Number(date.seconds));
    }
    Err(Error::client(format!("'{raw}' is neither a number nor a date-math expression")))
}

fn bound_only(field: &str, gte: Option<FieldValue>, lte: Option<FieldValue>) -> Query {
    Query::Range(RangeQuery { field: field.to_string(), gt: None, gte, lt: None, lte, boost: None })
}

fn phrase_query(field: &str, phrase: &str) -> Query {
    Query::Phrase(PhraseQuery {
        field: field.to_string(),
        phrase: phrase.split_whitespace().map(String::from).collect(),
        slop: 0,
        boost: None,
    })
}

fn negate(inner: Query) -> Query {
    let mut bq = BoolQuery::new();
    bq.must.push(Query::MatchAll);
    bq.must_not.push(inner);
    Query::Bool(bq)
}

fn and_combine(left: Query, right: Query) -> Query {
    let mut bq = BoolQuery::new();
    bq.must.push(left);
    bq.must.push(right);
    Query::Bool(bq)
}

fn or_combine(left: Query, right: Query) -> Query {
    let mut bq = BoolQuery::new();
    bq.should.push(left);
    bq.should.push(right);
    bq.minimum_should_match = Some(1);
    Query::Bool(bq)
}

/// `A XOR B` has no native AST node; lowered to `(A OR B) AND NOT (A AND
/// B)` using only the clauses `query::matcher` already understands.
fn xor_combine(left: Query, right: Query) -> Query {
    let mut either = BoolQuery::new();
    either.should.push(left.clone());
    either.should.push(right.clone());
    either.minimum_should_match = Some(1);

    let mut both = BoolQuery::new();
    both.must.push(left);
    both.must.push(right);

    let mut out = BoolQuery::new();
    out.must.push(Query::Bool(either));
    out.must_not.push(Query::Bool(both));
    Query::Bool(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::specification::ConcreteType;

    #[test]
    fn bare_word_becomes_all_field_term() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "rust", &[], 0, 10).unwrap();
        assert_eq!(
            compiled.query,
            Query::Term(TermQuery { field: "_all".to_string(), value: "rust".to_string(), boost: None })
        );
    }

    #[test]
    fn field_colon_value_is_a_term_query() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "title:rust", &[], 0, 10).unwrap();
        match compiled.query {
            Query::Term(t) => {
                assert_eq!(t.field, "title");
                assert_eq!(t.value, "rust");
            }
            other => panic!("expected Term, got {other:?}"),
        }
    }

    #[test]
    fn and_or_not_compose_into_bool_query() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "rust AND (fast OR safe) NOT slow", &[], 0, 10).unwrap();
        match compiled.query {
            Query::Bool(bq) => assert_eq!(bq.must.len(), 2),
            other => panic!("expected Bool, got {other:?}"),
        }
    }

    #[test]
    fn quoted_phrase_parses_into_phrase_query() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "\"exact phrase\"", &[], 0, 10).unwrap();
        assert_eq!(
            compiled.query,
            Query::Phrase(PhraseQuery {
                field: "_all".to_string(),
                phrase: vec!["exact".to_string(), "phrase".to_string()],
                slop: 0,
                boost: None,
            })
        );
    }

    #[test]
    fn inclusive_range_bracket_sets_gte_and_lte() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "price:[10,100]", &[], 0, 10).unwrap();
        match compiled.query {
            Query::Range(r) => {
                assert_eq!(r.gte, Some(FieldValue::Number(10.0)));
                assert_eq!(r.lte, Some(FieldValue::Number(100.0)));
            }
            other => panic!("expected Range, got {other:?}"),
        }
    }

    #[test]
    fn exclusive_range_paren_sets_gt_and_lt() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "price:(10,100)", &[], 0, 10).unwrap();
        match compiled.query {
            Query::Range(r) => {
                assert_eq!(r.gt, Some(FieldValue::Number(10.0)));
                assert_eq!(r.lt, Some(FieldValue::Number(100.0)));
            }
            other => panic!("expected Range, got {other:?}"),
        }
    }

    #[test]
    fn dotted_range_inside_brackets_sets_gte_and_lte() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "year:[2000..2015]", &[], 0, 10).unwrap();
        match compiled.query {
            Query::Range(r) => {
                assert_eq!(r.gte, Some(FieldValue::Number(2000.0)));
                assert_eq!(r.lte, Some(FieldValue::Number(2015.0)));
            }
            other => panic!("expected Range, got {other:?}"),
        }
    }

    #[test]
    fn bare_terms_juxtaposed_become_implicit_and() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "hello world", &[], 0, 10).unwrap();
        match compiled.query {
            Query::Bool(bq) => {
                assert_eq!(bq.must.len(), 2);
                assert_eq!(
                    bq.must[0],
                    Query::Term(TermQuery { field: "_all".to_string(), value: "hello".to_string(), boost: None })
                );
                assert_eq!(
                    bq.must[1],
                    Query::Term(TermQuery { field: "_all".to_string(), value: "world".to_string(), boost: None })
                );
            }
            other => panic!("expected Bool, got {other:?}"),
        }
    }

    #[test]
    fn range_over_accuracy_field_adds_should_terms() {
        let schema = Schema::new("");
        schema.resolve_or_create("year", ConcreteType::Integer, true, false).unwrap();
        schema.commit();
        let compiled = compile(&schema, "year:[1000,2000]", &[], 0, 10).unwrap();
        match compiled.query {
            Query::Bool(bq) => {
                assert_eq!(bq.filter.len(), 1);
                assert!(!bq.should.is_empty());
            }
            other => panic!("expected Bool with accuracy terms, got {other:?}"),
        }
    }

    #[test]
    fn sort_keys_parse_descending_prefix() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "rust", &["-date".to_string(), "title".to_string()], 0, 10).unwrap();
        assert_eq!(compiled.sort[0], SortKey { field: "date".to_string(), descending: true });
        assert_eq!(compiled.sort[1], SortKey { field: "title".to_string(), descending: false });
    }

    #[test]
    fn xor_excludes_documents_matching_both_sides() {
        let schema = Schema::new("");
        let compiled = compile(&schema, "a XOR b", &[], 0, 10).unwrap();
        match compiled.query {
            Query::Bool(outer) => {
                assert_eq!(outer.must.len(), 1);
                assert_eq!(outer.must_not.len(), 1);
            }
            other => panic!("expected Bool, got {other:?}"),
        }
    }
}
