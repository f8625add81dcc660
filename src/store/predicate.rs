use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use crate::errors::StoreError;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_PATTERN_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Compiled form of a match document.
#[derive(Debug, Clone)]
pub enum Predicate {
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Nor(Vec<Predicate>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    Regex { path: String, regex: Regex },
}

impl Predicate {
    /// Compiles a match document (`{field: value}`, `{field: {$op: value}}`, `$and`/`$or`/`$nor`).
    ///
    /// # Errors
    /// `QueryError` for unknown operators or malformed operands.
    pub fn parse(filter: &Document) -> Result<Self, StoreError> {
        let mut parts = Vec::with_capacity(filter.len());
        for (key, value) in filter {
            let p = match key.as_str() {
                "$and" => Self::And(parse_list(key, value)?),
                "$or" => Self::Or(parse_list(key, value)?),
                "$nor" => Self::Nor(parse_list(key, value)?),
                k if k.starts_with('$') => {
                    return Err(StoreError::QueryError(format!("unknown top-level operator: {k}")));
                }
                field => parse_field(field, value)?,
            };
            parts.push(p);
        }
        Ok(match parts.len() {
            0 => Self::True,
            1 => parts.remove(0),
            _ => Self::And(parts),
        })
    }

    /// The `_id` value when this predicate is a plain id equality, enabling a point lookup.
    #[must_use]
    pub fn id_lookup(&self) -> Option<&str> {
        match self {
            Self::Cmp { path, op: CmpOp::Eq, value: Bson::String(id) } if path == "_id" => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::True => true,
            Self::And(ps) => ps.iter().all(|p| p.matches(doc)),
            Self::Or(ps) => ps.iter().any(|p| p.matches(doc)),
            Self::Nor(ps) => !ps.iter().any(|p| p.matches(doc)),
            Self::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
            Self::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
            Self::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
            Self::Cmp { path, op, value } => match (get_path(doc, path), op) {
                (found, CmpOp::Ne) => !found.is_some_and(|v| values_equal(v, value)),
                (Some(v), CmpOp::Eq) => values_equal(v, value),
                (Some(v), CmpOp::Gt) => comparable(v, value) == Some(Ordering::Greater),
                (Some(v), CmpOp::Gte) => {
                    matches!(comparable(v, value), Some(Ordering::Greater | Ordering::Equal))
                }
                (Some(v), CmpOp::Lt) => comparable(v, value) == Some(Ordering::Less),
                (Some(v), CmpOp::Lte) => {
                    matches!(comparable(v, value), Some(Ordering::Less | Ordering::Equal))
                }
                (None, _) => false,
            },
            Self::Regex { path, regex } => match get_path(doc, path) {
                Some(Bson::String(s)) => regex.is_match(s),
                _ => false,
            },
        }
    }
}

fn parse_list(op: &str, value: &Bson) -> Result<Vec<Predicate>, StoreError> {
    let Bson::Array(items) = value else {
        return Err(StoreError::QueryError(format!("{op} requires an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => Predicate::parse(d),
            _ => Err(StoreError::QueryError(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn is_operator_doc(d: &Document) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn parse_field(path: &str, value: &Bson) -> Result<Predicate, StoreError> {
    let ops = match value {
        Bson::Document(d) if is_operator_doc(d) => d,
        other => return Ok(Predicate::Cmp { path: path.to_string(), op: CmpOp::Eq, value: other.clone() }),
    };
    let mut parts = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let p = match op.as_str() {
            "$eq" => cmp(path, CmpOp::Eq, operand),
            "$ne" => cmp(path, CmpOp::Ne, operand),
            "$gt" => cmp(path, CmpOp::Gt, operand),
            "$gte" => cmp(path, CmpOp::Gte, operand),
            "$lt" => cmp(path, CmpOp::Lt, operand),
            "$lte" => cmp(path, CmpOp::Lte, operand),
            "$in" => Predicate::In { path: path.to_string(), values: set_values(op, operand)? },
            "$nin" => Predicate::Nin { path: path.to_string(), values: set_values(op, operand)? },
            "$exists" => match operand {
                Bson::Boolean(b) => Predicate::Exists { path: path.to_string(), exists: *b },
                _ => return Err(StoreError::QueryError("$exists requires a boolean".into())),
            },
            "$regex" => {
                let options = match ops.get("$options") {
                    None => "",
                    Some(Bson::String(o)) => o.as_str(),
                    Some(_) => return Err(StoreError::QueryError("$options must be a string".into())),
                };
                let Bson::String(pattern) = operand else {
                    return Err(StoreError::QueryError("$regex requires a string".into()));
                };
                Predicate::Regex { path: path.to_string(), regex: compile_regex(pattern, options)? }
            }
            // consumed together with $regex
            "$options" if ops.contains_key("$regex") => continue,
            other => {
                return Err(StoreError::QueryError(format!("unknown operator {other} on {path}")));
            }
        };
        parts.push(p);
    }
    Ok(if parts.len() == 1 { parts.remove(0) } else { Predicate::And(parts) })
}

fn cmp(path: &str, op: CmpOp, operand: &Bson) -> Predicate {
    Predicate::Cmp { path: path.to_string(), op, value: operand.clone() }
}

fn set_values(op: &str, operand: &Bson) -> Result<Vec<Bson>, StoreError> {
    match operand {
        Bson::Array(items) => Ok(items.iter().take(MAX_IN_SET).cloned().collect()),
        _ => Err(StoreError::QueryError(format!("{op} requires an array"))),
    }
}

fn compile_regex(pattern: &str, options: &str) -> Result<Regex, StoreError> {
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(StoreError::QueryError("regex pattern too long".into()));
    }
    let mut re = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => re.case_insensitive(true),
            'm' => re.multi_line(true),
            's' => re.dot_matches_new_line(true),
            'x' => re.ignore_whitespace(true),
            other => return Err(StoreError::QueryError(format!("unsupported regex option: {other}"))),
        };
    }
    re.build().map_err(|e| StoreError::QueryError(format!("invalid regex: {e}")))
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().take(MAX_IN_SET).any(|x| values_equal(v, x))
}

/// Resolves a dotted path. Paths deeper than `MAX_PATH_DEPTH` never match.
pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth + 2 > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y) == Ordering::Equal,
        _ => a == b,
    }
}

/// Ordering between values of the same kind; `None` when the kinds differ.
fn comparable(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return Some(compare_numbers(x, y));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.timestamp_millis().cmp(&y.timestamp_millis())),
        _ => None,
    }
}

/// NaN sorts before every other number and equals itself.
fn compare_numbers(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.total_cmp(&y),
    }
}

/// Total order used by `$sort`: same-kind values compare naturally, mixed kinds by type rank.
pub(crate) fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    comparable(a, b)
        .or_else(|| match (a, b) {
            // stable but not numeric; decimals are only ordered among themselves
            (Bson::Decimal128(x), Bson::Decimal128(y)) => Some(x.bytes().cmp(&y.bytes())),
            _ => None,
        })
        .unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 2,
        // no lossless bridge to f64, so decimals rank after the other numbers
        Bson::Decimal128(_) => 3,
        Bson::String(_) | Bson::Symbol(_) => 4,
        Bson::Document(_) => 5,
        Bson::Array(_) => 6,
        Bson::Binary(_) => 7,
        Bson::ObjectId(_) => 8,
        Bson::Boolean(_) => 9,
        Bson::DateTime(_) => 10,
        Bson::Timestamp(_) => 11,
        Bson::RegularExpression(_) => 12,
        Bson::DbPointer(_) => 13,
        Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 14,
        Bson::MaxKey => 255,
    }
}
