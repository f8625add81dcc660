use bson::{Bson, Document};
use std::cmp::Ordering;

use super::predicate::{Predicate, compare_bson, get_path};
use crate::context::CallContext;
use crate::errors::StoreError;

/// A compiled aggregation stage.
#[derive(Debug, Clone)]
pub enum Stage {
    Match(Predicate),
    Sort(Vec<(String, i32)>),
    Skip(usize),
    Limit(usize),
}

/// Compiles raw stage documents. Each stage must hold exactly one operator key.
///
/// # Errors
/// `QueryError` for unsupported stages or malformed arguments.
pub fn compile(pipeline: &[Document]) -> Result<Vec<Stage>, StoreError> {
    pipeline.iter().map(compile_stage).collect()
}

fn compile_stage(stage: &Document) -> Result<Stage, StoreError> {
    let mut it = stage.iter();
    let (Some((name, arg)), None) = (it.next(), it.next()) else {
        return Err(StoreError::QueryError("a stage must have exactly one operator".into()));
    };
    match name.as_str() {
        "$match" => match arg {
            Bson::Document(d) => Ok(Stage::Match(Predicate::parse(d)?)),
            _ => Err(StoreError::QueryError("$match requires a document".into())),
        },
        "$sort" => {
            let Bson::Document(keys) = arg else {
                return Err(StoreError::QueryError("$sort requires a document".into()));
            };
            let mut out = Vec::with_capacity(keys.len());
            for (field, dir) in keys {
                match as_int(dir) {
                    Some(1) => out.push((field.clone(), 1)),
                    Some(-1) => out.push((field.clone(), -1)),
                    _ => {
                        return Err(StoreError::QueryError(format!("$sort direction for {field} must be 1 or -1")));
                    }
                }
            }
            Ok(Stage::Sort(out))
        }
        "$skip" => count_arg(name, arg).map(Stage::Skip),
        "$limit" => count_arg(name, arg).map(Stage::Limit),
        other => Err(StoreError::QueryError(format!("unsupported stage: {other}"))),
    }
}

fn as_int(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}

fn count_arg(name: &str, arg: &Bson) -> Result<usize, StoreError> {
    as_int(arg)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| StoreError::QueryError(format!("{name} requires a non-negative integer")))
}

/// Runs compiled stages over `docs` in order. The context is polled once per document.
///
/// # Errors
/// `Cancelled` or `DeadlineExceeded` from the context.
pub fn run<'a, I>(ctx: &CallContext, docs: I, stages: &[Stage]) -> Result<Vec<Document>, StoreError>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut stages = stages.iter().peekable();
    // A leading match filters while scanning so non-matching documents are never cloned.
    let first_match = match stages.peek() {
        Some(Stage::Match(p)) => {
            stages.next();
            Some(p)
        }
        _ => None,
    };
    let mut cur = Vec::new();
    for doc in docs {
        ctx.check()?;
        if first_match.is_none_or(|p| p.matches(doc)) {
            cur.push(doc.clone());
        }
    }
    for stage in stages {
        ctx.check()?;
        match stage {
            Stage::Match(p) => cur.retain(|d| p.matches(d)),
            Stage::Sort(keys) => cur.sort_by(|a, b| compare_docs(a, b, keys)),
            Stage::Skip(n) => {
                let n = (*n).min(cur.len());
                cur.drain(..n);
            }
            Stage::Limit(n) => cur.truncate(*n),
        }
    }
    Ok(cur)
}

fn compare_docs(a: &Document, b: &Document, keys: &[(String, i32)]) -> Ordering {
    for (field, dir) in keys {
        let ord = match (get_path(a, field), get_path(b, field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_bson(x, y),
        };
        let ord = if *dir < 0 { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn docs() -> Vec<Document> {
        vec![
            doc! { "_id": "1", "t": "b", "n": 2 },
            doc! { "_id": "2", "t": "a", "n": 2 },
            doc! { "_id": "3", "t": "c", "n": 1 },
            doc! { "_id": "4", "n": 3 },
        ]
    }

    fn ids(out: &[Document]) -> Vec<&str> {
        out.iter().map(|d| d.get_str("_id").unwrap()).collect()
    }

    #[test]
    fn empty_pipeline_returns_everything_in_order() {
        let d = docs();
        let out = run(&CallContext::background(), &d, &[]).unwrap();
        assert_eq!(ids(&out), ["1", "2", "3", "4"]);
    }

    #[test]
    fn sort_is_stable_and_multi_key() {
        let d = docs();
        let stages = compile(&[doc! { "$sort": { "n": -1, "t": 1 } }]).unwrap();
        let out = run(&CallContext::background(), &d, &stages).unwrap();
        assert_eq!(ids(&out), ["4", "2", "1", "3"]);
    }

    #[test]
    fn missing_sort_field_orders_first() {
        let d = docs();
        let stages = compile(&[doc! { "$sort": { "t": 1 } }]).unwrap();
        let out = run(&CallContext::background(), &d, &stages).unwrap();
        assert_eq!(ids(&out), ["4", "2", "1", "3"]);
    }

    #[test]
    fn sort_with_nan_and_decimals_is_a_total_order() {
        let decimal = bson::Decimal128::from_bytes([0; 16]);
        let d: Vec<Document> = (0..200)
            .map(|i| {
                let v = match i {
                    _ if i % 7 == 0 => Bson::Double(f64::NAN),
                    _ if i % 11 == 0 => Bson::Decimal128(decimal),
                    _ => Bson::Int32((i * 37) % 101),
                };
                doc! { "_id": i.to_string(), "v": v }
            })
            .collect();
        let stages = compile(&[doc! { "$sort": { "v": 1 } }]).unwrap();
        let out = run(&CallContext::background(), &d, &stages).unwrap();
        assert_eq!(out.len(), 200);

        let nans = d.iter().filter(|x| matches!(x.get("v"), Some(Bson::Double(f)) if f.is_nan())).count();
        let decimals = d.iter().filter(|x| matches!(x.get("v"), Some(Bson::Decimal128(_)))).count();
        let vs: Vec<&Bson> = out.iter().map(|x| x.get("v").unwrap()).collect();
        assert!(vs[..nans].iter().all(|v| matches!(v, Bson::Double(f) if f.is_nan())));
        assert!(vs[vs.len() - decimals..].iter().all(|v| matches!(v, Bson::Decimal128(_))));
        let ints: Vec<i32> = vs.iter().filter_map(|v| v.as_i32()).collect();
        assert_eq!(ints.len(), 200 - nans - decimals);
        assert!(ints.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn match_skip_limit() {
        let d = docs();
        let stages = compile(&[
            doc! { "$match": { "n": { "$gte": 2 } } },
            doc! { "$skip": 1_i64 },
            doc! { "$limit": 1_i64 },
        ])
        .unwrap();
        let out = run(&CallContext::background(), &d, &stages).unwrap();
        assert_eq!(ids(&out), ["2"]);
    }

    #[test]
    fn limit_zero_and_oversized_skip_return_nothing() {
        let d = docs();
        let ctx = CallContext::background();
        assert!(run(&ctx, &d, &compile(&[doc! { "$limit": 0 }]).unwrap()).unwrap().is_empty());
        assert!(run(&ctx, &d, &compile(&[doc! { "$skip": 10 }]).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_stages() {
        for bad in [
            doc! { "$group": {} },
            doc! { "$skip": -1 },
            doc! { "$limit": "3" },
            doc! { "$sort": { "t": 2 } },
            doc! { "$match": {}, "$limit": 1 },
            doc! {},
        ] {
            assert!(matches!(compile(&[bad]), Err(StoreError::QueryError(_))));
        }
    }

    #[test]
    fn cancelled_context_stops_the_scan() {
        let d = docs();
        let ctx = CallContext::background();
        ctx.cancel();
        assert!(matches!(run(&ctx, &d, &[]), Err(StoreError::Cancelled)));
    }
}
