use bson::{Bson, Document, doc};
use std::collections::HashSet;

use super::operator::FilterOperator;
use super::order::SortField;

/// An ordered list of pipeline stages, executed in sequence by the store.
pub type Pipeline = Vec<Document>;

/// Conjunction of predicate fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fragments: Vec<Document>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fragment produced by the operator translator. `None` and empty fragments are
    /// skipped.
    pub fn push(&mut self, fragment: Option<Document>) {
        if let Some(f) = fragment
            && !f.is_empty()
        {
            self.fragments.push(f);
        }
    }

    #[must_use]
    pub fn and(mut self, fragment: Document) -> Self {
        self.push(Some(fragment));
        self
    }

    #[must_use]
    pub fn with(self, op: FilterOperator, field: &str, value: impl Into<Bson>) -> Self {
        self.and(op.fragment(field, value))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    #[must_use]
    pub fn fragments(&self) -> &[Document] {
        &self.fragments
    }

    /// Combined match document. Fragments with disjoint keys are merged into one
    /// document; overlapping keys fall back to an explicit `$and`.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut seen = HashSet::new();
        let disjoint = self.fragments.iter().flat_map(Document::keys).all(|k| seen.insert(k.as_str()));
        if disjoint {
            let mut out = Document::new();
            for f in &self.fragments {
                for (k, v) in f {
                    out.insert(k.clone(), v.clone());
                }
            }
            out
        } else {
            let parts: Vec<Bson> = self.fragments.iter().cloned().map(Bson::Document).collect();
            doc! { "$and": parts }
        }
    }
}

/// Declarative query: filter, sort, and pagination window.
///
/// `skip` and `limit` are independently optional; negative values mean "no stage".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub filter: Filter,
    pub sort: Vec<SortField>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl QuerySpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn sort_by(mut self, sort: Vec<SortField>) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub const fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builds stages in fixed order: match, sort, skip, limit.
    #[must_use]
    pub fn build_pipeline(&self) -> Pipeline {
        let mut pipe = Pipeline::new();
        if !self.filter.is_empty() {
            pipe.push(match_stage(self.filter.to_document()));
        }
        if !self.sort.is_empty() {
            pipe.push(sort_stage(&self.sort));
        }
        if let Some(skip) = self.skip
            && skip >= 0
        {
            pipe.push(skip_stage(skip));
        }
        // limit is independent of skip's sign
        if let Some(limit) = self.limit
            && limit >= 0
        {
            pipe.push(limit_stage(limit));
        }
        pipe
    }
}

#[must_use]
pub fn match_stage(filter: Document) -> Document {
    doc! { "$match": filter }
}

#[must_use]
pub fn sort_stage(sort: &[SortField]) -> Document {
    let mut keys = Document::new();
    for s in sort {
        keys.insert(s.field.clone(), s.direction.as_i32());
    }
    doc! { "$sort": keys }
}

#[must_use]
pub fn skip_stage(skip: i64) -> Document {
    doc! { "$skip": skip }
}

#[must_use]
pub fn limit_stage(limit: i64) -> Document {
    doc! { "$limit": limit }
}

/// Arguments of a `$lookup` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
}

#[must_use]
pub fn lookup_stage(opt: &Lookup) -> Document {
    doc! {
        "$lookup": {
            "from": opt.from.as_str(),
            "localField": opt.local_field.as_str(),
            "foreignField": opt.foreign_field.as_str(),
            "as": opt.as_field.as_str(),
        }
    }
}

/// Arguments of an `$unwind` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unwind {
    pub path: String,
    pub include_array_index: Option<String>,
    pub preserve_empty: bool,
}

#[must_use]
pub fn unwind_stage(opt: &Unwind) -> Document {
    let mut args = doc! { "path": opt.path.as_str() };
    if let Some(index) = &opt.include_array_index {
        args.insert("includeArrayIndex", index.as_str());
    }
    args.insert("preserveNullAndEmptyArrays", opt.preserve_empty);
    doc! { "$unwind": args }
}

#[must_use]
pub fn union_with_stage(collection: &str, pipeline: &[Document]) -> Document {
    let stages: Vec<Bson> = pipeline.iter().cloned().map(Bson::Document).collect();
    doc! { "$unionWith": { "coll": collection, "pipeline": stages } }
}

/// Arguments of a `$graphLookup` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphLookup {
    pub from: String,
    pub start_with: String,
    pub connect_from_field: String,
    pub connect_to_field: String,
    pub depth_field: String,
    pub as_field: String,
}

#[must_use]
pub fn graph_lookup_stage(opt: &GraphLookup) -> Document {
    doc! {
        "$graphLookup": {
            "from": opt.from.as_str(),
            "startWith": opt.start_with.as_str(),
            "connectFromField": opt.connect_from_field.as_str(),
            "connectToField": opt.connect_to_field.as_str(),
            "depthField": opt.depth_field.as_str(),
            "as": opt.as_field.as_str(),
        }
    }
}

/// `$dateToString` expression; `date` is an expression such as `"$audit.createdAt"`.
#[must_use]
pub fn date_to_string(date: &str, format: &str) -> Document {
    doc! { "$dateToString": { "format": format, "date": date } }
}

/// `{field: {$in: [values..]}}`.
#[must_use]
pub fn in_fragment<I, V>(field: &str, values: I) -> Document
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
    doc! { field: { "$in": values } }
}
