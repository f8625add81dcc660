use bson::{Bson, Document, doc};

/// Operator vocabulary accepted by [`filter_fragment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Contains,
    StartsWith,
    EndsWith,
    Eq,
    Ne,
    In,
    Nin,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOperator {
    pub const ALL: [Self; 11] = [
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Eq,
        Self::Ne,
        Self::In,
        Self::Nin,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
    ];

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Contains => "$contains",
            Self::StartsWith => "$startWith",
            Self::EndsWith => "$endWith",
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }

    /// Looks up an operator by its wire token. Unknown tokens yield `None`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.token() == token)
    }

    /// Builds the predicate fragment for `field`.
    ///
    /// Substring operators compile to a case-insensitive `$regex`; the value is spliced
    /// into the pattern as-is. Set operators wrap a scalar value into a one-element array.
    #[must_use]
    pub fn fragment(self, field: &str, value: impl Into<Bson>) -> Document {
        let value = value.into();
        match self {
            Self::Contains | Self::StartsWith | Self::EndsWith => {
                let text = pattern_text(&value);
                let pattern = match self {
                    Self::Contains => format!(".*{text}.*"),
                    Self::StartsWith => format!("^{text}"),
                    _ => format!("{text}$"),
                };
                doc! { field: { "$regex": pattern, "$options": "i" } }
            }
            Self::In | Self::Nin => {
                let values = match value {
                    Bson::Array(items) => items,
                    other => vec![other],
                };
                doc! { field: { (self.token()): values } }
            }
            Self::Eq | Self::Ne | Self::Gt | Self::Gte | Self::Lt | Self::Lte => {
                doc! { field: { (self.token()): value } }
            }
        }
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

fn pattern_text(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Translates `operator` into a predicate fragment, or `None` when the token is unknown.
/// A `None` means "skip this predicate", never an error.
#[must_use]
pub fn filter_fragment(operator: &str, field: &str, value: impl Into<Bson>) -> Option<Document> {
    FilterOperator::parse(operator).map(|op| op.fragment(field, value))
}
