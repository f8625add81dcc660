use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `DESC` in any case is descending; every other token is ascending.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        if token.eq_ignore_ascii_case("desc") { Self::Desc } else { Self::Asc }
    }

    /// Store-native sort key: `1` ascending, `-1` descending.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Separators for the compact order syntax `field*dir,field*dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSeparators<'a> {
    pub field: &'a str,
    pub direction: &'a str,
}

impl Default for OrderSeparators<'_> {
    fn default() -> Self {
        Self { field: ",", direction: "*" }
    }
}

/// Parses `"title*desc,description*asc"` with the default separators.
#[must_use]
pub fn parse_orders(orders: &str) -> Vec<SortField> {
    parse_orders_with(orders, OrderSeparators::default())
}

/// Parses an order string into sort fields, in order.
///
/// A token must split into exactly a field and a direction; anything else is dropped.
/// Directions `desc` (any case) and `-1` are descending, the rest ascending.
#[must_use]
pub fn parse_orders_with(orders: &str, seps: OrderSeparators<'_>) -> Vec<SortField> {
    if orders.is_empty() || seps.field.is_empty() || seps.direction.is_empty() {
        return Vec::new();
    }
    orders
        .split(seps.field)
        .filter_map(|token| {
            let mut parts = token.split(seps.direction);
            let field = parts.next()?;
            let dir = parts.next()?;
            if parts.next().is_some() {
                return None;
            }
            let direction = if dir == "-1" { SortDirection::Desc } else { SortDirection::parse(dir) };
            Some(SortField { field: field.to_string(), direction })
        })
        .collect()
}
