use indexmap::IndexMap;
use serde::Serialize;

/// One item inside a `List` value's accumulated cell: either the raw
/// captured text, or — when the value's own regex has more than one
/// capturing group — the named groups of that re-match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListItem {
    Scalar(String),
    Map(IndexMap<String, String>),
}

/// A single value's committed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Scalar(String),
    List(Vec<ListItem>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Null
    }
}

/// One emitted record: an ordered mapping from value name to cell,
/// column order equal to the template's value declaration order.
pub type Record = IndexMap<String, Cell>;
