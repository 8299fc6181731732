use thiserror::Error;

/// A row, column or item handle that does not resolve against the current tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("row {row} out of range (parent has {len} rows)")]
    RowOutOfRange { row: usize, len: usize },
    #[error("{count} rows at {row} out of range (parent has {len} rows)")]
    RangeOutOfBounds { row: usize, count: usize, len: usize },
    #[error("column {column} out of range ({len} columns)")]
    ColumnOutOfRange { column: usize, len: usize },
    #[error("{count} columns at {index} out of range ({len} columns)")]
    ColumnRangeOutOfBounds {
        index: usize,
        count: usize,
        len: usize,
    },
    #[error("item handle is stale or belongs to another tree")]
    StaleItem,
    #[error("the root is not an addressable row")]
    RootNotAddressable,
    #[error("column name `children` is reserved for nested items")]
    ReservedColumn,
}

/// A persistence document that does not have the `{ columns, items }` shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid JSON: {0}")]
    Parse(String),
    #[error("{path}: expected an object, found {found}")]
    NotAnObject { path: String, found: &'static str },
    #[error("missing required key `{0}`")]
    MissingKey(&'static str),
    #[error("{path}: expected {expected}, found {found}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}
