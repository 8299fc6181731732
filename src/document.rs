//! The `{ columns, items }` persistence format.
//!
//! ```json
//! {
//!     "columns": ["name", "age"],
//!     "items": [
//!         { "name": "a", "age": 1, "children": [ { "name": "b", "age": 2 } ] }
//!     ]
//! }
//! ```
//!
//! `children` is reserved: it holds nested items and is never a field. It is
//! omitted for leaves on save. Item keys missing from `columns` are kept and
//! written back even though the model cannot address them.

use crate::error::FormatError;
use crate::item::{Fields, ItemRecord};
use crate::model::TreeModel;
use crate::statics;
use crate::value::{Map, Value};

/// A validated persistence document, detached from any model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub columns: Vec<String>,
    pub items: Vec<ItemRecord>,
    /// Top-level keys other than `columns` and `items`, in file order.
    pub extra: Map,
}

impl Document {
    /// Parse and validate document text.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        Self::from_value(&Value::parse(text)?)
    }

    pub fn from_value(value: &Value) -> Result<Self, FormatError> {
        let top = value.as_object().ok_or_else(|| FormatError::NotAnObject {
            path: "$".to_string(),
            found: value.type_name(),
        })?;

        let columns_value = top
            .get(statics::DOC_COLUMNS)
            .ok_or(FormatError::MissingKey(statics::DOC_COLUMNS))?;
        let columns = parse_columns(columns_value)?;

        let items_value = top
            .get(statics::DOC_ITEMS)
            .ok_or(FormatError::MissingKey(statics::DOC_ITEMS))?;
        let items = parse_items(items_value, statics::DOC_ITEMS)?;

        let extra = top
            .iter()
            .filter(|(k, _)| {
                k.as_str() != statics::DOC_COLUMNS && k.as_str() != statics::DOC_ITEMS
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            columns,
            items,
            extra,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut top = Map::new();
        top.insert(
            statics::DOC_COLUMNS.to_string(),
            Value::Array(self.columns.iter().cloned().map(Value::String).collect()),
        );
        top.insert(
            statics::DOC_ITEMS.to_string(),
            Value::Array(items_to_values(&self.items)),
        );
        for (k, v) in &self.extra {
            top.insert(k.clone(), v.clone());
        }
        Value::Object(top)
    }

    pub fn to_pretty_string(&self) -> String {
        self.to_value().to_pretty_string()
    }

    /// Total number of items at every depth.
    pub fn item_count(&self) -> usize {
        self.items.iter().map(ItemRecord::item_count).sum()
    }
}

/// Replace the model's columns and rows with the document's.
///
/// The document is already validated, so this cannot fail half way.
pub fn load(document: Document, model: &mut TreeModel) {
    tracing::debug!(
        columns = document.columns.len(),
        items = document.item_count(),
        "loading document into model"
    );
    model.reset(document.columns, document.items);
}

/// Build a document from the model's current columns and rows.
pub fn save(model: &TreeModel) -> Document {
    Document {
        columns: model.columns().to_vec(),
        items: model.snapshot(),
        extra: Map::new(),
    }
}

fn parse_columns(value: &Value) -> Result<Vec<String>, FormatError> {
    let values = value.as_array().ok_or_else(|| FormatError::WrongType {
        path: statics::DOC_COLUMNS.to_string(),
        expected: "array",
        found: value.type_name(),
    })?;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| FormatError::WrongType {
                    path: format!("{}[{i}]", statics::DOC_COLUMNS),
                    expected: "string",
                    found: v.type_name(),
                })
        })
        .collect()
}

fn parse_items(value: &Value, path: &str) -> Result<Vec<ItemRecord>, FormatError> {
    let values = value.as_array().ok_or_else(|| FormatError::WrongType {
        path: path.to_string(),
        expected: "array",
        found: value.type_name(),
    })?;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| parse_item(v, &format!("{path}[{i}]")))
        .collect()
}

fn parse_item(value: &Value, path: &str) -> Result<ItemRecord, FormatError> {
    let map = value.as_object().ok_or_else(|| FormatError::NotAnObject {
        path: path.to_string(),
        found: value.type_name(),
    })?;

    let mut fields = Fields::with_capacity(map.len());
    let mut children = Vec::new();
    for (key, v) in map {
        if key == statics::DOC_CHILDREN {
            children = parse_items(v, &format!("{path}.{}", statics::DOC_CHILDREN))?;
        } else {
            fields.insert(key.clone(), v.clone());
        }
    }
    Ok(ItemRecord { fields, children })
}

/// Convert records to item objects without recursing per level: records are
/// listed in pre-order, then converted last to first so that every child value
/// exists before its parent is assembled.
fn items_to_values(records: &[ItemRecord]) -> Vec<Value> {
    let mut order: Vec<(&ItemRecord, Option<usize>)> = Vec::new();
    let mut stack: Vec<(&ItemRecord, Option<usize>)> =
        records.iter().rev().map(|record| (record, None)).collect();
    while let Some((record, parent)) = stack.pop() {
        let index = order.len();
        order.push((record, parent));
        stack.extend(record.children.iter().rev().map(|child| (child, Some(index))));
    }

    // Filled in reverse sibling order, flipped when the parent is built.
    let mut children: Vec<Vec<Value>> = vec![Vec::new(); order.len()];
    let mut top = Vec::with_capacity(records.len());
    for (index, (record, parent)) in order.into_iter().enumerate().rev() {
        let mut map = record.fields.clone();
        // A field stored under the reserved key cannot be represented in the file.
        map.shift_remove(statics::DOC_CHILDREN);
        let mut nested = std::mem::take(&mut children[index]);
        if !nested.is_empty() {
            nested.reverse();
            map.insert(statics::DOC_CHILDREN.to_string(), Value::Array(nested));
        }
        match parent {
            Some(parent) => children[parent].push(Value::Object(map)),
            None => top.push(Value::Object(map)),
        }
    }
    top.reverse();
    top
}
