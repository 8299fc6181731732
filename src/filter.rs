//! Read-only filtering over a [`TreeModel`].
//!
//! Nothing here keeps state or touches the model: the caller owns the current
//! pattern and column choice and asks again whenever either changes.

use crate::error::AddressError;
use crate::item::ItemId;
use crate::model::TreeModel;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

/// Which columns a pattern is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterColumn {
    /// Any schema column may match.
    #[default]
    All,
    Column(usize),
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Regex(Regex),
    Literal(String),
}

/// Case-insensitive filter pattern.
///
/// The text is compiled as a regular expression. Text that is not a valid
/// regex (a lone `(` typed into a filter box, say) is matched as a plain
/// substring instead. An empty pattern matches everything.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: String,
    matcher: Matcher,
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            text: String::new(),
            matcher: Matcher::Any,
        }
    }
}

impl Pattern {
    pub fn new(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let matcher = match RegexBuilder::new(text).case_insensitive(true).build() {
            Ok(regex) => Matcher::Regex(regex),
            Err(err) => {
                tracing::debug!(pattern = text, %err, "not a regex, matching literally");
                Matcher::Literal(text.to_lowercase())
            }
        };
        Self {
            text: text.to_string(),
            matcher,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.matcher, Matcher::Any)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Regex(regex) => regex.is_match(haystack),
            Matcher::Literal(needle) => haystack.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// Sorted, de-duplicated display texts of `column` across the whole tree.
/// Missing and null fields show up as `None`.
pub fn distinct_values(model: &TreeModel, column: usize) -> Result<Vec<String>, AddressError> {
    let values: BTreeSet<String> = model
        .all_values_in_column(column, model.root())?
        .into_iter()
        .map(|value| value.display_text())
        .collect();
    Ok(values.into_iter().collect())
}

/// Whether `item` passes `pattern` on the chosen column(s).
pub fn matches(
    model: &TreeModel,
    item: ItemId,
    pattern: &Pattern,
    target: FilterColumn,
) -> Result<bool, AddressError> {
    if let FilterColumn::Column(column) = target {
        let value = model.item_value(item, column)?;
        return Ok(pattern.is_match(&value.display_text()));
    }
    if pattern.is_empty() {
        model.item(item)?;
        return Ok(true);
    }
    for column in 0..model.column_count() {
        if pattern.is_match(&model.item_value(item, column)?.display_text()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Items a filtered view shows, in display (pre-order) order.
///
/// A row is shown when it matches and its parent row is shown; a row that
/// does not match hides its whole subtree.
pub fn visible_items(
    model: &TreeModel,
    pattern: &Pattern,
    target: FilterColumn,
) -> Result<Vec<ItemId>, AddressError> {
    let mut out = Vec::new();
    let mut stack: Vec<ItemId> = model
        .item(model.root())?
        .children()
        .iter()
        .rev()
        .copied()
        .collect();
    while let Some(id) = stack.pop() {
        if !matches(model, id, pattern, target)? {
            continue;
        }
        out.push(id);
        stack.extend(model.item(id)?.children().iter().rev().copied());
    }
    Ok(out)
}
