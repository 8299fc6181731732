//! Position-addressed tree model.
//!
//! A [`TreeModel`] owns the item tree plus the column schema shared by every
//! item. Fields are addressed by `(row, column, parent)`, items by
//! `(row, parent)`, where `parent` is an [`ItemId`] and [`TreeModel::root`]
//! stands for the top level. Rows are always derived from the parent's child
//! list, so they are correct right after any mutation; callers must re-derive
//! them instead of caching them across structural changes.
//!
//! Every mutation notifies registered [`ModelObserver`]s. Structural changes
//! are bracketed by an "about to" event (state before) and a completion event
//! (state after); observers never see a half-applied change.

use crate::error::AddressError;
use crate::item::{Item, ItemArena, ItemId, ItemRecord};
use crate::statics;
use crate::value::Value;
use std::fmt;

/// Change notification delivered to observers. Ranges are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    DataChanged {
        parent: ItemId,
        row: usize,
        column: usize,
    },
    HeaderChanged {
        first: usize,
        last: usize,
    },
    RowsAboutToBeInserted {
        parent: ItemId,
        first: usize,
        last: usize,
    },
    RowsInserted {
        parent: ItemId,
        first: usize,
        last: usize,
    },
    RowsAboutToBeRemoved {
        parent: ItemId,
        first: usize,
        last: usize,
    },
    RowsRemoved {
        parent: ItemId,
        first: usize,
        last: usize,
    },
    ColumnsAboutToBeInserted {
        first: usize,
        last: usize,
    },
    ColumnsInserted {
        first: usize,
        last: usize,
    },
    ColumnsAboutToBeRemoved {
        first: usize,
        last: usize,
    },
    ColumnsRemoved {
        first: usize,
        last: usize,
    },
    ModelAboutToBeReset,
    ModelReset,
}

/// Receives change notifications together with a read-only view of the model.
pub trait ModelObserver {
    fn notify(&mut self, model: &TreeModel, event: &ModelEvent);
}

impl<F> ModelObserver for F
where
    F: FnMut(&TreeModel, &ModelEvent),
{
    fn notify(&mut self, model: &TreeModel, event: &ModelEvent) {
        self(model, event)
    }
}

#[derive(Default)]
pub struct TreeModel {
    items: ItemArena,
    columns: Vec<String>,
    observers: Vec<Box<dyn ModelObserver>>,
}

impl fmt::Debug for TreeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeModel")
            .field("columns", &self.columns)
            .field("items", &self.items.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl TreeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn subscribe(&mut self, observer: impl ModelObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Handle of the synthetic root. Use it as `parent` to address top-level rows.
    pub fn root(&self) -> ItemId {
        self.items.root()
    }

    /// True in the initial state: no columns and no rows.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.items.is_empty()
    }

    pub fn items(&self) -> &ItemArena {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Result<&Item, AddressError> {
        self.items.get(id)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, index: usize) -> Result<&str, AddressError> {
        self.columns
            .get(index)
            .map(String::as_str)
            .ok_or(AddressError::ColumnOutOfRange {
                column: index,
                len: self.columns.len(),
            })
    }

    /// First column called `name`. Names are not required to be unique.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn set_column_name(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<(), AddressError> {
        self.check_column(index)?;
        let name = name.into();
        if name == statics::DOC_CHILDREN {
            return Err(AddressError::ReservedColumn);
        }
        self.columns[index] = name;
        self.emit(ModelEvent::HeaderChanged {
            first: index,
            last: index,
        });
        Ok(())
    }

    pub fn row_count(&self, parent: ItemId) -> Result<usize, AddressError> {
        Ok(self.items.get(parent)?.child_count())
    }

    /// Handle of the item at `row` under `parent`.
    pub fn index(&self, row: usize, parent: ItemId) -> Result<ItemId, AddressError> {
        let item = self.items.get(parent)?;
        item.child(row).ok_or(AddressError::RowOutOfRange {
            row,
            len: item.child_count(),
        })
    }

    /// Parent handle of `id` (the root for top-level rows, `None` for the root itself).
    pub fn parent_of(&self, id: ItemId) -> Result<Option<ItemId>, AddressError> {
        Ok(self.items.get(id)?.parent())
    }

    /// Current row of `id` within its parent, `None` for the root or a stale handle.
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.position(id)
    }

    pub fn value(
        &self,
        row: usize,
        column: usize,
        parent: ItemId,
    ) -> Result<&Value, AddressError> {
        let id = self.index(row, parent)?;
        self.item_value(id, column)
    }

    /// Field of an already resolved item under the schema column `column`.
    pub fn item_value(&self, id: ItemId, column: usize) -> Result<&Value, AddressError> {
        let name = self.column_name(column)?;
        if id == self.root() {
            return Err(AddressError::RootNotAddressable);
        }
        Ok(self.items.get(id)?.get_field(name))
    }

    pub fn set_value(
        &mut self,
        row: usize,
        column: usize,
        parent: ItemId,
        value: impl Into<Value>,
    ) -> Result<(), AddressError> {
        let id = self.index(row, parent)?;
        let name = self.column_name(column)?.to_string();
        // Values under the reserved key could never be saved.
        if name == statics::DOC_CHILDREN {
            return Err(AddressError::ReservedColumn);
        }
        self.items.get_mut(id)?.set_field(name, value.into());
        self.emit(ModelEvent::DataChanged {
            parent,
            row,
            column,
        });
        Ok(())
    }

    /// Insert `count` empty rows at `row` under `parent`.
    pub fn insert_rows(
        &mut self,
        row: usize,
        count: usize,
        parent: ItemId,
    ) -> Result<Vec<ItemId>, AddressError> {
        self.check_insert_row(row, parent)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let (first, last) = (row, row + count - 1);
        self.emit(ModelEvent::RowsAboutToBeInserted {
            parent,
            first,
            last,
        });
        let created = self.items.insert_children(parent, row, count)?;
        self.emit(ModelEvent::RowsInserted {
            parent,
            first,
            last,
        });
        tracing::trace!(row, count, "inserted rows");
        Ok(created)
    }

    /// Insert detached subtrees at `row` under `parent`.
    pub fn insert_records(
        &mut self,
        row: usize,
        parent: ItemId,
        records: Vec<ItemRecord>,
    ) -> Result<Vec<ItemId>, AddressError> {
        self.check_insert_row(row, parent)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let (first, last) = (row, row + records.len() - 1);
        self.emit(ModelEvent::RowsAboutToBeInserted {
            parent,
            first,
            last,
        });
        let created = self.items.insert_records(parent, row, records)?;
        self.emit(ModelEvent::RowsInserted {
            parent,
            first,
            last,
        });
        Ok(created)
    }

    /// Remove `count` rows starting at `row` under `parent`; the removed
    /// subtrees are returned detached.
    pub fn remove_rows(
        &mut self,
        row: usize,
        count: usize,
        parent: ItemId,
    ) -> Result<Vec<ItemRecord>, AddressError> {
        let len = self.row_count(parent)?;
        match row.checked_add(count) {
            Some(end) if end <= len => {}
            _ => return Err(AddressError::RangeOutOfBounds { row, count, len }),
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let (first, last) = (row, row + count - 1);
        self.emit(ModelEvent::RowsAboutToBeRemoved {
            parent,
            first,
            last,
        });
        let removed = self.items.remove_children(parent, row, count)?;
        self.emit(ModelEvent::RowsRemoved {
            parent,
            first,
            last,
        });
        tracing::trace!(row, count, "removed rows");
        Ok(removed)
    }

    /// Insert `count` empty-named columns at `index`. Item fields are untouched.
    pub fn insert_columns(&mut self, index: usize, count: usize) -> Result<(), AddressError> {
        let len = self.columns.len();
        if index > len {
            return Err(AddressError::ColumnOutOfRange { column: index, len });
        }
        if count == 0 {
            return Ok(());
        }
        let (first, last) = (index, index + count - 1);
        self.emit(ModelEvent::ColumnsAboutToBeInserted { first, last });
        let tail = self.columns.split_off(index);
        self.columns
            .extend(std::iter::repeat_n(String::new(), count).chain(tail));
        self.emit(ModelEvent::ColumnsInserted { first, last });
        Ok(())
    }

    /// Remove `count` columns starting at `index` from the schema.
    ///
    /// Items keep their stored values under the removed names; those keys just
    /// stop being addressable. Row counts are unaffected.
    pub fn remove_columns(
        &mut self,
        index: usize,
        count: usize,
    ) -> Result<Vec<String>, AddressError> {
        let len = self.columns.len();
        match index.checked_add(count) {
            Some(end) if end <= len => {}
            _ => {
                return Err(AddressError::ColumnRangeOutOfBounds { index, count, len });
            }
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let (first, last) = (index, index + count - 1);
        self.emit(ModelEvent::ColumnsAboutToBeRemoved { first, last });
        let removed: Vec<String> = self.columns.drain(index..index + count).collect();
        self.emit(ModelEvent::ColumnsRemoved { first, last });
        Ok(removed)
    }

    /// Values of `column` for every descendant of `parent`, depth-first
    /// pre-order. A real item contributes its own value first; the root does not.
    pub fn all_values_in_column(
        &self,
        column: usize,
        parent: ItemId,
    ) -> Result<Vec<&Value>, AddressError> {
        let name = self.column_name(column)?;
        let skip = usize::from(parent == self.root());
        let values = self
            .items
            .preorder(parent)?
            .into_iter()
            .skip(skip)
            .filter_map(|id| self.items.get(id).ok())
            .map(|item| item.get_field(name))
            .collect();
        Ok(values)
    }

    /// Replace columns and rows in one step. Every handle except the root
    /// becomes stale.
    pub fn reset(&mut self, columns: Vec<String>, records: Vec<ItemRecord>) {
        self.emit(ModelEvent::ModelAboutToBeReset);
        self.columns = columns;
        self.items.replace_all(records);
        self.emit(ModelEvent::ModelReset);
    }

    /// Detached copy of every top-level row, in order.
    pub fn snapshot(&self) -> Vec<ItemRecord> {
        let root = self.root();
        self.items
            .get(root)
            .map(|item| item.children().to_vec())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.items.record(id).ok())
            .collect()
    }

    /// Resolve a row path (rows from the top level down). An empty path is the root.
    pub fn resolve_path(&self, path: &[usize]) -> Result<ItemId, AddressError> {
        path.iter()
            .try_fold(self.root(), |parent, &row| self.index(row, parent))
    }

    /// Row path of `id`, the inverse of [`TreeModel::resolve_path`].
    pub fn path_of(&self, id: ItemId) -> Result<Vec<usize>, AddressError> {
        let mut path = Vec::new();
        let mut cursor = id;
        while let Some(parent) = self.items.get(cursor)?.parent() {
            let row = self.items.position(cursor).ok_or(AddressError::StaleItem)?;
            path.push(row);
            cursor = parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Remove a selection of items.
    ///
    /// Duplicates and items whose ancestor is also selected are skipped, and
    /// removal runs from the last item in document order to the first, so the
    /// remaining entries keep resolving while the batch runs. Returns how many
    /// subtrees were removed. Nothing is removed if any handle is invalid.
    /// An empty selection removes the last top-level row, if there is one.
    pub fn remove_items(&mut self, selection: &[ItemId]) -> Result<usize, AddressError> {
        let root = self.root();
        if selection.is_empty() {
            let len = self.row_count(root)?;
            if len == 0 {
                return Ok(0);
            }
            self.remove_rows(len - 1, 1, root)?;
            return Ok(1);
        }
        let mut targets: Vec<(Vec<usize>, ItemId)> = Vec::with_capacity(selection.len());
        for &id in selection {
            if id == root {
                return Err(AddressError::RootNotAddressable);
            }
            let path = self.path_of(id)?;
            if !targets.iter().any(|(_, seen)| *seen == id) {
                targets.push((path, id));
            }
        }
        targets.retain(|(_, id)| {
            !selection
                .iter()
                .any(|&other| other != *id && self.items.is_ancestor(other, *id))
        });
        targets.sort_by(|a, b| b.0.cmp(&a.0));

        let removed = targets.len();
        for (mut path, _) in targets {
            let Some(row) = path.pop() else {
                continue;
            };
            let parent = self.resolve_path(&path)?;
            self.remove_rows(row, 1, parent)?;
        }
        tracing::debug!(removed, "removed selected items");
        Ok(removed)
    }

    /// Append one empty child under each distinct item of `selection`, or one
    /// top-level row when the selection is empty. Returns the new handles.
    pub fn append_rows(&mut self, selection: &[ItemId]) -> Result<Vec<ItemId>, AddressError> {
        let mut parents: Vec<ItemId> = Vec::with_capacity(selection.len().max(1));
        for &id in selection {
            self.items.get(id)?;
            if !parents.contains(&id) {
                parents.push(id);
            }
        }
        if parents.is_empty() {
            parents.push(self.root());
        }

        let mut created = Vec::with_capacity(parents.len());
        for parent in parents {
            let row = self.row_count(parent)?;
            created.extend(self.insert_rows(row, 1, parent)?);
        }
        Ok(created)
    }

    fn check_insert_row(&self, row: usize, parent: ItemId) -> Result<(), AddressError> {
        let len = self.row_count(parent)?;
        if row > len {
            return Err(AddressError::RowOutOfRange { row, len });
        }
        Ok(())
    }

    fn check_column(&self, index: usize) -> Result<(), AddressError> {
        self.column_name(index).map(|_| ())
    }

    fn emit(&mut self, event: ModelEvent) {
        if self.observers.is_empty() {
            return;
        }
        let mut observers = std::mem::take(&mut self.observers);
        for observer in &mut observers {
            observer.notify(self, &event);
        }
        self.observers = observers;
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelEvent, TreeModel};
    use crate::error::AddressError;
    use crate::value::Value;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn new_model_is_empty() {
        let model = TreeModel::new();
        assert!(model.is_empty());
        assert_eq!(model.column_count(), 0);
        assert_eq!(model.row_count(model.root()).unwrap(), 0);
    }

    #[test]
    fn insert_rows_on_empty_model_then_remove_first() {
        let mut model = TreeModel::with_columns(["name"]);
        let root = model.root();
        let ids = model.insert_rows(0, 2, root).unwrap();
        assert_eq!(model.row_count(root).unwrap(), 2);

        model.remove_rows(0, 1, root).unwrap();
        assert_eq!(model.row_count(root).unwrap(), 1);
        assert_eq!(model.index(0, root).unwrap(), ids[1]);
        assert_eq!(model.position(ids[1]), Some(0));
    }

    #[test]
    fn value_errors_are_reported_not_clamped() {
        let mut model = TreeModel::with_columns(["name"]);
        let root = model.root();
        model.insert_rows(0, 1, root).unwrap();

        assert_eq!(
            model.value(1, 0, root),
            Err(AddressError::RowOutOfRange { row: 1, len: 1 })
        );
        assert_eq!(
            model.value(0, 1, root),
            Err(AddressError::ColumnOutOfRange { column: 1, len: 1 })
        );
        assert_eq!(
            model.set_value(0, 3, root, "x"),
            Err(AddressError::ColumnOutOfRange { column: 3, len: 1 })
        );
        assert_eq!(model.item_value(root, 0), Err(AddressError::RootNotAddressable));
    }

    #[test]
    fn stale_parent_fails_to_resolve() {
        let mut model = TreeModel::with_columns(["name"]);
        let root = model.root();
        let parent = model.insert_rows(0, 1, root).unwrap()[0];
        model.insert_rows(0, 1, parent).unwrap();
        model.remove_rows(0, 1, root).unwrap();

        assert_eq!(model.row_count(parent), Err(AddressError::StaleItem));
        assert_eq!(model.value(0, 0, parent), Err(AddressError::StaleItem));
    }

    #[test]
    fn columns_insert_as_empty_names_and_keep_fields() {
        let mut model = TreeModel::with_columns(["a", "b"]);
        let root = model.root();
        model.insert_rows(0, 1, root).unwrap();
        model.set_value(0, 1, root, 5).unwrap();

        model.insert_columns(1, 2).unwrap();
        assert_eq!(model.columns(), ["a", "", "", "b"]);
        assert_eq!(model.value(0, 3, root).unwrap(), &Value::from(5));
        assert!(model.value(0, 1, root).unwrap().is_null());
        assert!(model.insert_columns(5, 1).is_err());
    }

    #[test]
    fn removed_column_keys_stay_in_item_fields() {
        let mut model = TreeModel::with_columns(["a", "b"]);
        let root = model.root();
        let id = model.insert_rows(0, 1, root).unwrap()[0];
        model.set_value(0, 1, root, "kept").unwrap();

        assert_eq!(model.remove_columns(1, 1).unwrap(), vec!["b".to_string()]);
        assert_eq!(model.column_count(), 1);
        assert_eq!(
            model.item(id).unwrap().get_field("b"),
            &Value::from("kept")
        );

        // Re-adding the name makes the old value addressable again.
        model.insert_columns(1, 1).unwrap();
        model.set_column_name(1, "b").unwrap();
        assert_eq!(model.value(0, 1, root).unwrap(), &Value::from("kept"));
    }

    #[test]
    fn structural_changes_are_bracketed_for_observers() {
        let log: Rc<RefCell<Vec<(ModelEvent, usize)>>> = Rc::default();
        let sink = Rc::clone(&log);

        let mut model = TreeModel::with_columns(["name"]);
        let root = model.root();
        model.subscribe(move |model: &TreeModel, event: &ModelEvent| {
            let rows = model.row_count(model.root()).unwrap_or(0);
            sink.borrow_mut().push((event.clone(), rows));
        });

        model.insert_rows(0, 2, root).unwrap();
        model.set_value(1, 0, root, "x").unwrap();
        model.remove_rows(0, 1, root).unwrap();
        // Rejected calls do not notify.
        assert!(model.remove_rows(4, 1, root).is_err());

        let log = log.borrow();
        assert_eq!(
            *log,
            vec![
                (
                    ModelEvent::RowsAboutToBeInserted {
                        parent: root,
                        first: 0,
                        last: 1
                    },
                    0
                ),
                (
                    ModelEvent::RowsInserted {
                        parent: root,
                        first: 0,
                        last: 1
                    },
                    2
                ),
                (
                    ModelEvent::DataChanged {
                        parent: root,
                        row: 1,
                        column: 0
                    },
                    2
                ),
                (
                    ModelEvent::RowsAboutToBeRemoved {
                        parent: root,
                        first: 0,
                        last: 0
                    },
                    2
                ),
                (
                    ModelEvent::RowsRemoved {
                        parent: root,
                        first: 0,
                        last: 0
                    },
                    1
                ),
            ]
        );
    }

    #[test]
    fn zero_count_mutations_are_silent_no_ops() {
        let events = Rc::new(RefCell::new(0usize));
        let counter = Rc::clone(&events);
        let mut model = TreeModel::with_columns(["a"]);
        let root = model.root();
        model.subscribe(move |_: &TreeModel, _: &ModelEvent| *counter.borrow_mut() += 1);

        assert!(model.insert_rows(0, 0, root).unwrap().is_empty());
        assert!(model.remove_rows(0, 0, root).unwrap().is_empty());
        model.insert_columns(0, 0).unwrap();
        assert!(model.remove_columns(0, 0).unwrap().is_empty());
        assert_eq!(*events.borrow(), 0);
    }

    #[test]
    fn paths_resolve_both_ways() {
        let mut model = TreeModel::with_columns(["a"]);
        let root = model.root();
        let top = model.insert_rows(0, 2, root).unwrap();
        let kids = model.insert_rows(0, 3, top[1]).unwrap();

        assert_eq!(model.resolve_path(&[]).unwrap(), root);
        assert_eq!(model.resolve_path(&[1, 2]).unwrap(), kids[2]);
        assert_eq!(model.path_of(kids[2]).unwrap(), vec![1, 2]);
        assert!(model.path_of(root).unwrap().is_empty());
        assert!(model.resolve_path(&[1, 3]).is_err());
    }

    #[test]
    fn remove_items_skips_descendants_of_selected_items() {
        let mut model = TreeModel::with_columns(["a"]);
        let root = model.root();
        let top = model.insert_rows(0, 3, root).unwrap();
        let kids = model.insert_rows(0, 2, top[0]).unwrap();

        let removed = model
            .remove_items(&[kids[1], top[0], top[2], top[2]])
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(model.row_count(root).unwrap(), 1);
        assert_eq!(model.index(0, root).unwrap(), top[1]);
        assert!(model.item(kids[0]).is_err());
    }

    #[test]
    fn remove_items_rejects_root_without_removing_anything() {
        let mut model = TreeModel::with_columns(["a"]);
        let root = model.root();
        let top = model.insert_rows(0, 1, root).unwrap();
        assert_eq!(
            model.remove_items(&[top[0], root]),
            Err(AddressError::RootNotAddressable)
        );
        assert_eq!(model.row_count(root).unwrap(), 1);
    }

    #[test]
    fn remove_items_without_selection_drops_last_top_level_row() {
        let mut model = TreeModel::with_columns(["a"]);
        let root = model.root();
        assert_eq!(model.remove_items(&[]).unwrap(), 0);

        let top = model.insert_rows(0, 2, root).unwrap();
        model.insert_rows(0, 1, top[0]).unwrap();
        assert_eq!(model.remove_items(&[]).unwrap(), 1);
        assert_eq!(model.row_count(root).unwrap(), 1);
        assert_eq!(model.index(0, root).unwrap(), top[0]);
        assert_eq!(model.row_count(top[0]).unwrap(), 1);
    }

    #[test]
    fn children_column_cannot_hold_values() {
        let mut model = TreeModel::with_columns(["children", "name"]);
        let root = model.root();
        model.insert_rows(0, 1, root).unwrap();

        assert_eq!(
            model.set_value(0, 0, root, "payload"),
            Err(AddressError::ReservedColumn)
        );
        assert!(model.value(0, 0, root).unwrap().is_null());
        assert_eq!(
            model.set_column_name(1, "children"),
            Err(AddressError::ReservedColumn)
        );
        assert_eq!(model.column_name(1).unwrap(), "name");
    }

    #[test]
    fn append_rows_adds_one_child_per_selected_item() {
        let mut model = TreeModel::with_columns(["a"]);
        let root = model.root();

        let first = model.append_rows(&[]).unwrap();
        assert_eq!(model.row_count(root).unwrap(), 1);

        let created = model.append_rows(&[first[0], first[0], root]).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(model.row_count(first[0]).unwrap(), 1);
        assert_eq!(model.row_count(root).unwrap(), 2);
        assert_eq!(model.position(created[1]), Some(1));
    }
}
