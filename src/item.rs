//! Tree nodes and the arena that owns them.
//!
//! Items are stored in a generational arena. A parent owns its children through
//! its `children` list; the `parent` link is a plain handle used for upward
//! traversal and never keeps anything alive. Removing an item frees its whole
//! subtree and turns every handle into it stale.

use crate::error::AddressError;
use crate::value::{Map, NULL, Value};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

new_key_type! {
    /// Handle to an item owned by an [`ItemArena`].
    ///
    /// Handles survive sibling insertions and removals, but the row of the
    /// item they point to does not: re-derive positions after any structural
    /// change. A handle to a removed item resolves to
    /// [`AddressError::StaleItem`].
    pub struct ItemId;
}

/// Field record of a single item, keyed by column name.
pub type Fields = Map;

#[derive(Debug, Clone, Default)]
pub struct Item {
    parent: Option<ItemId>,
    children: Vec<ItemId>,
    fields: Fields,
}

impl Item {
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    pub fn child(&self, row: usize) -> Option<ItemId> {
        self.children.get(row).copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Stored value for `name`, or null when the key is absent.
    pub fn get_field(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL)
    }

    /// Store `value` under `name`. Any key is accepted; the column schema is
    /// enforced by the model, not here.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn full_record(&self) -> Fields {
        self.fields.clone()
    }

    pub fn set_full_record(&mut self, fields: Fields) {
        self.fields = fields;
    }
}

/// A detached subtree: fields plus owned children, no handles.
///
/// Removed rows come back as records, documents are loaded from records, and
/// records can be re-attached anywhere with [`ItemArena::insert_records`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemRecord {
    pub fields: Fields,
    pub children: Vec<ItemRecord>,
}

impl ItemRecord {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<ItemRecord>) -> Self {
        self.children = children;
        self
    }

    /// Number of items in this subtree, including itself.
    pub fn item_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(record) = stack.pop() {
            count += 1;
            stack.extend(&record.children);
        }
        count
    }
}

// Flatten before dropping so deep subtrees do not recurse once per level.
impl Drop for ItemRecord {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut record) = stack.pop() {
            stack.append(&mut record.children);
        }
    }
}

/// Owner of every item in one tree, including the synthetic root.
#[derive(Debug, Clone)]
pub struct ItemArena {
    items: SlotMap<ItemId, Item>,
    root: ItemId,
}

impl Default for ItemArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemArena {
    pub fn new() -> Self {
        let mut items = SlotMap::with_key();
        let root = items.insert(Item::default());
        Self { items, root }
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    /// Number of live items, not counting the root.
    pub fn len(&self) -> usize {
        self.items.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: ItemId) -> Result<&Item, AddressError> {
        self.items.get(id).ok_or(AddressError::StaleItem)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Result<&mut Item, AddressError> {
        self.items.get_mut(id).ok_or(AddressError::StaleItem)
    }

    /// Index of `id` within its parent's children; `None` for the root or a
    /// stale handle.
    pub fn position(&self, id: ItemId) -> Option<usize> {
        let parent = self.items.get(id)?.parent?;
        self.items
            .get(parent)?
            .children
            .iter()
            .position(|&child| child == id)
    }

    /// Create `count` empty items at `row` under `parent`, shifting later
    /// siblings right. `row` may equal the child count (append).
    pub fn insert_children(
        &mut self,
        parent: ItemId,
        row: usize,
        count: usize,
    ) -> Result<Vec<ItemId>, AddressError> {
        self.check_insert_row(parent, row)?;
        let created: Vec<ItemId> = (0..count)
            .map(|_| {
                self.items.insert(Item {
                    parent: Some(parent),
                    ..Item::default()
                })
            })
            .collect();
        splice_in(&mut self.items[parent].children, row, &created);
        Ok(created)
    }

    /// Attach detached subtrees at `row` under `parent`, in order.
    pub fn insert_records(
        &mut self,
        parent: ItemId,
        row: usize,
        records: Vec<ItemRecord>,
    ) -> Result<Vec<ItemId>, AddressError> {
        self.check_insert_row(parent, row)?;
        let created: Vec<ItemId> = records
            .into_iter()
            .map(|record| self.build(parent, record))
            .collect();
        splice_in(&mut self.items[parent].children, row, &created);
        Ok(created)
    }

    /// Remove `count` children starting at `row`, shifting later siblings left.
    /// The removed subtrees are freed from the arena and returned as records.
    pub fn remove_children(
        &mut self,
        parent: ItemId,
        row: usize,
        count: usize,
    ) -> Result<Vec<ItemRecord>, AddressError> {
        self.check_remove_range(parent, row, count)?;
        let removed: Vec<ItemId> = self.items[parent]
            .children
            .drain(row..row + count)
            .collect();
        Ok(removed.into_iter().map(|id| self.take(id)).collect())
    }

    /// Detached copy of the subtree rooted at `id`.
    ///
    /// Records are assembled bottom-up in reverse pre-order, so every child
    /// is finished before its parent asks for it.
    pub fn record(&self, id: ItemId) -> Result<ItemRecord, AddressError> {
        let order = self.preorder(id)?;
        let mut done: SecondaryMap<ItemId, ItemRecord> = SecondaryMap::with_capacity(order.len());
        for &next in order.iter().rev() {
            let item = self.get(next)?;
            let children = item
                .children
                .iter()
                .map(|&child| done.remove(child).ok_or(AddressError::StaleItem))
                .collect::<Result<Vec<_>, _>>()?;
            done.insert(
                next,
                ItemRecord {
                    fields: item.fields.clone(),
                    children,
                },
            );
        }
        done.remove(id).ok_or(AddressError::StaleItem)
    }

    /// `id` followed by all of its descendants, depth-first pre-order.
    pub fn preorder(&self, id: ItemId) -> Result<Vec<ItemId>, AddressError> {
        self.get(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(item) = self.items.get(next) {
                stack.extend(item.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: ItemId, id: ItemId) -> bool {
        let mut cursor = self.items.get(id).and_then(|item| item.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.items.get(current).and_then(|item| item.parent);
        }
        false
    }

    /// Replace the whole tree with `records` as the root's children.
    /// The root handle stays the same; every other handle becomes stale.
    pub fn replace_all(&mut self, records: Vec<ItemRecord>) {
        self.clear();
        let root = self.root;
        let ids: Vec<ItemId> = records
            .into_iter()
            .map(|record| self.build(root, record))
            .collect();
        self.items[root].children = ids;
    }

    /// Drop every item except the root and clear the root's fields.
    pub fn clear(&mut self) {
        let root = self.root;
        self.items.retain(|id, _| id == root);
        let root_item = &mut self.items[root];
        root_item.children.clear();
        root_item.fields.clear();
    }

    fn check_insert_row(&self, parent: ItemId, row: usize) -> Result<(), AddressError> {
        let len = self.get(parent)?.children.len();
        if row > len {
            return Err(AddressError::RowOutOfRange { row, len });
        }
        Ok(())
    }

    fn check_remove_range(
        &self,
        parent: ItemId,
        row: usize,
        count: usize,
    ) -> Result<(), AddressError> {
        let len = self.get(parent)?.children.len();
        match row.checked_add(count) {
            Some(end) if end <= len => Ok(()),
            _ => Err(AddressError::RangeOutOfBounds { row, count, len }),
        }
    }

    /// Allocate `record` under `parent` and return its handle. The caller
    /// links the handle into the parent's child list.
    fn build(&mut self, parent: ItemId, record: ItemRecord) -> ItemId {
        let top = self.items.insert(Item {
            parent: Some(parent),
            ..Item::default()
        });
        let mut pending = vec![(top, record)];
        while let Some((id, mut record)) = pending.pop() {
            let children = std::mem::take(&mut record.children);
            let child_ids: Vec<ItemId> = children
                .iter()
                .map(|_| {
                    self.items.insert(Item {
                        parent: Some(id),
                        ..Item::default()
                    })
                })
                .collect();
            let item = &mut self.items[id];
            item.fields = std::mem::take(&mut record.fields);
            item.children = child_ids.clone();
            pending.extend(child_ids.into_iter().zip(children));
        }
        top
    }

    /// Free the subtree at `id` and hand it back as a record.
    fn take(&mut self, id: ItemId) -> ItemRecord {
        let order = self.preorder(id).unwrap_or_default();
        let mut done: SecondaryMap<ItemId, ItemRecord> = SecondaryMap::with_capacity(order.len());
        for next in order.into_iter().rev() {
            let Some(item) = self.items.remove(next) else {
                continue;
            };
            let children = item
                .children
                .into_iter()
                .filter_map(|child| done.remove(child))
                .collect();
            done.insert(
                next,
                ItemRecord {
                    fields: item.fields,
                    children,
                },
            );
        }
        done.remove(id).unwrap_or_default()
    }
}

fn splice_in(children: &mut Vec<ItemId>, row: usize, ids: &[ItemId]) {
    let tail = children.split_off(row);
    children.extend_from_slice(ids);
    children.extend(tail);
}
