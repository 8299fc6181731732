use coltree::{AddressError, ItemRecord, ModelEvent, TreeModel, Value};
use pretty_assertions::assert_eq;
use std::{cell::RefCell, rc::Rc};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn named(name: &str) -> ItemRecord {
    let mut record = ItemRecord::default();
    record.fields.insert("name".to_string(), Value::from(name));
    record
}

fn names(model: &TreeModel, parent: coltree::ItemId) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for row in 0..model.row_count(parent)? {
        out.push(model.value(row, 0, parent)?.display_text());
    }
    Ok(out)
}

#[test]
fn insert_then_remove_shifts_siblings() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();

    model.insert_rows(0, 2, root)?;
    assert_eq!(model.row_count(root)?, 2);
    model.set_value(1, 0, root, "second")?;
    let second = model.index(1, root)?;

    model.remove_rows(0, 1, root)?;
    assert_eq!(model.row_count(root)?, 1);
    assert_eq!(model.index(0, root)?, second);
    assert_eq!(model.position(second), Some(0));
    assert_eq!(model.value(0, 0, root)?, &Value::from("second"));
    Ok(())
}

#[test]
fn insert_then_remove_same_range_restores_siblings() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();
    model.insert_rows(0, 4, root)?;
    for row in 0..4 {
        model.set_value(row, 0, root, format!("row{row}"))?;
    }
    let handles = (0..4)
        .map(|row| model.index(row, root))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let before = names(&model, root)?;

    let inserted = model.insert_rows(2, 3, root)?;
    assert_eq!(model.row_count(root)?, 7);
    assert_eq!(model.index(5, root)?, handles[3]);

    let removed = model.remove_rows(2, 3, root)?;
    assert_eq!(removed.len(), 3);
    assert_eq!(model.row_count(root)?, 4);
    assert_eq!(names(&model, root)?, before);
    for (row, &handle) in handles.iter().enumerate() {
        assert_eq!(model.index(row, root)?, handle);
        assert_eq!(model.position(handle), Some(row));
    }
    assert!(inserted.iter().all(|&id| model.item(id).is_err()));
    Ok(())
}

#[test]
fn removed_records_reinsert_to_the_same_tree() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();
    model.insert_records(
        0,
        root,
        vec![
            named("a").with_children(vec![named("a0"), named("a1")]),
            named("b"),
            named("c"),
        ],
    )?;
    let before = model.snapshot();

    let removed = model.remove_rows(0, 2, root)?;
    assert_eq!(removed.len(), 2);
    assert_eq!(removed[0].children.len(), 2);
    assert_eq!(names(&model, root)?, vec!["c"]);
    assert_eq!(model.items().len(), 1);

    model.insert_records(0, root, removed)?;
    assert_eq!(model.snapshot(), before);
    Ok(())
}

#[test]
fn every_child_knows_its_position() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();
    model.insert_rows(0, 3, root)?;
    let middle = model.index(1, root)?;
    model.insert_rows(0, 4, middle)?;
    model.remove_rows(1, 2, middle)?;
    model.insert_rows(1, 1, middle)?;
    model.insert_rows(0, 1, root)?;

    for parent in [root, middle] {
        for row in 0..model.row_count(parent)? {
            let child = model.index(row, parent)?;
            assert_eq!(model.position(child), Some(row));
            assert_eq!(model.parent_of(child)?, Some(parent));
        }
    }
    assert_eq!(model.position(root), None);
    assert_eq!(model.path_of(middle)?, vec![2]);
    Ok(())
}

#[test]
fn out_of_range_rows_are_rejected_without_change() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();
    model.insert_rows(0, 2, root)?;

    assert_eq!(
        model.insert_rows(3, 1, root),
        Err(AddressError::RowOutOfRange { row: 3, len: 2 })
    );
    assert_eq!(
        model.remove_rows(1, 2, root),
        Err(AddressError::RangeOutOfBounds {
            row: 1,
            count: 2,
            len: 2
        })
    );
    assert_eq!(
        model.value(2, 0, root),
        Err(AddressError::RowOutOfRange { row: 2, len: 2 })
    );
    assert_eq!(model.row_count(root)?, 2);
    Ok(())
}

#[test]
fn removed_handles_go_stale() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();
    model.insert_rows(0, 1, root)?;
    let gone = model.index(0, root)?;
    model.insert_rows(0, 1, gone)?;
    let grandchild = model.index(0, gone)?;

    model.remove_rows(0, 1, root)?;
    assert_eq!(model.row_count(gone), Err(AddressError::StaleItem));
    assert_eq!(model.item_value(grandchild, 0), Err(AddressError::StaleItem));
    assert_eq!(model.position(gone), None);
    Ok(())
}

#[test]
fn column_changes_leave_fields_alone() -> Result<()> {
    let mut model = TreeModel::with_columns(["name", "age"]);
    let root = model.root();
    model.insert_rows(0, 1, root)?;
    model.set_value(0, 1, root, 30)?;

    assert_eq!(model.remove_columns(1, 1)?, vec!["age"]);
    assert_eq!(model.column_count(), 1);
    assert_eq!(model.row_count(root)?, 1);
    assert_eq!(
        model.value(0, 1, root),
        Err(AddressError::ColumnOutOfRange { column: 1, len: 1 })
    );

    // Re-adding the name makes the stored value addressable again.
    model.insert_columns(1, 1)?;
    assert_eq!(model.value(0, 1, root)?, &Value::Null);
    model.set_column_name(1, "age")?;
    assert_eq!(model.value(0, 1, root)?, &Value::from(30));
    Ok(())
}

#[test]
fn structural_changes_are_bracketed() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();
    let log: Rc<RefCell<Vec<(ModelEvent, usize)>>> = Rc::default();
    let sink = Rc::clone(&log);
    model.subscribe(move |m: &TreeModel, e: &ModelEvent| {
        let rows = m.row_count(m.root()).unwrap_or_default();
        sink.borrow_mut().push((e.clone(), rows));
    });

    model.insert_rows(0, 2, root)?;
    model.set_value(1, 0, root, "x")?;
    model.remove_rows(0, 1, root)?;
    model.insert_rows(0, 0, root)?;

    assert_eq!(
        *log.borrow(),
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
    Ok(())
}

#[test]
fn remove_items_handles_nested_selection() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();
    model.insert_records(
        0,
        root,
        vec![
            named("a").with_children(vec![named("a0"), named("a1")]),
            named("b"),
            named("c").with_children(vec![named("c0")]),
        ],
    )?;
    let a = model.index(0, root)?;
    let a1 = model.index(1, a)?;
    let c = model.index(2, root)?;
    let c0 = model.index(0, c)?;

    // c0 is covered by c; a1 and c are removed bottom-up.
    assert_eq!(model.remove_items(&[a1, c0, c, a1])?, 2);
    assert_eq!(names(&model, root)?, vec!["a", "b"]);
    assert_eq!(names(&model, a)?, vec!["a0"]);

    assert_eq!(
        model.remove_items(&[root]),
        Err(AddressError::RootNotAddressable)
    );
    Ok(())
}

#[test]
fn append_rows_adds_one_child_per_selected_item() -> Result<()> {
    let mut model = TreeModel::with_columns(["name"]);
    let root = model.root();

    let top = model.append_rows(&[])?;
    assert_eq!(top.len(), 1);
    assert_eq!(model.row_count(root)?, 1);

    let parent = top[0];
    let created = model.append_rows(&[parent, root, parent])?;
    assert_eq!(created.len(), 2);
    assert_eq!(model.row_count(parent)?, 1);
    assert_eq!(model.row_count(root)?, 2);
    assert_eq!(model.path_of(created[0])?, vec![0, 0]);
    assert_eq!(model.path_of(created[1])?, vec![1]);
    Ok(())
}
