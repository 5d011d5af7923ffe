/// Update pipeline integration tests
///
/// Modification commands running against the in-memory store: ordering by
/// generated keys, key fix-up into dependents, and failure reporting.
/// Run with: cargo test --test modification_pipeline_tests

use rustmemodb_update::{
    CancellationToken, DbError, EntityState, EntityStateEntry, IdentifierId, MemoryStore,
    ModificationCommand, OrderedCommandProducer, PropagatorFlags, PropagatorResult, StateManager,
    StoreConnection, TableSchema, UpdateCommand, UpdateError, UpdateTranslator, Value,
};

use std::sync::Arc;
use std::time::Duration;

fn create_store(store: MemoryStore) -> Arc<MemoryStore> {
    store
        .create_table(
            TableSchema::new("customers", &["id", "name"])
                .identity("id")
                .unique("name"),
        )
        .unwrap();
    store
        .create_table(TableSchema::new("orders", &["id", "customer_id", "total"]).identity("id"))
        .unwrap();
    Arc::new(store)
}

fn member(entry: &Arc<EntityStateEntry>, ordinal: usize, flags: PropagatorFlags) -> PropagatorResult {
    PropagatorResult::member_value(flags, entry.clone(), ordinal)
}

fn insert_customer(
    store: &Arc<MemoryStore>,
    entry: &Arc<EntityStateEntry>,
    key: IdentifierId,
) -> Arc<dyn UpdateCommand> {
    let connection: Arc<dyn StoreConnection> = store.clone();
    Arc::new(
        ModificationCommand::insert(connection, "customers")
            .set("name", Arc::new(member(entry, 1, PropagatorFlags::NO_FLAGS)))
            .output(
                "id",
                Arc::new(member(entry, 0, PropagatorFlags::KEY | PropagatorFlags::SERVER_GEN).with_identifier(key)),
            )
            .entry(entry.clone()),
    )
}

fn insert_order(
    store: &Arc<MemoryStore>,
    entry: &Arc<EntityStateEntry>,
    customer_key: IdentifierId,
) -> Arc<dyn UpdateCommand> {
    let connection: Arc<dyn StoreConnection> = store.clone();
    Arc::new(
        ModificationCommand::insert(connection, "orders")
            .set(
                "customer_id",
                Arc::new(member(entry, 1, PropagatorFlags::FOREIGN_KEY).with_identifier(customer_key)),
            )
            .set("total", Arc::new(member(entry, 2, PropagatorFlags::NO_FLAGS)))
            .output("id", Arc::new(member(entry, 0, PropagatorFlags::KEY | PropagatorFlags::SERVER_GEN)))
            .entry(entry.clone()),
    )
}

fn translator(commands: Vec<Arc<dyn UpdateCommand>>) -> UpdateTranslator {
    UpdateTranslator::new(Arc::new(OrderedCommandProducer::new(commands)))
}

#[test]
fn test_principal_inserted_first_and_key_fixed_up() {
    let store = create_store(MemoryStore::new());
    let manager = StateManager::new();
    let customer = manager.add_entry("customers", EntityState::Added, vec![Value::Null, "Alice".into()]);
    let order = manager.add_entry(
        "orders",
        EntityState::Added,
        vec![Value::Null, Value::Null, Value::Integer(250)],
    );
    let customer_key = IdentifierId::new();

    // Dependent listed first; the producer has to reorder.
    let commands = vec![
        insert_order(&store, &order, customer_key),
        insert_customer(&store, &customer, customer_key),
    ];

    let entities_affected = translator(commands).update().unwrap();

    assert_eq!(entities_affected, 2);
    assert_eq!(*customer.current_value(0).unwrap(), Value::Integer(1));
    assert!(Arc::ptr_eq(
        &customer.current_value(0).unwrap(),
        &order.current_value(1).unwrap()
    ));
    assert_eq!(*order.current_value(0).unwrap(), Value::Integer(1));
    assert_eq!(customer.state(), EntityState::Unchanged);
    assert_eq!(order.state(), EntityState::Unchanged);
    assert!(manager.pending_entries().is_empty());

    let orders = store.scan_table("orders").unwrap();
    assert_eq!(orders, vec![vec![Value::Integer(1), Value::Integer(1), Value::Integer(250)]]);
}

#[test]
fn test_update_and_delete_existing_rows() {
    let store = create_store(MemoryStore::new());
    let manager = StateManager::new();
    let seed = manager.add_entry("customers", EntityState::Added, vec![Value::Null, "Alice".into()]);
    translator(vec![insert_customer(&store, &seed, IdentifierId::new())])
        .update()
        .unwrap();

    let renamed = manager.add_entry("customers", EntityState::Modified, vec![Value::Integer(1), "Alicia".into()]);
    let connection: Arc<dyn StoreConnection> = store.clone();
    let update: Arc<dyn UpdateCommand> = Arc::new(
        ModificationCommand::update(connection.clone(), "customers")
            .key("id", Arc::new(member(&renamed, 0, PropagatorFlags::KEY)))
            .set("name", Arc::new(member(&renamed, 1, PropagatorFlags::NO_FLAGS)))
            .entry(renamed.clone()),
    );

    assert_eq!(translator(vec![update]).update().unwrap(), 1);
    assert_eq!(
        store.scan_table("customers").unwrap(),
        vec![vec![Value::Integer(1), Value::from("Alicia")]]
    );

    let removed = manager.add_entry("customers", EntityState::Deleted, vec![Value::Integer(1), "Alicia".into()]);
    let delete: Arc<dyn UpdateCommand> = Arc::new(
        ModificationCommand::delete(connection, "customers")
            .key("id", Arc::new(member(&removed, 0, PropagatorFlags::KEY)))
            .entry(removed.clone()),
    );

    assert_eq!(translator(vec![delete]).update().unwrap(), 1);
    assert_eq!(store.row_count("customers").unwrap(), 0);
    assert_eq!(removed.state(), EntityState::Detached);
    assert_eq!(manager.prune_detached(), 1);
}

#[test]
fn test_store_fault_is_wrapped_with_failing_entry() {
    let store = create_store(MemoryStore::new());
    let manager = StateManager::new();
    let first = manager.add_entry("customers", EntityState::Added, vec![Value::Null, "Bob".into()]);
    let duplicate = manager.add_entry("customers", EntityState::Added, vec![Value::Null, "Bob".into()]);

    let err = translator(vec![
        insert_customer(&store, &first, IdentifierId::new()),
        insert_customer(&store, &duplicate, IdentifierId::new()),
    ])
    .update()
    .unwrap_err();

    assert!(matches!(
        err.store_error(),
        Some(DbError::ConstraintViolation(_))
    ));
    assert_eq!(err.state_entries().len(), 1);
    assert!(Arc::ptr_eq(&err.state_entries()[0], &duplicate));

    // Work done before the failure stays in the store; nothing is accepted.
    assert_eq!(store.row_count("customers").unwrap(), 1);
    assert_eq!(*first.current_value(0).unwrap(), Value::Integer(1));
    assert_eq!(first.state(), EntityState::Added);
    assert_eq!(err.snapshots()[0].values, vec![Value::Null, Value::from("Bob")]);
}

#[test]
fn test_missing_row_is_a_concurrency_conflict() {
    let store = create_store(MemoryStore::new());
    let manager = StateManager::new();
    let stale = manager.add_entry("customers", EntityState::Modified, vec![Value::Integer(99), "Ghost".into()]);
    let connection: Arc<dyn StoreConnection> = store.clone();
    let update: Arc<dyn UpdateCommand> = Arc::new(
        ModificationCommand::update(connection, "customers")
            .key("id", Arc::new(member(&stale, 0, PropagatorFlags::KEY)))
            .set("name", Arc::new(member(&stale, 1, PropagatorFlags::NO_FLAGS)))
            .entry(stale.clone()),
    );

    let err = translator(vec![update]).update().unwrap_err();

    assert!(matches!(err, UpdateError::Concurrency { rows_affected: 0, .. }));
    assert!(Arc::ptr_eq(&err.state_entries()[0], &stale));
    assert_eq!(stale.state(), EntityState::Modified);
}

#[test]
fn test_keyless_delete_is_rejected_and_wrapped() {
    let store = create_store(MemoryStore::new());
    let manager = StateManager::new();
    let seeded: Vec<_> = ["Alice", "Bob", "Carol"]
        .into_iter()
        .map(|name| manager.add_entry("customers", EntityState::Added, vec![Value::Null, name.into()]))
        .collect();
    let inserts = seeded
        .iter()
        .map(|entry| insert_customer(&store, entry, IdentifierId::new()))
        .collect();
    assert_eq!(translator(inserts).update().unwrap(), 3);

    let removed = manager.add_entry("customers", EntityState::Deleted, vec![Value::Integer(1), "Alice".into()]);
    let connection: Arc<dyn StoreConnection> = store.clone();
    let delete: Arc<dyn UpdateCommand> =
        Arc::new(ModificationCommand::delete(connection, "customers").entry(removed.clone()));

    let err = translator(vec![delete]).update().unwrap_err();

    assert!(matches!(err.store_error(), Some(DbError::ExecutionError(_))));
    assert!(Arc::ptr_eq(&err.state_entries()[0], &removed));
    assert_eq!(store.row_count("customers").unwrap(), 3);
    assert_eq!(removed.state(), EntityState::Deleted);
}

#[test]
fn test_cyclic_keys_fail_before_execution() {
    let store = create_store(MemoryStore::new());
    let manager = StateManager::new();
    let left = manager.add_entry("orders", EntityState::Added, vec![Value::Null, Value::Null, Value::Integer(1)]);
    let right = manager.add_entry("orders", EntityState::Added, vec![Value::Null, Value::Null, Value::Integer(2)]);
    let left_key = IdentifierId::new();
    let right_key = IdentifierId::new();
    let connection: Arc<dyn StoreConnection> = store.clone();

    let command = |entry: &Arc<EntityStateEntry>, consumes: IdentifierId, produces: IdentifierId| -> Arc<dyn UpdateCommand> {
        Arc::new(
            ModificationCommand::insert(connection.clone(), "orders")
                .set("customer_id", Arc::new(member(entry, 1, PropagatorFlags::FOREIGN_KEY).with_identifier(consumes)))
                .output("id", Arc::new(member(entry, 0, PropagatorFlags::SERVER_GEN).with_identifier(produces)))
                .entry(entry.clone()),
        )
    };

    let err = translator(vec![
        command(&left, right_key, left_key),
        command(&right, left_key, right_key),
    ])
    .update()
    .unwrap_err();

    assert!(matches!(err, UpdateError::DependencyCycle { .. }));
    assert_eq!(err.state_entries().len(), 2);
    assert_eq!(store.row_count("orders").unwrap(), 0);
}

#[tokio::test]
async fn test_async_pipeline_matches_blocking_pipeline() {
    let store = create_store(MemoryStore::new().with_latency(Duration::from_millis(1)));
    let manager = StateManager::new();
    let customer = manager.add_entry("customers", EntityState::Added, vec![Value::Null, "Carol".into()]);
    let order = manager.add_entry(
        "orders",
        EntityState::Added,
        vec![Value::Null, Value::Null, Value::Integer(10)],
    );
    let customer_key = IdentifierId::new();

    let entities_affected = translator(vec![
        insert_order(&store, &order, customer_key),
        insert_customer(&store, &customer, customer_key),
    ])
    .update_async(&CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(entities_affected, 2);
    assert_eq!(*order.current_value(1).unwrap(), Value::Integer(1));
    assert_eq!(store.row_count("orders").unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_async_cancellation_keeps_completed_commands() {
    let store = create_store(MemoryStore::new().with_latency(Duration::from_millis(100)));
    let manager = StateManager::new();
    let first = manager.add_entry("customers", EntityState::Added, vec![Value::Null, "Dan".into()]);
    let second = manager.add_entry("customers", EntityState::Added, vec![Value::Null, "Eve".into()]);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let err = translator(vec![
        insert_customer(&store, &first, IdentifierId::new()),
        insert_customer(&store, &second, IdentifierId::new()),
    ])
    .update_async(&cancel)
    .await
    .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(store.row_count("customers").unwrap(), 1);
    assert_eq!(*first.current_value(0).unwrap(), Value::Integer(1));
    assert!(second.current_value(0).unwrap().is_null());
    assert_eq!(first.state(), EntityState::Added);
}
