//! Drives spec.md §8's six end-to-end scenarios against a real on-disk
//! store, grounded directly on the storage layer's own unit tests
//! (`storage-api/src/storage.rs`'s `tests` module) but run here as an
//! observable demo rather than an assertion suite.

use crate::config::CliConfig;
use containers::key_codec::{offset_to_slot, slot_to_offset, Slot};
use mapping::Offset;
use schema::{OrderKeyDescriptor, Schema, SchemaError, TypeDescriptor, VolatileResolver};
use storage_api::{SkipListOrder, Storage, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn populate_schema(schema: &mut Schema, resolver: &dyn VolatileResolver) -> Result<(), SchemaError> {
    let person_fields = vec![("name".into(), "ByteString".into()), ("age".into(), "Int".into()), ("weight".into(), "Float".into())];
    schema.define_structure("Root", &[], person_fields.clone(), resolver)?;
    schema.define_structure("Agent", &[], person_fields, resolver)?;

    schema.define_named("ListOfAgents", TypeDescriptor::List { value: "Agent".into() })?;
    schema.define_named(
        "AgentsByName",
        TypeDescriptor::HashTable {
            key: "ByteString".into(),
            value: Some("Agent".into()),
        },
    )?;
    schema.define_named(
        "WordLengths",
        TypeDescriptor::SkipList {
            value: "Int".into(),
            order_key: OrderKeyDescriptor::Identity,
        },
    )?;
    schema.define_named("Person", TypeDescriptor::Node { value: "ByteString".into() })?;
    schema.define_named("Software", TypeDescriptor::Node { value: "ByteString".into() })?;
    schema.define_named(
        "created",
        TypeDescriptor::Edge {
            value: "Float".into(),
            from_node: "Person".into(),
            to_node: "Software".into(),
        },
    )?;
    Ok(())
}

fn int_slot(value: i64) -> Slot {
    value.to_le_bytes()
}

fn float_slot(value: f64) -> Slot {
    value.to_le_bytes()
}

fn open(cfg: &CliConfig) -> Result<Storage, DemoError> {
    let redo = cfg.storage.redo_capacity.map(|capacity| (cfg.redo_path(), capacity));
    Ok(Storage::open(cfg.primary_path(), cfg.storage.file_size, None, redo, populate_schema)?)
}

pub fn run(cfg: &CliConfig) -> Result<(), DemoError> {
    scenario_1_scalars_in_a_root(cfg)?;
    scenario_2_interning(cfg)?;
    scenario_3_listed_structures(cfg)?;
    scenario_4_skip_list_of_integers(cfg)?;
    scenario_5_graph_walk(cfg)?;
    scenario_6_safe_close(cfg)?;
    Ok(())
}

fn scenario_1_scalars_in_a_root(cfg: &CliConfig) -> Result<(), DemoError> {
    tracing::info!("scenario 1: scalars in a root");
    std::fs::remove_file(cfg.primary_path()).ok();
    std::fs::remove_file(cfg.redo_path()).ok();
    let mut storage = open(cfg)?;

    let root = storage.root()?;
    root.set_int(&mut storage, "age", 27)?;
    root.set_float(&mut storage, "weight", 73.1415926)?;
    assert_eq!(root.get_int(&storage, "age")?, 27);
    assert!((root.get_float(&storage, "weight")? - 73.1415926).abs() < 1e-9);

    let age = root.increment_int(&mut storage, "age")?;
    let weight = root.add_float(&mut storage, "weight", 31.45)?;
    assert_eq!(age, 28);
    assert!((weight - 104.5915926).abs() < 1e-9);
    tracing::info!(age, weight, "scenario 1 passed");

    storage.close()?;
    Ok(())
}

fn scenario_2_interning(cfg: &CliConfig) -> Result<(), DemoError> {
    tracing::info!("scenario 2: interning");
    let mut storage = open(cfg)?;

    let root = storage.root()?;
    let first = storage.intern(b"James Bond")?;
    let second = storage.intern(b"James Bond")?;
    assert_eq!(first, second, "repeated interning of equal bytes must return the same offset");
    root.set_byte_string(&mut storage, "name", b"James Bond")?;
    storage.close()?;

    let storage = open(cfg)?;
    let root = storage.root()?;
    let name = root.get_byte_string(&storage, "name")?;
    assert_eq!(name.as_deref(), Some(b"James Bond".as_slice()));
    tracing::info!("scenario 2 passed: name survived close/reopen");
    Ok(())
}

fn scenario_3_listed_structures(cfg: &CliConfig) -> Result<(), DemoError> {
    tracing::info!("scenario 3: listed structures");
    let mut storage = open(cfg)?;

    let list = storage.create_list()?;
    let dict = storage.create_dict("ByteString", 8)?;

    for (name, age) in [("Felix Leiter", 31i64), ("Miss Moneypenny", 23), ("Bill Tanner", 57)] {
        let agent = storage.create_structure("Agent")?;
        agent.set_byte_string(&mut storage, "name", name.as_bytes())?;
        agent.set_int(&mut storage, "age", age)?;
        agent.set_float(&mut storage, "weight", 0.0)?;

        list.append(&mut storage, agent.slot())?;
        let name_offset = storage.intern(name.as_bytes())?;
        dict.set(&mut storage, offset_to_slot(name_offset), agent.slot())?;
    }

    let ordered_names: Vec<String> = list
        .iterate(&storage)?
        .into_iter()
        .map(|slot| {
            let offset = slot_to_offset(slot);
            let proxy = storage.open_structure("Agent", offset)?;
            let bytes = proxy.get_byte_string(&storage, "name")?.unwrap_or_default();
            Ok::<_, DemoError>(String::from_utf8_lossy(&bytes).into_owned())
        })
        .collect::<Result<_, _>>()?;
    assert_eq!(ordered_names, vec!["Felix Leiter", "Miss Moneypenny", "Bill Tanner"]);

    let moneypenny_name_offset = storage.intern(b"Miss Moneypenny")?;
    let moneypenny_slot = dict.get(&storage, offset_to_slot(moneypenny_name_offset))?;
    let moneypenny = storage.open_structure("Agent", slot_to_offset(moneypenny_slot))?;
    moneypenny.set_float(&mut storage, "weight", 57.3)?;
    assert!((moneypenny.get_float(&storage, "weight")? - 57.3).abs() < 1e-9);
    tracing::info!(?ordered_names, "scenario 3 passed");

    drop(moneypenny);
    storage.close()?;
    Ok(())
}

fn scenario_4_skip_list_of_integers(cfg: &CliConfig) -> Result<(), DemoError> {
    tracing::info!("scenario 4: skip list of integers");
    let mut storage = open(cfg)?;

    let phrase = "Lorem ipsum dolor sit amet consectetur";
    let lengths: Vec<i64> = phrase.split_whitespace().map(|w| w.len() as i64).collect();

    let skip_list = storage.create_skip_list(SkipListOrder::Int)?;
    for len in &lengths {
        skip_list.insert(&mut storage, int_slot(*len))?;
    }

    let iterated: Vec<i64> = skip_list.iterate(&storage)?.into_iter().map(|s| i64::from_le_bytes(s)).collect();
    let mut sorted = lengths.clone();
    sorted.sort();
    assert_eq!(iterated, sorted);

    let below_three: Vec<i64> = skip_list
        .range(&storage, None, Some(int_slot(3)))?
        .into_iter()
        .map(|s| i64::from_le_bytes(s))
        .collect();
    assert!(below_three.iter().all(|&v| v < 3));

    let at_least_three: Vec<i64> = skip_list
        .range(&storage, Some(int_slot(3)), None)?
        .into_iter()
        .map(|s| i64::from_le_bytes(s))
        .collect();
    assert!(at_least_three.iter().all(|&v| v >= 3));
    tracing::info!(?iterated, "scenario 4 passed");

    storage.close()?;
    Ok(())
}

fn scenario_5_graph_walk(cfg: &CliConfig) -> Result<(), DemoError> {
    tracing::info!("scenario 5: graph walk");
    let mut storage = open(cfg)?;

    let person = |storage: &mut Storage, name: &str| -> Result<_, DemoError> {
        let offset = storage.intern(name.as_bytes())?;
        Ok(storage.create_node("Person", offset_to_slot(offset))?)
    };
    let software = |storage: &mut Storage, name: &str| -> Result<_, DemoError> {
        let offset = storage.intern(name.as_bytes())?;
        Ok(storage.create_node("Software", offset_to_slot(offset))?)
    };

    let marko = person(&mut storage, "marko")?;
    let vadas = person(&mut storage, "vadas")?;
    let josh = person(&mut storage, "josh")?;
    let peter = person(&mut storage, "peter")?;
    let lop = software(&mut storage, "lop")?;
    let ripple = software(&mut storage, "ripple")?;

    storage.connect("knows", &marko, &vadas, float_slot(0.5))?; // not a "created" edge — ignored by the query below
    storage.connect("created", &marko, &lop, float_slot(0.4))?;
    storage.connect("created", &josh, &lop, float_slot(0.4))?;
    storage.connect("created", &josh, &ripple, float_slot(1.0))?;
    storage.connect("created", &peter, &lop, float_slot(0.2))?;

    let mut created_pairs = Vec::new();
    for developer in [&marko, &vadas, &josh, &peter] {
        for edge_offset in developer.out_edges(&mut storage, "created")? {
            let (_from, to) = storage.edge_endpoints(edge_offset)?;
            let program_name_offset = slot_to_offset(storage.node_value(to)?);
            let program_name = storage.read_byte_string_at(program_name_offset)?;
            let developer_name_offset = slot_to_offset(developer.value(&storage)?);
            let developer_name = storage.read_byte_string_at(developer_name_offset)?;
            created_pairs.push((String::from_utf8_lossy(&developer_name).into_owned(), String::from_utf8_lossy(&program_name).into_owned()));
        }
    }

    let mut expected = vec![
        ("marko".to_string(), "lop".to_string()),
        ("josh".to_string(), "lop".to_string()),
        ("josh".to_string(), "ripple".to_string()),
        ("peter".to_string(), "lop".to_string()),
    ];
    let mut actual = created_pairs.clone();
    actual.sort();
    expected.sort();
    assert_eq!(actual, expected, "out_edges returns most-recently-inserted first, not insertion order");
    tracing::info!(?created_pairs, "scenario 5 passed");

    storage.close()?;
    Ok(())
}

fn scenario_6_safe_close(cfg: &CliConfig) -> Result<(), DemoError> {
    tracing::info!("scenario 6: safe close");
    let mut storage = open(cfg)?;

    let dict = storage.create_dict("ByteString", 8)?;
    let agent = storage.create_structure("Agent")?;
    agent.set_byte_string(&mut storage, "name", b"Q")?;
    let name_offset = storage.intern(b"Q")?;
    dict.set(&mut storage, offset_to_slot(name_offset), agent.slot())?;

    let held_slot = dict.get(&storage, offset_to_slot(name_offset))?;
    let held_offset: Offset = slot_to_offset(held_slot);
    let held_proxy = storage.open_structure("Agent", held_offset)?;

    match storage.close() {
        Err(StorageError::Proxies(n)) => tracing::info!(outstanding = n, "close correctly refused while a proxy is live"),
        other => panic!("expected close to refuse with Proxies, got {other:?}"),
    }

    drop(held_proxy);
    drop(agent);
    storage.close()?;
    tracing::info!("scenario 6 passed: close succeeded once the proxy was dropped");

    let storage = open(cfg)?;
    let root = storage.root()?;
    assert_eq!(root.get_int(&storage, "age")?, 28);
    tracing::info!("scenario 6 passed: reopen after safe close preserves all data");
    Ok(())
}
