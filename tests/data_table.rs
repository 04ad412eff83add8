use dynacoe::res::data_table::MAGIC;
use dynacoe::res::prelude::*;
use rand::Rng;

fn sample() -> DataTable {
    let mut nested = DataTable::new();
    nested.write("depth", &2u32).unwrap();

    let mut table = DataTable::new();
    table.write("hp", &100i32).unwrap();
    table.write("speed", &1.5f32).unwrap();
    table.write("seed", &0xDEAD_BEEF_u64).unwrap();
    table.write("name", "player one").unwrap();
    table.write("blob", &vec![0u8, 1, 2, 255]).unwrap();
    table.write("ratio", &0.25f64).unwrap();
    table.write("child", &nested).unwrap();
    table
}

#[test]
fn round_trip() {
    let table = sample();
    let state = table.write_state();
    assert_eq!(&state[..8], &MAGIC[..]);

    let mut restored = DataTable::new();
    restored.read_state(&state).unwrap();

    assert_eq!(restored, table);
    assert_eq!(restored.read::<i32>("hp"), Some(100));
    assert_eq!(restored.read::<f32>("speed"), Some(1.5));
    assert_eq!(restored.read::<u64>("seed"), Some(0xDEAD_BEEF));
    assert_eq!(restored.read::<String>("name"), Some("player one".to_owned()));
    assert_eq!(restored.read::<Vec<u8>>("blob"), Some(vec![0, 1, 2, 255]));
    assert_eq!(restored.read::<f64>("ratio"), Some(0.25));

    let child = restored.read::<DataTable>("child").unwrap();
    assert_eq!(child.read::<u32>("depth"), Some(2));

    let names: Vec<_> = restored.names().collect();
    assert_eq!(names, vec!["blob", "child", "hp", "name", "ratio", "seed", "speed"]);
}

#[test]
fn empty_round_trip() {
    let state = DataTable::new().write_state();

    let mut restored = sample();
    restored.read_state(&state).unwrap();
    assert!(restored.is_empty());
}

#[test]
fn every_single_byte_corruption() {
    let table = sample();
    let state = table.write_state();
    let mut rng = rand::thread_rng();

    let mut target = DataTable::new();
    target.write("untouched", &7i32).unwrap();
    let before = target.clone();

    for i in 0..state.len() {
        let mut corrupted = state.clone();
        let delta: u8 = rng.gen_range(1, 256u16) as u8;
        corrupted[i] = corrupted[i].wrapping_add(delta);

        assert!(target.read_state(&corrupted).is_err(), "byte {}", i);
        assert_eq!(target, before);
    }
}

#[test]
fn foreign_buffers() {
    let mut target = sample();
    let before = target.clone();

    assert_eq!(target.read_state(&[]), Err(DataTableError::Truncated));
    assert_eq!(target.read_state(&[0u8; 64]), Err(DataTableError::Magic));

    let mut state = before.write_state();
    state.truncate(state.len() - 3);
    assert!(target.read_state(&state).is_err());

    assert_eq!(target, before);
}

#[test]
fn consolidate() {
    let mut table = sample();
    let len = table.data_len();

    table.write("name", "a much longer name than before").unwrap();
    assert!(table.data_len() > len);

    table.remove("blob");
    table.consolidate();

    let mut expected = sample();
    expected.remove("blob");
    expected.write("name", "a much longer name than before").unwrap();
    expected.consolidate();

    assert_eq!(table, expected);
    assert_eq!(table.data_len(), expected.data_len());
    assert!(!table.query("blob"));
}
