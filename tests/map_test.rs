#![allow(missing_docs)]

use tessera::{deserialize, serialize, Archive, HashMap, HashSet, Mode};

#[derive(Archive, Debug, Clone, Hash, PartialEq, Eq)]
#[tessera(compare)]
struct Key {
    id: u32,
    label: String,
}

fn key(id: u32, label: &str) -> Key {
    Key {
        id,
        label: label.into(),
    }
}

#[test]
fn composite_keys_match_by_value() -> tessera::Result<()> {
    let mut map: HashMap<Vec<Key>, u64> = HashMap::new();
    let (value, inserted) = map.insert(vec![key(1, "one"), key(2, "two")], 12);
    assert!(inserted);
    assert_eq!(*value, 12);
    map.insert(vec![key(3, "three")], 3);

    // Built independently of the stored key.
    let lookup = vec![key(1, "one"), key(2, "two")];
    let other = vec![key(1, "one"), key(2, "TWO")];
    assert_eq!(map.get(&lookup), Some(&12));
    assert_eq!(map.get(&other), None);

    let (_, inserted) = map.insert(lookup.clone(), 99);
    assert!(!inserted);
    assert_eq!(map[&lookup], 12);

    let bytes = serialize(&map, Mode::DEEP_CHECK)?;
    let view = deserialize::<HashMap<Vec<Key>, u64>>(&bytes, Mode::DEEP_CHECK)?;
    assert_eq!(view.len(), 2);
    assert_eq!(view.get(&lookup), Some(&12));
    assert_eq!(view.get(&other), None);
    assert_eq!(view.get(&vec![key(3, "three")]), Some(&3));
    Ok(())
}

#[test]
fn cursor_erase_visits_every_element_once() {
    let mut map: HashMap<u32, u32> = (0..100).map(|i| (i, i * 10)).collect();
    let mut seen = Vec::new();
    let mut cursor = map.cursor_mut();
    while let Some((k, _)) = cursor.current() {
        let k = *k;
        seen.push(k);
        if k % 3 == 0 {
            cursor.remove();
        } else {
            cursor.move_next();
        }
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
    assert_eq!(map.len(), 66);
    assert!(map.keys().all(|k| k % 3 != 0));
}

#[test]
fn growth_keeps_every_entry_reachable() {
    let mut map = HashMap::new();
    for i in 0..10_000u64 {
        map.insert(i, i.to_string());
    }
    assert_eq!(map.len(), 10_000);
    assert!(map.capacity().is_power_of_two());
    for i in (0..10_000u64).step_by(97) {
        assert_eq!(map.get(&i).map(String::as_str), Some(i.to_string().as_str()));
    }
    map.retain(|k, _| k % 2 == 0);
    assert_eq!(map.len(), 5_000);
    assert!(map.remove(&2).is_some());
    assert!(map.remove(&2).is_none());
}

#[test]
fn insert_or_assign_and_emplace() {
    let mut map: HashMap<String, Vec<u8>> = HashMap::new();
    let (v, inserted) = map.emplace("a".into(), Vec::new);
    assert!(inserted);
    v.push(1);
    let (v, inserted) = map.emplace("a".into(), || vec![9]);
    assert!(!inserted);
    assert_eq!(*v, [1]);
    assert_eq!(map.insert_or_assign("a".into(), vec![2]), Some(vec![1]));
    map.get_or_insert_with("b".into(), Vec::new).push(5);
    assert_eq!(map.get("b"), Some(&vec![5]));
}

#[test]
fn sets_round_trip() -> tessera::Result<()> {
    let set: HashSet<String> = ["red", "green", "blue"].into_iter().map(String::from).collect();
    let bytes = serialize(&set, Mode::WITH_INTEGRITY)?;
    let view = deserialize::<HashSet<String>>(&bytes, Mode::WITH_INTEGRITY)?;
    assert_eq!(view.len(), 3);
    assert!(view.contains("green"));
    assert!(!view.contains("yellow"));
    Ok(())
}

#[test]
fn empty_map_round_trips() -> tessera::Result<()> {
    let map: HashMap<u32, u32> = HashMap::new();
    let bytes = serialize(&map, Mode::DEEP_CHECK)?;
    let view = deserialize::<HashMap<u32, u32>>(&bytes, Mode::DEEP_CHECK)?;
    assert!(view.is_empty());
    assert_eq!(view.get(&1u32), None);
    Ok(())
}
