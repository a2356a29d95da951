#![allow(missing_docs)]

use std::collections::{HashSet as StdHashSet, VecDeque};
use tessera::{
    fingerprint, serialize, serialize_into, Archive, ArchiveReader, FileTarget, Mode, Ptr,
    TesseraError,
};

#[derive(Archive)]
struct Node {
    name: String,
    edges: Vec<Ptr<Node>>,
}

fn node(name: &str) -> Node {
    Node {
        name: name.into(),
        edges: Vec::new(),
    }
}

/// Builds the cycle A -> B -> C -> A.
fn cycle() -> Vec<Node> {
    let mut nodes = vec![node("A"), node("B"), node("C")];
    let ptrs: Vec<Ptr<Node>> = nodes.iter().map(Ptr::new).collect();
    for (i, n) in nodes.iter_mut().enumerate() {
        n.edges.push(ptrs[(i + 1) % 3]);
    }
    nodes
}

#[test]
fn cyclic_graph_survives_a_file_round_trip() -> tessera::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("graph.tsr");
    let mode = Mode::WITH_INTEGRITY | Mode::WITH_VERSION;

    let nodes = cycle();
    let mut target = FileTarget::create(&path)?;
    let written = serialize_into(&mut target, &nodes, mode)?;
    target.into_file()?;
    assert!(written.checksum.is_some());

    let reader = ArchiveReader::open(&path)?.with_mode(mode);
    let view = reader.access::<Vec<Node>>()?;
    assert_eq!(view.len(), 3);

    let mut visited = Vec::new();
    let mut seen = StdHashSet::new();
    let mut queue = VecDeque::from([&view[0]]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current as *const ArchivedNode) {
            continue;
        }
        visited.push(current.name.as_str().to_string());
        for edge in current.edges.iter() {
            if let Some(next) = edge.get() {
                queue.push_back(next);
            }
        }
    }
    assert_eq!(visited, ["A", "B", "C"]);

    // Edges point into the archived vector itself.
    let b = view[0].edges[0].get();
    assert!(b.is_some_and(|b| std::ptr::eq(b, &view[1])));
    Ok(())
}

#[test]
fn pointer_to_unserialized_target_is_dangling() {
    let outside = node("outside");
    let mut lonely = node("lonely");
    lonely.edges.push(Ptr::new(&outside));
    assert!(matches!(
        serialize(&lonely, Mode::NONE),
        Err(TesseraError::DanglingPointer { .. })
    ));
}

#[test]
fn null_pointers_stay_null() -> tessera::Result<()> {
    let mut n = node("solo");
    n.edges.push(Ptr::null());
    let bytes = serialize(&n, Mode::NONE)?;
    let view = tessera::deserialize::<Node>(&bytes, Mode::NONE)?;
    assert!(view.edges[0].is_null());
    assert!(view.edges[0].get().is_none());
    Ok(())
}

mod first {
    use tessera::Archive;

    #[derive(Archive)]
    pub struct Pair {
        pub a: u32,
        pub b: Vec<u8>,
    }
}

mod second {
    use tessera::Archive;

    #[derive(Archive)]
    pub struct Couple {
        pub left: u32,
        pub right: Vec<u8>,
    }
}

#[derive(Archive)]
struct A {
    b: Option<Box<B>>,
}

#[derive(Archive)]
struct B {
    c: Vec<C>,
}

#[derive(Archive)]
struct C {
    a: Option<Box<A>>,
    value: u64,
}

#[derive(Archive)]
#[tessera(version = 3)]
struct Versioned {
    value: u32,
}

#[test]
fn fingerprints_follow_shape_not_names() -> tessera::Result<()> {
    assert_eq!(
        fingerprint::<first::Pair>()?,
        fingerprint::<second::Couple>()?
    );
    assert_ne!(fingerprint::<Vec<u32>>()?, fingerprint::<Vec<Vec<u32>>>()?);
    assert_ne!(fingerprint::<(u32, u64)>()?, fingerprint::<(u64, u32)>()?);
    assert_ne!(fingerprint::<first::Pair>()?, fingerprint::<(u32, Vec<u8>)>()?);
    Ok(())
}

#[test]
fn recursive_types_have_a_stable_fingerprint() -> tessera::Result<()> {
    let first = fingerprint::<A>()?;
    assert_eq!(first, fingerprint::<A>()?);
    assert_ne!(first, fingerprint::<B>()?);
    assert_ne!(fingerprint::<B>()?, fingerprint::<C>()?);
    Ok(())
}

#[test]
fn wrong_type_or_schema_is_rejected() -> tessera::Result<()> {
    let mode = Mode::WITH_VERSION;
    let bytes = serialize(&Versioned { value: 9 }, mode)?;
    assert_eq!(tessera::deserialize::<Versioned>(&bytes, mode)?.value, 9);
    assert!(matches!(
        tessera::deserialize::<u32>(&bytes, mode),
        Err(TesseraError::VersionMismatch { expected: 0, found: 3 })
    ));

    let bytes = serialize(&first::Pair { a: 1, b: vec![2] }, mode)?;
    assert!(matches!(
        tessera::deserialize::<(u64, Vec<u8>)>(&bytes, mode),
        Err(TesseraError::IntegrityMismatch { what: "fingerprint", .. })
    ));
    Ok(())
}
