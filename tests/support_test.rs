#![allow(missing_docs)]

use rayon::prelude::*;
use std::any::Any;
use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicI16, AtomicU64, Ordering};
use tessera::atomic::{fetch_max, fetch_min};
use tessera::bits::{get_order, leading_zeros, trailing_zeros};
use tessera::de::{EndianFixup, Validator};
use tessera::fingerprint::TypeHasher;
use tessera::ser::Serializer;
use tessera::{
    deserialize, deserialize_mut, fingerprint, serialize, Archive, Bitset, ByteString,
    FieldVisitor, FieldVisitorMut, HashMap, Mode, Reflect, Target, TesseraError, Variant,
    Verify, VecVec,
};

// --- Custom archiving ---

/// A range whose archived form stores only the bounds and rejects inverted ones.
struct Window {
    lo: u32,
    hi: u32,
    label_cache: String,
}

#[repr(C)]
struct ArchivedWindow {
    lo: u32,
    hi: u32,
}

impl Archive for Window {
    type Archived = ArchivedWindow;

    fn serialize_into<W: Target + ?Sized>(
        &self,
        serializer: &mut Serializer<'_, W>,
        pos: u64,
    ) -> tessera::Result<()> {
        serializer.write_scalar(pos, self.lo)?;
        serializer.write_scalar(pos + 4, self.hi)
    }

    fn fingerprint(hasher: &mut TypeHasher) -> tessera::Result<()> {
        hasher.write_tag("window");
        Ok(())
    }
}

// SAFETY: both fields are plain integers; the ordering check is extra.
unsafe impl Verify for ArchivedWindow {
    unsafe fn verify(ptr: *const Self, validator: &mut Validator<'_>) -> tessera::Result<()> {
        // SAFETY: the caller checked the range.
        let (lo, hi) = unsafe { ((*ptr).lo, (*ptr).hi) };
        if lo > hi {
            return Err(validator.invalid(format!("window {lo}..{hi} is inverted")));
        }
        Ok(())
    }

    unsafe fn fix_endian(ptr: *mut Self, fixup: &mut EndianFixup<'_>) -> tessera::Result<()> {
        // SAFETY: field addresses of an in-range value.
        unsafe {
            fixup.swap(addr_of_mut!((*ptr).lo))?;
            fixup.swap(addr_of_mut!((*ptr).hi))?;
        }
        Ok(())
    }
}

#[derive(Archive)]
struct Schedule {
    windows: Vec<Window>,
}

#[test]
fn manual_archive_replaces_the_derived_walk() -> tessera::Result<()> {
    let schedule = Schedule {
        windows: vec![
            Window {
                lo: 1,
                hi: 5,
                label_cache: "1..5".into(),
            },
            Window {
                lo: 8,
                hi: 9,
                label_cache: String::new(),
            },
        ],
    };
    assert!(!schedule.windows[0].label_cache.is_empty());

    // Only the bounds are written: 16 byte vector header plus 2 * 8.
    let bytes = serialize(&schedule, Mode::NONE)?;
    assert_eq!(bytes.len(), 32);
    let view = deserialize::<Schedule>(&bytes, Mode::NONE)?;
    assert_eq!((view.windows[1].lo, view.windows[1].hi), (8, 9));

    let inverted = Schedule {
        windows: vec![Window {
            lo: 9,
            hi: 1,
            label_cache: String::new(),
        }],
    };
    let bytes = serialize(&inverted, Mode::NONE)?;
    assert!(matches!(
        deserialize::<Schedule>(&bytes, Mode::NONE),
        Err(TesseraError::InvalidData(_))
    ));

    let foreign = if cfg!(target_endian = "little") {
        Mode::SERIALIZE_BIG_ENDIAN
    } else {
        Mode::NONE
    };
    let mut swapped = serialize(&schedule, foreign)?;
    let view = deserialize_mut::<Schedule>(&mut swapped, foreign)?;
    assert_eq!((view.windows[0].lo, view.windows[0].hi), (1, 5));
    Ok(())
}

// --- Reflection ---

#[derive(Archive, Reflect, Default)]
struct Settings {
    name: String,
    retries: u32,
    #[tessera(skip)]
    scratch: Vec<u8>,
    timeout: u32,
}

struct Collect(Vec<(&'static str, String)>);

impl FieldVisitor for Collect {
    fn visit<F: 'static>(&mut self, name: &'static str, value: &F) {
        let any = value as &dyn Any;
        let text = if let Some(s) = any.downcast_ref::<String>() {
            s.clone()
        } else if let Some(n) = any.downcast_ref::<u32>() {
            n.to_string()
        } else {
            "?".to_string()
        };
        self.0.push((name, text));
    }
}

struct DoubleNumbers;

impl FieldVisitorMut for DoubleNumbers {
    fn visit<F: 'static>(&mut self, _: &'static str, value: &mut F) {
        if let Some(n) = (value as &mut dyn Any).downcast_mut::<u32>() {
            *n *= 2;
        }
    }
}

#[test]
fn reflection_sees_the_archived_fields() -> tessera::Result<()> {
    let mut settings = Settings {
        name: "db".into(),
        retries: 3,
        scratch: vec![1, 2, 3],
        timeout: 30,
    };
    assert_eq!(Settings::FIELD_NAMES, ["name", "retries", "timeout"]);
    assert_eq!(Settings::field_count(), 3);
    assert_eq!(Settings::member_index("timeout"), Some(2));
    assert_eq!(Settings::member_index("scratch"), None);

    let (name, retries, timeout) = settings.as_tuple();
    assert_eq!((name.as_str(), *retries, *timeout), ("db", 3, 30));

    let mut collect = Collect(Vec::new());
    settings.for_each_field(&mut collect);
    assert_eq!(
        collect.0,
        [
            ("name", "db".to_string()),
            ("retries", "3".to_string()),
            ("timeout", "30".to_string())
        ]
    );

    settings.for_each_field_mut(&mut DoubleNumbers);
    assert_eq!((settings.retries, settings.timeout), (6, 60));
    assert_eq!(settings.scratch.len(), 3);

    let bytes = serialize(&settings, Mode::NONE)?;
    let view = deserialize::<Settings>(&bytes, Mode::NONE)?;
    assert_eq!(view.timeout, 60);
    Ok(())
}

#[derive(Archive)]
enum Signal {
    Stop,
    Go(u8),
    Wait { ticks: u16 },
}

#[test]
fn variant_indices_match_declaration_order() -> tessera::Result<()> {
    assert_eq!(Signal::VARIANT_COUNT, 3);
    assert_eq!(Signal::Stop.variant_index(), 0);
    assert_eq!(Signal::Wait { ticks: 2 }.variant_index(), 2);

    let signals = vec![Signal::Go(1), Signal::Wait { ticks: 9 }, Signal::Stop];
    let bytes = serialize(&signals, Mode::DEEP_CHECK)?;
    let view = deserialize::<Vec<Signal>>(&bytes, Mode::DEEP_CHECK)?;
    let indices: Vec<u32> = view.iter().map(Variant::variant_index).collect();
    assert_eq!(indices, [1, 2, 0]);
    assert!(matches!(view[1], ArchivedSignal::Wait { ticks: 9 }));

    assert_eq!(Some(5u8).variant_index(), 1);
    assert_ne!(fingerprint::<Signal>()?, fingerprint::<Option<u8>>()?);
    Ok(())
}

// --- Atomics and bit helpers ---

#[test]
fn parallel_fetch_min_converges_to_the_minimum() {
    const SLOTS: usize = 8;
    let slots: Vec<AtomicI16> = (0..SLOTS).map(|_| AtomicI16::new(i16::MAX)).collect();
    let value = |i: usize| ((i * 7919) % 30_001) as i16 - 15_000;

    (0..20_000usize).into_par_iter().for_each(|i| {
        fetch_min(&slots[i % SLOTS], value(i));
    });

    for (slot, cell) in slots.iter().enumerate() {
        let expected = (0..20_000usize)
            .filter(|i| i % SLOTS == slot)
            .map(value)
            .min();
        assert_eq!(Some(cell.load(Ordering::Relaxed)), expected);
    }
}

#[test]
fn fetch_min_and_max_return_the_previous_value() {
    let cell = AtomicU64::new(10);
    assert_eq!(fetch_min(&cell, 20), 10);
    assert_eq!(fetch_min(&cell, 4), 10);
    assert_eq!(fetch_max(&cell, 7), 4);
    assert_eq!(cell.load(Ordering::Relaxed), 7);
}

#[test]
fn bit_counts_for_64_and_32_bit_values() {
    let wide: [(u64, u32, u32); 4] = [(0, 64, 64), (1, 0, 63), (1 << 32, 32, 31), (7 << 30, 30, 31)];
    for (value, trailing, leading) in wide {
        assert_eq!(trailing_zeros(value), trailing, "{value:#x}");
        assert_eq!(leading_zeros(value), leading, "{value:#x}");
    }
    let narrow: [(u32, u32, u32); 3] = [(0, 32, 32), (1, 0, 31), (1 << 31, 31, 0)];
    for (value, trailing, leading) in narrow {
        assert_eq!(trailing_zeros(value), trailing, "{value:#x}");
        assert_eq!(leading_zeros(value), leading, "{value:#x}");
    }
    assert_eq!(get_order(1), 0);
    assert_eq!(get_order(4096), 12);
    assert_eq!(get_order(4097), 13);
}

// --- Serde interop ---

#[test]
fn owned_containers_work_with_serde() -> Result<(), Box<dyn std::error::Error>> {
    let config = bincode::config::standard();

    let text = ByteString::from("serde and back again, long form");
    let encoded = bincode::serde::encode_to_vec(&text, config)?;
    let (decoded, _): (ByteString, usize) = bincode::serde::decode_from_slice(&encoded, config)?;
    assert_eq!(decoded, text);

    let map: HashMap<String, u32> = [("x".to_string(), 1), ("y".to_string(), 2)]
        .into_iter()
        .collect();
    let encoded = bincode::serde::encode_to_vec(&map, config)?;
    let (decoded, _): (HashMap<String, u32>, usize) =
        bincode::serde::decode_from_slice(&encoded, config)?;
    assert_eq!(decoded, map);

    let bits: Bitset<12, 1> = "100000000101".parse()?;
    let encoded = bincode::serde::encode_to_vec(bits, config)?;
    let (decoded, _): (Bitset<12, 1>, usize) = bincode::serde::decode_from_slice(&encoded, config)?;
    assert_eq!(decoded, bits);
    assert_eq!(decoded.to_string(), "100000000101");

    let rows: VecVec<u32, u8> = vec![vec![1], vec![], vec![2, 3]].into_iter().collect();
    let encoded = bincode::serde::encode_to_vec(&rows, config)?;
    let (decoded, _): (VecVec<u32, u8>, usize) =
        bincode::serde::decode_from_slice(&encoded, config)?;
    assert_eq!(decoded, rows);
    Ok(())
}
