#![allow(missing_docs)]

use tessera::de::MAX_DEPTH;
use tessera::{deserialize, deserialize_mut, serialize, Archive, ByteBuf, Mode, TesseraError};

#[derive(Archive)]
struct Link {
    next: Option<Box<Link>>,
}

/// Lays out `records` archived links back to back, each pointing at the next.
///
/// A record is the option tag byte, padding, then the box's relative pointer, which
/// spans the eight bytes to the following record.
fn forged_chain(records: usize, encode: fn(i64) -> [u8; 8]) -> ByteBuf {
    let mut buf = ByteBuf::new();
    for i in 0..records {
        let mut record = [0u8; 16];
        if i + 1 < records {
            record[0] = 1;
            record[8..].copy_from_slice(&encode(8));
        }
        buf.extend_from_slice(&record);
    }
    buf
}

#[test]
fn record_layout_matches_the_forged_chain() -> tessera::Result<()> {
    let chain = Link {
        next: Some(Box::new(Link { next: None })),
    };
    let bytes = serialize(&chain, Mode::NONE)?;
    assert_eq!(&bytes[..], &forged_chain(2, i64::to_le_bytes)[..]);
    Ok(())
}

#[test]
fn moderate_nesting_is_accepted() -> tessera::Result<()> {
    let buf = forged_chain(MAX_DEPTH / 2, i64::to_ne_bytes);
    let mut view = deserialize::<Link>(&buf, Mode::DEEP_CHECK)?;
    let mut length = 1;
    while let Some(next) = view.next.as_ref() {
        view = next;
        length += 1;
    }
    assert_eq!(length, MAX_DEPTH / 2);
    Ok(())
}

#[test]
fn runaway_nesting_is_rejected_without_overflowing() {
    let buf = forged_chain(400_000, i64::to_ne_bytes);
    for mode in [Mode::NONE, Mode::DEEP_CHECK] {
        assert!(matches!(
            deserialize::<Link>(&buf, mode),
            Err(TesseraError::InvalidData(_))
        ));
    }
}

#[test]
fn runaway_nesting_is_rejected_by_the_byte_order_pass() {
    let (foreign, encode): (Mode, fn(i64) -> [u8; 8]) = if cfg!(target_endian = "little") {
        (Mode::SERIALIZE_BIG_ENDIAN, i64::to_be_bytes)
    } else {
        (Mode::NONE, i64::to_le_bytes)
    };
    let mut buf = forged_chain(400_000, encode);
    assert!(matches!(
        deserialize_mut::<Link>(&mut buf, foreign),
        Err(TesseraError::InvalidData(_))
    ));
}
