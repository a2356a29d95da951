#![allow(missing_docs)]

use tessera::{
    deserialize, deserialize_mut, serialize, serialize_into, unchecked_deserialize, Archive,
    ArchiveInspector, ArchiveReader, ByteBuf, HashMap, MmapTarget, Mode, Tessera,
    TesseraBuilder, TesseraError,
};

#[derive(Archive, Debug, Clone, PartialEq)]
#[tessera(compare, derive(Debug))]
enum Status {
    Idle,
    Busy { job: String, progress: u8 },
}

#[derive(Archive, Clone)]
#[tessera(version = 2)]
struct Record {
    id: u64,
    title: String,
    samples: Vec<i32>,
    tags: HashMap<String, u16>,
    status: Status,
}

fn record() -> Record {
    Record {
        id: 0x0102_0304_0506_0708,
        title: "a title that is comfortably longer than fifteen bytes".into(),
        samples: vec![-1, 0, 1, i32::MAX],
        tags: [("alpha".to_string(), 1), ("beta".to_string(), 2)]
            .into_iter()
            .collect(),
        status: Status::Busy {
            job: "compaction".into(),
            progress: 42,
        },
    }
}

fn check_record(view: &ArchivedRecord) {
    let expected = record();
    assert_eq!(view.id, expected.id);
    assert_eq!(view.title, expected.title);
    assert_eq!(view.samples, expected.samples);
    assert_eq!(view.tags.get("beta"), Some(&2));
    assert_eq!(view.status, expected.status);
}

// --- Facade ---

#[test]
fn facade_save_and_open() -> tessera::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("record.tsr");

    let written = Tessera::builder()
        .with_version()
        .with_integrity()
        .save(&path, &record())?;
    assert_eq!(written.range.start, 0);

    let reader = Tessera::builder().with_version().with_integrity().open(&path)?;
    assert_eq!(reader.len() as u64, written.range.end);
    check_record(reader.access::<Record>()?);

    // The trailers are located by the mode, so a partial mode misreads them.
    assert!(Tessera::open(&path)?
        .with_mode(Mode::WITH_VERSION)
        .access::<Record>()
        .is_err());
    Ok(())
}

#[test]
fn builder_modes_compose() -> tessera::Result<()> {
    let builder = Tessera::builder().deep_check().with_integrity();
    assert_eq!(builder.build(), Mode::DEEP_CHECK | Mode::WITH_INTEGRITY);
    assert_eq!(TesseraBuilder::default().build(), Mode::NONE);

    let bytes = builder.to_bytes(&record())?;
    check_record(builder.read::<Record>(&bytes)?);

    let mut buf = ByteBuf::new();
    let written = Tessera::write(&mut buf, &vec![1u8, 2, 3])?;
    assert_eq!(written.range, 0..buf.len() as u64);
    assert_eq!(Tessera::builder().read::<Vec<u8>>(&buf)?, &[1u8, 2, 3]);
    Ok(())
}

#[test]
fn mode_displays_and_serializes() -> Result<(), Box<dyn std::error::Error>> {
    let mode = Mode::WITH_VERSION | Mode::SERIALIZE_BIG_ENDIAN;
    let text = mode.to_string();
    assert!(text.contains("WITH_VERSION") && text.contains("SERIALIZE_BIG_ENDIAN"));
    assert!(mode.contains(Mode::WITH_VERSION));
    assert_eq!(mode.without(Mode::WITH_VERSION), Mode::SERIALIZE_BIG_ENDIAN);

    let config = bincode::config::standard();
    let encoded = bincode::serde::encode_to_vec(Tessera::builder().deep_check(), config)?;
    let (decoded, _): (TesseraBuilder, usize) =
        bincode::serde::decode_from_slice(&encoded, config)?;
    assert_eq!(decoded.build(), Mode::DEEP_CHECK);
    Ok(())
}

// --- Placement and targets ---

#[test]
fn archive_after_existing_bytes_is_aligned() -> tessera::Result<()> {
    let mut buf = ByteBuf::new();
    buf.extend_from_slice(b"hdr");
    let written = serialize_into(&mut buf, &record(), Mode::WITH_INTEGRITY)?;
    assert_eq!(written.range.start, 8);
    let start = written.range.start as usize;
    check_record(deserialize::<Record>(&buf[start..], Mode::WITH_INTEGRITY)?);
    Ok(())
}

#[test]
fn mmap_target_writes_a_readable_file() -> tessera::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("mapped.tsr");
    let big: Vec<u64> = (0..100_000).collect();

    let mut target = MmapTarget::create(&path)?;
    let written = serialize_into(&mut target, &big, Mode::WITH_INTEGRITY)?;
    let file = target.finish()?;
    assert_eq!(file.metadata()?.len(), written.range.end);

    let reader = ArchiveReader::open(&path)?.with_mode(Mode::WITH_INTEGRITY);
    let view = reader.access::<Vec<u64>>()?;
    assert_eq!(view.len(), 100_000);
    assert_eq!(view[99_999], 99_999);
    Ok(())
}

// --- Integrity and byte order ---

#[test]
fn corruption_is_detected_by_the_checksum() -> tessera::Result<()> {
    let mode = Mode::WITH_INTEGRITY;
    let mut bytes = serialize(&record(), mode)?;
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x40;
    assert!(matches!(
        deserialize::<Record>(&bytes, mode),
        Err(TesseraError::IntegrityMismatch { what: "checksum", .. })
    ));
    let report = ArchiveInspector::inspect(&bytes, mode)?;
    assert!(report.checksum.is_some_and(|c| !c.is_valid()));
    Ok(())
}

#[test]
fn schema_version_comes_from_the_attribute() -> tessera::Result<()> {
    let bytes = serialize(&record(), Mode::WITH_VERSION)?;
    let report = ArchiveInspector::inspect_as::<Record>(&bytes, Mode::WITH_VERSION)?;
    let version = report.version.as_ref().map(|v| v.schema_version);
    assert_eq!(version, Some(2));
    assert_eq!(report.validation.as_deref(), Some("ok"));
    Ok(())
}

#[test]
fn foreign_byte_order_is_converted_in_place() -> tessera::Result<()> {
    let foreign = if cfg!(target_endian = "little") {
        Mode::SERIALIZE_BIG_ENDIAN
    } else {
        Mode::NONE
    };
    let mode = foreign | Mode::WITH_VERSION | Mode::WITH_INTEGRITY;
    let mut bytes = serialize(&record(), mode)?;

    assert!(matches!(
        deserialize::<Record>(&bytes, mode),
        Err(TesseraError::InvalidData(_))
    ));

    check_record(deserialize_mut::<Record>(&mut bytes, mode)?);

    // The buffer is now a host-order archive.
    let host = if cfg!(target_endian = "little") {
        mode.without(Mode::SERIALIZE_BIG_ENDIAN)
    } else {
        mode.with(Mode::SERIALIZE_BIG_ENDIAN)
    };
    check_record(deserialize::<Record>(&bytes, host)?);
    Ok(())
}

#[test]
fn unchecked_access_reads_trusted_bytes() -> tessera::Result<()> {
    let bytes = serialize(&record(), Mode::NONE)?;
    // SAFETY: the bytes were just produced by `serialize` for `Record`.
    let view = unsafe { unchecked_deserialize::<Record>(&bytes) };
    check_record(view);
    Ok(())
}

#[test]
fn misaligned_input_is_rejected() -> tessera::Result<()> {
    let bytes = serialize(&7u64, Mode::NONE)?;
    let mut shifted = ByteBuf::new();
    shifted.extend_from_slice(&[0]);
    shifted.extend_from_slice(&bytes);
    assert!(matches!(
        deserialize::<u64>(&shifted[1..], Mode::NONE),
        Err(TesseraError::Misaligned { align: 8 })
    ));
    Ok(())
}
