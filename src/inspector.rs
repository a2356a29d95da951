//! Tools for inspecting the physical structure of archives.
//! Useful when an archive is rejected and the reason is not obvious.

use crate::archive::Archive;
use crate::de::deserialize;
use crate::error::Result;
use crate::fingerprint::fingerprint;
use crate::format::{read_u64, Sections, VersionTrailer, ARCHIVE_ALIGN, FORMAT_VERSION};
use crate::io::xxhash;
use crate::mode::Mode;
use serde::Serialize;
use std::fmt;

/// A structural report of an archive.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    /// Total size in bytes, trailers included.
    pub size: u64,
    /// The mode the archive was inspected with.
    pub mode: Mode,
    /// Whether the buffer start is aligned for in-place reading.
    pub aligned: bool,
    /// The regions of the archive in file order.
    pub sections: Vec<SectionInfo>,
    /// Version trailer contents, if present.
    pub version: Option<VersionInfo>,
    /// Checksum trailer state, if present.
    pub checksum: Option<ChecksumInfo>,
    /// Outcome of a typed validation, if one was requested.
    pub validation: Option<String>,
}

/// One region of an archive.
#[derive(Debug, Clone, Serialize)]
pub struct SectionInfo {
    /// Region name.
    pub name: &'static str,
    /// Absolute offset.
    pub offset: u64,
    /// Length in bytes.
    pub length: u64,
}

/// Version trailer contents.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    /// Stored type fingerprint.
    pub fingerprint: u64,
    /// Fingerprint of the type the archive was checked against, for typed inspection.
    pub expected_fingerprint: Option<u64>,
    /// Stored format version.
    pub format_version: u32,
    /// Whether the format version is the one this build reads.
    pub format_supported: bool,
    /// Stored schema version.
    pub schema_version: u32,
}

/// Checksum trailer state.
#[derive(Debug, Clone, Serialize)]
pub struct ChecksumInfo {
    /// Stored value.
    pub stored: u64,
    /// Value recomputed over the preceding bytes.
    pub computed: u64,
}

impl ChecksumInfo {
    /// True if the stored and recomputed values agree.
    pub fn is_valid(&self) -> bool {
        self.stored == self.computed
    }
}

/// The archive inspector.
#[derive(Debug)]
pub struct ArchiveInspector;

impl ArchiveInspector {
    /// Splits `bytes` by `mode` and decodes the trailers without knowing the root type.
    pub fn inspect(bytes: &[u8], mode: Mode) -> Result<ArchiveReport> {
        let located = Sections::locate(bytes.len(), mode)?;
        let mut sections = vec![SectionInfo {
            name: "payload",
            offset: 0,
            length: located.payload.len() as u64,
        }];

        let version = match &located.version {
            Some(range) => {
                sections.push(SectionInfo {
                    name: "version",
                    offset: range.start as u64,
                    length: range.len() as u64,
                });
                let trailer = VersionTrailer::from_bytes(&bytes[range.clone()])?;
                Some(VersionInfo {
                    fingerprint: trailer.fingerprint,
                    expected_fingerprint: None,
                    format_version: trailer.format_version,
                    format_supported: trailer.format_version == FORMAT_VERSION,
                    schema_version: trailer.schema_version,
                })
            }
            None => None,
        };

        let checksum = match &located.checksum {
            Some(range) => {
                sections.push(SectionInfo {
                    name: "checksum",
                    offset: range.start as u64,
                    length: range.len() as u64,
                });
                Some(ChecksumInfo {
                    stored: read_u64(bytes, range.start)?,
                    computed: xxhash(&bytes[..range.start]),
                })
            }
            None => None,
        };

        Ok(ArchiveReport {
            size: bytes.len() as u64,
            mode,
            aligned: (bytes.as_ptr() as usize) % ARCHIVE_ALIGN == 0,
            sections,
            version,
            checksum,
            validation: None,
        })
    }

    /// Like [`ArchiveInspector::inspect`], and also validates `bytes` as an archive of
    /// `T`, recording the outcome instead of failing.
    pub fn inspect_as<T: Archive>(bytes: &[u8], mode: Mode) -> Result<ArchiveReport> {
        let mut report = Self::inspect(bytes, mode)?;
        if let Some(version) = &mut report.version {
            version.expected_fingerprint = Some(fingerprint::<T>()?);
        }
        report.validation = Some(match deserialize::<T>(bytes, mode) {
            Ok(_) => "ok".to_string(),
            Err(err) => err.to_string(),
        });
        Ok(report)
    }
}

impl fmt::Display for ArchiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== TESSERA ARCHIVE REPORT ===")?;
        writeln!(f, "Size:    {} bytes", self.size)?;
        writeln!(f, "Mode:    {}", self.mode)?;
        writeln!(f, "Aligned: {}", self.aligned)?;
        writeln!(f, "\n[LAYOUT]")?;
        for (i, section) in self.sections.iter().enumerate() {
            let connector = if i + 1 == self.sections.len() {
                "└── "
            } else {
                "├── "
            };
            write!(
                f,
                "{connector}[{}] {}..{} ({}b)",
                section.name,
                section.offset,
                section.offset + section.length,
                section.length
            )?;
            match section.name {
                "version" => {
                    if let Some(v) = &self.version {
                        write!(
                            f,
                            " | fingerprint {:#018x} | format {}{} | schema {}",
                            v.fingerprint,
                            v.format_version,
                            if v.format_supported { "" } else { " (unsupported)" },
                            v.schema_version
                        )?;
                        if let Some(expected) = v.expected_fingerprint {
                            let verdict = if expected == v.fingerprint { "match" } else { "MISMATCH" };
                            write!(f, " | type {verdict}")?;
                        }
                    }
                }
                "checksum" => {
                    if let Some(c) = &self.checksum {
                        let verdict = if c.is_valid() { "ok" } else { "MISMATCH" };
                        write!(f, " | {:#018x} {verdict}", c.stored)?;
                    }
                }
                _ => {}
            }
            writeln!(f)?;
        }
        if let Some(validation) = &self.validation {
            writeln!(f, "\nValidation: {validation}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::serialize;

    #[test]
    fn report_lists_trailers() -> Result<()> {
        let mode = Mode::WITH_VERSION | Mode::WITH_INTEGRITY;
        let bytes = serialize(&String::from("inspect me, I am long"), mode)?;
        let report = ArchiveInspector::inspect_as::<String>(&bytes, mode)?;

        let names: Vec<_> = report.sections.iter().map(|s| s.name).collect();
        assert_eq!(names, ["payload", "version", "checksum"]);
        assert!(report.checksum.as_ref().is_some_and(ChecksumInfo::is_valid));
        assert_eq!(report.validation.as_deref(), Some("ok"));
        assert!(report.to_string().contains("type match"));
        Ok(())
    }

    #[test]
    fn corruption_shows_in_the_report() -> Result<()> {
        let mut bytes = serialize(&vec![5u8; 40], Mode::WITH_INTEGRITY)?;
        bytes[20] ^= 0xff;
        let report = ArchiveInspector::inspect(&bytes, Mode::WITH_INTEGRITY)?;
        assert!(report.checksum.as_ref().is_some_and(|c| !c.is_valid()));
        assert!(report.to_string().contains("MISMATCH"));
        Ok(())
    }
}
