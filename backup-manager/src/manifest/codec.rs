//! Binary encoder/decoder for backup manifests.
//!
//! The codec works on any `Read`/`Write`, so it is agnostic to whether the
//! bytes are compressed. Writers only emit [`BackupVersion::LATEST`]; readers
//! accept every version ever defined and branch on it for path rules.

use super::{BackupManifest, BackupRecord, BackupVersion, ManifestHeader, FBKP_MAGIC};
use crate::utils::ManifestError;
use std::io::{self, Read, Write};

/// Upper bound for the initial record allocation; the count is untrusted.
const MAX_PREALLOCATED_RECORDS: usize = 4096;

/// Encode records as a manifest of the latest version.
///
/// Leading path separators are stripped on write. Every path is checked
/// before the first byte is written, so an empty path leaves the writer
/// untouched.
pub fn encode<W: Write>(writer: W, records: &[BackupRecord]) -> Result<(), ManifestError> {
    encode_version(writer, records, BackupVersion::LATEST)
}

fn encode_version<W: Write>(
    mut writer: W,
    records: &[BackupRecord],
    version: BackupVersion,
) -> Result<(), ManifestError> {
    let count = i32::try_from(records.len())
        .map_err(|_| ManifestError::TooManyRecords(records.len()))?;

    let paths = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let path = if version.strips_leading_separator() {
                record.path.trim_start_matches('/')
            } else {
                record.path.as_str()
            };
            if path.is_empty() {
                Err(ManifestError::EmptyPath(index))
            } else {
                Ok(path)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    writer.write_all(&FBKP_MAGIC.to_le_bytes())?;
    writer.write_all(&[version.as_byte()])?;
    writer.write_all(&count.to_le_bytes())?;

    for (index, (record, path)) in records.iter().zip(paths).enumerate() {
        writer.write_all(&record.size.to_le_bytes())?;
        writer.write_all(&[u8::from(record.is_encrypted)])?;
        write_string(&mut writer, path, index)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read the magic, version and record count.
///
/// The reader is left positioned at the first record.
pub fn read_header<R: Read>(reader: &mut R) -> Result<ManifestHeader, ManifestError> {
    let magic = u32::from_le_bytes(read_array(reader)?);
    if magic != FBKP_MAGIC {
        return Err(ManifestError::BadMagic(magic));
    }

    let [version_byte] = read_array::<_, 1>(reader)?;
    let version = BackupVersion::from_byte(version_byte)?;

    let count = i32::from_le_bytes(read_array(reader)?);
    let record_count =
        usize::try_from(count).map_err(|_| ManifestError::InvalidRecordCount(count))?;

    Ok(ManifestHeader {
        magic,
        version,
        record_count,
    })
}

/// Decode a complete manifest.
pub fn decode<R: Read>(mut reader: R) -> Result<BackupManifest, ManifestError> {
    let header = read_header(&mut reader)?;

    let mut records = Vec::with_capacity(header.record_count.min(MAX_PREALLOCATED_RECORDS));
    for index in 0..header.record_count {
        records.push(read_record(&mut reader, header.version, index)?);
    }

    Ok(BackupManifest {
        version: header.version,
        records,
    })
}

fn read_record<R: Read>(
    reader: &mut R,
    version: BackupVersion,
    index: usize,
) -> Result<BackupRecord, ManifestError> {
    let size = u64::from_le_bytes(read_array(reader)?);
    let [encrypted] = read_array::<_, 1>(reader)?;
    let raw = read_string(reader, index)?;

    let path = match version {
        BackupVersion::PerfectPath if raw.starts_with('/') => {
            raw.trim_start_matches('/').to_string()
        }
        BackupVersion::PerfectPath => raw,
        // Legacy files carried no version byte semantics of their own; they
        // share the initial layout and keep paths verbatim.
        BackupVersion::Initial | BackupVersion::BeforeVersionWasAdded => raw,
    };
    if path.is_empty() {
        return Err(ManifestError::EmptyPath(index));
    }

    Ok(BackupRecord {
        size,
        is_encrypted: encrypted != 0,
        path,
    })
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], ManifestError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn write_string<W: Write>(writer: &mut W, value: &str, index: usize) -> Result<(), ManifestError> {
    let len = u32::try_from(value.len()).map_err(|_| ManifestError::PathTooLong(index))?;
    write_7bit_u32(writer, len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(reader: &mut R, index: usize) -> Result<String, ManifestError> {
    let len = read_7bit_u32(reader).map_err(|e| match e {
        ManifestError::PathTooLong(_) => ManifestError::PathTooLong(index),
        other => other,
    })?;

    let mut bytes = Vec::new();
    reader.by_ref().take(u64::from(len)).read_to_end(&mut bytes)?;
    if bytes.len() != len as usize {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated path").into());
    }

    String::from_utf8(bytes).map_err(|_| ManifestError::InvalidPath(index))
}

/// Write `value` 7 bits at a time, low bits first, high bit set on every byte
/// but the last.
fn write_7bit_u32<W: Write>(writer: &mut W, mut value: u32) -> io::Result<()> {
    let mut buf = [0u8; 5];
    let mut len = 0;
    while value >= 0x80 {
        buf[len] = (value as u8) | 0x80;
        value >>= 7;
        len += 1;
    }
    buf[len] = value as u8;
    writer.write_all(&buf[..=len])
}

fn read_7bit_u32<R: Read>(reader: &mut R) -> Result<u32, ManifestError> {
    let mut value = 0u32;
    for shift in (0..35).step_by(7) {
        let [byte] = read_array::<_, 1>(reader)?;
        // The fifth byte may only carry the top four bits of a u32.
        if shift == 28 && byte > 0x0F {
            return Err(ManifestError::PathTooLong(0));
        }
        value |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(ManifestError::PathTooLong(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use proptest::prelude::*;

    fn sample_records() -> Vec<BackupRecord> {
        vec![
            BackupRecord::new(100, false, "Game/Content/A.uasset"),
            BackupRecord::new(50, true, "Game/Content/B.uasset"),
        ]
    }

    fn encode_to_vec(records: &[BackupRecord], version: BackupVersion) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_version(&mut buf, records, version).unwrap();
        buf
    }

    #[test]
    fn test_encode_decode_example() {
        let mut buf = Vec::new();
        encode(&mut buf, &sample_records()).unwrap();

        assert_eq!(&buf[..9], &[0x46, 0x42, 0x4B, 0x50, 2, 2, 0, 0, 0]);

        let manifest = decode(Cursor::new(&buf)).unwrap();
        assert_eq!(manifest.magic(), 0x504B4246);
        assert_eq!(manifest.version, BackupVersion::PerfectPath);
        assert_eq!(manifest.record_count(), 2);
        assert_eq!(manifest.records, sample_records());
    }

    #[test]
    fn test_record_layout() {
        let buf = encode_to_vec(
            &[BackupRecord::new(0x0102, true, "ab")],
            BackupVersion::LATEST,
        );

        let record = &buf[9..];
        assert_eq!(&record[..8], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(record[8], 1);
        assert_eq!(&record[9..], &[2, b'a', b'b']);
    }

    #[test]
    fn test_round_trip_unusual_values() {
        let long_path = format!("Game/{}/Deep.uasset", "Nested".repeat(60));
        let records = vec![
            BackupRecord::new(0, false, "a"),
            BackupRecord::new(u64::MAX, true, "Game/Content/Ünïcødé/日本語.uasset"),
            BackupRecord::new(42, false, "Game/Content/emoji_🎮.umap"),
            BackupRecord::new(7, true, long_path.clone()),
        ];

        let mut buf = Vec::new();
        encode(&mut buf, &records).unwrap();
        let manifest = decode(Cursor::new(&buf)).unwrap();

        assert_eq!(manifest.records, records);
        assert!(long_path.len() > 127);
    }

    #[test]
    fn test_empty_manifest() {
        let mut buf = Vec::new();
        encode(&mut buf, &[]).unwrap();
        assert_eq!(buf.len(), 9);

        let manifest = decode(Cursor::new(&buf)).unwrap();
        assert_eq!(manifest.record_count(), 0);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = Vec::new();
        encode(&mut buf, &sample_records()).unwrap();
        buf[0] = b'X';

        assert!(matches!(
            decode(Cursor::new(&buf)),
            Err(ManifestError::BadMagic(_))
        ));
        assert!(matches!(
            decode(Cursor::new(b"PK\x03\x04")),
            Err(ManifestError::BadMagic(0x0403_4B50))
        ));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut buf = Vec::new();
        encode(&mut buf, &sample_records()).unwrap();
        buf[4] = BackupVersion::LATEST.as_byte() + 1;

        assert!(matches!(
            decode(Cursor::new(&buf)),
            Err(ManifestError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_perfect_path_strips_leading_separator() {
        let records = vec![BackupRecord::new(1, false, "/Game/Content/Hero.uasset")];
        let buf = encode_to_vec(&records, BackupVersion::PerfectPath);

        let manifest = decode(Cursor::new(&buf)).unwrap();
        let record = &manifest.records[0];
        assert!(!record.path.starts_with('/'));
        assert_eq!(record.path.to_lowercase(), record.canonical_path());
        assert_eq!(record.canonical_path(), "game/content/hero.uasset");
    }

    #[test]
    fn test_perfect_path_reader_strips_raw_separator() {
        // Hand-built record whose stored path still has a slash.
        let mut buf = Vec::new();
        buf.extend_from_slice(&FBKP_MAGIC.to_le_bytes());
        buf.push(BackupVersion::PerfectPath.as_byte());
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&9u64.to_le_bytes());
        buf.push(0);
        buf.push(6);
        buf.extend_from_slice(b"/A/B.c");

        let manifest = decode(Cursor::new(&buf)).unwrap();
        assert_eq!(manifest.records[0].path, "A/B.c");
    }

    #[test]
    fn test_initial_version_preserves_paths() {
        let records = vec![
            BackupRecord::new(1, false, "/Game/Content/Hero.uasset"),
            BackupRecord::new(2, true, "Game/Content/Map.umap"),
        ];
        let buf = encode_to_vec(&records, BackupVersion::Initial);

        let manifest = decode(Cursor::new(&buf)).unwrap();
        assert_eq!(manifest.version, BackupVersion::Initial);
        assert_eq!(manifest.records, records);
    }

    #[test]
    fn test_legacy_version_decodes_verbatim() {
        let records = vec![BackupRecord::new(3, false, "/Legacy/Path.uasset")];
        let buf = encode_to_vec(&records, BackupVersion::BeforeVersionWasAdded);

        let manifest = decode(Cursor::new(&buf)).unwrap();
        assert_eq!(manifest.version, BackupVersion::BeforeVersionWasAdded);
        assert_eq!(manifest.records[0].path, "/Legacy/Path.uasset");
    }

    #[test]
    fn test_negative_count_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&FBKP_MAGIC.to_le_bytes());
        buf.push(BackupVersion::LATEST.as_byte());
        buf.extend_from_slice(&(-1i32).to_le_bytes());

        assert!(matches!(
            decode(Cursor::new(&buf)),
            Err(ManifestError::InvalidRecordCount(-1))
        ));
    }

    #[test]
    fn test_truncated_input_is_io_error() {
        let mut buf = Vec::new();
        encode(&mut buf, &sample_records()).unwrap();
        buf.truncate(buf.len() - 3);

        match decode(Cursor::new(&buf)) {
            Err(ManifestError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected truncated read, got {:?}", other),
        }
    }

    #[test]
    fn test_count_larger_than_content() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&FBKP_MAGIC.to_le_bytes());
        buf.push(BackupVersion::LATEST.as_byte());
        buf.extend_from_slice(&i32::MAX.to_le_bytes());

        assert!(matches!(decode(Cursor::new(&buf)), Err(ManifestError::Io(_))));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&FBKP_MAGIC.to_le_bytes());
        buf.push(BackupVersion::LATEST.as_byte());
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&1u64.to_le_bytes());
        buf.push(0);
        buf.push(2);
        buf.extend_from_slice(&[0xC3, 0x28]);

        assert!(matches!(
            decode(Cursor::new(&buf)),
            Err(ManifestError::InvalidPath(0))
        ));
    }

    #[test]
    fn test_malformed_length_prefix_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&FBKP_MAGIC.to_le_bytes());
        buf.push(BackupVersion::LATEST.as_byte());
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&1u64.to_le_bytes());
        buf.push(0);
        buf.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);

        assert!(matches!(
            decode(Cursor::new(&buf)),
            Err(ManifestError::PathTooLong(0))
        ));
    }

    #[test]
    fn test_empty_path_rejected_on_encode() {
        let records = vec![
            BackupRecord::new(1, false, "Game/A.uasset"),
            BackupRecord::new(1, false, "/"),
        ];
        let mut buf = Vec::new();

        assert!(matches!(
            encode(&mut buf, &records),
            Err(ManifestError::EmptyPath(1))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_header_only() {
        let mut buf = Vec::new();
        encode(&mut buf, &sample_records()).unwrap();

        let mut cursor = Cursor::new(&buf);
        let header = read_header(&mut cursor).unwrap();
        assert_eq!(header.magic, FBKP_MAGIC);
        assert_eq!(header.version, BackupVersion::LATEST);
        assert_eq!(header.record_count, 2);
        assert_eq!(cursor.position(), 9);
    }

    #[test]
    fn test_7bit_lengths() {
        for value in [0u32, 1, 127, 128, 300, 16_383, 16_384, u32::MAX] {
            let mut buf = Vec::new();
            write_7bit_u32(&mut buf, value).unwrap();
            assert_eq!(read_7bit_u32(&mut Cursor::new(&buf)).unwrap(), value);
        }

        let mut buf = Vec::new();
        write_7bit_u32(&mut buf, 300).unwrap();
        assert_eq!(buf, vec![0xAC, 0x02]);
    }

    #[test]
    fn test_encode_to_failing_sink() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        assert!(matches!(
            encode(Broken, &sample_records()),
            Err(ManifestError::Io(_))
        ));
    }

    fn stored_path() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_ .Üé日本/-]{0,40}[A-Za-z0-9Üé日]".prop_filter("no leading separator", |p| {
            !p.starts_with('/')
        })
    }

    proptest! {
        #[test]
        fn test_any_records_round_trip(
            records in prop::collection::vec(
                (any::<u64>(), any::<bool>(), stored_path())
                    .prop_map(|(size, encrypted, path)| BackupRecord::new(size, encrypted, path)),
                0..64,
            )
        ) {
            let mut buf = Vec::new();
            encode(&mut buf, &records).unwrap();
            let manifest = decode(Cursor::new(&buf)).unwrap();

            prop_assert_eq!(manifest.version, BackupVersion::LATEST);
            prop_assert_eq!(manifest.records, records);
        }
    }
}
