//! Manifest files on disk: compressed, written atomically.

use super::{codec, BackupManifest, BackupRecord, ManifestHeader};
use crate::transfer::compression::{CompressedReader, CompressedWriter};
use crate::utils::ManifestError;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Permission bits of a published manifest
#[cfg(unix)]
const MANIFEST_MODE: u32 = 0o644;

/// Write `records` as a compressed manifest at `path`.
///
/// Bytes go to a temporary sibling first and are renamed into place once the
/// frame is complete, so an existing file at `path` is either fully replaced or
/// untouched. Returns the number of bytes on disk.
pub fn write_manifest_file(
    path: &Path,
    records: &[BackupRecord],
    level: i32,
) -> Result<u64, ManifestError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(dir)?;

    let mut writer = CompressedWriter::new(BufWriter::new(temp), level)?;
    codec::encode(&mut writer, records)?;
    let temp = writer
        .finish()?
        .into_inner()
        .map_err(|e| e.into_error())?;
    temp.as_file().sync_all()?;

    // Temporaries are created owner-only; published manifests match `File::create`.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(MANIFEST_MODE))?;
    }

    let file = temp.persist(path).map_err(|e| e.error)?;
    Ok(file.metadata()?.len())
}

pub fn read_manifest_file(path: &Path) -> Result<BackupManifest, ManifestError> {
    let file = File::open(path)?;
    codec::decode(CompressedReader::new(file)?)
}

/// Decompress just enough of `path` to read its header.
pub fn read_manifest_header(path: &Path) -> Result<ManifestHeader, ManifestError> {
    let file = File::open(path)?;
    let mut reader = CompressedReader::new(file)?;
    codec::read_header(&mut reader)
}

/// Encode records into an in-memory compressed buffer.
pub fn encode_compressed(records: &[BackupRecord], level: i32) -> Result<Vec<u8>, ManifestError> {
    let mut writer = CompressedWriter::new(Vec::new(), level)?;
    codec::encode(&mut writer, records)?;
    let mut buf = writer.finish()?;
    buf.flush()?;
    Ok(buf)
}

pub fn decode_compressed(bytes: &[u8]) -> Result<BackupManifest, ManifestError> {
    codec::decode(CompressedReader::new(io::Cursor::new(bytes))?)
}
