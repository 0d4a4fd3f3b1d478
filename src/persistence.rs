//! Encoder state on disk.
//!
//! A blob is the CBOR encoding of `{ schema_version, state }`. Older blobs
//! that only carry a `basis` entry still load, as `LegacyBasisOnly`.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::encoder::state::EncoderState;
use crate::error::{EncoderError, Result};
use crate::projection::ProjectionBasis;

pub const SCHEMA_VERSION: u32 = 1;

/// What a blob turned out to contain.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedState {
    /// full state of the current schema
    Fresh(EncoderState),
    /// a basis without vocabulary or merge statistics
    LegacyBasisOnly(ProjectionBasis),
}

#[derive(Serialize)]
struct BlobRef<'a> {
    schema_version: u32,
    state: &'a EncoderState,
}

#[derive(Deserialize)]
struct Blob {
    schema_version: u32,
    state: EncoderState,
}

#[derive(Deserialize)]
struct LegacyBlob {
    basis: ProjectionBasis,
}

pub fn encode(state: &EncoderState) -> Result<Vec<u8>> {
    let blob = BlobRef {
        schema_version: SCHEMA_VERSION,
        state,
    };
    Ok(serde_cbor::to_vec(&blob)?)
}

pub fn decode(bytes: &[u8]) -> Result<PersistedState> {
    let reason = match serde_cbor::from_slice::<Blob>(bytes) {
        Ok(blob) if blob.schema_version == SCHEMA_VERSION => {
            return Ok(PersistedState::Fresh(blob.state));
        }
        Ok(blob) => format!("schema version {} (expected {SCHEMA_VERSION})", blob.schema_version),
        Err(err) => err.to_string(),
    };
    match serde_cbor::from_slice::<LegacyBlob>(bytes) {
        Ok(legacy) => {
            let err = EncoderError::IncompatiblePersistedState(format!("{reason}, keeping the basis only"));
            tracing::warn!("{err}");
            Ok(PersistedState::LegacyBasisOnly(legacy.basis))
        }
        Err(_) => Err(EncoderError::Codec(format!("unreadable encoder blob: {reason}"))),
    }
}

pub fn load(path: &Path) -> Result<PersistedState> {
    let bytes = fs::read(path).map_err(|source| EncoderError::PersistenceIo {
        path: path.to_path_buf(),
        source,
    })?;
    let state = decode(&bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "loaded encoder state");
    Ok(state)
}

/// Write the state next to `path` and rename it into place, so a failed
/// save never leaves a truncated blob behind.
pub fn save(path: &Path, state: &EncoderState) -> Result<()> {
    let bytes = encode(state)?;
    let tmp = tmp_path(path);
    let io_err = |source| EncoderError::PersistenceIo {
        path: path.to_path_buf(),
        source,
    };
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(&bytes)?;
        file.sync_all()
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(source));
    }
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        io_err(source)
    })?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), docs = state.doc_num, "saved encoder state");
    Ok(())
}

/// Remove a persisted blob; a missing file is not an error.
pub fn discard(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(EncoderError::PersistenceIo {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
