use std::fs;
use std::io::{self, Read};

use camino::Utf8Path;

use crate::error::RipError;

const PARTIAL_PREFIX: &str = ".accu-rip";
const PARTIAL_SUFFIX: &str = ".part";

/// True when something already occupies `path`. Errors other than "not found"
/// are reported rather than read as absence.
pub fn exists(path: &Utf8Path) -> Result<bool, RipError> {
    match fs::metadata(path.as_std_path()) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(RipError::Filesystem(format!("stat {path}: {err}"))),
    }
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), RipError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| RipError::Filesystem(format!("create {path}: {err}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { bytes: u64 },
    /// Another writer got there first; the existing file was kept.
    AlreadyPresent,
}

/// Copies `source` into a temporary file beside `dest` and moves it into place
/// only once the copy completed. `dest` is never truncated or overwritten.
pub fn write_stream_atomic(
    dest: &Utf8Path,
    source: &mut dyn Read,
) -> Result<WriteOutcome, RipError> {
    let parent = dest
        .parent()
        .ok_or_else(|| RipError::Filesystem(format!("no parent directory for {dest}")))?;
    let mut temp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent.as_std_path())
        .map_err(|err| RipError::Filesystem(err.to_string()))?;
    let bytes = io::copy(source, temp.as_file_mut())
        .map_err(|err| RipError::Filesystem(format!("copy into {dest}: {err}")))?;
    match temp.persist_noclobber(dest.as_std_path()) {
        Ok(_) => Ok(WriteOutcome::Written { bytes }),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
            Ok(WriteOutcome::AlreadyPresent)
        }
        Err(err) => Err(RipError::Filesystem(format!("persist {dest}: {}", err.error))),
    }
}

/// Deletes temporary files an interrupted run left in `dir`. A missing
/// directory has nothing to clean. Must not run while writers use `dir`.
pub fn remove_partials(dir: &Utf8Path) -> Result<usize, RipError> {
    let entries = match fs::read_dir(dir.as_std_path()) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(RipError::Filesystem(format!("list {dir}: {err}"))),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|err| RipError::Filesystem(format!("list {dir}: {err}")))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX) {
            fs::remove_file(entry.path())
                .map_err(|err| RipError::Filesystem(format!("remove {name}: {err}")))?;
            removed += 1;
        }
    }
    Ok(removed)
}
