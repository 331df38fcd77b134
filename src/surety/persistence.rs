use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{SuretyError, internal_error},
    surety::engine::SuretySnapshot,
};

const SNAPSHOT_VERSION: u64 = 1;

/// Stores the engine snapshot as a single versioned JSON document. Writes go
/// to a sibling temp file that replaces the target only once it is synced.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSnapshot {
    version: u64,
    state: SuretySnapshot,
}

#[derive(Serialize)]
struct StoredSnapshotRef<'a> {
    version: u64,
    state: &'a SuretySnapshot,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<SuretySnapshot>, SuretyError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(internal_error(format!(
                    "failed to read state snapshot '{}': {err}",
                    self.path.display()
                )));
            }
        };

        let stored: StoredSnapshot = serde_json::from_str(&content).map_err(|err| {
            internal_error(format!(
                "failed to parse state snapshot '{}': {err}",
                self.path.display()
            ))
        })?;
        if stored.version != SNAPSHOT_VERSION {
            return Err(internal_error(format!(
                "unsupported snapshot version {} at '{}'",
                stored.version,
                self.path.display()
            )));
        }

        Ok(Some(stored.state))
    }

    pub fn save(&self, snapshot: &SuretySnapshot) -> Result<(), SuretyError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|err| {
            internal_error(format!(
                "failed to create state directory '{}': {err}",
                parent.display()
            ))
        })?;

        let tmp_path = self.path.with_extension("tmp");
        let file = fs::File::create(&tmp_path).map_err(|err| {
            internal_error(format!(
                "failed to create snapshot temp file '{}': {err}",
                tmp_path.display()
            ))
        })?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(
            &mut writer,
            &StoredSnapshotRef {
                version: SNAPSHOT_VERSION,
                state: snapshot,
            },
        )
        .map_err(|err| {
            internal_error(format!(
                "failed to serialize snapshot '{}': {err}",
                tmp_path.display()
            ))
        })?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|err| {
                internal_error(format!(
                    "failed to write snapshot '{}': {err}",
                    tmp_path.display()
                ))
            })?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|err| {
                internal_error(format!(
                    "failed to sync snapshot '{}': {err}",
                    tmp_path.display()
                ))
            })?;
        drop(writer);

        fs::rename(&tmp_path, &self.path).map_err(|err| {
            internal_error(format!(
                "failed to replace state snapshot '{}' from '{}': {err}",
                self.path.display(),
                tmp_path.display()
            ))
        })?;

        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}
