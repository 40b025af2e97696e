/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Single YAML document backend: `state.yaml`.
//!
//! ```yaml
//! containers:
//!   - name: pod1
//!     bandwidth: 7
//!     priority: 128
//!     core: 0
//! tasks:
//!   - container: pod1
//!     wcet: 3000
//!     period: 100000
//!     priority: 8
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::storage::{from_records, to_records, ContainerRecord, Storage, StorageError, TaskRecord};
use crate::task::Container;

pub const STATE_FILE: &str = "state.yaml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    containers: Vec<ContainerRecord>,
    #[serde(default)]
    tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone)]
pub struct YamlStorage {
    directory: PathBuf,
}

impl YamlStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path(&self) -> PathBuf {
        self.directory.join(STATE_FILE)
    }
}

impl Storage for YamlStorage {
    fn backend(&self) -> &'static str {
        "yaml"
    }

    fn load(&self, server_period_us: u64) -> Result<Vec<Container>, StorageError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let doc: StateDocument =
            serde_yaml::from_str(&content).map_err(|source| StorageError::Yaml { path, source })?;
        Ok(from_records(doc.containers, doc.tasks, server_period_us))
    }

    fn save(&self, containers: &[Container]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.directory).map_err(|source| StorageError::Io {
            path: self.directory.clone(),
            source,
        })?;

        let (containers, tasks) = to_records(containers);
        let path = self.path();
        let content = serde_yaml::to_string(&StateDocument { containers, tasks }).map_err(
            |source| StorageError::Yaml {
                path: path.clone(),
                source,
            },
        )?;

        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, content).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use tempfile::tempdir;

    fn make_container(name: &str, core: usize) -> Container {
        Container {
            name: name.into(),
            tasks: vec![Task {
                period_us: 2_500,
                wcet_us: 50,
                priority: 13,
            }],
            band: 7,
            period_us: 2_500,
            priority: 128,
            core,
        }
    }

    #[test]
    fn saved_state_is_restored() {
        let dir = tempdir().unwrap();
        let storage = YamlStorage::new(dir.path());
        let containers = vec![make_container("pod1", 0), make_container("pod2", 1)];
        storage.save(&containers).unwrap();

        assert_eq!(storage.load(2_500).unwrap(), containers);
    }

    #[test]
    fn missing_or_empty_document_loads_as_empty() {
        let dir = tempdir().unwrap();
        let storage = YamlStorage::new(dir.path());
        assert!(storage.load(2_500).unwrap().is_empty());

        fs::write(dir.path().join(STATE_FILE), "\n").unwrap();
        assert!(storage.load(2_500).unwrap().is_empty());
    }

    #[test]
    fn hand_written_document_is_accepted() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(STATE_FILE),
            r#"
containers:
  - name: pod1
    bandwidth: 7
    priority: 128
    core: 0
tasks:
  - container: pod1
    wcet: 50
    period: 2500
    priority: 13
"#,
        )
        .unwrap();

        let restored = YamlStorage::new(dir.path()).load(2_500).unwrap();
        assert_eq!(restored, vec![make_container("pod1", 0)]);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(STATE_FILE),
            "containers: [ {name: x, bandwidth: lots} ]",
        )
        .unwrap();
        assert!(matches!(
            YamlStorage::new(dir.path()).load(2_500),
            Err(StorageError::Yaml { .. })
        ));
    }
}
