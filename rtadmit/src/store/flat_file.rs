/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Comma-separated flat files: `containers.csv` and `tasks.csv`.
//!
//! No header line and no quoting: container names are validated at admission
//! to contain neither `,` nor line breaks.  Each save writes a sibling
//! `.tmp` file and renames it over the old one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::storage::{from_records, to_records, ContainerRecord, Storage, StorageError, TaskRecord};
use crate::task::Container;

pub const CONTAINERS_FILE: &str = "containers.csv";
pub const TASKS_FILE: &str = "tasks.csv";

#[derive(Debug, Clone)]
pub struct FlatFileStorage {
    directory: PathBuf,
}

impl FlatFileStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn containers_path(&self) -> PathBuf {
        self.directory.join(CONTAINERS_FILE)
    }

    fn tasks_path(&self) -> PathBuf {
        self.directory.join(TASKS_FILE)
    }
}

impl Storage for FlatFileStorage {
    fn backend(&self) -> &'static str {
        "csv"
    }

    fn load(&self, server_period_us: u64) -> Result<Vec<Container>, StorageError> {
        let heads = read_lines(&self.containers_path(), parse_container)?;
        let tasks = read_lines(&self.tasks_path(), parse_task)?;
        debug!(
            directory = %self.directory.display(),
            containers = heads.len(),
            tasks = tasks.len(),
            "flat files read"
        );
        Ok(from_records(heads, tasks, server_period_us))
    }

    fn save(&self, containers: &[Container]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.directory).map_err(|source| StorageError::Io {
            path: self.directory.clone(),
            source,
        })?;

        let (heads, tasks) = to_records(containers);

        let heads: String = heads
            .iter()
            .map(|r| format!("{},{},{},{}\n", r.name, r.bandwidth, r.priority, r.core))
            .collect();
        let tasks: String = tasks
            .iter()
            .map(|r| format!("{},{},{},{}\n", r.container, r.wcet, r.period, r.priority))
            .collect();

        write_atomically(&self.containers_path(), &heads)?;
        write_atomically(&self.tasks_path(), &tasks)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Parse every non-blank line of `path`.  A missing file reads as empty.
fn read_lines<T>(
    path: &Path,
    parse: fn(&[&str]) -> Result<T, String>,
) -> Result<Vec<T>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            split_fields(line)
                .and_then(|fields| parse(&fields))
                .map_err(|reason| StorageError::Malformed {
                    path: path.to_path_buf(),
                    line: i + 1,
                    reason,
                })
        })
        .collect()
}

fn split_fields(line: &str) -> Result<Vec<&str>, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    }
    Ok(fields)
}

fn parse_container(f: &[&str]) -> Result<ContainerRecord, String> {
    Ok(ContainerRecord {
        name: f[0].to_string(),
        bandwidth: parse_field(f[1], "bandwidth")?,
        priority: parse_field(f[2], "priority")?,
        core: parse_field(f[3], "core")?,
    })
}

fn parse_task(f: &[&str]) -> Result<TaskRecord, String> {
    Ok(TaskRecord {
        container: f[0].to_string(),
        wcet: parse_field(f[1], "wcet")?,
        period: parse_field(f[2], "period")?,
        priority: parse_field(f[3], "priority")?,
    })
}

fn parse_field<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("invalid {} '{}'", what, raw))
}

fn write_atomically(path: &Path, content: &str) -> Result<(), StorageError> {
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, content).map_err(|source| StorageError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use tempfile::tempdir;

    fn make_container(name: &str, band: u32, core: usize) -> Container {
        Container {
            name: name.into(),
            tasks: vec![
                Task {
                    period_us: 100_000,
                    wcet_us: 3_000,
                    priority: 8,
                },
                Task {
                    period_us: 2_500,
                    wcet_us: 50,
                    priority: 13,
                },
            ],
            band,
            period_us: 2_500,
            priority: 128,
            core,
        }
    }

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempdir().unwrap();
        let storage = FlatFileStorage::new(dir.path());
        assert!(storage.load(2_500).unwrap().is_empty());
    }

    #[test]
    fn save_writes_documented_layout() {
        let dir = tempdir().unwrap();
        let storage = FlatFileStorage::new(dir.path());
        storage.save(&[make_container("pod1", 7, 0)]).unwrap();

        let heads = fs::read_to_string(dir.path().join(CONTAINERS_FILE)).unwrap();
        let tasks = fs::read_to_string(dir.path().join(TASKS_FILE)).unwrap();
        assert_eq!(heads, "pod1,7,128,0\n");
        assert_eq!(tasks, "pod1,3000,100000,8\npod1,50,2500,13\n");
    }

    #[test]
    fn saved_state_is_restored() {
        let dir = tempdir().unwrap();
        let storage = FlatFileStorage::new(dir.path());
        let containers = vec![make_container("pod1", 7, 0), make_container("pod2", 10, 1)];
        storage.save(&containers).unwrap();

        assert_eq!(storage.load(2_500).unwrap(), containers);
    }

    #[test]
    fn save_replaces_deleted_containers() {
        let dir = tempdir().unwrap();
        let storage = FlatFileStorage::new(dir.path());
        storage
            .save(&[make_container("pod1", 7, 0), make_container("pod2", 10, 0)])
            .unwrap();
        storage.save(&[make_container("pod2", 10, 0)]).unwrap();

        let restored = storage.load(2_500).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].name, "pod2");
    }

    #[test]
    fn save_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("state").join("node10");
        let storage = FlatFileStorage::new(&nested);
        storage.save(&[make_container("pod1", 7, 0)]).unwrap();
        assert!(nested.join(CONTAINERS_FILE).exists());
    }

    #[test]
    fn malformed_line_reports_position() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONTAINERS_FILE), "pod1,7,128,0\n\npod2,seven,64,0\n").unwrap();

        let err = FlatFileStorage::new(dir.path()).load(2_500).unwrap_err();
        match err {
            StorageError::Malformed { line, reason, .. } => {
                assert_eq!(line, 3);
                assert!(reason.contains("bandwidth"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(TASKS_FILE), "pod1,3000,100000\n").unwrap();
        assert!(matches!(
            FlatFileStorage::new(dir.path()).load(2_500),
            Err(StorageError::Malformed { line: 1, .. })
        ));
    }
}
