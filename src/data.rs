// src/data.rs
use crate::error::Result;
use crate::reference::Displacement;
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct DisplacementRecord {
    x: f32,
    y: f32,
    z: f32,
}

impl From<&Displacement> for DisplacementRecord {
    fn from(d: &Displacement) -> Self {
        Self {
            x: d.x,
            y: d.y,
            z: d.z,
        }
    }
}

/// Per-frame displacement log: one headerless `x,y,z` row per frame, in
/// millimeters. An existing file is truncated when the log is created.
pub struct DisplacementLog {
    path: PathBuf,
    writer: Writer<File>,
    rows: u64,
}

impl DisplacementLog {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        let writer = WriterBuilder::new().has_headers(false).from_writer(file);
        info!("Logging displacement to {}", path.display());

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn append(&mut self, displacement: &Displacement) -> Result<()> {
        self.writer.serialize(DisplacementRecord::from(displacement))?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn close(mut self) -> Result<PathBuf> {
        self.flush()?;
        debug!("Closed {} after {} rows", self.path.display(), self.rows);
        Ok(self.path)
    }
}

/// Reads a displacement log back, row by row.
pub fn read_displacements(path: impl AsRef<Path>) -> Result<Vec<Displacement>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |i: usize| -> Result<f32> {
            record
                .get(i)
                .and_then(|v| v.trim().parse::<f32>().ok())
                .ok_or_else(|| {
                    crate::error::TrackingError::Recording(format!(
                        "malformed displacement row: {:?}",
                        record
                    ))
                })
        };
        rows.push(Displacement {
            x: field(0)?,
            y: field(1)?,
            z: field(2)?,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("com_tracker_data_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_rows_have_no_header() {
        let path = temp_path("no_header.csv");
        let mut log = DisplacementLog::create(&path).unwrap();
        log.append(&Displacement { x: 1.5, y: -2.0, z: 0.0 }).unwrap();
        log.append(&Displacement { x: 0.0, y: 0.0, z: 10.25 }).unwrap();
        assert_eq!(log.rows(), 2);
        log.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1.5,-2.0,0.0\n0.0,0.0,10.25\n");

        let rows = read_displacements(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].z, 10.25);
    }

    #[test]
    fn test_create_truncates() {
        let path = temp_path("truncate.csv");
        let mut log = DisplacementLog::create(&path).unwrap();
        log.append(&Displacement { x: 1.0, y: 1.0, z: 1.0 }).unwrap();
        log.close().unwrap();

        let log = DisplacementLog::create(&path).unwrap();
        log.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
