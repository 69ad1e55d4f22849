//! JSON-Lines file sink
//!
//! Each stream lands in `{dir}/{stream}.jsonl`. Output is written to a
//! sibling temp file and renamed into place only after the extraction
//! drained cleanly, so a failed stream never leaves a partial file.

use super::{LoadOutcome, LoadSink};
use crate::catalog::StreamSpec;
use crate::engine::Extraction;
use crate::error::{Error, Result};
use crate::types::{Record, WriteMode};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

/// Natural key used by merge loads
const MERGE_KEY: &str = "Id";

/// Writes streams as JSON-Lines files in a directory
#[derive(Debug, Clone)]
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    /// Create a sink writing under `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding a stream's records
    pub fn path_for(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{stream}.jsonl"))
    }

    /// Read a stream's current file; a missing file is empty
    pub async fn read_stream(&self, stream: &str) -> Result<Vec<Record>> {
        read_records(&self.path_for(stream)).await
    }

    async fn write_replace(&self, temp: &Path, extraction: &mut Extraction<'_>) -> Result<usize> {
        let mut writer = create(temp).await?;
        let mut count = 0;
        while let Some(record) = extraction.next().await {
            write_line(&mut writer, temp, &record?).await?;
            count += 1;
        }
        writer.flush().await.map_err(|e| io_error(temp, &e))?;
        Ok(count)
    }

    async fn write_merge(
        &self,
        path: &Path,
        temp: &Path,
        extraction: &mut Extraction<'_>,
    ) -> Result<(usize, usize)> {
        let mut rows = read_records(path).await?;
        let mut index: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| merge_key(row).map(|key| (key, i)))
            .collect();

        let mut loaded = 0;
        while let Some(record) = extraction.next().await {
            let record = record?;
            loaded += 1;
            match merge_key(&record) {
                Some(key) => match index.get(&key) {
                    Some(&i) => rows[i] = record,
                    None => {
                        index.insert(key, rows.len());
                        rows.push(record);
                    }
                },
                None => rows.push(record),
            }
        }

        let mut writer = create(temp).await?;
        for row in &rows {
            write_line(&mut writer, temp, row).await?;
        }
        writer.flush().await.map_err(|e| io_error(temp, &e))?;
        Ok((loaded, rows.len()))
    }
}

#[async_trait]
impl LoadSink for JsonlSink {
    async fn load(
        &self,
        spec: &StreamSpec,
        extraction: &mut Extraction<'_>,
    ) -> Result<LoadOutcome> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, &e))?;

        let path = self.path_for(&spec.name);
        let temp = path.with_extension("jsonl.tmp");
        debug!(
            stream = %spec.name,
            mode = %spec.write_mode,
            path = %path.display(),
            "Loading stream"
        );

        let written = match spec.write_mode {
            WriteMode::Replace => self
                .write_replace(&temp, extraction)
                .await
                .map(|n| (n, n)),
            WriteMode::Merge => self.write_merge(&path, &temp, extraction).await,
        };
        let (records_loaded, records_total) = match written {
            Ok(counts) => counts,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| io_error(&path, &e))?;

        info!(
            stream = %spec.name,
            mode = %spec.write_mode,
            loaded = records_loaded,
            total = records_total,
            "Stream loaded"
        );
        Ok(LoadOutcome {
            stream: spec.name.clone(),
            write_mode: spec.write_mode,
            records_loaded,
            records_total,
        })
    }
}

fn merge_key(record: &Record) -> Option<String> {
    record
        .get(MERGE_KEY)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

fn io_error(path: &Path, err: &std::io::Error) -> Error {
    Error::output(format!("{}: {err}", path.display()))
}

async fn create(path: &Path) -> Result<BufWriter<tokio::fs::File>> {
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| io_error(path, &e))?;
    Ok(BufWriter::new(file))
}

async fn write_line(
    writer: &mut BufWriter<tokio::fs::File>,
    path: &Path,
    record: &Record,
) -> Result<()> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .map_err(|e| io_error(path, &e))
}

async fn read_records(path: &Path) -> Result<Vec<Record>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(path, &e)),
    };

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                Error::output(format!("{}: line {}: {e}", path.display(), n + 1))
            })
        })
        .collect()
}
