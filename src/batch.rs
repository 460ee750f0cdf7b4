//! Batch manifests: CSV rows pairing an exercise with an image file.
//!
//! ```text
//! exercise_id,image_filename
//! 101,page-01.png
//! 102,page-02.jpg
//! ```
//!
//! Extra columns are ignored. Each row is checked on its own: a short or
//! unreadable line, a bad exercise id or an image that was not supplied
//! fails that row only. Only an unreadable file or a missing column is fatal.

use crate::error::{ItemError, McqError};
use crate::pipeline::input::display_name;
use crate::pipeline::upload::ExerciseId;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const COLUMN_EXERCISE: &str = "exercise_id";
const COLUMN_IMAGE: &str = "image_filename";

/// Image extensions picked up by [`images_in_dir`].
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// One manifest line, unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestRow {
    pub exercise_id: String,
    pub image_filename: String,
}

/// A manifest row resolved against the supplied images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchJob {
    Ready {
        /// 1-based data row (the header is row 0).
        row: usize,
        exercise: ExerciseId,
        path: PathBuf,
    },
    Invalid {
        row: usize,
        image_filename: String,
        error: ItemError,
    },
}

impl BatchJob {
    pub fn row(&self) -> usize {
        match self {
            BatchJob::Ready { row, .. } | BatchJob::Invalid { row, .. } => *row,
        }
    }
}

/// A data line that could not be deserialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Image column as far as it could be read; empty when absent.
    pub image_filename: String,
    pub error: ItemError,
}

/// Parsed manifest. `rows[i]` is data row `i + 1`.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    pub rows: Vec<Result<ManifestRow, RowError>>,
}

impl Manifest {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, McqError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| McqError::InvalidManifest {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::from_reader(file, path)
    }

    /// Parse CSV from any reader; `path` only labels errors.
    pub fn from_reader(reader: impl io::Read, path: impl Into<PathBuf>) -> Result<Self, McqError> {
        let path = path.into();
        let invalid = |detail: String| McqError::InvalidManifest {
            path: path.clone(),
            detail,
        };

        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv.headers().map_err(|e| invalid(e.to_string()))?.clone();
        for column in [COLUMN_EXERCISE, COLUMN_IMAGE] {
            if !headers.iter().any(|h| h == column) {
                return Err(invalid(format!(
                    "missing column '{column}' (found: {})",
                    headers.iter().collect::<Vec<_>>().join(", ")
                )));
            }
        }
        let image_column = headers.iter().position(|h| h == COLUMN_IMAGE);

        let mut rows = Vec::new();
        for (i, record) in csv.records().enumerate() {
            let row = i + 1;
            let parsed = match record {
                Ok(record) => record.deserialize::<ManifestRow>(Some(&headers)).map_err(|e| {
                    RowError {
                        image_filename: image_column
                            .and_then(|c| record.get(c))
                            .unwrap_or_default()
                            .to_string(),
                        error: ItemError::MalformedRow {
                            row,
                            detail: e.to_string(),
                        },
                    }
                }),
                Err(e) if e.is_io_error() => return Err(invalid(format!("row {row}: {e}"))),
                Err(e) => Err(RowError {
                    image_filename: String::new(),
                    error: ItemError::MalformedRow {
                        row,
                        detail: e.to_string(),
                    },
                }),
            };
            rows.push(parsed);
        }

        debug!("Manifest {}: {} rows", path.display(), rows.len());
        Ok(Self { path, rows })
    }

    /// Pair each row with an image from `images`, matched by file name.
    ///
    /// When two supplied images share a file name the first one wins.
    pub fn bind(&self, images: &[PathBuf]) -> Vec<BatchJob> {
        let mut by_name: HashMap<String, &PathBuf> = HashMap::new();
        for path in images {
            by_name.entry(display_name(path)).or_insert(path);
        }

        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let row_no = i + 1;
                let row = match row {
                    Ok(row) => row,
                    Err(bad) => {
                        warn!("{}", bad.error);
                        return BatchJob::Invalid {
                            row: row_no,
                            image_filename: bad.image_filename.clone(),
                            error: bad.error.clone(),
                        };
                    }
                };
                let invalid = |error: ItemError| {
                    warn!("{}", error);
                    BatchJob::Invalid {
                        row: row_no,
                        image_filename: row.image_filename.clone(),
                        error,
                    }
                };

                let Ok(exercise) = row.exercise_id.parse::<ExerciseId>() else {
                    return invalid(ItemError::InvalidExerciseId {
                        row: row_no,
                        input: row.exercise_id.clone(),
                    });
                };
                match by_name.get(row.image_filename.as_str()) {
                    Some(path) => BatchJob::Ready {
                        row: row_no,
                        exercise,
                        path: (*path).clone(),
                    },
                    None => invalid(ItemError::UnknownImage {
                        row: row_no,
                        filename: row.image_filename.clone(),
                    }),
                }
            })
            .collect()
    }
}

/// Image files directly inside `dir`, sorted by name.
pub async fn images_in_dir(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;
    let mut images = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_image && entry.file_type().await?.is_file() {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
