//! Question bank table and sources.
//!
//! A [`QuestionTable`] is the raw tabular question bank: a header row plus
//! string cells, any of which may be missing. [`QuestionTable::records`]
//! turns it into [`QuestionRecord`]s: the question column is required, rows
//! with a blank question are dropped, the subject column becomes metadata
//! and every other column is an answer option (missing cells become `""`).
//!
//! The same filtering is applied at index time and whenever the table is
//! re-read for option lookups, so surviving rows keep their positions.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::QuestionsConfig;
use crate::error::{Error, Result};
use crate::models::QuestionRecord;

/// Which columns carry the question text and the subject tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSchema {
    pub question_column: String,
    pub subject_column: String,
}

impl QuestionSchema {
    pub fn from_config(config: &QuestionsConfig) -> Self {
        Self {
            question_column: config.question_column.clone(),
            subject_column: config.subject_column.clone(),
        }
    }
}

impl Default for QuestionSchema {
    fn default() -> Self {
        Self {
            question_column: "Question".to_string(),
            subject_column: "Subject".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestionTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl QuestionTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { headers, rows }
    }

    /// Parse CSV with a header row. Empty cells are read as missing.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| Error::Table(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in csv.records().enumerate() {
            let record = record.map_err(|e| Error::Table(format!("row {}: {}", line + 1, e)))?;
            rows.push(
                record
                    .iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let table = Self::from_reader(file)?;
        debug!(path = %path.display(), rows = table.rows.len(), "read question table");
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Validated question records, in table order.
    ///
    /// # Errors
    ///
    /// [`Error::MissingColumn`] if the question column is absent.
    pub fn records(&self, schema: &QuestionSchema) -> Result<Vec<QuestionRecord>> {
        let question_col = self
            .headers
            .iter()
            .position(|h| h == &schema.question_column)
            .ok_or_else(|| Error::MissingColumn {
                column: schema.question_column.clone(),
            })?;
        let subject_col = self
            .headers
            .iter()
            .position(|h| h == &schema.subject_column);
        let option_cols: Vec<usize> = (0..self.headers.len())
            .filter(|&i| i != question_col && Some(i) != subject_col)
            .collect();

        let mut records = Vec::with_capacity(self.rows.len());
        let mut dropped = 0usize;
        for row in &self.rows {
            let question = match cell(row, question_col) {
                Some(q) if !q.trim().is_empty() => q.to_string(),
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            let options = option_cols
                .iter()
                .map(|&i| cell(row, i).unwrap_or("").to_string())
                .collect();
            let subject = subject_col.and_then(|i| cell(row, i)).map(str::to_string);
            records.push(QuestionRecord {
                question,
                options,
                subject,
            });
        }

        if dropped > 0 {
            debug!(dropped, kept = records.len(), "dropped rows without question text");
        }
        Ok(records)
    }
}

fn cell(row: &[Option<String>], i: usize) -> Option<&str> {
    row.get(i).and_then(|c| c.as_deref())
}

/// Anything that can produce the current question table.
pub trait QuestionSource: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> String;

    fn load(&self) -> Result<QuestionTable>;
}

/// Reads the question bank from a CSV file on every call.
#[derive(Debug, Clone)]
pub struct CsvQuestionSource {
    path: PathBuf,
}

impl CsvQuestionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QuestionSource for CsvQuestionSource {
    fn name(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load(&self) -> Result<QuestionTable> {
        QuestionTable::from_csv_path(&self.path)
    }
}
