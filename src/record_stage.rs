//! Filter stage trait and implementations.
//!
//! Each `RecordStage` turns one input record into at most one output record.
//! The runner in `pipeline` drives a stage on its own thread; the sequential
//! executor drives it inline. Both go through `RecordStage::apply`, so the
//! handling of rows a stage cannot process is the same either way.

use std::collections::HashSet;

use regex::Regex;
use tracing::warn;

use crate::dsl::{ColumnRef, Command};
use crate::error::{PipelineError, Result};
use crate::record::Record;
use crate::report::StageReport;

/// A pipeline stage that processes records one at a time.
pub trait RecordStage: Send {
    /// Process a single input record.
    ///
    /// `Ok(None)` drops the record. An error rejects this one row; the
    /// stage keeps running.
    fn process(&mut self, record: Record) -> Result<Option<Record>>;

    /// The display name of this stage.
    fn name(&self) -> &str;

    /// Process a record and count the outcome.
    ///
    /// A row the stage rejects is logged, counted as skipped and dropped.
    fn apply(&mut self, record: Record, report: &mut StageReport) -> Option<Record> {
        report.received += 1;
        match self.process(record) {
            Ok(Some(output)) => {
                report.emitted += 1;
                Some(output)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(stage = self.name(), row = report.received, error = %e, "skipping row");
                report.skipped += 1;
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stage implementations
// ---------------------------------------------------------------------------

/// cols - projects columns and literals into a new row.
pub struct SelectStage {
    columns: Vec<ColumnRef>,
}

impl SelectStage {
    pub fn new(columns: Vec<ColumnRef>) -> Self {
        SelectStage { columns }
    }
}

impl RecordStage for SelectStage {
    fn process(&mut self, record: Record) -> Result<Option<Record>> {
        let fields = self
            .columns
            .iter()
            .map(|column| match column {
                ColumnRef::Index(i) => record.field(*i).map(str::to_owned).ok_or_else(|| {
                    PipelineError::column_out_of_range("cols", *i, record.width())
                }),
                ColumnRef::Literal(text) => Ok(text.clone()),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Record::new(fields)))
    }

    fn name(&self) -> &str {
        "cols"
    }
}

/// re - keeps records whose column matches a pattern.
pub struct MatchStage {
    column: usize,
    pattern: Regex,
}

impl MatchStage {
    pub fn new(column: usize, pattern: Regex) -> Self {
        MatchStage { column, pattern }
    }
}

impl RecordStage for MatchStage {
    fn process(&mut self, record: Record) -> Result<Option<Record>> {
        let value = record
            .field(self.column)
            .ok_or_else(|| PipelineError::column_out_of_range("re", self.column, record.width()))?;
        if self.pattern.is_match(value) {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    fn name(&self) -> &str {
        "re"
    }
}

/// split - replaces one column with the pieces between pattern matches.
pub struct SplitStage {
    column: usize,
    pattern: Regex,
}

impl SplitStage {
    pub fn new(column: usize, pattern: Regex) -> Self {
        SplitStage { column, pattern }
    }

    /// Pieces of `target` between matches of the pattern.
    ///
    /// A match ending at offset 0 contributes no leading piece, and no
    /// trailing piece follows a match that starts at the end of `target`.
    /// An empty `target` is one empty piece, unless the pattern itself is
    /// empty.
    fn pieces<'t>(&self, target: &'t str) -> Vec<&'t str> {
        if target.is_empty() {
            return if self.pattern.as_str().is_empty() {
                Vec::new()
            } else {
                vec![""]
            };
        }

        let mut pieces = Vec::new();
        let (mut beg, mut end) = (0, 0);
        for m in self.pattern.find_iter(target) {
            end = m.start();
            if m.end() != 0 {
                pieces.push(&target[beg..end]);
            }
            beg = m.end();
        }
        if end != target.len() {
            pieces.push(&target[beg..]);
        }
        pieces
    }
}

impl RecordStage for SplitStage {
    fn process(&mut self, record: Record) -> Result<Option<Record>> {
        let fields = record.fields();
        let target = fields.get(self.column).ok_or_else(|| {
            PipelineError::column_out_of_range("split", self.column, fields.len())
        })?;

        let mut output = Vec::with_capacity(fields.len() + 1);
        output.extend_from_slice(&fields[..self.column]);
        output.extend(self.pieces(target).into_iter().map(str::to_owned));
        output.extend_from_slice(&fields[self.column + 1..]);
        Ok(Some(Record::new(output)))
    }

    fn name(&self) -> &str {
        "split"
    }
}

/// uniq - keeps the first record seen for each value of a column.
pub struct DistinctStage {
    column: usize,
    seen: HashSet<String>,
}

impl DistinctStage {
    pub fn new(column: usize) -> Self {
        DistinctStage {
            column,
            seen: HashSet::new(),
        }
    }
}

impl RecordStage for DistinctStage {
    fn process(&mut self, record: Record) -> Result<Option<Record>> {
        let value = record.field(self.column).ok_or_else(|| {
            PipelineError::column_out_of_range("uniq", self.column, record.width())
        })?;
        if self.seen.contains(value) {
            return Ok(None);
        }
        self.seen.insert(value.to_owned());
        Ok(Some(record))
    }

    fn name(&self) -> &str {
        "uniq"
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create a `RecordStage` from a parsed `Command`, consuming it.
pub fn command_to_record_stage(cmd: Command) -> Box<dyn RecordStage> {
    match cmd {
        Command::Cols { columns } => Box::new(SelectStage::new(columns)),
        Command::Re { column, pattern } => Box::new(MatchStage::new(column, pattern)),
        Command::Split { column, pattern } => Box::new(SplitStage::new(column, pattern)),
        Command::Uniq { column } => Box::new(DistinctStage::new(column)),
    }
}
