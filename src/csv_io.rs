//! Delimited-text source and sink.
//!
//! A source is anything that yields `Result<Record>` and can be moved to
//! another thread; `CsvSource` is the one the binary uses. A sink receives
//! the final stream on the runner's thread.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecordsIntoIter, WriterBuilder};

use crate::config::{SinkConfig, SourceConfig};
use crate::error::{PipelineError, Result};
use crate::record::Record;

/// Consumer at the end of a pipeline.
pub trait RecordSink {
    fn write_record(&mut self, record: Record) -> Result<()>;

    /// Push out anything buffered. Called once after End-of-Stream.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<Record> {
    fn write_record(&mut self, record: Record) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Rejects quotes outside the strict quoting rules: a `"` inside an
/// unquoted field, or a `"` in a quoted field that is neither doubled nor
/// followed by a delimiter or line end.
///
/// The `csv` parser accepts both, so this sits underneath it. Complete
/// records ahead of the offending one are passed through before the error
/// is returned, so the reader still yields them.
struct StrictQuotes<R> {
    inner: R,
    delimiter: u8,
    state: QuoteState,
    line: u64,
    pending: Option<io::Error>,
    failed: bool,
}

impl<R: Read> StrictQuotes<R> {
    fn new(inner: R, delimiter: u8) -> Self {
        StrictQuotes {
            inner,
            delimiter,
            state: QuoteState::FieldStart,
            line: 1,
            pending: None,
            failed: false,
        }
    }

    fn quote_error(&self, what: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line {}: {what} (lazy quotes not enabled)", self.line),
        )
    }
}

impl<R: Read> Read for StrictQuotes<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.pending.take() {
            self.failed = true;
            return Err(err);
        }
        if self.failed {
            return Ok(0);
        }

        let n = self.inner.read(buf)?;
        if n == 0 {
            if self.state == QuoteState::Quoted {
                self.failed = true;
                return Err(self.quote_error("unterminated quoted field"));
            }
            return Ok(0);
        }

        // End of the last complete record seen in this chunk.
        let mut record_end = 0;
        for (i, &b) in buf[..n].iter().enumerate() {
            let next = match (self.state, b) {
                (QuoteState::Quoted, b'"') => QuoteState::QuoteInQuoted,
                (QuoteState::Quoted, _) => QuoteState::Quoted,
                (QuoteState::QuoteInQuoted, b'"') => QuoteState::Quoted,
                (QuoteState::FieldStart, b'"') => QuoteState::Quoted,
                (QuoteState::Unquoted, b'"') => {
                    return self.reject(record_end, "bare \" in non-quoted field");
                }
                (_, b'\n') => {
                    record_end = i + 1;
                    QuoteState::FieldStart
                }
                (_, b'\r') => QuoteState::FieldStart,
                (_, d) if d == self.delimiter => QuoteState::FieldStart,
                (QuoteState::QuoteInQuoted, _) => {
                    return self.reject(record_end, "extraneous \" in quoted field");
                }
                (_, _) => QuoteState::Unquoted,
            };
            if b == b'\n' {
                self.line += 1;
            }
            self.state = next;
        }
        Ok(n)
    }
}

impl<R: Read> StrictQuotes<R> {
    /// Hand back the complete records read so far and hold the error for
    /// the next call. With none to hand back, fail now.
    fn reject(&mut self, record_end: usize, what: &str) -> io::Result<usize> {
        let err = self.quote_error(what);
        if record_end == 0 {
            self.failed = true;
            return Err(err);
        }
        self.pending = Some(err);
        Ok(record_end)
    }
}

/// Reads records from delimited text.
///
/// Every row is data; there is no header handling. Unless `lazy_quotes` is
/// set, misplaced quotes end the stream with an error.
pub struct CsvSource {
    records: StringRecordsIntoIter<Box<dyn Read + Send>>,
}

impl CsvSource {
    pub fn new<R>(reader: R, config: &SourceConfig) -> Self
    where
        R: Read + Send + 'static,
    {
        let reader: Box<dyn Read + Send> = if config.lazy_quotes {
            Box::new(reader)
        } else {
            Box::new(StrictQuotes::new(reader, config.delimiter))
        };
        let records = ReaderBuilder::new()
            .delimiter(config.delimiter)
            .has_headers(false)
            .flexible(!config.strict_len)
            .double_quote(true)
            .from_reader(reader)
            .into_records();
        CsvSource { records }
    }

    pub fn from_path<P: AsRef<Path>>(path: P, config: &SourceConfig) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), config))
    }

    pub fn stdin(config: &SourceConfig) -> Self {
        Self::new(io::stdin(), config)
    }
}

impl Iterator for CsvSource {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records
            .next()
            .map(|row| row.map(Record::from).map_err(PipelineError::Source))
    }
}

/// Writes records as delimited text.
///
/// Rows of any width are accepted.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, config: &SinkConfig) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(config.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);
        CsvSink { writer }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| PipelineError::Sink(e.into_error().into()))
    }
}

impl CsvSink<Box<dyn Write>> {
    pub fn create<P: AsRef<Path>>(path: P, config: &SinkConfig) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file)), config))
    }

    pub fn stdout(config: &SinkConfig) -> Self {
        Self::new(Box::new(io::stdout()), config)
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_record(&mut self, record: Record) -> Result<()> {
        self.writer
            .write_record(record.fields())
            .map_err(PipelineError::Sink)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| PipelineError::Sink(e.into()))
    }
}
