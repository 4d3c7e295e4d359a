//! # csvmung
//!
//! A concurrent filter chain for delimited row streams.
//!
//! Rows are read from delimited text, pushed through an ordered chain of
//! filter stages, and written back out. Each stage runs on its own thread and
//! hands rows to the next through a zero-capacity channel, so rows keep
//! their order and a slow consumer throttles everything upstream.
//!
//! ## Filters
//!
//! - `cols:ref:ref:...` - project columns; a non-integer ref is a literal
//! - `re:col:pattern` - keep rows whose column matches a regex
//! - `split:col:pattern` - explode a column on every regex match
//! - `uniq:col` - keep the first row for each value of a column
//!
//! ## Example
//!
//! ```
//! use csvmung::{FilterChain, Record, run};
//!
//! let rows = vec![
//!     Record::from_strs(&["a", "b-y", "c"]),
//!     Record::from_strs(&["a", "x", "c"]),
//!     Record::from_strs(&["z", "b-q", "c"]),
//! ];
//!
//! let chain = FilterChain::from_tokens(&["uniq:0", "split:1:-"]).unwrap();
//! let mut output: Vec<Record> = Vec::new();
//! let summary = run(rows.into_iter().map(Ok), chain, &mut output).unwrap();
//!
//! assert_eq!(summary.rows_read, 3);
//! assert_eq!(output[0], Record::from_strs(&["a", "b", "y", "c"]));
//! assert_eq!(output[1], Record::from_strs(&["z", "b", "q", "c"]));
//! ```

pub mod chain;
pub mod config;
pub mod csv_io;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod record;
pub mod record_stage;
pub mod report;

pub use chain::FilterChain;
pub use config::{SinkConfig, SourceConfig, parse_delimiter};
pub use csv_io::{CsvSink, CsvSource, RecordSink};
pub use dsl::{ColumnRef, Command, parse_command, parse_commands};
pub use error::{PipelineError, Result};
pub use executor::execute_rat;
pub use pipeline::{StageHandle, attach, run};
pub use record::Record;
pub use record_stage::{
    DistinctStage, MatchStage, RecordStage, SelectStage, SplitStage, command_to_record_stage,
};
pub use report::{RunSummary, StageReport};
