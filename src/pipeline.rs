//! Concurrent pipeline runner.
//!
//! The source and every stage run on their own thread. Neighbours are linked
//! by zero-capacity channels, so each record is a rendezvous between
//! producer and consumer: a slow sink stalls every stage upstream of it, and
//! nothing is buffered between stages.
//!
//! End-of-Stream is channel disconnection. A stage's sender is dropped when
//! its input loop finishes, which happens once, after its last send.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, bounded};
use tracing::{debug, error, info};

use crate::chain::FilterChain;
use crate::csv_io::RecordSink;
use crate::error::{PipelineError, Result};
use crate::record::Record;
use crate::record_stage::RecordStage;
use crate::report::{RunSummary, StageReport};

/// Handle on a stage running on its own thread.
pub struct StageHandle {
    name: String,
    handle: JoinHandle<StageReport>,
}

impl StageHandle {
    /// Wait for the stage to finish and collect its report.
    pub fn join(self) -> Result<StageReport> {
        self.handle
            .join()
            .map_err(|_| PipelineError::StagePanicked(self.name))
    }
}

/// Start `stage` on a new thread reading from `input`.
///
/// The returned output stream ends once `input` has ended and every record
/// the stage kept has been handed downstream.
pub fn attach(
    position: usize,
    stage: Box<dyn RecordStage>,
    input: Receiver<Record>,
) -> Result<(Receiver<Record>, StageHandle)> {
    let name = stage.name().to_string();
    let (tx, output) = bounded::<Record>(0);

    let handle = thread::Builder::new()
        .name(format!("stage-{position}-{name}"))
        .spawn(move || {
            let mut stage = stage;
            let mut report = StageReport::new(stage.name());
            debug!(stage = %report.name, position, "stage started");

            for record in input.iter() {
                let Some(out) = stage.apply(record, &mut report) else {
                    continue;
                };
                if tx.send(out).is_err() {
                    // Only happens after the sink has failed.
                    debug!(stage = %report.name, "downstream closed");
                    break;
                }
            }

            debug!(
                stage = %report.name,
                received = report.received,
                emitted = report.emitted,
                skipped = report.skipped,
                "stage finished"
            );
            report
        })?;

    Ok((output, StageHandle { name, handle }))
}

#[derive(Debug, Default)]
struct SourceOutcome {
    rows_read: u64,
    error: Option<PipelineError>,
}

/// Start the source on its own thread. A failed read ends the stream.
fn spawn_source<I>(records: I) -> Result<(Receiver<Record>, JoinHandle<SourceOutcome>)>
where
    I: Iterator<Item = Result<Record>> + Send + 'static,
{
    let (tx, rx) = bounded::<Record>(0);

    let handle = thread::Builder::new()
        .name("source".to_string())
        .spawn(move || {
            let mut outcome = SourceOutcome::default();
            for item in records {
                match item {
                    Ok(record) => {
                        outcome.rows_read += 1;
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(row = outcome.rows_read + 1, error = %e, "input ended early");
                        outcome.error = Some(e);
                        break;
                    }
                }
            }
            outcome
        })?;

    Ok((rx, handle))
}

/// Hand every record on `input` to the sink until End-of-Stream.
fn drain<S>(input: Receiver<Record>, sink: &mut S) -> Result<u64>
where
    S: RecordSink + ?Sized,
{
    let mut written = 0;
    for record in input.iter() {
        sink.write_record(record)?;
        written += 1;
    }
    Ok(written)
}

/// Run `chain` from `source` into `sink`.
///
/// The sink is driven on the calling thread. On success every stage and the
/// source have finished and the sink has been flushed. A source error is
/// returned after the rows read before it have been written and flushed.
/// A sink error is returned immediately; the stage threads then wind down
/// on their own as their channels disconnect.
pub fn run<I, S>(source: I, chain: FilterChain, sink: &mut S) -> Result<RunSummary>
where
    I: IntoIterator<Item = Result<Record>>,
    I::IntoIter: Send + 'static,
    S: RecordSink + ?Sized,
{
    let (mut upstream, source_handle) = spawn_source(source.into_iter())?;

    let mut handles = Vec::with_capacity(chain.len());
    for (position, stage) in chain.into_stages().into_iter().enumerate() {
        let (output, handle) = attach(position, stage, upstream)?;
        upstream = output;
        handles.push(handle);
    }

    let rows_written = drain(upstream, sink)?;
    sink.flush()?;

    let stages = handles
        .into_iter()
        .map(StageHandle::join)
        .collect::<Result<Vec<_>>>()?;
    let outcome = source_handle
        .join()
        .map_err(|_| PipelineError::StagePanicked("source".to_string()))?;

    let summary = RunSummary {
        rows_read: outcome.rows_read,
        rows_written,
        stages,
    };
    info!(
        rows_read = summary.rows_read,
        rows_written = summary.rows_written,
        rows_skipped = summary.rows_skipped(),
        "pipeline finished"
    );

    match outcome.error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::csv_io::CsvSource;
    use crate::executor::execute_rat;
    use crate::record_stage::DistinctStage;
    use std::io::Cursor;
    use std::time::Duration;

    fn rows(rows: &[&[&str]]) -> Vec<Record> {
        rows.iter().map(|r| Record::from_strs(r)).collect()
    }

    fn run_tokens(tokens: &[&str], input: Vec<Record>) -> (Vec<Record>, RunSummary) {
        let chain = FilterChain::from_tokens(tokens).unwrap();
        let mut sink: Vec<Record> = Vec::new();
        let summary = run(input.into_iter().map(Ok), chain, &mut sink).unwrap();
        (sink, summary)
    }

    /// Assert the threaded runner and the sequential executor agree.
    fn assert_equivalence(tokens: &[&str], input: Vec<Record>) {
        let mut chain = FilterChain::from_tokens(tokens).unwrap();
        let (sequential, seq_reports) = execute_rat(input.clone(), &mut chain);
        let (threaded, summary) = run_tokens(tokens, input);
        assert_eq!(sequential, threaded, "runner differs from executor for {tokens:?}");
        assert_eq!(seq_reports, summary.stages);
    }

    fn sample_input() -> Vec<Record> {
        (0..500)
            .map(|i| {
                Record::new(vec![
                    format!("k{}", i % 13),
                    format!("{}-{}", i, i % 3),
                    i.to_string(),
                ])
            })
            .collect()
    }

    #[test]
    fn test_attach_single_stage() {
        let (tx, rx) = bounded(0);
        let (output, handle) = attach(0, Box::new(DistinctStage::new(0)), rx).unwrap();
        let feeder = thread::spawn(move || {
            for v in ["a", "x", "a", "a", "j", "a", "j"] {
                tx.send(Record::from_strs(&[v])).unwrap();
            }
        });
        let out: Vec<Record> = output.iter().collect();
        feeder.join().unwrap();
        let report = handle.join().unwrap();
        assert_eq!(out, rows(&[&["a"], &["x"], &["j"]]));
        assert_eq!(report.received, 7);
        assert_eq!(report.emitted, 3);
    }

    #[test]
    fn test_stage_output_is_rendezvous() {
        let (_tx, rx) = bounded::<Record>(0);
        let (output, _handle) = attach(0, Box::new(DistinctStage::new(0)), rx).unwrap();
        assert_eq!(output.capacity(), Some(0));
    }

    #[test]
    fn test_source_output_is_rendezvous() {
        let (output, _handle) = spawn_source(Vec::<Result<Record>>::new().into_iter()).unwrap();
        assert_eq!(output.capacity(), Some(0));
    }

    #[test]
    fn test_unread_output_holds_one_record_per_stage() {
        let (tx, rx) = bounded::<Record>(0);
        let (output, _handle) = attach(0, Box::new(DistinctStage::new(0)), rx).unwrap();
        // The stage takes one record, then blocks handing it on.
        tx.send(Record::from_strs(&["a"])).unwrap();
        let second = tx.send_timeout(Record::from_strs(&["b"]), Duration::from_millis(200));
        assert!(second.is_err());
        assert!(output.is_empty());
        assert_eq!(output.recv().unwrap(), Record::from_strs(&["a"]));
    }

    #[test]
    fn test_attach_forwards_end_of_stream_on_empty_input() {
        let (tx, rx) = bounded::<Record>(0);
        drop(tx);
        let (output, handle) = attach(0, Box::new(DistinctStage::new(0)), rx).unwrap();
        assert_eq!(output.iter().count(), 0);
        assert_eq!(handle.join().unwrap().received, 0);
    }

    #[test]
    fn test_run_each_filter() {
        let (out, _) = run_tokens(
            &["cols:1:3:x"],
            rows(&[&["a", "b", "c", "d"], &["x", "y", "z", "splunge"]]),
        );
        assert_eq!(out, rows(&[&["b", "d", "x"], &["y", "splunge", "x"]]));

        let (out, _) = run_tokens(
            &["re:1:^ff$"],
            rows(&[
                &["a", "b", "c", "d"],
                &["a", "ff", "c", "d"],
                &["a", "b", "c", "d"],
                &["a", "ff", "c", "d"],
            ]),
        );
        assert_eq!(out, rows(&[&["a", "ff", "c", "d"], &["a", "ff", "c", "d"]]));

        let (out, _) = run_tokens(&["split:1:-"], rows(&[&["a", "b-y", "c", "d"]]));
        assert_eq!(out, rows(&[&["a", "b", "y", "c", "d"]]));
    }

    #[test]
    fn test_runner_matches_executor() {
        assert_equivalence(&["uniq:0"], sample_input());
        assert_equivalence(&["split:1:-", "cols:3:0:1"], sample_input());
        assert_equivalence(&["re:2:7", "uniq:0", "cols:0:tag"], sample_input());
        assert_equivalence(&["uniq:0", "uniq:0"], sample_input());
        assert_equivalence(&["cols:5"], sample_input());
    }

    #[test]
    fn test_order_preserved_through_many_stages() {
        let input: Vec<Record> = (0..2000).map(|i| Record::new(vec![i.to_string()])).collect();
        let tokens = ["cols:0:x", "re:0:.", "uniq:0", "cols:0", "re:0:^", "uniq:0"];
        let (out, summary) = run_tokens(&tokens, input.clone());
        assert_eq!(out, input);
        assert_eq!(summary.rows_read, 2000);
        assert_eq!(summary.rows_written, 2000);
        assert_eq!(summary.stages.len(), 6);
    }

    #[test]
    fn test_out_of_range_rows_skipped() {
        let input = rows(&[&["a", "b"], &["c"], &["d", "e"]]);
        let (out, summary) = run_tokens(&["cols:1"], input);
        assert_eq!(out, rows(&[&["b"], &["e"]]));
        assert_eq!(summary.rows_skipped(), 1);
        assert_eq!(summary.stages[0].skipped, 1);
    }

    #[test]
    fn test_source_error_ends_stream_early() {
        let config = SourceConfig {
            strict_len: true,
            ..Default::default()
        };
        let source = CsvSource::new(Cursor::new("a,b\nc,d\ne\nf,g\n".to_string()), &config);
        let chain = FilterChain::from_tokens(&["cols:1:0"]).unwrap();
        let mut sink: Vec<Record> = Vec::new();
        let result = run(source, chain, &mut sink);
        assert!(matches!(result, Err(PipelineError::Source(_))));
        assert_eq!(sink, rows(&[&["b", "a"], &["d", "c"]]));
    }

    struct FailingSink {
        accepted: usize,
        limit: usize,
    }

    impl RecordSink for FailingSink {
        fn write_record(&mut self, _record: Record) -> Result<()> {
            if self.accepted == self.limit {
                let io = std::io::Error::other("disk full");
                return Err(PipelineError::Sink(io.into()));
            }
            self.accepted += 1;
            Ok(())
        }
    }

    #[test]
    fn test_sink_error_is_fatal() {
        let chain = FilterChain::from_tokens(&["uniq:2"]).unwrap();
        let mut sink = FailingSink {
            accepted: 0,
            limit: 10,
        };
        let result = run(sample_input().into_iter().map(Ok), chain, &mut sink);
        assert!(matches!(result, Err(PipelineError::Sink(_))));
        assert_eq!(sink.accepted, 10);
    }

    #[test]
    fn test_empty_source() {
        let (out, summary) = run_tokens(&["uniq:0", "cols:0"], Vec::new());
        assert!(out.is_empty());
        assert_eq!(summary.rows_read, 0);
        assert!(summary.stages.iter().all(|s| s.received == 0));
    }
}
