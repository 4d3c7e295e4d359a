//! Record-at-a-time (RAT) sequential executor.
//!
//! Pushes each input record through the entire chain on the calling thread
//! before taking the next one. It produces exactly what the threaded runner
//! in `pipeline` produces, without spawning anything.

use crate::chain::FilterChain;
use crate::record::Record;
use crate::record_stage::RecordStage;
use crate::report::StageReport;

/// Push one record through a slice of stages, stopping at the first stage
/// that drops it.
fn push_through_stages(
    record: Record,
    stages: &mut [Box<dyn RecordStage>],
    reports: &mut [StageReport],
) -> Option<Record> {
    let mut current = record;
    for (stage, report) in stages.iter_mut().zip(reports.iter_mut()) {
        current = stage.apply(current, report)?;
    }
    Some(current)
}

/// Execute a chain in record-at-a-time mode.
///
/// Returns the surviving records in input order and one report per stage.
pub fn execute_rat<I>(input: I, chain: &mut FilterChain) -> (Vec<Record>, Vec<StageReport>)
where
    I: IntoIterator<Item = Record>,
{
    let stages = chain.stages_mut();
    let mut reports: Vec<StageReport> = stages.iter().map(|s| StageReport::new(s.name())).collect();
    let mut output = Vec::new();

    for record in input {
        if let Some(out) = push_through_stages(record, stages, &mut reports) {
            output.push(out);
        }
    }

    (output, reports)
}
