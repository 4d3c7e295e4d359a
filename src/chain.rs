//! Chain builder: turns filter tokens into an ordered list of stages.

use std::fmt;

use tracing::debug;

use crate::dsl::{Command, parse_commands};
use crate::error::{PipelineError, Result};
use crate::record_stage::{RecordStage, command_to_record_stage};

/// A validated, non-empty, ordered sequence of stages.
pub struct FilterChain {
    stages: Vec<Box<dyn RecordStage>>,
}

impl FilterChain {
    /// Parse tokens and build the chain they describe.
    ///
    /// Fails on the first malformed token, or when no token names a known
    /// filter.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let commands = parse_commands(tokens)?;
        Self::from_commands(commands)
    }

    pub fn from_commands(commands: Vec<Command>) -> Result<Self> {
        let stages = commands.into_iter().map(command_to_record_stage).collect();
        Self::from_stages(stages)
    }

    pub fn from_stages(stages: Vec<Box<dyn RecordStage>>) -> Result<Self> {
        if stages.is_empty() {
            return Err(PipelineError::EmptyChain);
        }
        let chain = FilterChain { stages };
        debug!(stages = ?chain.names(), "filter chain built");
        Ok(chain)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: an empty chain cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn stages_mut(&mut self) -> &mut [Box<dyn RecordStage>] {
        &mut self.stages
    }

    pub fn into_stages(self) -> Vec<Box<dyn RecordStage>> {
        self.stages
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("stages", &self.names())
            .finish()
    }
}
