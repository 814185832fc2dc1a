// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

/// Default maximum number of steps taken when following an update chain.
const MAX_TRACE_DEPTH: usize = 4096;

/// Configuration of content resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Include contributions of principals who were removed from a group, reached through their
    /// archive anchors. Queries can override this.
    pub(crate) include_archives: bool,

    /// Stop following update chains after this many steps.
    pub(crate) max_trace_depth: usize,
}

impl Config {
    pub fn new() -> Self {
        Self {
            include_archives: true,
            max_trace_depth: MAX_TRACE_DEPTH,
        }
    }

    pub fn with_include_archives(mut self, include_archives: bool) -> Self {
        self.include_archives = include_archives;
        self
    }

    pub fn with_max_trace_depth(mut self, max_trace_depth: usize) -> Self {
        self.max_trace_depth = max_trace_depth;
        self
    }

    pub fn include_archives(&self) -> bool {
        self.include_archives
    }

    pub fn max_trace_depth(&self) -> usize {
        self.max_trace_depth
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
