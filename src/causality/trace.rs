//! Captured stack frames and causality-chain rendering.

use std::fmt;

use serde::Serialize;

/// One captured script stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub function: String,
    pub source: String,
    pub line: u32,
    pub column: u32,
}

impl StackFrame {
    pub fn new(
        function: impl Into<String>,
        source: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            function: function.into(),
            source: source.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at {} ({}:{}:{})",
            self.function, self.source, self.line, self.column
        )
    }
}

/// Separator printed before each context's frames in a rendered chain.
pub(crate) const CHAIN_SEPARATOR: &str = "    ---------------------------";

pub(crate) fn write_frames(out: &mut dyn fmt::Write, frames: &[StackFrame]) -> fmt::Result {
    writeln!(out, "{CHAIN_SEPARATOR}")?;
    for frame in frames {
        writeln!(out, "    {frame}")?;
    }
    Ok(())
}

/// One link of a causality chain in the serialized view handed to host
/// devtools, newest context first.
#[derive(Debug, Clone, Serialize)]
pub struct ChainRecord {
    pub frames: Vec<StackFrame>,
}
