//! Captures and forwards tool output line by line.

use std::io::{self, BufRead, BufReader, Read};

use tracing::{error, info};

use crate::observability::TOOL_LOG_TARGET;

/// Lines captured from a successful tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Standard output lines, in emission order.
    pub stdout: Vec<String>,
    /// Standard error lines, in emission order.
    pub stderr: Vec<String>,
}

/// Which stream a drained pipe belongs to.
#[derive(Debug, Clone, Copy)]
pub(super) enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn forward(self, tool: &str, line: &str) {
        match self {
            Self::Stdout => info!(target: TOOL_LOG_TARGET, "{tool}: {line}"),
            Self::Stderr => error!(target: TOOL_LOG_TARGET, "{tool}: {line}"),
        }
    }
}

/// Reads `pipe` to the end, logging and collecting each line.
///
/// Invalid UTF-8 is replaced rather than treated as an error so a noisy tool
/// cannot abort the run.
pub(super) fn drain(pipe: impl Read, stream: Stream, tool: &str) -> io::Result<Vec<String>> {
    let mut reader = BufReader::new(pipe);
    let mut lines = Vec::new();
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(lines);
        }
        let text = String::from_utf8_lossy(&buffer);
        let line = text.trim_end_matches(['\n', '\r']).to_owned();
        stream.forward(tool, &line);
        lines.push(line);
    }
}
