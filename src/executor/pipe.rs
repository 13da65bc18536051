//! Internal utilities for draining and decoding child process pipes.
//!
//! Output is both collected for the caller and traced line-by-line so that
//! `--log-level trace` shows what the external tools printed.

use std::io::{BufRead, BufReader, Read, Write};

/// Type of output stream for logging purposes.
#[derive(Clone, Copy)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Extracts a human-readable message from a thread panic.
pub(super) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Reads a pipe to EOF, logging each line and returning the raw bytes.
///
/// - stdout lines are logged at TRACE, stderr lines at DEBUG
/// - I/O errors stop reading but don't fail command execution
///   (success is determined by exit status)
/// - `None` pipe logs an error and returns empty output
pub(super) fn read_pipe<R: Read>(pipe: Option<R>, stream_type: StreamType) -> Vec<u8> {
    let Some(pipe) = pipe else {
        tracing::error!(
            stream = %stream_type,
            "pipe was None (unexpected: Stdio::piped() was set), no output will be captured"
        );
        return Vec::new();
    };

    let mut reader = BufReader::new(pipe);
    let mut collected = Vec::new();
    let mut line_buf = Vec::new();

    loop {
        line_buf.clear();
        match reader.read_until(b'\n', &mut line_buf) {
            Ok(0) => break,
            Ok(_) => {
                let log_content = line_buf.strip_suffix(b"\n").unwrap_or(&line_buf);
                log_line(log_content, stream_type);
                collected.extend_from_slice(&line_buf);
            }
            Err(e) => {
                tracing::error!(stream = %stream_type, error = %e, "I/O error, stopping read");
                break;
            }
        }
    }

    collected
}

/// Writes the whole input to the child's stdin and closes it.
pub(super) fn write_stdin<W: Write>(pipe: Option<W>, input: &str) {
    let Some(mut pipe) = pipe else {
        tracing::error!("stdin pipe was None (unexpected: Stdio::piped() was set)");
        return;
    };
    if let Err(e) = pipe.write_all(input.as_bytes()) {
        // A child that exits early closes its end; the exit status reports the failure.
        tracing::debug!(error = %e, "failed to write stdin");
    }
}

/// Decodes captured output into a `String`.
///
/// WSL's own tooling emits UTF-16LE with a byte-order mark; that is decoded
/// as UTF-16. Anything else is decoded as lossy UTF-8.
pub(super) fn decode_output(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn log_line(line: &[u8], stream_type: StreamType) {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim_end_matches('\r');
    match stream_type {
        StreamType::Stdout => tracing::trace!(stream = %stream_type, "{}", trimmed),
        StreamType::Stderr => tracing::debug!(stream = %stream_type, "{}", trimmed),
    }
}
