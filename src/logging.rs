// Log sinks - where the command manager writes its status lines
//
// The manager only needs a "write line" capability. Structured diagnostics
// go through `tracing` separately.

use std::sync::Mutex;

/// Destination for human-readable status lines
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);

    /// Lines describing a failure. Defaults to `write_line`.
    fn write_error(&self, line: &str) {
        self.write_line(line);
    }
}

/// Prints to stdout, errors to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }

    fn write_error(&self, line: &str) {
        eprintln!("{}", line);
    }
}

/// Keeps every line in memory (for tests and replay)
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.lines.lock().ok().and_then(|lines| lines.last().cloned())
    }

    /// True if any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .map(|lines| lines.iter().any(|l| l.contains(needle)))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Forwards lines to the `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "command_engine", "{}", line);
    }

    fn write_error(&self, line: &str) {
        tracing::warn!(target: "command_engine", "{}", line);
    }
}

/// Install a compact fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_lines() {
        let sink = MemorySink::new();
        sink.write_line("first");
        sink.write_error("second failed");

        assert_eq!(sink.lines(), vec!["first", "second failed"]);
        assert_eq!(sink.last().as_deref(), Some("second failed"));
        assert!(sink.contains("failed"));

        sink.clear();
        assert!(sink.lines().is_empty());
    }
}
