/// Abstract console the diagnostic reports through.
///
/// The diagnostic only ever appends whole lines; the transport (serial
/// console, host stdout, a capture buffer) is the caller's business.
pub trait ReportSink {
    fn line(&mut self, line: &str);
}

/// Sink that keeps every line in memory, for tests and summaries.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl ReportSink for BufferSink {
    fn line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}
