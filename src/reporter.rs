// Progress reporting seam between the pipeline and whatever renders it

/// Receives pipeline progress. Implementations must be cheap; they are called per chunk.
pub trait Reporter: Send + Sync {
    /// A pipeline step started, e.g. "Resolving Paper 1.21.8"
    fn step(&self, _message: &str) {}

    /// A transfer started; `total` is the advertised size if known
    fn download_started(&self, _label: &str, _total: Option<u64>) {}

    /// Bytes written so far. Never decreases within one transfer, including across retries.
    fn download_progress(&self, _bytes: u64) {}

    fn download_finished(&self, _label: &str) {}

    /// One line of output from an external process (BuildTools, installers)
    fn process_line(&self, _line: &str) {}
}

/// Reporter that drops everything.
pub struct SilentReporter;

impl Reporter for SilentReporter {}
