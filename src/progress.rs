/// Opaque progress surface used by operators that may take noticeable time.
///
/// The core only issues calls and never blocks on the reporter; cancellation
/// is not part of the contract.
pub trait ProgressReporter {
    fn open(&mut self) {}
    fn close(&mut self) {}
    fn set_information_text(&mut self, _text: &str) {}
    fn set_progress_range(&mut self, _min: u32, _max: u32) {}
    fn inc_current_progress_value(&mut self) {}
}

/// Reporter that swallows everything.
pub struct NullProgress;

impl ProgressReporter for NullProgress {}

/// Reporter that routes progress through the `log` crate.
#[derive(Default)]
pub struct LogProgress {
    label: String,
    current: u32,
    max: u32,
}

impl ProgressReporter for LogProgress {
    fn open(&mut self) {
        self.current = 0;
    }

    fn close(&mut self) {
        log::info!("{}: done", self.label);
    }

    fn set_information_text(&mut self, text: &str) {
        self.label = text.to_string();
    }

    fn set_progress_range(&mut self, min: u32, max: u32) {
        self.current = min;
        self.max = max;
    }

    fn inc_current_progress_value(&mut self) {
        self.current += 1;
        log::info!("{}: {}/{}", self.label, self.current, self.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_progress_counts() {
        let mut progress = LogProgress::default();
        progress.set_information_text("op");
        progress.set_progress_range(0, 3);
        progress.inc_current_progress_value();
        progress.inc_current_progress_value();
        assert_eq!(progress.current, 2);
    }
}
