use std::time::Duration;

use hf_hub::api::tokio::Progress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

static PROGRESS_BAR: Lazy<MultiProgress> = Lazy::new(MultiProgress::new);

pub fn progress_bar(filename: &str) -> ProgressBar {
    let pb = PROGRESS_BAR.add(ProgressBar::new_spinner());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{wide_bar}] {bytes}/{total_bytes} ({eta})",
        )
        .expect("set progress bar style"),
    );
    pb.set_message(filename.to_string());
    pb
}

/// Feeds hf-hub download callbacks into a terminal progress bar.
#[derive(Clone)]
pub struct Reporter {
    pb: ProgressBar,
    filename: String,
}

impl Reporter {
    pub fn new(filename: &str) -> Self {
        Self {
            pb: progress_bar(filename),
            filename: filename.to_string(),
        }
    }

    /// Stops the spinner and removes the bar, for downloads that never finish.
    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }
}

impl Progress for Reporter {
    async fn init(&mut self, size: usize, filename: &str) {
        self.filename = filename.to_string();
        self.pb.set_length(size as u64);
        self.pb.set_position(0);
    }

    async fn update(&mut self, size: usize) {
        self.pb.inc(size as u64);
    }

    async fn finish(&mut self) {
        self.pb.finish_and_clear();
        tracing::debug!(filename = %self.filename, "download finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clearing_finishes_every_clone() {
        let reporter = Reporter::new("model.onnx");
        let handed_out = reporter.clone();

        reporter.clear();

        assert!(handed_out.pb.is_finished());
    }
}
