//! CLI-specific progress handling for butterfly-walk
//!
//! Provides the progress bar shown while a batch of stop pairs is resolved.

use std::sync::Arc;

use butterfly_walk::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

const PAIRS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} pairs ({percent}%) {per_sec} ETA: {eta}";

/// Creates a progress bar counting resolved pairs
pub fn create_progress_bar(total_pairs: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_pairs);
    let style = ProgressStyle::default_bar()
        .template(PAIRS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Progress manager for a resolution run
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_pairs: u64, message: &str) -> Self {
        let pb = create_progress_bar(total_pairs);

        // Print initial message to stderr
        eprintln!("{message}");

        Self { pb }
    }

    /// Callback for the resolver that moves this bar
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.pb.clone();
        Arc::new(move |done, total| {
            pb.set_length(total);
            pb.set_position(done);
        })
    }

    pub fn finish(&self) {
        self.pb.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_progress_bar_template() {
        let pb = create_progress_bar(1000);
        assert_eq!(pb.length().unwrap(), 1000);

        pb.set_position(100);
        pb.finish();
    }

    #[test]
    fn test_callback_moves_bar() {
        let manager = ProgressManager::new(500, "Test resolution");
        let callback = manager.callback();

        callback(250, 500);
        assert_eq!(manager.pb.position(), 250);

        callback(500, 500);
        assert_eq!(manager.pb.position(), 500);
        manager.finish();
    }
}
