//! 传输进度上报与 CLI 进度条管理。

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::models::{ProgressCallback, ProgressSnapshot};

const BYTES_PER_MB: f64 = 1_000_000.0;

pub(crate) struct ProgressReporter {
    pub(crate) snapshot: ProgressSnapshot,
    cb: Option<ProgressCallback>,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// `written` 为已在磁盘上的字节数，`total` 为目标文件总字节数。
    pub(crate) fn new(
        label: &str,
        written: u64,
        total: u64,
        cb: Option<ProgressCallback>,
        show_bar: bool,
    ) -> Self {
        let bar = show_bar.then(|| {
            let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template(
                "{prefix} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({binary_bytes_per_sec}, {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar.set_position(written);
            bar
        });

        let mut reporter = Self {
            snapshot: ProgressSnapshot {
                written_mb: written as f64 / BYTES_PER_MB,
                total_mb: total as f64 / BYTES_PER_MB,
            },
            cb,
            bar,
        };
        reporter.emit();
        reporter
    }

    fn emit(&mut self) {
        if let Some(cb) = self.cb.as_mut() {
            cb(self.snapshot);
        }
    }

    pub(crate) fn advance(&mut self, bytes: u64) {
        self.snapshot.written_mb += bytes as f64 / BYTES_PER_MB;
        if let Some(bar) = self.bar.as_ref() {
            bar.inc(bytes);
        }
        self.emit();
    }

    pub(crate) fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // 出错提前返回时也收起进度条
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}
