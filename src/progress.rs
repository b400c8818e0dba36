//! Terminal progress reporting.

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed, ETA {eta_precise}";

/// Whether stderr is attached to a terminal.
pub fn stderr_is_terminal() -> bool {
    atty::is(atty::Stream::Stderr)
}

/// Builds the bar for the download stage, or a hidden one when disabled.
pub(crate) fn download_bar(total: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::default_bar()
        .template(TEMPLATE)
        .map(|style| style.progress_chars("█▓▒░ "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    let pb = ProgressBar::new(total);
    pb.set_style(style);
    pb.set_message(format!("📦 Mirroring {} key(s)", total));
    pb
}
