//! 终端 UI 样式
//!
//! 进度条与运行报告共用的符号、进度条模板和时长格式。

use std::time::Duration;

pub mod symbols {
    pub const CHECK: &str = "✓";
    pub const CROSS: &str = "✗";
    pub const ARROW_RIGHT: &str = "→";
    pub const BULLET: &str = "•";
    pub const CHART: &str = "📊";
    pub const FOLDER: &str = "📁";
    pub const CLOCK: &str = "⏱️";
    pub const WARNING: &str = "⚠️";
}

/// 进度条样式，crate 内所有进度条共用
pub mod progress_style {
    /// filled, current, empty
    pub const PROGRESS_CHARS: &str = "█▓░";

    pub const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

    /// `{eta}` rather than `{eta_precise}`: the latter overflows on stalls.
    pub const BATCH_TEMPLATE: &str = "{spinner:.green} {prefix:.cyan.bold} ▕{bar:35.green/black}▏ {percent:>3}% • {pos}/{len} • ⏱️ {elapsed_precise} (ETA: {eta}) • {msg}";
}

/// `1h 02m 03s`, `2m 05s`, `4.2s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
