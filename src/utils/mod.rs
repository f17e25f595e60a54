//! Common utilities and helpers

pub mod logging;
pub mod path;

/// Formatting helpers for CLI output
pub struct Utils;

impl Utils {
    /// Format seconds as `MM:SS.mmm` or `HH:MM:SS.mmm`
    pub fn format_seconds(seconds: f64) -> String {
        crate::domain::model::TimeSpec::from_seconds(seconds.max(0.0)).to_string()
    }

    /// Format file size for display
    pub fn format_file_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Size change as a signed percentage of the original
    pub fn size_change_percent(original: u64, result: u64) -> f64 {
        if original == 0 {
            0.0
        } else {
            (result as f64 - original as f64) / original as f64 * 100.0
        }
    }
}
