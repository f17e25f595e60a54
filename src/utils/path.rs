//! Output path naming

use std::path::{Path, PathBuf};

use crate::domain::model::TimeSpec;

/// Longest slug kept in generated file names
const MAX_SLUG_LEN: usize = 48;

/// Derives output file names from inputs
pub struct PathUtils;

impl PathUtils {
    /// `clip.mov` -> `clip_compressed.webm`, next to the input
    pub fn compressed_output(input: &Path, extension: &str) -> PathBuf {
        let stem = Self::stem(input);
        input.with_file_name(format!("{}_compressed.{}", stem, extension))
    }

    /// `clip.mov` -> `clip_0m05s-0m12s500.webm`, next to the input
    pub fn clip_output(input: &Path, start: TimeSpec, end: TimeSpec, extension: &str) -> PathBuf {
        let stem = Self::stem(input);
        input.with_file_name(format!(
            "{}_{}-{}.{}",
            stem,
            start.file_label(),
            end.file_label(),
            extension
        ))
    }

    /// `02_best-goal-of-the-match.webm`; `index` is zero-based
    pub fn highlight_file_name(index: usize, title: &str, extension: &str) -> String {
        let slug = Self::slugify(title);
        if slug.is_empty() {
            format!("{:02}_highlight.{}", index + 1, extension)
        } else {
            format!("{:02}_{}.{}", index + 1, slug, extension)
        }
    }

    /// Lowercase ASCII alphanumerics separated by single dashes
    pub fn slugify(title: &str) -> String {
        let mut slug = String::with_capacity(title.len());
        let mut dash = false;
        for ch in title.chars() {
            if ch.is_ascii_alphanumeric() {
                if dash && !slug.is_empty() {
                    slug.push('-');
                }
                dash = false;
                slug.push(ch.to_ascii_lowercase());
                if slug.len() >= MAX_SLUG_LEN {
                    break;
                }
            } else {
                dash = true;
            }
        }
        slug
    }

    /// Extension in lowercase, if any
    pub fn extension(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    fn stem(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_output() {
        let out = PathUtils::compressed_output(Path::new("/videos/holiday.mov"), "webm");
        assert_eq!(out, PathBuf::from("/videos/holiday_compressed.webm"));
    }

    #[test]
    fn test_clip_output() {
        let out = PathUtils::clip_output(
            Path::new("match.mp4"),
            TimeSpec::from_seconds(5.0),
            TimeSpec::from_seconds(72.5),
            "webm",
        );
        assert_eq!(out, PathBuf::from("match_0m05s-1m12s500.webm"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(PathUtils::slugify("  Best Goal -- of the Match!"), "best-goal-of-the-match");
        assert_eq!(PathUtils::slugify("???"), "");
        assert_eq!(PathUtils::highlight_file_name(1, "Intro", "mp4"), "02_intro.mp4");
        assert_eq!(PathUtils::highlight_file_name(0, "!!", "webm"), "01_highlight.webm");
    }
}
