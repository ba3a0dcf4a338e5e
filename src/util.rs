#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use glob::glob;

/// A glob utility function to find paths to files with certain extension
///
/// * `extension`: the file extension to find paths for
/// * `search_depth`: how many folders deep to search for
/// * `root_dir`: the root directory where search starts
pub fn find_files(extension: &str, search_depth: i8, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pattern = root_dir.to_path_buf();

    for _ in 0..search_depth {
        pattern.push("**");
    }

    pattern.push(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert root_dir to string")?
        .to_string();

    let mut files: Vec<PathBuf> = glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// Runs `op` up to `attempts` times, sleeping `base_delay`, then twice that,
/// and so on between attempts. Returns the last error when every attempt
/// fails.
///
/// Blocks the calling thread; call it from blocking workers only.
pub fn retry_with_backoff<T, E, F>(
    what: &str,
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> std::result::Result<T, E>
where
    E: Display,
    F: FnMut() -> std::result::Result<T, E>,
{
    let attempts = attempts.max(1);
    let mut delay = base_delay;
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    "{what} failed (attempt {attempt}/{attempts}): {e}; retrying in {delay:?}"
                );
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Removes the `_xlfn.` prefixes spreadsheet files put in front of newer
/// function names.
pub fn strip_xlfn(text: &str) -> String {
    text.replace("_xlfn.", "")
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn retry_stops_at_the_first_success() {
        let calls = Cell::new(0);
        let result: std::result::Result<u32, String> =
            retry_with_backoff("write", 5, Duration::ZERO, || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err("locked".into()) } else { Ok(calls.get()) }
            });
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_gives_up_after_the_last_attempt() {
        let calls = Cell::new(0);
        let result: std::result::Result<(), String> =
            retry_with_backoff("write", 4, Duration::ZERO, || {
                calls.set(calls.get() + 1);
                Err(format!("failure {}", calls.get()))
            });
        assert_eq!(result, Err("failure 4".to_string()));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn xlfn_prefixes_are_removed() {
        assert_eq!(strip_xlfn("=_xlfn.XLOOKUP(A1,B:B,C:C)"), "=XLOOKUP(A1,B:B,C:C)");
        assert_eq!(strip_xlfn("Paris"), "Paris");
    }
}
