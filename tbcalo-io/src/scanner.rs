//! Run discovery.
//!
//! Finds the runs available on disk by globbing the input pattern and
//! reading the run number out of each matching file name.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::Result;

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunFile {
    /// Run number parsed from the file name.
    pub run: u32,
    /// Path of the file.
    pub path: PathBuf,
}

/// Scanner for run files matching an input pattern.
pub struct RunScanner;

impl RunScanner {
    /// Returns the run files matching `pattern`, sorted by run number.
    ///
    /// A file is kept only if its name, without the extension, holds exactly
    /// one group of digits; names with no digits or several digit groups are
    /// ambiguous and skipped. Duplicate run numbers are kept once (first path wins).
    ///
    /// # Errors
    /// Returns an error if the pattern is not a valid glob.
    pub fn scan(pattern: &str) -> Result<Vec<RunFile>> {
        let mut runs: Vec<RunFile> = Vec::new();
        for entry in glob::glob(pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!("skipping unreadable path: {e}");
                    continue;
                }
            };
            match Self::run_number(&path) {
                Some(run) => runs.push(RunFile { run, path }),
                None => debug!("no unique run number in {}", path.display()),
            }
        }
        runs.sort();
        runs.dedup_by_key(|file| file.run);
        info!("found {} runs matching {pattern}", runs.len());
        Ok(runs)
    }

    /// Returns the run numbers matching `pattern`, ascending.
    ///
    /// # Errors
    /// Returns an error if the pattern is not a valid glob.
    pub fn run_numbers(pattern: &str) -> Result<Vec<u32>> {
        Ok(Self::scan(pattern)?.into_iter().map(|f| f.run).collect())
    }

    /// Parses the run number of a file name.
    ///
    /// The extension is ignored. Returns `None` unless the remaining name
    /// holds exactly one digit group that fits in a `u32`.
    #[must_use]
    pub fn run_number(path: &Path) -> Option<u32> {
        let name = path.file_stem()?.to_str()?;
        let mut groups = name
            .split(|c: char| !c.is_ascii_digit())
            .filter(|group| !group.is_empty());
        let run = groups.next()?;
        if groups.next().is_some() {
            return None;
        }
        run.parse().ok()
    }
}
