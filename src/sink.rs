//! Terminal-side collaborators: where exports land and how the user is asked.

use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use canvas::engine::Confirm;
use canvas::export::DownloadSink;
use tracing::{info, warn};

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;

/// Writes exports into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&self, filename: &str, png: &[u8]) -> io::Result<()> {
        if filename.contains(['/', '\\']) {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("refusing nested filename `{filename}`")));
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        fs::write(&path, png)?;
        info!(path = %path.display(), bytes = png.len(), "export written");
        Ok(())
    }
}

/// Yes/no prompt on a line-oriented reader. `assume_yes` skips the prompt.
pub struct LineConfirm<R> {
    input: RefCell<R>,
    assume_yes: bool,
}

/// Confirmation read from standard input.
pub type StdinConfirm = LineConfirm<io::StdinLock<'static>>;

impl StdinConfirm {
    #[must_use]
    pub fn stdin(assume_yes: bool) -> Self {
        LineConfirm::new(io::stdin().lock(), assume_yes)
    }
}

impl<R: BufRead> LineConfirm<R> {
    pub fn new(input: R, assume_yes: bool) -> Self {
        Self { input: RefCell::new(input), assume_yes }
    }
}

impl<R: BufRead> Confirm for LineConfirm<R> {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        let mut stderr = io::stderr().lock();
        if let Err(e) = write!(stderr, "{prompt} [y/N] ").and_then(|()| stderr.flush()) {
            warn!(error = %e, "failed to write prompt");
        }
        let mut answer = String::new();
        match self.input.borrow_mut().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                warn!(error = %e, "failed to read confirmation");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "是")
}
