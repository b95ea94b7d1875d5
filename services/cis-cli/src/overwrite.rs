//! What to do when the output file already exists.

use std::io::{BufRead, Write};
use std::path::Path;

use cis_common::{CisError, Result};
use collocation::config::parse_flag;

/// Overwrite policy, from `CIS_FORCE_OVERWRITE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    Overwrite,
    Refuse,
    Ask,
}

impl OverwritePolicy {
    pub fn from_env() -> Self {
        match std::env::var("CIS_FORCE_OVERWRITE") {
            Ok(val) => Self::from_flag(&val),
            Err(_) => OverwritePolicy::Ask,
        }
    }

    pub fn from_flag(val: &str) -> Self {
        if parse_flag(val) {
            OverwritePolicy::Overwrite
        } else {
            OverwritePolicy::Refuse
        }
    }

    /// Ok when `path` may be written. Asks on `input` / `prompt` under
    /// [`OverwritePolicy::Ask`]; anything but `y` or `yes` declines.
    pub fn check<R: BufRead, W: Write>(&self, path: &Path, input: &mut R, prompt: &mut W) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let allowed = match self {
            OverwritePolicy::Overwrite => true,
            OverwritePolicy::Refuse => false,
            OverwritePolicy::Ask => {
                write!(prompt, "File {} already exists. Overwrite? [y/N] ", path.display())?;
                prompt.flush()?;
                let mut answer = String::new();
                input.read_line(&mut answer)?;
                matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
            }
        };
        if allowed {
            tracing::debug!(path = %path.display(), "overwriting existing output");
            Ok(())
        } else {
            Err(CisError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists and will not be overwritten", path.display()),
            )))
        }
    }
}
