//! File-backed registry of spent nullifiers.
//!
//! Each line of the registry holds one `scope:nullifier` pair in decimal.
//! A verifier that records every accepted proof here rejects a second
//! signal from the same member under the same scope.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct NullifierRegistry {
    path: PathBuf,
}

fn entry(scope: &str, nullifier: &str) -> String {
    format!("{}:{}", scope.trim(), nullifier.trim())
}

impl NullifierRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        NullifierRegistry { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the pair has been recorded. A missing registry file is empty.
    pub fn contains(&self, scope: &str, nullifier: &str) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let file = fs::File::open(&self.path).with_context(|| {
            format!("Failed to open nullifier registry: {}", self.path.display())
        })?;
        Self::scan(BufReader::new(&file), &entry(scope, nullifier))
    }

    fn scan(reader: impl BufRead, wanted: &str) -> Result<bool> {
        for line in reader.lines() {
            let line = line.context("Failed to read line from nullifier registry")?;
            if line.trim() == wanted {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Appends the pair, failing if it is already present.
    pub fn check_and_add(&self, scope: &str, nullifier: &str) -> Result<()> {
        let wanted = entry(scope, nullifier);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create registry directory: {}", parent.display())
            })?;
        }
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| {
                format!("Failed to open nullifier registry: {}", self.path.display())
            })?;

        if Self::scan(BufReader::new(&file), &wanted)? {
            bail!("Nullifier {} was already used for scope {}", nullifier.trim(), scope.trim());
        }

        let mut writer = std::io::BufWriter::new(&file);
        let end = writer
            .seek(SeekFrom::End(0))
            .context("Failed to seek to end of registry")?;
        if end > 0 {
            // Tolerate a registry whose last line lacks a newline.
            let mut last = [0u8; 1];
            let mut reader = &file;
            reader
                .seek(SeekFrom::End(-1))
                .context("Failed to seek in registry")?;
            std::io::Read::read_exact(&mut reader, &mut last)
                .context("Failed to read registry")?;
            if last[0] != b'\n' {
                writer.write_all(b"\n").context("Failed to write newline")?;
            }
        }
        writer
            .write_all(wanted.as_bytes())
            .context("Failed to write nullifier")?;
        writer.write_all(b"\n").context("Failed to write newline")?;
        writer.flush().context("Failed to flush registry")?;

        Ok(())
    }
}
