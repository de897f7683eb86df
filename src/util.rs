//! # Utility Module
//!
//! Output directory checks and CLI conversions.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::aggregate::ExportFormat;

const WRITE_CHECK_FILE: &str = ".radiobatch_write_check";

/// Convert CLI table format to internal enum
pub fn format_from_cli(format: crate::cli::TableFormat) -> ExportFormat {
    match format {
        crate::cli::TableFormat::Csv => ExportFormat::Csv,
        crate::cli::TableFormat::Parquet => ExportFormat::Parquet,
    }
}

/// Create the save directory if needed and check that files can be created in it.
pub fn ensure_output_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        bail!("save path is not a directory: {}", path.display());
    }
    std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))?;

    let marker = path.join(WRITE_CHECK_FILE);
    std::fs::write(&marker, b"")
        .with_context(|| format!("save directory is not writable: {}", path.display()))?;
    std::fs::remove_file(&marker).with_context(|| format!("removing {}", marker.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_output_dir() {
        let dir = tempdir().expect("tempdir");
        let out = dir.path().join("nested").join("save");
        ensure_output_dir(&out).expect("ensure");
        assert!(out.is_dir());
        assert!(!out.join(WRITE_CHECK_FILE).exists());
    }

    #[test]
    fn rejects_file_as_output_dir() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").expect("write");
        assert!(ensure_output_dir(&file).is_err());
    }

    #[test]
    fn existing_dir_keeps_its_contents() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("keep.json"), b"{}").expect("write");
        ensure_output_dir(dir.path()).expect("ensure");
        assert!(dir.path().join("keep.json").is_file());
        assert_eq!(std::fs::read_dir(dir.path()).expect("read_dir").count(), 1);
    }
}
