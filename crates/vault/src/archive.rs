// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filtered tar.gz construction and extraction

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::warn;
use walkdir::WalkDir;

/// File extensions never archived
const SKIPPED_EXTENSIONS: [&str; 3] = ["tmp", "log", "cache"];

fn dir_is_skipped(name: &str) -> bool {
    name.starts_with('.') || name == "__pycache__"
}

fn file_is_skipped(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|e| SKIPPED_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Build a gzip tar of `sources` at `dest`. Archive names are relative to
/// each source's parent, so restoring recreates the source directory name.
/// Unreadable files are logged and skipped. Returns the number of files
/// archived.
pub(crate) fn build(sources: &[&Path], dest: &Path, compression_level: u32) -> std::io::Result<usize> {
    let file = BufWriter::new(File::create(dest)?);
    let encoder = GzEncoder::new(file, Compression::new(compression_level.min(9)));
    let mut builder = tar::Builder::new(encoder);
    let mut archived = 0usize;

    for source in sources {
        let base = source.parent().unwrap_or(Path::new(""));

        if source.is_file() {
            let name = source.file_name().map(Path::new).unwrap_or(source);
            match builder.append_path_with_name(source, name) {
                Ok(()) => archived += 1,
                Err(e) => warn!(path = %source.display(), error = %e, "could not archive file"),
            }
            continue;
        }

        let walker = WalkDir::new(source).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_dir() && entry.depth() > 0 && dir_is_skipped(&name))
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || file_is_skipped(entry.path()) {
                continue;
            }
            let arcname = entry.path().strip_prefix(base).unwrap_or(entry.path());
            match builder.append_path_with_name(entry.path(), arcname) {
                Ok(()) => archived += 1,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "could not archive file");
                }
            }
        }
    }

    let mut writer = builder.into_inner()?.finish()?;
    std::io::Write::flush(&mut writer)?;
    Ok(archived)
}

/// Extract a gzip tar into `dest`, creating it if needed.
pub(crate) fn extract(archive: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = BufReader::new(File::open(archive)?);
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest)
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
