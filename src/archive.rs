//! Archive builder
//!
//! Bundles finished results into a single zip, one entry per image, named
//! after the original file with [`RESULT_SUFFIX`] inserted before the
//! extension.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::batch::{EditedImage, TrackedImage};

/// Suffix inserted before the extension of every output file
pub const RESULT_SUFFIX: &str = "_healed";

/// Default file name for downloaded archives
pub const DEFAULT_ARCHIVE_NAME: &str = "healed-images.zip";

/// Archive error types
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("No processed images to archive")]
    EmptyResultSet,

    #[error("Could not create the archive: {0}")]
    ArchiveBuildFailure(String),
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(e: zip::result::ZipError) -> Self {
        ArchiveError::ArchiveBuildFailure(e.to_string())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::ArchiveBuildFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Output file name for an edited image
///
/// `photo.jpg` becomes `photo_healed.jpg`; a name without an extension gets
/// the suffix appended. A leading dot does not start an extension.
pub fn output_name(original: &str) -> String {
    match original.rfind('.') {
        Some(dot) if dot > 0 => {
            let (stem, extension) = original.split_at(dot);
            format!("{}{}{}", stem, RESULT_SUFFIX, extension)
        }
        _ => format!("{}{}", original, RESULT_SUFFIX),
    }
}

/// Make `name` unique among `taken` by numbering repeats before the extension
fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name.as_str(), ""),
    };
    let mut counter = 2;
    loop {
        let candidate = format!("{}_{}{}", stem, counter, extension);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Entry names and results of every finished image, in batch order
///
/// Names follow [`output_name`]; repeats are numbered so every entry is
/// unique.
pub fn result_entries(images: &[TrackedImage]) -> Vec<(String, &EditedImage)> {
    let mut taken = HashSet::new();
    images
        .iter()
        .filter_map(|image| {
            let result = image.result()?;
            Some((unique_name(output_name(image.name()), &mut taken), result))
        })
        .collect()
}

/// Zip the results of every finished image, in batch order
///
/// Images that are not done are skipped. Fails with
/// [`ArchiveError::EmptyResultSet`] if none are done; no partial archive is
/// returned on failure.
pub fn build_archive(images: &[TrackedImage]) -> Result<Vec<u8>> {
    let entries = result_entries(images);
    if entries.is_empty() {
        return Err(ArchiveError::EmptyResultSet);
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (entry, result) in &entries {
        debug!(%entry, bytes = result.bytes.len(), "Adding archive entry");
        writer.start_file(entry.as_str(), options)?;
        writer.write_all(&result.bytes)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}
