//! Command-line interface definitions
//!
//! The CLI stands in for the interactive front end: it selects files, sets
//! corner and tool, runs the batch, and writes results.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::batch::SourceImage;
use crate::config::CliOverrides;
use crate::progress::OutputMode;
use crate::selection::{Corner, Tool};

/// Extensions accepted as input, with their mime types
const SUPPORTED_IMAGES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
];

/// Erase an object from a chosen corner of every image
#[derive(Debug, Parser)]
#[command(name = "corner-heal", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process images through the editing service
    Process(ProcessArgs),
    /// Show version and resolved configuration
    Info(InfoArgs),
    /// Start the local REST interface
    #[cfg(feature = "web")]
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ProcessArgs {
    /// Image files or directories (png, jpg, jpeg, webp)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Corner holding the object to remove
    #[arg(long, value_enum)]
    pub corner: Option<Corner>,

    /// Removal tool
    #[arg(short, long, value_enum)]
    pub tool: Option<Tool>,

    /// Image-editing service endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Config file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write each edited image into this directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Write all edited images into this zip archive
    #[arg(short, long)]
    pub archive: Option<PathBuf>,

    /// Extra rounds that retry only failed images
    #[arg(long, default_value_t = 0)]
    pub retry_failed: u32,

    /// Show what would be processed without calling the service
    #[arg(long)]
    pub dry_run: bool,

    /// Increase output (-v per image, -vv debug logging)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl ProcessArgs {
    /// Flags that override config file values
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            endpoint: self.endpoint.clone(),
            timeout_secs: self.timeout,
            corner: self.corner,
            tool: self.tool,
        }
    }

    /// Output verbosity
    pub fn output_mode(&self) -> OutputMode {
        if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::from_verbosity(self.verbose)
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct InfoArgs {
    /// Config file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(feature = "web")]
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = crate::web::DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = crate::web::DEFAULT_BIND)]
    pub bind: String,

    /// Image-editing service endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Config file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum upload size in megabytes
    #[arg(long)]
    pub upload_limit_mb: Option<usize>,
}

/// Mime type for a supported image path
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_IMAGES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// Expand inputs into supported image files
///
/// Files are kept in the given order; directories contribute their supported
/// files (non-recursive) sorted by name. Unsupported files are skipped.
pub fn collect_image_files(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            if mime_type_for(input).is_some() {
                files.push(input.clone());
            }
        } else if input.is_dir() {
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && mime_type_for(&path).is_some() {
                    entries.push(path);
                }
            }
            entries.sort();
            files.extend(entries);
        }
    }

    Ok(files)
}

/// Read image files into source images
pub fn read_sources(paths: &[PathBuf]) -> std::io::Result<Vec<SourceImage>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let mime = mime_type_for(path).unwrap_or("application/octet-stream");
            Ok(SourceImage::new(name, mime, bytes).with_preview(path.display().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    // TC-CLI-001: Process arguments
    #[test]
    fn test_parse_process_args() {
        let cli = Cli::try_parse_from([
            "corner-heal",
            "process",
            "a.jpg",
            "b.png",
            "--corner",
            "top-right",
            "--tool",
            "generative-remove",
            "--retry-failed",
            "2",
            "-vv",
        ])
        .unwrap();

        let Commands::Process(args) = cli.command else {
            panic!("expected process command");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.corner, Some(Corner::TopRight));
        assert_eq!(args.tool, Some(Tool::GenerativeRemove));
        assert_eq!(args.retry_failed, 2);
        assert_eq!(args.output_mode(), OutputMode::VeryVerbose);

        let overrides = args.overrides();
        assert_eq!(overrides.corner, Some(Corner::TopRight));
        assert!(overrides.endpoint.is_none());
    }

    #[test]
    fn test_parse_requires_inputs() {
        assert!(Cli::try_parse_from(["corner-heal", "process"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["corner-heal", "process", "a.jpg", "-q", "-v"]).is_err());
    }

    // TC-CLI-002: Mime detection
    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(mime_type_for(Path::new("a.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_type_for(Path::new("a.png")), Some("image/png"));
        assert_eq!(mime_type_for(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(mime_type_for(Path::new("a.gif")), None);
        assert_eq!(mime_type_for(Path::new("noext")), None);
    }

    // TC-CLI-003: Directory expansion
    #[test]
    fn test_collect_image_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"b").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        let single = dir.path().join("single.webp");
        std::fs::write(&single, b"s").unwrap();

        let files =
            collect_image_files(&[single.clone(), dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["single.webp", "a.jpg", "b.png", "single.webp"]);
    }

    #[test]
    fn test_read_sources() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"jpeg-bytes").unwrap();

        let sources = read_sources(&[path]).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "photo.jpg");
        assert_eq!(sources[0].mime_type, "image/jpeg");
        assert_eq!(&sources[0].bytes[..], b"jpeg-bytes");
        assert!(sources[0].preview.is_some());
    }
}
