use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder as TarBuilder;
use walkdir::WalkDir;

/// Suffix appended to an output directory's path to name its archive.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Packages job output directories into gzip-compressed tarballs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Archiver;

impl Archiver {
    pub fn new() -> Self {
        Self
    }

    /// `<dir>.tar.gz`, next to the directory itself.
    pub fn archive_path(dir: &Path) -> PathBuf {
        let mut name = OsString::from(dir.as_os_str());
        name.push(".");
        name.push(ARCHIVE_EXTENSION);
        PathBuf::from(name)
    }

    /// Archive every regular file under `dir`, keyed by its path relative to
    /// `dir`. Any previous archive is replaced.
    pub fn archive(&self, dir: &Path) -> Result<PathBuf, ArchiveError> {
        let metadata = std::fs::metadata(dir).map_err(|source| ArchiveError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ArchiveError::NotADirectory(dir.to_path_buf()));
        }

        let archive_path = Self::archive_path(dir);
        let parent = archive_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // Build next to the destination, then rename over it.
        let staging = tempfile::Builder::new()
            .prefix(".archive-")
            .tempfile_in(parent)
            .map_err(|source| ArchiveError::Io {
                path: parent.to_path_buf(),
                source,
            })?;

        let file_count = {
            let writer = BufWriter::new(staging.as_file());
            let encoder = GzEncoder::new(writer, Compression::default());
            let mut tar = TarBuilder::new(encoder);
            let count = self.append_tree(&mut tar, dir)?;
            let encoder = tar.into_inner().map_err(|source| ArchiveError::Io {
                path: archive_path.clone(),
                source,
            })?;
            let mut writer = encoder.finish().map_err(|source| ArchiveError::Io {
                path: archive_path.clone(),
                source,
            })?;
            writer.flush().map_err(|source| ArchiveError::Io {
                path: archive_path.clone(),
                source,
            })?;
            count
        };

        staging
            .persist(&archive_path)
            .map_err(|e| ArchiveError::Io {
                path: archive_path.clone(),
                source: e.error,
            })?;

        tracing::debug!(
            dir = %dir.display(),
            archive = %archive_path.display(),
            files = file_count,
            "Archive written"
        );

        Ok(archive_path)
    }

    /// Return the archive for `dir`, building it only if it does not exist.
    pub fn ensure(&self, dir: &Path) -> Result<PathBuf, ArchiveError> {
        let archive_path = Self::archive_path(dir);
        if archive_path.is_file() {
            return Ok(archive_path);
        }
        self.archive(dir)
    }

    fn append_tree<W: Write>(
        &self,
        tar: &mut TarBuilder<W>,
        dir: &Path,
    ) -> Result<usize, ArchiveError> {
        let mut count = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path
                .strip_prefix(dir)
                .map_err(|_| ArchiveError::OutsideRoot(path.to_path_buf()))?;

            let mut file = File::open(path).map_err(|source| ArchiveError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tar.append_file(relative, &mut file)
                .map_err(|source| ArchiveError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            count += 1;
        }
        Ok(count)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Entry {0} is outside the archived directory")]
    OutsideRoot(PathBuf),
}

impl ArchiveError {
    /// True when the directory to archive does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            ArchiveError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            ArchiveError::Walk(e) => e
                .io_error()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound),
            _ => false,
        }
    }
}
