use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::arch::paths::legacy_hash_path;
use crate::error::{Error, Result};

/// Filesystem access for legacy hash files.
pub trait HashFiles: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_readable(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OsHashFiles;

impl HashFiles for OsHashFiles {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_readable(&self, path: &Path) -> bool {
        File::open(path).is_ok()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)?;
        // The OS keeps these root-only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// Per-user SHA1 hash files used by 10.5 and 10.6, one per GeneratedUID.
pub struct LegacyHashStore {
    dir: PathBuf,
    files: Box<dyn HashFiles>,
}

impl LegacyHashStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_files(dir, Box::new(OsHashFiles))
    }

    pub fn with_files(dir: impl Into<PathBuf>, files: Box<dyn HashFiles>) -> Self {
        Self {
            dir: dir.into(),
            files,
        }
    }

    /// The hash file for `guid`. The GUID must parse as a UUID, which also keeps
    /// path separators out of the file name.
    pub fn path_for(&self, guid: &str) -> Result<PathBuf> {
        let uuid = Uuid::parse_str(guid.trim()).map_err(|_| Error::InvalidGuid(guid.to_string()))?;
        let name = uuid.hyphenated().to_string().to_uppercase();
        Ok(legacy_hash_path(&self.dir, &name))
    }

    /// Read a user's hash file.
    ///
    /// `Ok(None)` when the file is missing or is not a regular file. A file that is
    /// present but unreadable is `Error::NotReadable`.
    pub fn read(&self, guid: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(guid)?;

        if !self.files.exists(&path) {
            debug!(path = %path.display(), "no legacy hash file");
            return Ok(None);
        }
        if !self.files.is_file(&path) {
            warn!(path = %path.display(), "legacy hash path is not a regular file");
            return Ok(None);
        }
        if !self.files.is_readable(&path) {
            return Err(Error::NotReadable { path });
        }

        let contents = self
            .files
            .read(&path)
            .map_err(|_| Error::NotReadable { path: path.clone() })?;
        Ok(Some(contents))
    }

    pub fn write(&self, guid: &str, contents: &[u8]) -> Result<()> {
        let path = self.path_for(guid)?;
        self.files.write(&path, contents)?;
        info!(path = %path.display(), "wrote legacy password hash");
        Ok(())
    }
}
