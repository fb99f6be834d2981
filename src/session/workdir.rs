//! Working-directory access.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Reads and changes the current working directory.
pub trait WorkingDir {
    /// The current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory can't be determined.
    fn current(&self) -> io::Result<PathBuf>;

    /// Changes the current directory to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the change fails.
    fn change(&mut self, path: &Path) -> io::Result<()>;
}

/// The process's real working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessDir;

impl WorkingDir for ProcessDir {
    fn current(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }

    fn change(&mut self, path: &Path) -> io::Result<()> {
        std::env::set_current_dir(path)
    }
}

/// A working directory that only exists in memory.
///
/// Clones share the same path, so a test can move the directory behind a
/// session's back.
#[derive(Debug, Clone)]
pub struct VirtualDir {
    path: Arc<Mutex<PathBuf>>,
}

impl VirtualDir {
    /// Starts at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(Mutex::new(path.into())),
        }
    }

    /// The current path.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WorkingDir for VirtualDir {
    fn current(&self) -> io::Result<PathBuf> {
        Ok(self.path())
    }

    fn change(&mut self, path: &Path) -> io::Result<()> {
        *self.path.lock().unwrap_or_else(PoisonError::into_inner) = path.to_path_buf();
        Ok(())
    }
}
