//! # Pid file with exclusive advisory lock.
//!
//! The supervisor refuses to start when the pid file already exists
//! (`O_CREAT|O_EXCL`), takes an exclusive `flock` on the open descriptor for
//! its whole lifetime, and writes its pid followed by a newline. Remote
//! control front-ends read the pid from this file; the lock lets them detect
//! a live supervisor.
//!
//! The file is removed (unlink, then unlock and close) at shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::error::SupervisorError;

/// An open, exclusively locked pid file.
#[derive(Debug)]
pub(crate) struct PidFile {
    lock: Flock<File>,
    path: PathBuf,
}

impl PidFile {
    /// Creates the pid file, locks it, and writes the current pid.
    ///
    /// Fails with `AlreadyExists` when another supervisor owns the path.
    pub(crate) fn create(path: &Path) -> Result<Self, SupervisorError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| SupervisorError::PidFile {
                path: path.to_path_buf(),
                source,
            })?;

        let mut lock =
            Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| {
                SupervisorError::PidFileLock {
                    path: path.to_path_buf(),
                    errno,
                }
            })?;

        writeln!(lock, "{}", std::process::id()).map_err(|source| SupervisorError::PidFile {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            lock,
            path: path.to_path_buf(),
        })
    }

    /// Unlinks the file, then releases the lock by closing the descriptor.
    pub(crate) fn remove(self) {
        let _ = std::fs::remove_file(&self.path);
        drop(self.lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_pid_and_removes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.pid");

        let pf = PidFile::create(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("{}\n", std::process::id()));

        pf.remove();
        assert!(!path.exists());
    }

    #[test]
    fn refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.pid");
        std::fs::write(&path, "12345\n").unwrap();

        let err = PidFile::create(&path).unwrap_err();
        match err {
            SupervisorError::PidFile { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::AlreadyExists);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
