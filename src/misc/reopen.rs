use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use super::FlagWatch;

/// An append-only file that is closed and opened again (by path) whenever its flag is raised.
///
/// logrotate moves the file away and sends SIGHUP; after that the next write lands in a fresh file.
#[derive(Debug)]
pub struct ReopenableFile {
    path: PathBuf,
    file: File,
    reopen: FlagWatch,
}

impl ReopenableFile {
    pub fn open(path: impl Into<PathBuf>, reopen: FlagWatch) -> io::Result<Self> {
        let path = path.into();
        let file = Self::open_append(&path)?;
        Ok(Self { path, file, reopen })
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// reopen now, regardless of the flag
    pub fn reopen(&mut self) -> io::Result<()> {
        let _ = self.file.flush();
        self.file = Self::open_append(&self.path)?;
        Ok(())
    }

    fn reopen_if_requested(&mut self) -> io::Result<()> {
        if self.reopen.take() {
            self.reopen()?;
        }
        Ok(())
    }
}

impl Write for ReopenableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reopen_if_requested()?;
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
