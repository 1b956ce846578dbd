use std::{io::Write, path::Path};

use super::ReadingSink;
use crate::{
    error::SinkError,
    misc::{FlagWatch, ReopenableFile},
    reading::Reading,
};

/// One JSON object per reading, one reading per line. reopened after log rotation
#[derive(Debug)]
pub struct FileSink {
    file: ReopenableFile,
    buf: Vec<u8>,
}

impl FileSink {
    pub fn open(path: &Path, rotate: FlagWatch) -> std::io::Result<Self> {
        Ok(Self {
            file: ReopenableFile::open(path, rotate)?,
            buf: Vec::with_capacity(256),
        })
    }
}

impl ReadingSink for FileSink {
    fn emit(&mut self, reading: &Reading) -> Result<(), SinkError> {
        self.buf.clear();
        serde_json::to_writer(&mut self.buf, reading)?;
        self.buf.push(b'\n');
        // a single write, so a line is never split across a rotation
        self.file.write_all(&self.buf)?;
        self.file.flush()?;
        Ok(())
    }
}
