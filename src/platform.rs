//! Platform services the recorder needs: wall clock, directory creation and
//! the byte sink behind each output file.

use chrono::DateTime;
use chrono::Local;
use std::fs;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

#[cfg(not(windows))]
pub const DEFAULT_RECORD_DIR: &str = "/media/usb/pcap";
#[cfg(windows)]
pub const DEFAULT_RECORD_DIR: &str = ".\\pcap";

pub trait Platform {
    fn now(&self) -> DateTime<Local>;
    /// Create `path` and all missing parents. Existing directories are fine.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Create (or truncate) the file at `path` and return the sink records
    /// are written to.
    fn create_file(&self, path: &Path) -> io::Result<Box<dyn Write>> {
        let fs = File::create(path)?;
        Ok(Box::new(BufWriter::new(fs)))
    }
    fn record_dir(&self) -> PathBuf {
        PathBuf::from(DEFAULT_RECORD_DIR)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPlatform;

impl Platform for SystemPlatform {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        SystemPlatform.create_dir_all(&nested).unwrap();
        // second call is a no-op
        SystemPlatform.create_dir_all(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn created_file_is_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.pcap");
        fs::write(&path, b"stale contents").unwrap();
        let mut sink = SystemPlatform.create_file(&path).unwrap();
        sink.write_all(b"new").unwrap();
        drop(sink);
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }
}
