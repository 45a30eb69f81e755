//! Byte sources: the read-only capability linearization pulls file bytes through.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// Random-access, read-only view of the bytes being described.
///
/// `read` must return exactly `length` bytes or fail; there are no partial reads.
pub trait ByteSource {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>>;

    /// File name, used only to guess a format from its extension.
    fn name(&self) -> Option<String> {
        None
    }
}

fn out_of_range(offset: u64, length: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("read of {} bytes at offset {} is out of range", length, offset),
    )
}

fn slice_range(len: usize, offset: u64, length: u64) -> io::Result<std::ops::Range<usize>> {
    let start = usize::try_from(offset).map_err(|_| out_of_range(offset, length))?;
    let n = usize::try_from(length).map_err(|_| out_of_range(offset, length))?;
    let end = start.checked_add(n).ok_or_else(|| out_of_range(offset, length))?;
    if end > len {
        return Err(out_of_range(offset, length));
    }
    Ok(start..end)
}

impl ByteSource for [u8] {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        let range = slice_range(self.len(), offset, length)?;
        Ok(self[range].to_vec())
    }
}

impl ByteSource for Vec<u8> {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        self.as_slice().read(offset, length)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        (**self).read(offset, length)
    }

    fn name(&self) -> Option<String> {
        (**self).name()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        (**self).read(offset, length)
    }

    fn name(&self) -> Option<String> {
        (**self).name()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Rc<T> {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        (**self).read(offset, length)
    }

    fn name(&self) -> Option<String> {
        (**self).name()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Arc<T> {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        (**self).read(offset, length)
    }

    fn name(&self) -> Option<String> {
        (**self).name()
    }
}

/// Lets the owner keep editing the bytes (`Rc<RefCell<Vec<u8>>>`) while a
/// cache reads them.
impl<T: ByteSource + ?Sized> ByteSource for RefCell<T> {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        self.borrow().read(offset, length)
    }

    fn name(&self) -> Option<String> {
        self.borrow().name()
    }
}

/// An in-memory buffer that carries a file name.
#[derive(Debug, Clone)]
pub struct NamedBytes {
    pub name: String,
    pub data: Vec<u8>,
}

impl NamedBytes {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        NamedBytes {
            name: name.into(),
            data,
        }
    }
}

impl ByteSource for NamedBytes {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        self.data.read(offset, length)
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }
}

/// Reads straight from a file on disk with seek + `read_exact`.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(FileSource { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl ByteSource for FileSource {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        let n = usize::try_from(length).map_err(|_| out_of_range(offset, length))?;
        let mut buf = vec![0u8; n];
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))?;
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}
