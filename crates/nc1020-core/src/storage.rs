use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::mmu::BANK_SIZE;

pub const ROM_FILE_NAME: &str = "obj_lu.bin";
pub const NOR_FILE_NAME: &str = "nc1020.fls";
pub const STATE_FILE_NAME: &str = "nc1020.sts";

const HALF_BANK: usize = BANK_SIZE / 2;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cannot open {}: {source}", .path.display())]
    FileUnavailable { path: PathBuf, source: io::Error },

    #[error("{} is truncated: expected {expected} bytes, found {actual}", .path.display())]
    TruncatedRead {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Locations of the ROM image, NOR image and state snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoragePaths {
    pub rom: PathBuf,
    pub nor: PathBuf,
    pub state: PathBuf,
}

impl StoragePaths {
    /// Standard file names inside `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            rom: dir.join(ROM_FILE_NAME),
            nor: dir.join(NOR_FILE_NAME),
            state: dir.join(STATE_FILE_NAME),
        }
    }
}

/// Swap the 16KB halves of every 32KB block. Images are stored on disk in
/// this order; applying the swap twice restores the input.
pub fn block_swap(data: &mut [u8]) {
    for block in data.chunks_exact_mut(BANK_SIZE) {
        let (low, high) = block.split_at_mut(HALF_BANK);
        low.swap_with_slice(high);
    }
}

/// Read the first `size` bytes of an image file and decode them.
pub fn read_image(path: &Path, size: usize) -> Result<Vec<u8>, StorageError> {
    let mut data = fs::read(path).map_err(|source| StorageError::FileUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    if data.len() < size {
        return Err(StorageError::TruncatedRead {
            path: path.to_path_buf(),
            expected: size,
            actual: data.len(),
        });
    }
    data.truncate(size);
    block_swap(&mut data);
    Ok(data)
}

/// Encode `data` and write it to `path`.
pub fn write_image(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut encoded = data.to_vec();
    block_swap(&mut encoded);
    write_file(path, &encoded)
}

/// Snapshot bytes, or `None` when no snapshot has been saved yet.
pub fn read_state(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::FileUnavailable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn write_file(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    fs::write(path, data).map_err(|source| StorageError::WriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove `path`, treating an already missing file as success.
pub fn remove_file(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StorageError::WriteFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}
