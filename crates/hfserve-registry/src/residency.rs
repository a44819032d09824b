//! Memory residency of collection files.
//!
//! `Locked` and `Mapped` collections are memory-mapped read-only; `Locked`
//! additionally pins every mapped page with `mlock`. A failed lock is a
//! startup error, never a silent fallback to `Mapped`. `Disk` collections
//! keep an open file handle and are read with positioned reads.

use crate::error::ResidencyError;
use crate::spec::ResidencyMode;
use memmap2::{Mmap, MmapOptions};
use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

enum Backing {
    Mapped { map: Mmap, locked: bool },
    Disk(File),
}

/// A collection file held in its requested residency mode.
///
/// Dropping it unlocks (if locked) and unmaps the file.
pub struct ResidentFile {
    path: PathBuf,
    mode: ResidencyMode,
    len: u64,
    backing: Backing,
}

impl std::fmt::Debug for ResidentFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResidentFile")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("len", &self.len)
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl ResidentFile {
    /// Open `path` and establish `mode`.
    pub fn load(path: &Path, mode: ResidencyMode) -> Result<Self, ResidencyError> {
        let open_error = |source| ResidencyError::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_error)?;
        let len = file.metadata().map_err(open_error)?.len();
        if len == 0 {
            return Err(ResidencyError::Empty {
                path: path.to_path_buf(),
            });
        }

        let backing = match mode {
            ResidencyMode::Disk => Backing::Disk(file),
            ResidencyMode::Mapped | ResidencyMode::Locked => {
                #[allow(unsafe_code)]
                let map = unsafe {
                    MmapOptions::new()
                        .map(&file)
                        .map_err(|source| ResidencyError::Map {
                            path: path.to_path_buf(),
                            source,
                        })?
                };

                let locked = mode == ResidencyMode::Locked;
                if locked {
                    lock_pages(&map, path, len)?;
                }
                Backing::Mapped { map, locked }
            }
        };

        info!(
            "Loaded {} ({} bytes, {})",
            path.display(),
            len,
            mode.as_str()
        );

        Ok(Self {
            path: path.to_path_buf(),
            mode,
            len,
            backing,
        })
    }

    /// Local path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Residency mode in effect.
    pub const fn mode(&self) -> ResidencyMode {
        self.mode
    }

    /// File size in bytes.
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Always false: empty files are rejected at load time.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the mapped pages are pinned in memory.
    pub const fn is_locked(&self) -> bool {
        matches!(self.backing, Backing::Mapped { locked: true, .. })
    }

    /// The whole file, when it is memory-mapped.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match &self.backing {
            Backing::Mapped { map, .. } => Some(&map[..]),
            Backing::Disk(_) => None,
        }
    }

    /// Read `len` bytes at `offset`.
    ///
    /// Borrows from the map when mapped; reads into a fresh buffer from disk
    /// otherwise. Ranges past the end of the file fail with `UnexpectedEof`.
    pub fn read_at(&self, offset: u64, len: usize) -> io::Result<Cow<'_, [u8]>> {
        let end = offset
            .checked_add(len as u64)
            .filter(|end| *end <= self.len)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "range {offset}+{len} exceeds file size {} of {}",
                        self.len,
                        self.path.display()
                    ),
                )
            })?;

        match &self.backing {
            Backing::Mapped { map, .. } => {
                Ok(Cow::Borrowed(&map[offset as usize..end as usize]))
            }
            Backing::Disk(file) => {
                let mut buf = vec![0u8; len];
                read_exact_at(file, &mut buf, offset)?;
                Ok(Cow::Owned(buf))
            }
        }
    }
}

impl Drop for ResidentFile {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Backing::Mapped { map, locked: true } = &self.backing
            && let Err(e) = map.unlock()
        {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
        debug!("Released {}", self.path.display());
    }
}

#[cfg(unix)]
fn lock_pages(map: &Mmap, path: &Path, size: u64) -> Result<(), ResidencyError> {
    lock_with(map, path, size, Mmap::lock)
}

#[cfg(unix)]
fn lock_with<F>(map: &Mmap, path: &Path, size: u64, lock: F) -> Result<(), ResidencyError>
where
    F: FnOnce(&Mmap) -> io::Result<()>,
{
    lock(map).map_err(|source| ResidencyError::Lock {
        path: path.to_path_buf(),
        size,
        limit: memlock_limit(),
        source,
    })
}

#[cfg(not(unix))]
fn lock_pages(_map: &Mmap, _path: &Path, _size: u64) -> Result<(), ResidencyError> {
    Err(ResidencyError::Unsupported {
        mode: ResidencyMode::Locked,
    })
}

/// Current `RLIMIT_MEMLOCK` soft limit in bytes; `u64::MAX` means unlimited.
#[cfg(unix)]
#[allow(clippy::useless_conversion)]
pub fn memlock_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    #[allow(unsafe_code)]
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, &raw mut limit) };
    if rc != 0 {
        return None;
    }
    if limit.rlim_cur == libc::RLIM_INFINITY {
        return Some(u64::MAX);
    }
    u64::try_from(limit.rlim_cur).ok()
}

/// Current `RLIMIT_MEMLOCK` soft limit; unavailable on this platform.
#[cfg(not(unix))]
pub fn memlock_limit() -> Option<u64> {
    None
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_disk_mode_reads_without_mapping() {
        let file = fixture(b"0123456789");
        let resident = ResidentFile::load(file.path(), ResidencyMode::Disk).unwrap();

        assert_eq!(resident.len(), 10);
        assert!(resident.as_slice().is_none());
        assert!(!resident.is_locked());
        assert_eq!(&resident.read_at(2, 3).unwrap()[..], b"234");
        assert!(matches!(resident.read_at(2, 3).unwrap(), Cow::Owned(_)));
    }

    #[test]
    fn test_mapped_mode_borrows_from_map() {
        let file = fixture(b"0123456789");
        let resident = ResidentFile::load(file.path(), ResidencyMode::Mapped).unwrap();

        assert_eq!(resident.as_slice().unwrap(), b"0123456789");
        assert!(!resident.is_locked());
        let bytes = resident.read_at(7, 3).unwrap();
        assert!(matches!(bytes, Cow::Borrowed(_)));
        assert_eq!(&bytes[..], b"789");
    }

    #[cfg(unix)]
    #[test]
    fn test_locked_mode_pins_pages() {
        let file = fixture(b"small enough to lock under any default limit");
        let resident = ResidentFile::load(file.path(), ResidencyMode::Locked).unwrap();

        assert!(resident.is_locked());
        assert_eq!(resident.mode(), ResidencyMode::Locked);
    }

    #[test]
    fn test_read_past_end_fails() {
        let file = fixture(b"0123456789");
        for mode in [ResidencyMode::Disk, ResidencyMode::Mapped] {
            let resident = ResidentFile::load(file.path(), mode).unwrap();
            let err = resident.read_at(8, 3).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
            assert!(resident.read_at(u64::MAX, 1).is_err());
        }
    }

    #[test]
    fn test_missing_file() {
        let result = ResidentFile::load(Path::new("/nonexistent/a.hfst"), ResidencyMode::Disk);
        assert!(matches!(result, Err(ResidencyError::Open { .. })));
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = fixture(b"");
        let result = ResidentFile::load(file.path(), ResidencyMode::Mapped);
        assert!(matches!(result, Err(ResidencyError::Empty { .. })));
    }

    #[cfg(unix)]
    #[test]
    #[allow(clippy::panic)]
    fn test_refused_lock_reports_size_and_limit() {
        let file = fixture(b"0123456789");
        let handle = File::open(file.path()).unwrap();
        #[allow(unsafe_code)]
        let map = unsafe { MmapOptions::new().map(&handle).unwrap() };

        let err = lock_with(&map, file.path(), 10, |_| {
            Err(io::Error::from_raw_os_error(libc::ENOMEM))
        })
        .unwrap_err();

        let ResidencyError::Lock {
            path, size, limit, ..
        } = &err
        else {
            panic!("expected a lock error, got {err:?}");
        };
        assert_eq!(path, file.path());
        assert_eq!(*size, 10);
        assert_eq!(*limit, memlock_limit());

        let message = err.to_string();
        assert!(message.contains("RLIMIT_MEMLOCK"), "{message}");
        assert!(message.contains("ulimit -l"), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_lock_passes_through() {
        let file = fixture(b"0123456789");
        let handle = File::open(file.path()).unwrap();
        #[allow(unsafe_code)]
        let map = unsafe { MmapOptions::new().map(&handle).unwrap() };

        assert!(lock_with(&map, file.path(), 10, |_| Ok(())).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_memlock_limit_is_readable() {
        assert!(memlock_limit().is_some());
    }
}
