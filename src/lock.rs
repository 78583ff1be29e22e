//! Build directory locking
//!
//! Several processes may build the same library at once, for example from
//! separate jobs of an outer build. Each one needs a private build directory.
//! The first candidate (`build`) is tried with a non-blocking exclusive lock
//! on a `.lock` file inside it; if another process holds it, numbered
//! siblings (`build-1`, `build-2`, ...) are tried in turn. Builds therefore
//! run side by side instead of waiting for each other.
//!
//! Locks are released when the [`BuildDirLock`] is dropped.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::error::{Error, Result};

/// Name of the sentinel file locked inside a build directory
pub const LOCK_FILE_NAME: &str = ".lock";

/// An acquired lock; dropping it releases the lock.
pub trait LockHandle: Send {}

impl LockHandle for File {}

/// Trait for taking non-blocking exclusive locks - allows faking in tests
pub trait LockProvider {
    /// Try to lock `lock_file`, creating it and its parent directories.
    ///
    /// Returns `Ok(None)` when another holder owns the lock.
    fn try_lock(&self, lock_file: &Path) -> io::Result<Option<Box<dyn LockHandle>>>;
}

/// OS file locks through `fs4`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLockProvider;

/// Attempts to reopen a lock file that was replaced while being locked
const STALE_LOCK_RETRIES: usize = 4;

impl LockProvider for FileLockProvider {
    fn try_lock(&self, lock_file: &Path) -> io::Result<Option<Box<dyn LockHandle>>> {
        for _ in 0..STALE_LOCK_RETRIES {
            let file = open_lock_file(lock_file)?;
            match claim(file, lock_file)? {
                Claim::Locked(file) => return Ok(Some(Box::new(file))),
                Claim::Busy => return Ok(None),
                Claim::Stale => {
                    log::debug!("{} was replaced while locking, reopening", lock_file.display());
                }
            }
        }
        Ok(None)
    }
}

/// Outcome of locking an opened lock file
#[derive(Debug)]
enum Claim {
    Locked(File),
    Busy,
    /// Locked, but `lock_file` no longer names the opened file
    Stale,
}

/// Lock `file`, which was opened from `lock_file`.
///
/// Another process may delete the directory between our open and our lock;
/// the lock then guards an unlinked file and is worthless.
fn claim(file: File, lock_file: &Path) -> io::Result<Claim> {
    match FileExt::try_lock_exclusive(&file) {
        Ok(true) => {}
        Ok(false) => return Ok(Claim::Busy),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Claim::Busy),
        Err(e) => return Err(e),
    }
    if is_same_file(&file, lock_file)? {
        Ok(Claim::Locked(file))
    } else {
        Ok(Claim::Stale)
    }
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// Windows cannot delete a file with an open handle, so the path still names it.
#[cfg(not(unix))]
fn is_same_file(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

fn open_lock_file(lock_file: &Path) -> io::Result<File> {
    let open = || -> io::Result<File> {
        if let Some(parent) = lock_file.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_file)
    };
    // The directory may vanish between creation and open when another process
    // sweeps it; one retry recreates it.
    match open() {
        Err(e) if e.kind() == io::ErrorKind::NotFound => open(),
        other => other,
    }
}

/// A locked build directory
pub struct BuildDirLock {
    dir: PathBuf,
    handle: Box<dyn LockHandle>,
}

impl std::fmt::Debug for BuildDirLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildDirLock").field("dir", &self.dir).finish()
    }
}

impl BuildDirLock {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }

    /// Release the lock and delete the directory.
    pub fn remove(self) -> io::Result<()> {
        let BuildDirLock { dir, handle } = self;
        remove_locked_dir(&dir, handle)
    }
}

/// Delete `dir` while holding its lock where the platform allows it, so no
/// other process can claim it half-deleted.
fn remove_locked_dir(dir: &Path, handle: Box<dyn LockHandle>) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(_) => {
            // Windows refuses to delete a file with an open handle.
            drop(handle);
            match fs::remove_dir_all(dir) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        }
    }
}

/// The `n`th candidate for `build_dir` under `source_dir`: `build`, `build-1`, ...
pub fn candidate_dir(source_dir: &Path, build_dir: &Path, n: usize) -> PathBuf {
    if n == 0 {
        return source_dir.join(build_dir);
    }
    let mut name = OsString::from(build_dir.as_os_str());
    name.push(format!("-{}", n));
    source_dir.join(name)
}

/// Whether `build_dir` is a relative path of plain names, so that every
/// candidate stays strictly inside the source directory.
pub fn is_valid_build_dir(build_dir: &Path) -> bool {
    !build_dir.as_os_str().is_empty()
        && build_dir
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// The first `max` candidates for `build_dir`.
///
/// Fails if any candidate would not be strictly inside `source_dir`; build
/// directories are purged and deleted.
pub fn candidates(source_dir: &Path, build_dir: &Path, max: usize) -> Result<Vec<PathBuf>> {
    let outside = |path: PathBuf| Error::Lock {
        path,
        message: format!(
            "build directory '{}' must be a relative path inside {}",
            build_dir.display(),
            source_dir.display()
        ),
    };
    if !is_valid_build_dir(build_dir) {
        return Err(outside(source_dir.join(build_dir)));
    }

    (0..max.max(1))
        .map(|n| {
            let dir = candidate_dir(source_dir, build_dir, n);
            if dir != source_dir && dir.starts_with(source_dir) {
                Ok(dir)
            } else {
                Err(outside(dir))
            }
        })
        .collect()
}

/// Lock the first available directory among `candidates`.
///
/// Returns `Ok(None)` when every candidate is held by someone else.
pub fn try_acquire<I>(provider: &dyn LockProvider, candidates: I) -> Result<Option<BuildDirLock>>
where
    I: IntoIterator<Item = PathBuf>,
{
    for dir in candidates {
        let lock_file = dir.join(LOCK_FILE_NAME);
        match provider.try_lock(&lock_file) {
            Ok(Some(handle)) => return Ok(Some(BuildDirLock { dir, handle })),
            Ok(None) => {
                log::debug!("{} is in use, trying the next directory", dir.display());
            }
            Err(e) => {
                return Err(Error::Lock {
                    path: lock_file,
                    message: e.to_string(),
                })
            }
        }
    }
    Ok(None)
}

/// Delete everything in `dir` except the lock file.
pub fn purge_except_lock(dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() == LOCK_FILE_NAME {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Remove numbered build directories that nobody holds a lock on.
///
/// Interrupted runs leave `build-N` directories behind; this reclaims them.
/// `keep` is never touched. Returns the number of directories removed.
pub fn sweep_stale(
    provider: &dyn LockProvider,
    source_dir: &Path,
    build_dir: &Path,
    max: usize,
    keep: &Path,
) -> usize {
    if !is_valid_build_dir(build_dir) {
        return 0;
    }
    let mut removed = 0;
    for n in 1..max.max(1) {
        let dir = candidate_dir(source_dir, build_dir, n);
        if dir == keep || !dir.is_dir() {
            continue;
        }
        match provider.try_lock(&dir.join(LOCK_FILE_NAME)) {
            Ok(Some(handle)) => match remove_locked_dir(&dir, handle) {
                Ok(()) => {
                    log::debug!("Removed stale build directory {}", dir.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove {}: {}", dir.display(), e),
            },
            Ok(None) => {}
            Err(e) => log::debug!("Skipping {}: {}", dir.display(), e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Token;
    impl LockHandle for Token {}

    /// Grants every lock except the ones listed as busy.
    struct FakeLocks {
        busy: HashSet<PathBuf>,
        attempts: Mutex<Vec<PathBuf>>,
    }

    impl FakeLocks {
        fn busy(paths: &[PathBuf]) -> Self {
            Self {
                busy: paths.iter().map(|p| p.join(LOCK_FILE_NAME)).collect(),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LockProvider for FakeLocks {
        fn try_lock(&self, lock_file: &Path) -> io::Result<Option<Box<dyn LockHandle>>> {
            self.attempts.lock().unwrap().push(lock_file.to_path_buf());
            if self.busy.contains(lock_file) {
                Ok(None)
            } else {
                Ok(Some(Box::new(Token)))
            }
        }
    }

    struct FailingLocks;
    impl LockProvider for FailingLocks {
        fn try_lock(&self, _lock_file: &Path) -> io::Result<Option<Box<dyn LockHandle>>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn test_candidate_names() {
        let src = Path::new("/src/SDL");
        assert_eq!(candidate_dir(src, Path::new("build"), 0), PathBuf::from("/src/SDL/build"));
        assert_eq!(candidate_dir(src, Path::new("build"), 2), PathBuf::from("/src/SDL/build-2"));
        assert_eq!(
            candidate_dir(src, Path::new("out/cmake"), 1),
            PathBuf::from("/src/SDL/out/cmake-1")
        );
        assert_eq!(candidates(src, Path::new("build"), 3).unwrap().len(), 3);
        assert_eq!(candidates(src, Path::new("build"), 0).unwrap().len(), 1);
    }

    #[test]
    fn test_try_acquire_first_free() {
        let locks = FakeLocks::busy(&[]);
        let lock = try_acquire(&locks, candidates(Path::new("/s"), Path::new("build"), 4).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(lock.dir(), Path::new("/s/build"));
        assert_eq!(locks.attempts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_try_acquire_falls_back_to_numbered_dirs() {
        let locks = FakeLocks::busy(&[PathBuf::from("/s/build"), PathBuf::from("/s/build-1")]);
        let lock = try_acquire(&locks, candidates(Path::new("/s"), Path::new("build"), 4).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(lock.dir(), Path::new("/s/build-2"));
        assert_eq!(lock.lock_file(), PathBuf::from("/s/build-2/.lock"));
    }

    #[test]
    fn test_try_acquire_exhausted() {
        let locks = FakeLocks::busy(&[PathBuf::from("/s/build"), PathBuf::from("/s/build-1")]);
        let lock = try_acquire(&locks, candidates(Path::new("/s"), Path::new("build"), 2).unwrap()).unwrap();
        assert!(lock.is_none());
    }

    #[test]
    fn test_try_acquire_propagates_provider_errors() {
        let err = try_acquire(&FailingLocks, vec![PathBuf::from("/s/build")]).unwrap_err();
        assert!(matches!(err, Error::Lock { .. }));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_file_locks_are_exclusive() {
        let temp = TempDir::new().unwrap();
        let lock_file = temp.path().join("build").join(LOCK_FILE_NAME);

        let first = FileLockProvider.try_lock(&lock_file).unwrap();
        assert!(first.is_some());
        assert!(lock_file.exists());

        let second = FileLockProvider.try_lock(&lock_file).unwrap();
        assert!(second.is_none());

        drop(first);
        assert!(FileLockProvider.try_lock(&lock_file).unwrap().is_some());
    }

    #[test]
    fn test_real_fallback_with_held_lock() {
        let temp = TempDir::new().unwrap();
        let held = try_acquire(
            &FileLockProvider,
            candidates(temp.path(), Path::new("build"), 4).unwrap(),
        )
        .unwrap()
        .unwrap();
        let next = try_acquire(
            &FileLockProvider,
            candidates(temp.path(), Path::new("build"), 4).unwrap(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(held.dir(), temp.path().join("build"));
        assert_eq!(next.dir(), temp.path().join("build-1"));
    }

    #[test]
    fn test_purge_keeps_only_lock_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        fs::write(dir.join(LOCK_FILE_NAME), "").unwrap();
        fs::write(dir.join("CMakeCache.txt"), "stale").unwrap();
        fs::create_dir_all(dir.join("CMakeFiles/sub")).unwrap();
        fs::write(dir.join("CMakeFiles/sub/x.o"), "o").unwrap();

        purge_except_lock(dir).unwrap();

        let names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from(LOCK_FILE_NAME)]);
    }

    #[test]
    fn test_remove_releases_and_deletes() {
        let temp = TempDir::new().unwrap();
        let lock = try_acquire(&FileLockProvider, vec![temp.path().join("build")])
            .unwrap()
            .unwrap();
        fs::write(lock.dir().join("Makefile"), "all:").unwrap();
        let dir = lock.dir().to_path_buf();

        lock.remove().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_sweep_removes_only_unlocked_numbered_dirs() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        for name in ["build", "build-1", "build-2", "build-3"] {
            fs::create_dir_all(src.join(name)).unwrap();
        }
        // build-2 is held by a concurrent build.
        let held = FileLockProvider
            .try_lock(&src.join("build-2").join(LOCK_FILE_NAME))
            .unwrap()
            .unwrap();

        let removed = sweep_stale(&FileLockProvider, src, Path::new("build"), 8, &src.join("build-3"));

        assert_eq!(removed, 1);
        assert!(src.join("build").exists());
        assert!(!src.join("build-1").exists());
        assert!(src.join("build-2").exists());
        assert!(src.join("build-3").exists());
        drop(held);
    }

    #[test]
    fn test_build_dir_must_stay_inside_source() {
        let src = Path::new("/src/SDL");
        for bad in ["", ".", "..", "../other", "build/../..", "/tmp/victim"] {
            assert!(!is_valid_build_dir(Path::new(bad)), "{:?} accepted", bad);
            let err = candidates(src, Path::new(bad), 4).unwrap_err();
            assert!(matches!(err, Error::Lock { .. }), "{:?}: {}", bad, err);
        }
        assert!(is_valid_build_dir(Path::new("out/cmake")));
    }

    #[test]
    fn test_sweep_ignores_invalid_build_dir() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("SDL");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("CMakeLists.txt"), "project(SDL3)").unwrap();
        let sibling = temp.path().join("SDL-1");
        fs::create_dir_all(&sibling).unwrap();

        assert_eq!(sweep_stale(&FileLockProvider, &src, Path::new(""), 4, &src), 0);
        assert_eq!(sweep_stale(&FileLockProvider, &src, Path::new("."), 4, &src), 0);
        assert!(src.join("CMakeLists.txt").exists());
        assert!(sibling.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_on_unlinked_file_is_stale() {
        let temp = TempDir::new().unwrap();
        let lock_file = temp.path().join("build-1").join(LOCK_FILE_NAME);
        let file = open_lock_file(&lock_file).unwrap();

        // A sweeper deletes the directory between our open and our lock.
        fs::remove_dir_all(temp.path().join("build-1")).unwrap();

        assert!(matches!(claim(file, &lock_file).unwrap(), Claim::Stale));
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_on_replaced_file_is_stale() {
        let temp = TempDir::new().unwrap();
        let lock_file = temp.path().join("build-1").join(LOCK_FILE_NAME);
        let file = open_lock_file(&lock_file).unwrap();

        // The directory is removed and recreated by another process.
        fs::remove_dir_all(temp.path().join("build-1")).unwrap();
        let other = FileLockProvider.try_lock(&lock_file).unwrap();
        assert!(other.is_some());

        assert!(matches!(claim(file, &lock_file).unwrap(), Claim::Stale));
        // The recreated lock is still held by its owner.
        assert!(FileLockProvider.try_lock(&lock_file).unwrap().is_none());
    }

    #[test]
    fn test_claim_on_current_file_locks() {
        let temp = TempDir::new().unwrap();
        let lock_file = temp.path().join("build").join(LOCK_FILE_NAME);
        let file = open_lock_file(&lock_file).unwrap();

        assert!(matches!(claim(file, &lock_file).unwrap(), Claim::Locked(_)));
    }
}
