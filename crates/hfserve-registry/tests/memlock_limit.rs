//! Locked residency under a zero locked-memory limit.
//!
//! Lowering RLIMIT_MEMLOCK affects the whole process, so this lives in its
//! own test binary.

#![cfg(unix)]
#![allow(clippy::unwrap_used)]

use hfserve_registry::{
    CollectionSpec, Registry, ResidencyError, ResidencyMode, StartupError, TableWriter,
};
use tempfile::TempDir;

#[allow(unsafe_code)]
fn lower_memlock_limit_to_zero() -> bool {
    // Root (or CAP_IPC_LOCK) ignores the limit.
    if unsafe { libc::geteuid() } == 0 {
        return false;
    }

    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    unsafe {
        if libc::getrlimit(libc::RLIMIT_MEMLOCK, &raw mut limit) != 0 {
            return false;
        }
        limit.rlim_cur = 0;
        libc::setrlimit(libc::RLIMIT_MEMLOCK, &raw const limit) == 0
    }
}

#[tokio::test]
async fn test_zero_memlock_limit_is_fatal() {
    if !lower_memlock_limit_to_zero() {
        eprintln!("skipping: cannot lower RLIMIT_MEMLOCK for this process");
        return;
    }

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.hfst");
    let mut writer = TableWriter::new();
    writer.insert("k", "v").unwrap();
    writer.write_file(&path).unwrap();

    let result = Registry::build(&[CollectionSpec::new(
        "a",
        path.to_string_lossy(),
        ResidencyMode::Locked,
    )])
    .await;

    let err = result.unwrap_err();
    assert!(matches!(
        &err,
        StartupError::Residency {
            source: ResidencyError::Lock { limit: Some(0), .. },
            ..
        }
    ));
    let message = err.to_string();
    assert!(message.contains("RLIMIT_MEMLOCK"));
    assert!(message.contains("ulimit -l"));
}
