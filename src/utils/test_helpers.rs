use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/// Installs a test-writer tracing subscriber, at most once per process.
///
/// Honors `RUST_LOG`. Safe to call from every test; later calls are no-ops and
/// a subscriber installed elsewhere is left alone.
pub fn setup_test_logging() {
    LOGGING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Returns true when the current process runs as root (UID 0).
/// Permission-denial tests cannot deny anything to root, so they skip.
#[cfg(test)]
#[inline]
pub fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and no side effects.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Returns true, after saying so on stderr, when a permission test has to skip.
#[cfg(test)]
pub fn skip_as_root(test_name: &str) -> bool {
    let skip = running_as_root();
    if skip {
        eprintln!("Skipping {}: permission checks are bypassed when running as root", test_name);
    }
    skip
}
