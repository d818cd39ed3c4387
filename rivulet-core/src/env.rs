//! Environment Queries
//!
//! A read-only mode flag plus a key-value mock registry, consulted only to
//! decide how chatty diagnostics should be. Core behavior is identical in
//! every mode.

use std::sync::OnceLock;

use dashmap::DashMap;

/// Environment variable that selects the mode (`dev`, `test`, anything
/// else means `prod`).
pub const MODE_VAR: &str = "RIVULET_MODE";

/// The running mode, resolved once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Test,
    Prod,
}

impl Mode {
    /// The process-wide mode. Read from [`MODE_VAR`] on first use and
    /// cached; defaults to [`Mode::Prod`].
    pub fn current() -> Mode {
        static MODE: OnceLock<Mode> = OnceLock::new();
        *MODE.get_or_init(|| match std::env::var(MODE_VAR).ok().as_deref() {
            Some("dev") => Mode::Dev,
            Some("test") => Mode::Test,
            _ => Mode::Prod,
        })
    }
}

pub fn is_dev() -> bool {
    Mode::current() == Mode::Dev
}

pub fn is_test() -> bool {
    Mode::current() == Mode::Test
}

pub fn is_prod() -> bool {
    Mode::current() == Mode::Prod
}

fn mocks() -> &'static DashMap<String, String> {
    static MOCKS: OnceLock<DashMap<String, String>> = OnceLock::new();
    MOCKS.get_or_init(DashMap::new)
}

/// Look up a mocked value.
pub fn mock(key: &str) -> Option<String> {
    mocks().get(key).map(|entry| entry.value().clone())
}

/// Register a mocked value for diagnostics and tests.
pub fn set_mock(key: impl Into<String>, value: impl Into<String>) {
    mocks().insert(key.into(), value.into());
}

/// Drop every registered mock.
pub fn clear_mocks() {
    mocks().clear();
}
