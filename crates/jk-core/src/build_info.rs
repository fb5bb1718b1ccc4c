//! Build-time metadata baked into the binary.

/// Package version reported in `jk version` and request headers.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source revision, when the build pipeline provides it.
pub const COMMIT: &str = match option_env!("JK_BUILD_COMMIT") {
    Some(commit) => commit,
    None => "",
};

/// Build timestamp, when the build pipeline provides it.
pub const DATE: &str = match option_env!("JK_BUILD_DATE") {
    Some(date) => date,
    None => "",
};

pub fn user_agent() -> String {
    format!("jk/{VERSION}")
}
