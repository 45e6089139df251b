pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_line() -> String {
    format!("HookVerify CLI v{VERSION}")
}
