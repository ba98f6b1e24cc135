//! Application identity
//!
//! Branding strings live here so the firmware banner and the host tools
//! agree on them.

/// The application name
pub const APP_NAME: &str = "Field Recorder";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Boot banner printed once over RTT
pub const fn boot_banner() -> &'static str {
    concat!("Field Recorder v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_names_app_and_version() {
        assert!(boot_banner().starts_with(APP_NAME));
        assert!(boot_banner().ends_with(APP_VERSION));
    }
}
