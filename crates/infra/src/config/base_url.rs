//! Base URL selection from the API configuration.

use quire_domain::constants::{
    ANDROID_EMULATOR_BASE_URL, DEV_URL_SENTINEL, LOCAL_BASE_URL, PRODUCTION_BASE_URL,
};
use quire_domain::{ApiConfig, Environment, Platform};

/// Resolve the base URL the client talks to.
///
/// An explicit URL wins unless it is empty or the `DEV` sentinel. Otherwise
/// mobile development builds point at the local server (through the emulator
/// host alias on Android) and everything else at the public API.
pub fn resolve_base_url(config: &ApiConfig) -> String {
    if let Some(url) = config.url.as_deref().map(str::trim) {
        if !url.is_empty() && url != DEV_URL_SENTINEL {
            return url.to_string();
        }
    }

    match (config.environment, config.platform) {
        (Environment::Development, Platform::Android) => ANDROID_EMULATOR_BASE_URL.to_string(),
        (Environment::Development, Platform::Ios) => LOCAL_BASE_URL.to_string(),
        (Environment::Development, Platform::Desktop) | (Environment::Production, _) => {
            PRODUCTION_BASE_URL.to_string()
        }
    }
}
