//! Client constants
//!
//! Centralized location for endpoint paths, defaults and fixed messages used
//! throughout the client.

// Endpoints
pub const LOGIN_ENDPOINT: &str = "/users/login";
pub const REFRESH_ENDPOINT: &str = "/users/refresh";
pub const USERS_ENDPOINT: &str = "/users";
pub const USER_ROLES_ENDPOINT: &str = "/user-roles";
pub const ARTICLES_ENDPOINT: &str = "/articles";

// Request defaults
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const CONTENT_TYPE_JSON: &str = "application/json";

// Base URL defaults
pub const DEV_URL_SENTINEL: &str = "DEV";
pub const ANDROID_EMULATOR_BASE_URL: &str = "http://10.0.2.2:3100";
pub const LOCAL_BASE_URL: &str = "http://localhost:3100";
pub const PRODUCTION_BASE_URL: &str = "https://api.yourapp.com";

// Response cache
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_NAMESPACE: &str = "api_cache:";

// Token storage
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "quire.api";
pub const DEFAULT_KEYCHAIN_ACCOUNT: &str = "main";

// Messages
pub const NO_CONNECTIVITY_MESSAGE: &str =
    "No connection to the server. Check your internet connection.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please sign in again";
