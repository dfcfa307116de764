// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "promwrite";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".promwrite";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "promwrite.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "PROMWRITE_CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "PROMWRITE_DEBUG";

/// Environment variable for server host
pub const ENV_HOST: &str = "PROMWRITE_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "PROMWRITE_PORT";

/// Environment variable for the remote-write endpoint path
pub const ENV_WRITE_PATH: &str = "PROMWRITE_WRITE_PATH";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "PROMWRITE_LOG";

/// Environment variable for a capacity applied to every queue
pub const ENV_QUEUE_CAPACITY: &str = "PROMWRITE_QUEUE_CAPACITY";

/// Environment variable for the Retry-After advisory
pub const ENV_RETRY_AFTER_SECS: &str = "PROMWRITE_RETRY_AFTER_SECS";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 9201;

/// Default remote-write endpoint path
pub const DEFAULT_WRITE_PATH: &str = "/api/v1/write";

/// Health endpoint path
pub const HEALTH_PATH: &str = "/health";

/// Protocol version header sent by remote-write clients
pub const REMOTE_WRITE_VERSION_HEADER: &str = "x-prometheus-remote-write-version";

// =============================================================================
// Request Body Limits
// =============================================================================

/// Compressed body limit for the write endpoint (10 MB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Decompressed body limit (32 MB)
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 32 * 1024 * 1024;

// =============================================================================
// Dispatch Queues
// =============================================================================

/// Default series queue capacity (items)
pub const DEFAULT_SERIES_QUEUE_CAPACITY: usize = 10_000;

/// Default sample queue capacity (items)
pub const DEFAULT_SAMPLE_QUEUE_CAPACITY: usize = 100_000;

/// Default exemplar queue capacity (items)
pub const DEFAULT_EXEMPLAR_QUEUE_CAPACITY: usize = 10_000;

/// Default histogram queue capacity (items)
pub const DEFAULT_HISTOGRAM_QUEUE_CAPACITY: usize = 10_000;

/// Retry-After header value on 429/503 (in seconds)
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
