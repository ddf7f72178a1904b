//! Pipeline defaults and well-known header names.

// Scheduler
pub const DEFAULT_MAX_CONCURRENCY: usize = 6;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;
pub const DEFAULT_HIGH_PRIORITY_RATIO: f64 = 0.3;

// Cache
pub const DEFAULT_MAX_MEMORY_ITEMS: usize = 100;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_CACHE_NAMESPACE: &str = "courier";

// Dedup
pub const DEFAULT_DEDUP_GRACE_MS: u64 = 1_000;

// Requests and retries
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_JITTER: f64 = 0.1;

// Headers
pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
pub const RETRY_AFTER_HEADER: &str = "Retry-After";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
