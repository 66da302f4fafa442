use std::time::Duration;

pub const DEFAULT_PORT: u16 = 6767;

pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
pub const RATE_LIMIT_MAX_CONNECTIONS: usize = 5;

pub const SUPERVISOR_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const INACTIVITY_WARN_THRESHOLD: Duration = Duration::from_secs(240);
pub const INACTIVITY_EVICT_THRESHOLD: Duration = Duration::from_secs(300);

pub const DEFAULT_TERMINAL_HEIGHT: u32 = 24;
pub const VISIBLE_LINES_FALLBACK: usize = 20;
pub const VISIBLE_LINES_FLOOR: u32 = 5;
pub const VISIBLE_LINES_HEIGHT_OFFSET: u32 = 18;

pub const RULE_WIDTH: usize = 78;
pub const SAVE_LOG_BANNER_WIDTH: usize = 60;
