//! Pricewatch core crate.
//!
//! Current implemented scope:
//! - price snapshot fetch against the backend endpoint
//! - refresh scheduler with idempotent start/stop and a single in-flight fetch
//! - lifecycle gate driven by host activation and page visibility
//! - tabbed text rendering of the price grid

mod config;
mod fetcher;
mod lifecycle;
mod observability;
mod render;
mod scheduler;
mod snapshot;

pub use config::{
    widget_config_from_env, ConfigError, WidgetConfig, DEFAULT_ENDPOINT,
    DEFAULT_REFRESH_INTERVAL_MS,
};
pub use fetcher::{FetchError, HttpPriceFetcher, PriceFetcher};
pub use lifecycle::{
    HostEvent, LifecycleError, LifecycleGate, LifecycleSignal, Subscription, Visibility,
};
pub use observability::{
    init_logging, log_app_exit, log_app_start, log_scheduler_status, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use render::{
    format_price, item_label, tab_rows, tab_title, to_persian_digits, Renderer, TextRenderer,
};
pub use scheduler::{
    CycleTrigger, RefreshScheduler, RefreshState, SchedulerError, SchedulerHandle,
    SchedulerStatus, DEFAULT_REFRESH_INTERVAL,
};
pub use snapshot::{parse_category, Category, PriceSnapshot, ALL_CATEGORIES};
