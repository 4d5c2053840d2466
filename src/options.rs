//! Various options usable by binaries
//!
//! The structs in this module allow binaries to flatten them into
//! their own options struct. This allows for a unified yet non-cluttered
//! option set.

use crate::library::communication::trigger::TriggerConfig;
use crate::library::helpers::parse_millis;
use std::time::Duration;
use structopt::StructOpt;

/// Options for connecting to the Redis server
#[derive(Debug, StructOpt)]
pub struct RedisOptions {
    /// Redis database server URL
    #[structopt(
        short = "r",
        long = "redis",
        env = "REDIS",
        global = true,
        default_value = "redis://127.0.0.1/",
        value_name = "url"
    )]
    pub url: String,
}

/// Options controlling how long to wait for events
#[derive(Debug, StructOpt)]
pub struct TimeoutOptions {
    /// Milliseconds to wait for an event before giving up
    #[structopt(
        short = "t",
        long = "timeout",
        env = "DEFAULT_TIMEOUT",
        global = true,
        default_value = "10000",
        parse(try_from_str = parse_millis),
        value_name = "ms"
    )]
    pub timeout: Duration,
}

impl From<&TimeoutOptions> for TriggerConfig {
    fn from(options: &TimeoutOptions) -> Self {
        TriggerConfig::new(options.timeout)
    }
}
