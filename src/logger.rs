//! log4rs setup for the server process.

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

use crate::config::LogConfig;

pub const AUDIT_TARGET: &str = "resik::audit";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(dir: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder().build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the logging config: console always, plus `app.log` and `audit.log` (rolled by size)
/// when a directory is configured. Audit records go only to the audit file when there is one.
///
/// # Errors
/// Returns an error if the log directory cannot be created or an appender fails to build.
pub fn build_config(cfg: &LogConfig, debug: bool) -> Result<Config, Box<dyn std::error::Error>> {
    let level = if debug { LevelFilter::Debug.max(parse_level(&cfg.level)) } else { parse_level(&cfg.level) };
    let console = ConsoleAppender::builder().encoder(Box::new(PatternEncoder::new(PATTERN))).build();
    let mut builder = Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(dir) = &cfg.dir {
        std::fs::create_dir_all(dir)?;
        let keep = cfg.retention.max(1);
        builder = builder
            .appender(Appender::builder().build("app", Box::new(rolling(dir, "app", keep)?)))
            .appender(Appender::builder().build("audit", Box::new(rolling(dir, "audit", keep)?)))
            .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, LevelFilter::Info));
        root = root.appender("app");
    }
    Ok(builder.build(root.build(level))?)
}

/// Installs the global logger. A configured log4rs YAML file takes over completely.
///
/// # Errors
/// Returns an error if the config cannot be built or a logger is already installed.
pub fn init(cfg: &LogConfig, debug: bool) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(file) = &cfg.config_file {
        return init_file(file);
    }
    log4rs::init_config(build_config(cfg, debug)?)?;
    Ok(())
}

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Returns an error if the file is missing or invalid.
pub fn init_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}
