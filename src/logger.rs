//! log4rs wiring for hosts and the CLI. The library itself only emits through the
//! `log` facade under `querycast::*` targets.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::error::Error;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
pub const SQL_TARGET: &str = "querycast::sql";

pub const LOG4RS_FILE: &str = "log4rs.yaml";

/// Initializes logging from `log4rs.yaml` in the working directory.
pub fn init() -> Result<(), Box<dyn Error>> {
    init_path(Path::new(LOG4RS_FILE))
}

pub fn init_path(path: &Path) -> Result<(), Box<dyn Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn Error>> {
    let roller =
        FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Configure process-wide logging into `{dir}/querycast.log`.
/// - dir: base directory for logs; current directory when `None`
/// - level: off|error|warn|info|debug|trace
/// - retention: rolled files to keep (default 7)
/// - route_sql: send `querycast::sql` records to their own `sql.log` at trace level
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    route_sql: bool,
) -> Result<(), Box<dyn Error>> {
    let base = match dir {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);

    let mut builder =
        Config::builder().appender(Appender::builder().build("app", Box::new(rolling(&base, "querycast", keep)?)));
    if route_sql {
        builder = builder
            .appender(Appender::builder().build("sql", Box::new(rolling(&base, "sql", keep)?)))
            .logger(Logger::builder().appender("sql").additive(false).build(SQL_TARGET, LevelFilter::Trace));
    }

    let config = builder.build(Root::builder().appender("app").build(lvl))?;
    log4rs::init_config(config)?;
    Ok(())
}
