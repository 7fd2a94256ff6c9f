use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::File;
use std::path::Path;

/// Parses a verbosity word as used on the command line; unknown words mean `Info`
pub fn level_from_str(text: &str) -> LevelFilter {
    match text.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Terminal logger at `level`, plus a file logger at `Debug` when `log_file` is given.
/// Called once by the binary.
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), String> {
    let term_config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        level,
        term_config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ));
    if let Some(path) = log_file {
        let file = File::create(path)
            .map_err(|e| format!("cannot create log file '{}': {}", path.display(), e))?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }
    CombinedLogger::init(loggers).map_err(|e| format!("logger already initialised: {}", e))
}
