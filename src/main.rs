use log::{error, info};
use sorption_analysis::Sorption::pipeline::AnalysisContext;
use sorption_analysis::Sorption::run_parameters::RunParameters;
use sorption_analysis::Utils::logging::{init_logging, level_from_str};
use sorption_analysis::cli::cli_main::run_interactive_menu;
use std::path::{Path, PathBuf};

/// `SORPTION_LOG` sets the verbosity, `SORPTION_LOG_FILE` adds a debug log file.
/// An optional first argument is a JSON file of run parameters.
pub fn main() {
    let level = level_from_str(&std::env::var("SORPTION_LOG").unwrap_or_default());
    let log_file = std::env::var("SORPTION_LOG_FILE").ok().map(PathBuf::from);
    if let Err(e) = init_logging(level, log_file.as_deref()) {
        eprintln!("{}", e);
    }

    let params = match std::env::args().nth(1) {
        Some(path) => match RunParameters::from_json_file(Path::new(&path)) {
            Ok(params) => {
                info!("run parameters read from {}", path);
                params
            }
            Err(e) => {
                error!("{}, using defaults", e);
                RunParameters::new()
            }
        },
        None => RunParameters::new(),
    };
    run_interactive_menu(AnalysisContext::new(params));
}
