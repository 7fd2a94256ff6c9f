/// logger initialisation for the binary (terminal, optionally a log file)
pub mod logging;
/// console tables of cycle metrics, run parameters, manual cuts and column lists
pub mod cycle_report;
