/// eng
/// File parsers that turn instrument exports into a run table and its cycle boundaries:
/// 1) the quadrupole mass-spectrometer export (compound signals, one cycle per file)
/// 2) the daily reactor-controller logs (mass flows, phase identifier, completed-cycle counter),
///    merged onto the mass-spec samples and defining the cycles
/// 3) the thermocouple logger export, merged the same way
/// ----------------------------------------------------------------
/// # Examples
/// ```no_run
/// use sorption_analysis::Ingest::mass_spec_parser::load_mass_spec;
/// use sorption_analysis::Ingest::reactor_log::merge_reactor_log;
/// use std::path::Path;
///
/// let run = load_mass_spec(Path::new("runs/2024-05-01_qms.csv")).unwrap();
/// let merged = merge_reactor_log(&run.table, Path::new("runs/backend")).unwrap();
/// println!("{} cycles, channels {:?}", merged.cycles.len(), merged.parameters);
/// ```
pub mod mass_spec_parser;
pub mod reactor_log;
pub mod temperature_log;
/// timestamp shapes and numeric cells
pub mod timestamps;
pub mod ingest_error;
