/// eng
/// Reduction of CO2 capture experiments: a time-indexed run table (mass-spectrometer signals,
/// optionally merged reactor-controller channels) plus the boundaries of each cycle go in, an
/// augmented run table and a per-cycle table of capacity and kinetics metrics come out.
///
/// Stages, always run in this order by the pipeline:
/// 1) signal derivation (mole fraction, concentration, molar flows, absorbed increments)
/// 2) cycle window resolution (breakthrough crossings combined with manual cuts)
/// 3) capacity integration
/// 4) dry kinetics (closed-form humidity/CO2 mass balance)
/// 5) wet kinetics (zero-intercept regression over residence time)
/// ----------------------------------------------------------------
/// # Examples
/// ```
/// use sorption_analysis::Sorption::pipeline::AnalysisContext;
/// use sorption_analysis::Sorption::run_parameters::RunParameters;
/// use sorption_analysis::Sorption::run_table::RunTable;
/// use sorption_analysis::Sorption::cycle_windows::{Boundary, CycleSpan};
/// use chrono::{NaiveDate, TimeDelta};
///
/// let t0 = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let stamps: Vec<_> = (0..10).map(|i| t0 + TimeDelta::seconds(30 * i)).collect();
/// let mut table = RunTable::new(stamps.clone());
/// let co2 = vec![0.0, 0.0, 0.001, 0.01, 0.03, 0.05, 0.08, 0.1, 0.12, 0.13];
/// table.insert_column("CO2", co2).unwrap();
/// table.insert_column("N2", vec![1.0; 10]).unwrap();
/// let span = CycleSpan { cycle: 1, start: stamps[0], end: stamps[9] };
///
/// let mut ctx = AnalysisContext::new(RunParameters::new());
/// ctx.load_run(table, vec![span]).unwrap();
/// ctx.set_override(1, Boundary::SorptionEnd, 3.5).unwrap();
/// let row = ctx.cycle_table().get(1).unwrap();
/// assert!(row.capacity.absorbed_mol >= 0.0);
/// assert_eq!(row.window.sorption_end, 3.5);
/// ```
pub mod pipeline;
/// tests
pub mod pipeline_tests;
/// run table: timestamps plus named f64 columns, as-of merges
pub mod run_table;
/// validated run parameters and calibration constants
pub mod run_parameters;
pub mod physical_constants;
/// derived CO2 channels computed from the raw species signals
pub mod signal_derivation;
/// breakthrough detection, manual cuts and the four resolved window edges of a cycle
pub mod cycle_windows;
pub mod capacity;
/// wet kinetics: residence-time trace and zero-intercept least squares
pub mod kinetics_wet;
pub mod kinetics_dry;
/// per-cycle result table
pub mod cycle_table;
pub mod analysis_error;
