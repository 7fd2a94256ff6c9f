//! # Pipeline Orchestrator
//!
//! `AnalysisContext` owns everything a sorption run consists of: the raw run table and cycle
//! spans from ingest, the validated run parameters, the manual cuts, and the last consistent
//! results (augmented run table + cycle table). It is the only writer of those results.
//!
//! Every mutation (file load, parameter edit, reference-gas change, manual cut) triggers a full
//! recompute through the fixed stage order in [`RECOMPUTE_ORDER`]:
//!
//! ```text
//! SignalDerivation -> CycleWindows -> Capacity -> DryKinetics -> WetKinetics
//! ```
//!
//! The recompute always starts from the raw table and builds a fresh snapshot; the snapshot is
//! committed only when all five stages succeed, so a failed load or edit leaves the previous
//! consistent state visible. A parameter text that does not parse as a number stops before any
//! stage runs and comes back as `AnalysisError::InvalidParameter`.
use crate::Sorption::analysis_error::AnalysisError;
use crate::Sorption::capacity::{CapacityMetrics, integrate_capacity};
use crate::Sorption::cycle_table::{CycleRecord, CycleTable};
use crate::Sorption::cycle_windows::{
    Boundary, CycleSpan, CycleWindow, OverrideOutcome, OverrideSet, resolve_windows,
};
use crate::Sorption::kinetics_dry::dry_rate_constants;
use crate::Sorption::kinetics_wet::{
    ACCUMULATED_ABSORBED, ACTIVE_VOLUME, RESIDENCE_TIME, WetKinetics, estimate_wet_kinetics,
};
use crate::Sorption::run_parameters::{CalibrationConstants, RunParameterField, RunParameters};
use crate::Sorption::run_table::RunTable;
use crate::Sorption::signal_derivation::derive_signals;
use log::{info, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SignalDerivation,
    CycleWindows,
    Capacity,
    DryKinetics,
    WetKinetics,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SignalDerivation => "signal derivation",
            Stage::CycleWindows => "cycle windows",
            Stage::Capacity => "capacity",
            Stage::DryKinetics => "dry kinetics",
            Stage::WetKinetics => "wet kinetics",
        };
        write!(f, "{}", name)
    }
}

/// Order in which a recompute runs the stages
pub const RECOMPUTE_ORDER: [Stage; 5] = [
    Stage::SignalDerivation,
    Stage::CycleWindows,
    Stage::Capacity,
    Stage::DryKinetics,
    Stage::WetKinetics,
];

/// Why a recompute was started
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecomputeTrigger {
    FileLoaded,
    ParameterEdited(RunParameterField),
    ReferenceGasChanged,
    OverrideChanged {
        cycle: usize,
        boundary: Boundary,
        outcome: OverrideOutcome,
    },
    OverridesRestored,
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// nothing loaded yet
    Empty,
    /// results reflect the current inputs
    Consistent,
}

/// Results of one complete recompute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub table: RunTable,
    pub cycles: CycleTable,
    pub derived_columns: Vec<String>,
    pub reference_used: String,
}

/// Intermediate state handed from stage to stage during one recompute
struct Scratch<'a> {
    spans: &'a [CycleSpan],
    params: &'a RunParameters,
    calibration: &'a CalibrationConstants,
    overrides: &'a OverrideSet,
    table: RunTable,
    derived_columns: Vec<String>,
    reference_used: String,
    windows: Vec<CycleWindow>,
    capacity: Vec<CapacityMetrics>,
    dry: Vec<f64>,
    wet: Vec<WetKinetics>,
}

impl Scratch<'_> {
    fn run_stage(&mut self, stage: Stage) -> Result<(), AnalysisError> {
        match stage {
            Stage::SignalDerivation => {
                let report = derive_signals(&mut self.table, self.params)?;
                self.reference_used = report.reference_used;
                self.derived_columns.extend(report.new_columns);
            }
            Stage::CycleWindows => {
                self.windows = resolve_windows(&self.table, self.spans, self.params, self.overrides)?;
            }
            Stage::Capacity => {
                self.capacity = self
                    .spans
                    .iter()
                    .zip(&self.windows)
                    .map(|(span, window)| {
                        integrate_capacity(&self.table, span, window, self.params, self.calibration)
                    })
                    .collect::<Result<_, _>>()?;
            }
            Stage::DryKinetics => {
                let plateaus: Vec<f64> = self
                    .capacity
                    .iter()
                    .map(|c| c.highest_sorption_point)
                    .collect();
                self.dry = dry_rate_constants(self.params, &plateaus);
            }
            Stage::WetKinetics => {
                let n = self.table.len();
                let mut accumulated = vec![f64::NAN; n];
                let mut active_volume = vec![f64::NAN; n];
                let mut residence_time = vec![f64::NAN; n];
                let mut wet = Vec::with_capacity(self.spans.len());
                for ((span, window), capacity) in
                    self.spans.iter().zip(&self.windows).zip(&self.capacity)
                {
                    let (kinetics, trace) = estimate_wet_kinetics(
                        &self.table,
                        span,
                        window,
                        capacity,
                        self.params,
                        self.calibration,
                    )?;
                    for (k, &i) in trace.rows.iter().enumerate() {
                        accumulated[i] = trace.accumulated[k];
                        active_volume[i] = trace.active_volume[k];
                        residence_time[i] = trace.residence_time[k];
                    }
                    wet.push(kinetics);
                }
                for (name, values) in [
                    (ACCUMULATED_ABSORBED, accumulated),
                    (ACTIVE_VOLUME, active_volume),
                    (RESIDENCE_TIME, residence_time),
                ] {
                    self.table.insert_column(name, values)?;
                    self.derived_columns.push(name.to_string());
                }
                self.wet = wet;
            }
        }
        Ok(())
    }

    fn into_snapshot(self) -> Snapshot {
        let rows = self
            .spans
            .iter()
            .enumerate()
            .map(|(i, span)| {
                CycleRecord::new(span, self.windows[i], self.capacity[i], self.wet[i], self.dry[i])
            })
            .collect();
        Snapshot {
            table: self.table,
            cycles: CycleTable::new(rows),
            derived_columns: self.derived_columns,
            reference_used: self.reference_used,
        }
    }
}

/// Runs all stages over the raw inputs. Pure: the same inputs give the same snapshot.
pub fn compute_snapshot(
    raw: &RunTable,
    spans: &[CycleSpan],
    params: &RunParameters,
    calibration: &CalibrationConstants,
    overrides: &OverrideSet,
) -> Result<Snapshot, AnalysisError> {
    let mut scratch = Scratch {
        spans,
        params,
        calibration,
        overrides,
        table: raw.clone(),
        derived_columns: Vec::new(),
        reference_used: String::new(),
        windows: Vec::new(),
        capacity: Vec::new(),
        dry: Vec::new(),
        wet: Vec::new(),
    };
    for stage in RECOMPUTE_ORDER {
        info!("stage '{}' started", stage);
        scratch.run_stage(stage)?;
        info!("stage '{}' finished", stage);
    }
    Ok(scratch.into_snapshot())
}

/// Owned, versioned analysis state of one run
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    raw: RunTable,
    spans: Vec<CycleSpan>,
    params: RunParameters,
    calibration: CalibrationConstants,
    overrides: OverrideSet,
    snapshot: Snapshot,
    state: PipelineState,
    version: u64,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new(RunParameters::default())
    }
}

impl AnalysisContext {
    pub fn new(params: RunParameters) -> Self {
        Self {
            raw: RunTable::default(),
            spans: Vec::new(),
            params,
            calibration: CalibrationConstants::default(),
            overrides: OverrideSet::default(),
            snapshot: Snapshot::default(),
            state: PipelineState::Empty,
            version: 0,
        }
    }

    pub fn with_calibration(mut self, calibration: CalibrationConstants) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Number of committed recomputes
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn parameters(&self) -> &RunParameters {
        &self.params
    }

    pub fn calibration(&self) -> &CalibrationConstants {
        &self.calibration
    }

    pub fn overrides(&self) -> &OverrideSet {
        &self.overrides
    }

    pub fn spans(&self) -> &[CycleSpan] {
        &self.spans
    }

    /// Table as delivered by ingest, without derived columns
    pub fn raw_table(&self) -> &RunTable {
        &self.raw
    }

    /// Raw table plus derived columns of the last consistent recompute
    pub fn run_table(&self) -> &RunTable {
        &self.snapshot.table
    }

    pub fn cycle_table(&self) -> &CycleTable {
        &self.snapshot.cycles
    }

    /// Names of the columns the pipeline added, for series selection
    pub fn derived_columns(&self) -> &[String] {
        &self.snapshot.derived_columns
    }

    /// Reference compound the last recompute actually used
    pub fn reference_used(&self) -> &str {
        &self.snapshot.reference_used
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn commit(&mut self, snapshot: Snapshot, trigger: RecomputeTrigger) {
        self.snapshot = snapshot;
        self.state = PipelineState::Consistent;
        self.version += 1;
        info!(
            "recompute #{} after {:?}: {} cycles",
            self.version,
            trigger,
            self.snapshot.cycles.len()
        );
    }

    /// Recomputes from the current inputs and commits on success
    fn recompute_with(&mut self, trigger: RecomputeTrigger) -> Result<(), AnalysisError> {
        if self.raw.is_empty() {
            return Err(AnalysisError::NoData);
        }
        info!("recompute triggered by {:?}", trigger);
        let snapshot = compute_snapshot(
            &self.raw,
            &self.spans,
            &self.params,
            &self.calibration,
            &self.overrides,
        )?;
        self.commit(snapshot, trigger);
        Ok(())
    }

    /// Collaborator entry point: recompute with unchanged inputs
    pub fn recompute(&mut self) -> Result<(), AnalysisError> {
        self.recompute_with(RecomputeTrigger::Requested)
    }

    /// Replaces the run with freshly ingested data. Cycles are renumbered 1..n in the order
    /// given; manual cuts are reset when the cycle count changes. On error nothing changes.
    pub fn load_run(&mut self, raw: RunTable, spans: Vec<CycleSpan>) -> Result<(), AnalysisError> {
        if raw.is_empty() {
            return Err(AnalysisError::NoData);
        }
        let spans: Vec<CycleSpan> = spans
            .into_iter()
            .enumerate()
            .map(|(i, span)| CycleSpan { cycle: i + 1, ..span })
            .collect();
        let mut overrides = self.overrides.clone();
        if overrides.fit_to(spans.len()) {
            info!("cycle count is now {}, manual cuts reset", spans.len());
        } else {
            overrides.validate(&spans);
        }
        let snapshot =
            compute_snapshot(&raw, &spans, &self.params, &self.calibration, &overrides)?;
        self.raw = raw;
        self.spans = spans;
        self.overrides = overrides;
        self.commit(snapshot, RecomputeTrigger::FileLoaded);
        Ok(())
    }

    /// Applies a text edit of one run parameter. Invalid text is reported and nothing is
    /// recomputed; before any data is loaded the value is only stored.
    pub fn set_parameter(
        &mut self,
        field: RunParameterField,
        text: &str,
    ) -> Result<(), AnalysisError> {
        let mut params = self.params.clone();
        if let Err(e) = params.set_field(field, text) {
            warn!("{}", e);
            return Err(e);
        }
        self.apply_parameters(params, RecomputeTrigger::ParameterEdited(field))
    }

    pub fn set_reference_gas(&mut self, name: &str) -> Result<(), AnalysisError> {
        let mut params = self.params.clone();
        params.reference_gas = name.trim().to_string();
        self.apply_parameters(params, RecomputeTrigger::ReferenceGasChanged)
    }

    /// Replaces the whole parameter set, e.g. when restoring a saved run
    pub fn set_parameters(&mut self, params: RunParameters) -> Result<(), AnalysisError> {
        self.apply_parameters(params, RecomputeTrigger::Requested)
    }

    fn apply_parameters(
        &mut self,
        params: RunParameters,
        trigger: RecomputeTrigger,
    ) -> Result<(), AnalysisError> {
        if self.raw.is_empty() {
            self.params = params;
            return Ok(());
        }
        let snapshot =
            compute_snapshot(&self.raw, &self.spans, &params, &self.calibration, &self.overrides)?;
        self.params = params;
        self.commit(snapshot, trigger);
        Ok(())
    }

    fn span(&self, cycle: usize) -> Result<CycleSpan, AnalysisError> {
        cycle
            .checked_sub(1)
            .and_then(|i| self.spans.get(i))
            .copied()
            .ok_or(AnalysisError::UnknownCycle(cycle))
    }

    /// Sets a manual cut, in minutes from the cycle's raw start. An out-of-span cut is
    /// discarded (the edge returns to automatic) and the recompute still runs.
    pub fn set_override(
        &mut self,
        cycle: usize,
        boundary: Boundary,
        minutes: f64,
    ) -> Result<OverrideOutcome, AnalysisError> {
        let span = self.span(cycle)?;
        let mut overrides = self.overrides.clone();
        let outcome = overrides.set(&span, boundary, minutes)?;
        self.apply_overrides(
            overrides,
            RecomputeTrigger::OverrideChanged {
                cycle,
                boundary,
                outcome,
            },
        )?;
        Ok(outcome)
    }

    pub fn clear_override(
        &mut self,
        cycle: usize,
        boundary: Boundary,
    ) -> Result<OverrideOutcome, AnalysisError> {
        self.span(cycle)?;
        let mut overrides = self.overrides.clone();
        let outcome = overrides.clear(cycle, boundary)?;
        self.apply_overrides(
            overrides,
            RecomputeTrigger::OverrideChanged {
                cycle,
                boundary,
                outcome,
            },
        )?;
        Ok(outcome)
    }

    /// Restores a saved set of manual cuts; a set sized for another cycle count is ignored.
    /// Cuts outside their cycle's raw span are discarded before the recompute.
    pub fn restore_overrides(&mut self, mut overrides: OverrideSet) -> Result<bool, AnalysisError> {
        if overrides.len() != self.spans.len() {
            warn!(
                "saved cuts cover {} cycles, run has {}; keeping automatic windows",
                overrides.len(),
                self.spans.len()
            );
            return Ok(false);
        }
        overrides.validate(&self.spans);
        self.apply_overrides(overrides, RecomputeTrigger::OverridesRestored)?;
        Ok(true)
    }

    fn apply_overrides(
        &mut self,
        overrides: OverrideSet,
        trigger: RecomputeTrigger,
    ) -> Result<(), AnalysisError> {
        let snapshot =
            compute_snapshot(&self.raw, &self.spans, &self.params, &self.calibration, &overrides)?;
        self.overrides = overrides;
        self.commit(snapshot, trigger);
        Ok(())
    }
}
