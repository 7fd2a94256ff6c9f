//! # Cycle Table
//!
//! One row per experiment cycle with its resolved window and every metric computed from it.
//! The table is always rebuilt in full by the pipeline, never patched row by row.
use crate::Sorption::capacity::CapacityMetrics;
use crate::Sorption::cycle_windows::{CycleSpan, CycleWindow};
use crate::Sorption::kinetics_wet::WetKinetics;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleRecord {
    /// 1-based cycle number
    pub cycle: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// window edges, minutes from `start`
    pub window: CycleWindow,
    pub capacity: CapacityMetrics,
    pub wet: WetKinetics,
    pub dry_rate_constant: f64,
}

impl CycleRecord {
    pub fn new(
        span: &CycleSpan,
        window: CycleWindow,
        capacity: CapacityMetrics,
        wet: WetKinetics,
        dry_rate_constant: f64,
    ) -> Self {
        Self {
            cycle: span.cycle,
            start: span.start,
            end: span.end,
            window,
            capacity,
            wet,
            dry_rate_constant,
        }
    }

    /// Numeric metrics as (label, value) pairs in display order
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        let w = &self.window;
        let c = &self.capacity;
        vec![
            ("Sorption Start [min]", w.sorption_start),
            ("Sorption End [min]", w.sorption_end),
            ("Regression Start [min]", w.regression_start),
            ("Regression End [min]", w.regression_end),
            ("Sorption Duration [min]", c.sorption_duration),
            ("Highest Sorption Point [%]", c.highest_sorption_point),
            ("CO2 Absorbed Cut [mol]", c.absorbed_mol),
            ("CO2 Absorbed Cut [g]", c.absorbed_g),
            ("CO2 Absorbed Phase [mol]", c.phase_absorbed_mol),
            ("CO2 Desorbed [mol]", c.desorbed_mol),
            ("CO2 Desorbed [g]", c.desorbed_g),
            ("Sorbent Capacity [gCO2/gSorbent]", c.gravimetric_capacity),
            ("Sorbent Capacity [gCO2/mLReactor]", c.volumetric_capacity),
            ("Capacity % to KPI", c.percent_of_kpi),
            ("Wet K", self.wet.rate_constant),
            ("Wet R2", self.wet.r_squared),
            ("Dry K", self.dry_rate_constant),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleTable {
    rows: Vec<CycleRecord>,
}

impl CycleTable {
    pub fn new(rows: Vec<CycleRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CycleRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, cycle: usize) -> Option<&CycleRecord> {
        cycle.checked_sub(1).and_then(|i| self.rows.get(i))
    }

    /// Bitwise comparison that treats NaN as equal to NaN
    pub fn bit_identical(&self, other: &CycleTable) -> bool {
        self.len() == other.len()
            && self.rows.iter().zip(&other.rows).all(|(a, b)| {
                a.cycle == b.cycle
                    && a.start == b.start
                    && a.end == b.end
                    && a.wet.n_points == b.wet.n_points
                    && a.window.sorption_start_auto.to_bits() == b.window.sorption_start_auto.to_bits()
                    && a.window.sorption_end_auto.to_bits() == b.window.sorption_end_auto.to_bits()
                    && a
                        .metrics()
                        .iter()
                        .zip(b.metrics())
                        .all(|((_, x), (_, y))| x.to_bits() == y.to_bits())
            })
    }
}
