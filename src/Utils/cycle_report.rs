use crate::Sorption::cycle_table::{CycleRecord, CycleTable};
use crate::Sorption::cycle_windows::{Boundary, OverrideSet};
use crate::Sorption::run_parameters::{RunParameterField, RunParameters};
use chrono::NaiveDateTime;
use prettytable::{Cell, Row, Table, row};

/// Fixed-width rendering of a metric; NaN reads as `n/a` so it is never mistaken for zero
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "n/a".to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-3..1e4).contains(&magnitude) {
        format!("{:.3e}", value)
    } else {
        format!("{:.4}", value)
    }
}

/// Metrics as rows, cycles as columns
pub fn cycle_table_report(cycles: &CycleTable) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new("Metric")];
    header.extend(cycles.rows().iter().map(|r| Cell::new(&format!("Cycle {}", r.cycle))));
    table.set_titles(Row::new(header));

    let edges: [(&str, fn(&CycleRecord) -> NaiveDateTime); 2] =
        [("Start", |r| r.start), ("End", |r| r.end)];
    for (label, edge) in edges {
        let mut cells = vec![Cell::new(label)];
        cells.extend(
            cycles
                .rows()
                .iter()
                .map(|r| Cell::new(&edge(r).format("%Y-%m-%d %H:%M:%S").to_string())),
        );
        table.add_row(Row::new(cells));
    }

    let Some(first) = cycles.rows().first() else {
        return table;
    };
    let labels: Vec<&str> = first.metrics().iter().map(|(label, _)| *label).collect();
    let metrics: Vec<Vec<(&str, f64)>> = cycles.rows().iter().map(|r| r.metrics()).collect();
    for (k, label) in labels.iter().enumerate() {
        let mut cells = vec![Cell::new(label)];
        cells.extend(metrics.iter().map(|m| Cell::new(&format_value(m[k].1))));
        table.add_row(Row::new(cells));
    }
    let mut points = vec![Cell::new("Wet Regression Points")];
    points.extend(cycles.rows().iter().map(|r| Cell::new(&r.wet.n_points.to_string())));
    table.add_row(Row::new(points));
    table
}

pub fn parameters_report(params: &RunParameters) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["#", "Parameter", "Value"]);
    for (i, field) in RunParameterField::ALL.iter().enumerate() {
        table.add_row(row![i + 1, field.label(), format_value(params.get(*field))]);
    }
    table.add_row(row!["", "Reference Gas", params.reference_gas]);
    table
}

/// Manual cuts per cycle, `auto` where none is set
pub fn overrides_report(overrides: &OverrideSet) -> Table {
    let mut table = Table::new();
    let mut header = vec![Cell::new("Cycle")];
    header.extend(Boundary::ALL.iter().map(|b| Cell::new(&b.to_string())));
    table.set_titles(Row::new(header));
    for cycle in 1..=overrides.len() {
        let mut cells = vec![Cell::new(&cycle.to_string())];
        for boundary in Boundary::ALL {
            let text = match overrides.get(cycle, boundary) {
                Ok(cut) if !cut.is_auto() => format_value(cut.or_auto(f64::NAN)),
                _ => "auto".to_string(),
            };
            cells.push(Cell::new(&text));
        }
        table.add_row(Row::new(cells));
    }
    table
}

pub fn columns_report(title: &str, columns: &[String]) -> Table {
    let mut table = Table::new();
    table.set_titles(row!["#", title]);
    for (i, name) in columns.iter().enumerate() {
        table.add_row(row![i + 1, name]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Sorption::capacity::CapacityMetrics;
    use crate::Sorption::cycle_windows::{CycleSpan, CycleWindow};
    use crate::Sorption::kinetics_wet::WetKinetics;
    use chrono::{NaiveDate, TimeDelta};

    fn record() -> CycleRecord {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let span = CycleSpan {
            cycle: 1,
            start,
            end: start + TimeDelta::minutes(30),
        };
        let window = CycleWindow {
            sorption_start: 0.0,
            sorption_end: 12.5,
            regression_start: 3.0,
            regression_end: 12.5,
            sorption_start_auto: 3.0,
            sorption_end_auto: 12.5,
        };
        let capacity = CapacityMetrics {
            absorbed_mol: 2.0e-3,
            absorbed_g: 2.0e-3 * 44.01,
            phase_absorbed_mol: 2.5e-3,
            desorbed_mol: f64::NAN,
            desorbed_g: f64::NAN,
            gravimetric_capacity: 0.0088,
            volumetric_capacity: 0.007,
            percent_of_kpi: 24.7,
            highest_sorption_point: 0.4,
            sorption_duration: 12.5,
        };
        CycleRecord::new(&span, window, capacity, WetKinetics::undefined(1), 0.12)
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(f64::NAN), "n/a");
        assert_eq!(format_value(0.0), "0.0000");
        assert_eq!(format_value(12.5), "12.5000");
        assert_eq!(format_value(2.0e-3), "0.0020");
        assert_eq!(format_value(-2.0e-5), "-2.000e-5");
        assert_eq!(format_value(123456.0), "1.235e5");
    }

    #[test]
    fn test_cycle_report_marks_missing_values() {
        let table = CycleTable::new(vec![record()]);
        let text = cycle_table_report(&table).to_string();
        assert!(text.contains("Cycle 1"));
        assert!(text.contains("2024-05-01 08:30:00"));
        assert!(text.contains("Wet K"));
        assert!(text.contains("n/a"));
        assert!(text.contains("12.5000"));
    }

    #[test]
    fn test_empty_cycle_report() {
        let text = cycle_table_report(&CycleTable::default()).to_string();
        assert!(text.contains("Metric"));
        assert!(!text.contains("Wet K"));
    }

    #[test]
    fn test_parameter_and_column_reports() {
        let text = parameters_report(&RunParameters::new()).to_string();
        assert!(text.contains("Sorbent Mass (g)"));
        assert!(text.contains("N2"));
        let text = columns_report("Derived Column", &["yCO2 [%]".to_string()]).to_string();
        assert!(text.contains("yCO2 [%]"));
    }

    #[test]
    fn test_overrides_report() {
        let text = overrides_report(&OverrideSet::new(2)).to_string();
        assert!(text.contains("Regression End"));
        assert_eq!(text.matches("auto").count(), 8);
    }
}
