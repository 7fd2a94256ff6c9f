#[cfg(test)]
mod tests {
    use crate::Sorption::analysis_error::AnalysisError;
    use crate::Sorption::cycle_windows::{
        Boundary, CycleSpan, CycleWindow, DESORPTION_PHASE, OverrideOutcome, OverrideSet,
        PHASE_COLUMN, SORPTION_PHASE,
    };
    use crate::Sorption::kinetics_wet::{ACCUMULATED_ABSORBED, ACTIVE_VOLUME, RESIDENCE_TIME};
    use crate::Sorption::pipeline::{
        AnalysisContext, PipelineState, RECOMPUTE_ORDER, Stage, compute_snapshot,
    };
    use crate::Sorption::run_parameters::{
        CalibrationConstants, DEFAULT_REFERENCE_COMPOUND, RunParameterField, RunParameters,
    };
    use crate::Sorption::run_table::RunTable;
    use crate::Sorption::signal_derivation::{ABSORBED_INCREMENT, MOLE_FRACTION};
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    const S: f64 = SORPTION_PHASE;
    const D: f64 = DESORPTION_PHASE;

    /// yCO2 [%] of the two synthetic cycles: flat zero, then a linear ramp past the feed level
    const CYCLE_1: [f64; 11] = [0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 7.0, 10.0, 13.0, 20.0, 20.0];
    const CYCLE_2: [f64; 11] = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 8.0, 12.0, 20.0, 20.0];
    const PHASES: [f64; 11] = [S, S, S, S, S, S, S, S, S, D, D];

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    /// 10 % CO2 in the feed, read 1:1 by the mass spectrometer, 100 SCCM,
    /// thresholds at 1 % and 5 % yCO2
    fn params() -> RunParameters {
        let mut p = RunParameters::new();
        p.sorbent_mass = 5.0;
        p.bulk_density = 0.5;
        p.input_flow_rate = 100.0;
        p.reactor_input_ratio = 10.0;
        p.qms_input_ratio = 10.0;
        p.regression_start_threshold = 10.0;
        p.regression_end_threshold = 50.0;
        p
    }

    /// two cycles of 11 one-minute samples, back to back
    fn two_cycle_run() -> (RunTable, Vec<CycleSpan>) {
        let stamps: Vec<_> = (0..22).map(|i| t0() + TimeDelta::minutes(i)).collect();
        let y: Vec<f64> = CYCLE_1.iter().chain(CYCLE_2.iter()).copied().collect();
        let mut table = RunTable::new(stamps.clone());
        table
            .insert_column("CO2", y.iter().map(|v| v / 100.0).collect())
            .unwrap();
        table.insert_column("N2", vec![1.0; 22]).unwrap();
        table.insert_column("Ar", vec![0.5; 22]).unwrap();
        table
            .insert_column(PHASE_COLUMN, PHASES.iter().chain(PHASES.iter()).copied().collect())
            .unwrap();
        // spans are numbered by the controller; loading renumbers them
        let spans = vec![
            CycleSpan {
                cycle: 7,
                start: stamps[0],
                end: stamps[10],
            },
            CycleSpan {
                cycle: 8,
                start: stamps[11],
                end: stamps[21],
            },
        ];
        (table, spans)
    }

    fn loaded() -> AnalysisContext {
        let (table, spans) = two_cycle_run();
        let mut ctx = AnalysisContext::new(params());
        ctx.load_run(table, spans).unwrap();
        ctx
    }

    /// clamped uptake of one 60 s sample at `y` percent against a 10 % feed of 100 SCCM
    fn increment(y: f64) -> f64 {
        ((0.1 - y / 100.0) * 100.0 * 7.45e-7 * 60.0).max(0.0)
    }

    fn window(ctx: &AnalysisContext, cycle: usize) -> CycleWindow {
        ctx.cycle_table().get(cycle).unwrap().window
    }

    fn assert_ordered(w: &CycleWindow) {
        assert!(w.sorption_start <= w.regression_start, "{:?}", w);
        assert!(w.regression_start <= w.regression_end, "{:?}", w);
        assert!(w.regression_end <= w.sorption_end, "{:?}", w);
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(
            RECOMPUTE_ORDER,
            [
                Stage::SignalDerivation,
                Stage::CycleWindows,
                Stage::Capacity,
                Stage::DryKinetics,
                Stage::WetKinetics,
            ]
        );
    }

    #[test]
    fn test_load_reaches_consistent_state() {
        let mut ctx = AnalysisContext::new(params());
        assert_eq!(ctx.state(), PipelineState::Empty);
        assert_eq!(ctx.recompute(), Err(AnalysisError::NoData));

        let (table, spans) = two_cycle_run();
        ctx.load_run(table, spans).unwrap();
        assert_eq!(ctx.state(), PipelineState::Consistent);
        assert_eq!(ctx.version(), 1);
        assert_eq!(ctx.cycle_table().len(), 2);
        assert_eq!(ctx.spans()[0].cycle, 1);
        assert_eq!(ctx.spans()[1].cycle, 2);
        assert_eq!(ctx.overrides().len(), 2);
        assert_eq!(ctx.reference_used(), "N2");
        for name in [MOLE_FRACTION, ABSORBED_INCREMENT, ACCUMULATED_ABSORBED, RESIDENCE_TIME] {
            assert!(ctx.derived_columns().iter().any(|c| c == name));
            assert!(ctx.run_table().has_column(name));
        }
        assert_eq!(ctx.run_table().len(), 22);
    }

    #[test]
    fn test_two_cycle_capacity_is_hand_computable() {
        let ctx = loaded();
        let p = params();

        // cycle 1: start crossing at 4 min (2 %), end crossing at 6 min (7 %)
        let w = window(&ctx, 1);
        assert_eq!(w.sorption_start, 0.0);
        assert_relative_eq!(w.sorption_end, 6.0);
        assert_relative_eq!(w.regression_start, 4.0);
        assert_relative_eq!(w.regression_end, 6.0);
        // the very first sample of the run has no predecessor
        let expected_1: f64 = CYCLE_1[1..=6].iter().map(|y| increment(*y)).sum();
        let c1 = ctx.cycle_table().get(1).unwrap().capacity;
        assert_relative_eq!(c1.absorbed_mol, expected_1, max_relative = 1e-9);
        assert_relative_eq!(c1.absorbed_mol, 4.47e-3 * 0.47, max_relative = 1e-9);
        assert_relative_eq!(
            c1.gravimetric_capacity,
            expected_1 * 44.01 / p.sorbent_mass,
            max_relative = 1e-9
        );
        assert_relative_eq!(c1.highest_sorption_point, 2.0, max_relative = 1e-9);

        // cycle 2: crossings at 6 and 7 min, its first sample follows cycle 1's last one
        let w = window(&ctx, 2);
        assert_relative_eq!(w.sorption_end, 7.0);
        assert_relative_eq!(w.regression_start, 6.0);
        let expected_2: f64 = CYCLE_2[0..=7].iter().map(|y| increment(*y)).sum();
        let c2 = ctx.cycle_table().get(2).unwrap().capacity;
        assert_relative_eq!(c2.absorbed_mol, expected_2, max_relative = 1e-9);
        assert_relative_eq!(c2.absorbed_mol, 4.47e-3 * 0.69, max_relative = 1e-9);
        assert_relative_eq!(
            c2.gravimetric_capacity,
            expected_2 * 44.01 / p.sorbent_mass,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            c2.volumetric_capacity,
            expected_2 * 44.01 / 10.0,
            max_relative = 1e-9
        );

        // two desorption samples at 20 % release 2 * 0.1 * 100 SCCM * 60 s
        assert_relative_eq!(c1.desorbed_mol, 2.0 * 4.47e-4, max_relative = 1e-9);
    }

    #[test]
    fn test_kinetics_are_filled_for_regular_cycles() {
        let ctx = loaded();
        for row in ctx.cycle_table().rows() {
            assert!(row.wet.n_points >= 2);
            assert!(row.wet.rate_constant.is_finite());
            assert!(row.dry_rate_constant.is_finite());
        }
        // wet trace columns are missing outside the sorption..regression slices
        let acc = ctx.run_table().column(ACCUMULATED_ABSORBED).unwrap();
        assert!(acc[9].is_nan() && acc[10].is_nan());
        assert!(acc[6].is_finite());
        let vol = ctx.run_table().column(ACTIVE_VOLUME).unwrap();
        // fully depleted at the end of the slice
        assert_relative_eq!(vol[6], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_absorbed_never_negative() {
        let mut ctx = loaded();
        // stretch cycle 1 over samples above the feed level
        ctx.set_override(1, Boundary::SorptionEnd, 9.5).unwrap();
        let c1 = ctx.cycle_table().get(1).unwrap().capacity;
        let expected: f64 = CYCLE_1[1..=8].iter().map(|y| increment(*y)).sum();
        assert_relative_eq!(c1.absorbed_mol, expected, max_relative = 1e-9);
        let dn = ctx.run_table().column(ABSORBED_INCREMENT).unwrap();
        assert!(dn.iter().all(|v| *v >= 0.0));
        for row in ctx.cycle_table().rows() {
            assert!(row.capacity.absorbed_mol >= 0.0);
        }
    }

    #[test]
    fn test_ordering_holds_over_override_combinations() {
        let starts = [None, Some(0.5), Some(1.5), Some(3.0)];
        let ends = [None, Some(4.5), Some(5.5), Some(8.0)];
        for s in starts {
            for e in ends {
                let mut ctx = loaded();
                for cycle in 1..=2 {
                    if let Some(s) = s {
                        ctx.set_override(cycle, Boundary::SorptionStart, s).unwrap();
                    }
                    if let Some(e) = e {
                        ctx.set_override(cycle, Boundary::SorptionEnd, e).unwrap();
                    }
                }
                for row in ctx.cycle_table().rows() {
                    assert_ordered(&row.window);
                }
            }
        }
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut ctx = loaded();
        ctx.set_override(2, Boundary::RegressionStart, 6.5).unwrap();
        let before = ctx.cycle_table().clone();
        ctx.recompute().unwrap();
        assert!(before.bit_identical(ctx.cycle_table()));
        ctx.recompute().unwrap();
        assert!(before.bit_identical(ctx.cycle_table()));
        assert_eq!(ctx.version(), 4);

        let (table, spans) = two_cycle_run();
        let renumbered: Vec<_> = spans
            .iter()
            .enumerate()
            .map(|(i, s)| CycleSpan { cycle: i + 1, ..*s })
            .collect();
        let a = compute_snapshot(
            &table,
            &renumbered,
            &params(),
            &CalibrationConstants::default(),
            &OverrideSet::new(2),
        )
        .unwrap();
        let b = compute_snapshot(
            &table,
            &renumbered,
            &params(),
            &CalibrationConstants::default(),
            &OverrideSet::new(2),
        )
        .unwrap();
        assert!(a.cycles.bit_identical(&b.cycles));
        assert_eq!(a.derived_columns, b.derived_columns);
    }

    #[test]
    fn test_out_of_range_override_is_rejected() {
        let mut ctx = loaded();
        let auto_1 = window(&ctx, 1);
        let row_2 = *ctx.cycle_table().get(2).unwrap();
        let version = ctx.version();

        let outcome = ctx.set_override(1, Boundary::SorptionEnd, -2.0).unwrap();
        assert_eq!(outcome, OverrideOutcome::Rejected);
        // rejection still recomputes
        assert_eq!(ctx.version(), version + 1);
        assert_eq!(window(&ctx, 1), auto_1);
        assert_eq!(*ctx.cycle_table().get(2).unwrap(), row_2);

        // past the raw end, after an accepted cut: back to automatic
        ctx.set_override(1, Boundary::SorptionEnd, 5.5).unwrap();
        assert_relative_eq!(window(&ctx, 1).sorption_end, 5.5);
        let outcome = ctx.set_override(1, Boundary::SorptionEnd, 10.0).unwrap();
        assert_eq!(outcome, OverrideOutcome::Rejected);
        assert_eq!(window(&ctx, 1), auto_1);
        assert!(ctx.overrides().get(1, Boundary::SorptionEnd).unwrap().is_auto());
    }

    #[test]
    fn test_single_sample_regression_window_is_nan() {
        let mut ctx = loaded();
        ctx.set_override(1, Boundary::RegressionStart, 4.5).unwrap();
        ctx.set_override(1, Boundary::RegressionEnd, 5.2).unwrap();
        let row = ctx.cycle_table().get(1).unwrap();
        assert_eq!(row.wet.n_points, 1);
        assert!(row.wet.rate_constant.is_nan());
        assert!(row.wet.r_squared.is_nan());
        // the row itself survives with its capacity metrics
        assert!(row.capacity.absorbed_mol > 0.0);
        assert!(ctx.cycle_table().get(2).unwrap().wet.rate_constant.is_finite());
    }

    #[test]
    fn test_reference_gas_selection_and_fallback() {
        let mut ctx = loaded();
        let y_n2 = ctx.run_table().column(MOLE_FRACTION).unwrap()[5];

        ctx.set_reference_gas("Ar").unwrap();
        assert_eq!(ctx.reference_used(), "Ar");
        let y_ar = ctx.run_table().column(MOLE_FRACTION).unwrap()[5];
        assert_relative_eq!(y_ar, 2.0 * y_n2, max_relative = 1e-12);

        ctx.set_reference_gas("He").unwrap();
        assert_eq!(ctx.parameters().reference_gas, "He");
        assert_eq!(ctx.reference_used(), DEFAULT_REFERENCE_COMPOUND);
        let y = ctx.run_table().column(MOLE_FRACTION).unwrap();
        assert!(y.iter().all(|v| v.is_finite()));
        assert_relative_eq!(y[5], y_n2, max_relative = 1e-12);
    }

    #[test]
    fn test_set_then_clear_restores_automatic_window() {
        let mut ctx = loaded();
        let auto = ctx.cycle_table().clone();
        for boundary in Boundary::ALL {
            ctx.set_override(2, boundary, 3.25).unwrap();
        }
        assert_relative_eq!(window(&ctx, 2).sorption_end, 3.25);
        for boundary in Boundary::ALL {
            assert_eq!(
                ctx.clear_override(2, boundary).unwrap(),
                OverrideOutcome::Cleared
            );
        }
        assert!(auto.bit_identical(ctx.cycle_table()));
        assert_eq!(ctx.clear_override(3, Boundary::SorptionEnd), Err(AnalysisError::UnknownCycle(3)));
    }

    #[test]
    fn test_invalid_parameter_keeps_previous_state() {
        let mut ctx = loaded();
        let before = ctx.snapshot().clone();
        let version = ctx.version();

        let err = ctx
            .set_parameter(RunParameterField::SorbentMass, "five")
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InvalidParameter {
                field: RunParameterField::SorbentMass,
                value: "five".to_string(),
            }
        );
        assert_eq!(ctx.version(), version);
        assert_eq!(ctx.parameters().sorbent_mass, 5.0);
        assert!(before.cycles.bit_identical(ctx.cycle_table()));

        ctx.set_parameter(RunParameterField::SorbentMass, " 2.5 ").unwrap();
        assert_eq!(ctx.version(), version + 1);
        let c1 = ctx.cycle_table().get(1).unwrap().capacity;
        assert_relative_eq!(c1.gravimetric_capacity, c1.absorbed_g / 2.5);
    }

    #[test]
    fn test_failed_load_keeps_previous_run() {
        let mut ctx = loaded();
        let before = ctx.cycle_table().clone();
        let mut broken = RunTable::new(vec![t0()]);
        broken.insert_column("N2", vec![1.0]).unwrap();
        let span = CycleSpan {
            cycle: 1,
            start: t0(),
            end: t0(),
        };
        assert_eq!(
            ctx.load_run(broken, vec![span]),
            Err(AnalysisError::MissingColumn("CO2".to_string()))
        );
        assert!(before.bit_identical(ctx.cycle_table()));
        assert_eq!(ctx.spans().len(), 2);
        assert_eq!(
            ctx.load_run(RunTable::default(), Vec::new()),
            Err(AnalysisError::NoData)
        );
    }

    #[test]
    fn test_cuts_survive_reload_with_same_cycle_count() {
        let mut ctx = loaded();
        ctx.set_override(1, Boundary::SorptionEnd, 5.5).unwrap();
        let (table, spans) = two_cycle_run();
        ctx.load_run(table, spans).unwrap();
        assert_relative_eq!(window(&ctx, 1).sorption_end, 5.5);

        let (table, spans) = two_cycle_run();
        ctx.load_run(table, spans[..1].to_vec()).unwrap();
        assert_eq!(ctx.cycle_table().len(), 1);
        assert!(ctx.overrides().get(1, Boundary::SorptionEnd).unwrap().is_auto());
    }

    #[test]
    fn test_calibration_constants_are_configurable() {
        let reference = loaded();
        let calibration = CalibrationConstants {
            kpi_volumetric_capacity: 2.0 * CalibrationConstants::default().kpi_volumetric_capacity,
            wet_log_intercept: 0.5,
        };
        let (table, spans) = two_cycle_run();
        let mut ctx = AnalysisContext::new(params()).with_calibration(calibration);
        ctx.load_run(table, spans).unwrap();
        assert_eq!(ctx.calibration(), &calibration);

        let a = reference.cycle_table().get(1).unwrap();
        let b = ctx.cycle_table().get(1).unwrap();
        assert_relative_eq!(b.capacity.absorbed_mol, a.capacity.absorbed_mol);
        assert_relative_eq!(b.capacity.percent_of_kpi, a.capacity.percent_of_kpi / 2.0);
        assert!(b.wet.rate_constant.is_finite());
        assert_ne!(b.wet.rate_constant, a.wet.rate_constant);
    }

    #[test]
    fn test_replacing_parameters_recomputes() {
        let mut ctx = loaded();
        let before = ctx.cycle_table().get(1).unwrap().capacity;
        let version = ctx.version();
        let mut p = params();
        p.sorbent_mass = 10.0;
        ctx.set_parameters(p).unwrap();
        assert_eq!(ctx.version(), version + 1);
        assert_eq!(ctx.parameters().sorbent_mass, 10.0);
        let after = ctx.cycle_table().get(1).unwrap().capacity;
        assert_relative_eq!(after.absorbed_mol, before.absorbed_mol);
        assert_relative_eq!(after.gravimetric_capacity, before.gravimetric_capacity / 2.0);
    }

    #[test]
    fn test_reload_drops_cuts_outside_new_spans() {
        let mut ctx = loaded();
        ctx.set_override(1, Boundary::SorptionEnd, 8.5).unwrap();
        ctx.set_override(2, Boundary::SorptionEnd, 8.5).unwrap();
        let (table, mut spans) = two_cycle_run();
        spans[0].end = spans[0].start + TimeDelta::minutes(5);
        ctx.load_run(table, spans).unwrap();
        assert!(ctx.overrides().get(1, Boundary::SorptionEnd).unwrap().is_auto());
        assert_relative_eq!(window(&ctx, 2).sorption_end, 8.5);
    }

    #[test]
    fn test_restore_overrides_checks_cycle_count() {
        let mut ctx = loaded();
        let mut saved = ctx.overrides().clone();
        saved.set(&ctx.spans()[1], Boundary::SorptionEnd, 6.5).unwrap();
        assert!(ctx.restore_overrides(saved).unwrap());
        assert_relative_eq!(window(&ctx, 2).sorption_end, 6.5);
        assert!(!ctx.restore_overrides(OverrideSet::new(5)).unwrap());
        assert_relative_eq!(window(&ctx, 2).sorption_end, 6.5);
    }

    #[test]
    fn test_restored_cuts_outside_span_fall_back_to_auto() {
        let mut ctx = loaded();
        let automatic = window(&ctx, 1);
        let json = r#"{"cuts":[
            {"sorption_start":"Auto","sorption_end":{"Overridden":999.0},"regression_start":"Auto","regression_end":"Auto"},
            {"sorption_start":{"Overridden":-5.0},"sorption_end":{"Overridden":6.5},"regression_start":"Auto","regression_end":"Auto"}
        ]}"#;
        let saved: OverrideSet = serde_json::from_str(json).unwrap();
        assert!(ctx.restore_overrides(saved).unwrap());

        assert_eq!(window(&ctx, 1), automatic);
        assert!(ctx.overrides().get(1, Boundary::SorptionEnd).unwrap().is_auto());
        let w2 = window(&ctx, 2);
        assert_eq!(w2.sorption_start, 0.0);
        assert_relative_eq!(w2.sorption_end, 6.5);
        assert!(ctx.overrides().get(2, Boundary::SorptionStart).unwrap().is_auto());
        assert_ordered(&w2);
    }
}
