use crate::Ingest::mass_spec_parser::{MassSpecRun, load_mass_spec};
use crate::Ingest::reactor_log::merge_reactor_log;
use crate::Ingest::temperature_log::merge_temperature_log;
use crate::Sorption::cycle_windows::{Boundary, OverrideOutcome};
use crate::Sorption::pipeline::AnalysisContext;
use crate::Sorption::run_parameters::RunParameterField;
use crate::Utils::cycle_report::{
    columns_report, cycle_table_report, overrides_report, parameters_report,
};
use log::error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Everything the menu works on between two choices
pub struct Session {
    pub ctx: AnalysisContext,
    /// last mass-spec file, the base every merge starts from
    pub mass_spec: Option<MassSpecRun>,
    pub reactor_parameters: Vec<String>,
    pub temperature_columns: Vec<String>,
}

impl Session {
    pub fn new(ctx: AnalysisContext) -> Self {
        Self {
            ctx,
            mass_spec: None,
            reactor_parameters: Vec::new(),
            temperature_columns: Vec::new(),
        }
    }
}

pub fn run_interactive_menu(ctx: AnalysisContext) {
    let mut session = Session::new(ctx);
    let stdin = io::stdin();
    let mut input = stdin.lock();
    run_menu(&mut session, &mut input);
}

/// Menu loop over any line source; returns at `0` or end of input
pub fn run_menu<R: BufRead>(session: &mut Session, input: &mut R) {
    loop {
        show_main_menu();
        let Some(choice) = get_user_input(input) else {
            break;
        };
        match choice.trim() {
            "1" => load_mass_spec_file(session, input),
            "2" => merge_reactor_folder(session, input),
            "3" => merge_temperature_file(session, input),
            "4" => edit_parameter(session, input),
            "5" => set_cut(session, input),
            "6" => clear_cut(session, input),
            "7" => change_reference_gas(session, input),
            "8" => show_cycles(session),
            "9" => show_columns(session),
            "10" => save_parameters(session, input),
            "0" => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please try again."),
        }
    }
}

fn show_main_menu() {
    println!("\x1b[34m\n CO2 sorption run analysis \n\x1b[0m");
    println!("\x1b[33m1. Load mass-spec file\x1b[0m");
    println!("\x1b[33m2. Merge reactor log folder\x1b[0m");
    println!("\x1b[33m3. Merge temperature log\x1b[0m");
    println!("\x1b[33m4. Edit run parameter\x1b[0m");
    println!("\x1b[33m5. Set manual cut\x1b[0m");
    println!("\x1b[33m6. Clear manual cut\x1b[0m");
    println!("\x1b[33m7. Change reference gas\x1b[0m");
    println!("\x1b[33m8. Show cycle table\x1b[0m");
    println!("\x1b[33m9. List columns\x1b[0m");
    println!("\x1b[33m10. Save run parameters (JSON)\x1b[0m");
    println!("\x1b[33m0. Exit\x1b[0m");
    prompt("Enter your choice: ");
}

fn prompt(text: &str) {
    print!("\x1b[36m{}\x1b[0m", text);
    let _ = io::stdout().flush();
}

fn report_error(e: &dyn std::fmt::Display) {
    println!("\x1b[31m{}\x1b[0m", e);
}

/// Next input line, `None` at end of input
fn get_user_input<R: BufRead>(input: &mut R) -> Option<String> {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim().to_string()),
        Err(e) => {
            error!("cannot read input: {}", e);
            None
        }
    }
}

fn ask<R: BufRead>(input: &mut R, question: &str) -> Option<String> {
    prompt(question);
    get_user_input(input)
}

fn ask_number<R: BufRead>(input: &mut R, question: &str) -> Option<usize> {
    let text = ask(input, question)?;
    match text.parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) => {
            println!("'{}' is not a number", text);
            None
        }
    }
}

fn load_mass_spec_file<R: BufRead>(session: &mut Session, input: &mut R) {
    let Some(path) = ask(input, "Enter mass-spec file path: ") else {
        return;
    };
    let run = match load_mass_spec(Path::new(&path)) {
        Ok(run) => run,
        Err(e) => return report_error(&e),
    };
    match session.ctx.load_run(run.table.clone(), run.cycles.clone()) {
        Ok(()) => {
            println!(
                "Loaded {} samples, compounds: {}",
                run.table.len(),
                run.compounds.join(", ")
            );
            session.mass_spec = Some(run);
            session.reactor_parameters.clear();
            session.temperature_columns.clear();
        }
        Err(e) => report_error(&e),
    }
}

fn merge_reactor_folder<R: BufRead>(session: &mut Session, input: &mut R) {
    let Some(run) = &session.mass_spec else {
        println!("Load a mass-spec file first.");
        return;
    };
    let Some(folder) = ask(input, "Enter reactor log folder: ") else {
        return;
    };
    let merge = match merge_reactor_log(&run.table, &PathBuf::from(folder)) {
        Ok(merge) => merge,
        Err(e) => return report_error(&e),
    };
    match session.ctx.load_run(merge.table, merge.cycles) {
        Ok(()) => {
            println!("{} cycles found", session.ctx.cycle_table().len());
            session.reactor_parameters = merge.parameters;
        }
        Err(e) => report_error(&e),
    }
}

fn merge_temperature_file<R: BufRead>(session: &mut Session, input: &mut R) {
    if session.ctx.raw_table().is_empty() {
        println!("Load a mass-spec file first.");
        return;
    }
    let Some(path) = ask(input, "Enter temperature log path: ") else {
        return;
    };
    let merge = match merge_temperature_log(session.ctx.raw_table(), Path::new(&path)) {
        Ok(merge) => merge,
        Err(e) => return report_error(&e),
    };
    let spans = session.ctx.spans().to_vec();
    match session.ctx.load_run(merge.table, spans) {
        Ok(()) => {
            println!("Temperature channels: {}", merge.temperature_columns.join(", "));
            session.temperature_columns = merge.temperature_columns;
        }
        Err(e) => report_error(&e),
    }
}

fn edit_parameter<R: BufRead>(session: &mut Session, input: &mut R) {
    parameters_report(session.ctx.parameters()).printstd();
    let Some(k) = ask_number(input, "Parameter number: ") else {
        return;
    };
    let Some(field) = k.checked_sub(1).and_then(|i| RunParameterField::ALL.get(i).copied()) else {
        println!("No parameter {}", k);
        return;
    };
    let Some(value) = ask(input, &format!("{}: ", field.label())) else {
        return;
    };
    match session.ctx.set_parameter(field, &value) {
        Ok(()) => println!("{} = {}", field.label(), session.ctx.parameters().get(field)),
        Err(e) => report_error(&e),
    }
}

fn ask_cut_target<R: BufRead>(session: &Session, input: &mut R) -> Option<(usize, Boundary)> {
    overrides_report(session.ctx.overrides()).printstd();
    let cycle = ask_number(input, "Cycle: ")?;
    for (i, b) in Boundary::ALL.iter().enumerate() {
        println!("{}. {}", i + 1, b);
    }
    let k = ask_number(input, "Boundary: ")?;
    match k.checked_sub(1).and_then(|i| Boundary::ALL.get(i).copied()) {
        Some(b) => Some((cycle, b)),
        None => {
            println!("No boundary {}", k);
            None
        }
    }
}

fn set_cut<R: BufRead>(session: &mut Session, input: &mut R) {
    let Some((cycle, boundary)) = ask_cut_target(session, input) else {
        return;
    };
    let Some(text) = ask(input, "Minutes from cycle start: ") else {
        return;
    };
    let Ok(minutes) = text.parse::<f64>() else {
        println!("'{}' is not a number", text);
        return;
    };
    match session.ctx.set_override(cycle, boundary, minutes) {
        Ok(OverrideOutcome::Rejected) => {
            println!("Cut outside the cycle, {} is automatic again", boundary)
        }
        Ok(_) => println!("Cycle {}: {} set to {} min", cycle, boundary, minutes),
        Err(e) => report_error(&e),
    }
}

fn clear_cut<R: BufRead>(session: &mut Session, input: &mut R) {
    let Some((cycle, boundary)) = ask_cut_target(session, input) else {
        return;
    };
    match session.ctx.clear_override(cycle, boundary) {
        Ok(_) => println!("Cycle {}: {} is automatic", cycle, boundary),
        Err(e) => report_error(&e),
    }
}

fn change_reference_gas<R: BufRead>(session: &mut Session, input: &mut R) {
    if let Some(run) = &session.mass_spec {
        println!("Compounds: {}", run.compounds.join(", "));
    }
    let Some(name) = ask(input, "Reference gas: ") else {
        return;
    };
    match session.ctx.set_reference_gas(&name) {
        Ok(()) => println!("Reference in use: {}", session.ctx.reference_used()),
        Err(e) => report_error(&e),
    }
}

fn show_cycles(session: &Session) {
    if session.ctx.cycle_table().is_empty() {
        println!("No cycles computed yet.");
        return;
    }
    cycle_table_report(session.ctx.cycle_table()).printstd();
}

fn show_columns(session: &Session) {
    columns_report("Derived Column", session.ctx.derived_columns()).printstd();
    if !session.reactor_parameters.is_empty() {
        columns_report("Reactor Parameter", &session.reactor_parameters).printstd();
    }
    if !session.temperature_columns.is_empty() {
        columns_report("Temperature", &session.temperature_columns).printstd();
    }
}

fn save_parameters<R: BufRead>(session: &mut Session, input: &mut R) {
    let Some(path) = ask(input, "Save to: ") else {
        return;
    };
    match session.ctx.parameters().save_json(Path::new(&path)) {
        Ok(()) => println!("Saved to {}", path),
        Err(e) => report_error(&e),
    }
}
