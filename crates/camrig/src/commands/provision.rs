//! `camrig provision`: bring every switch into its operational state.

use tabled::Tabled;

use camrig_core::{Controller, ProvisionOutcome, ProvisionReport};

use crate::cli::GlobalOpts;
use crate::commands::{build_services, fleet_config};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Switch")]
    switch: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

fn outcome_label(outcome: &ProvisionOutcome) -> String {
    match outcome {
        ProvisionOutcome::AlreadyOperational => "already operational".into(),
        ProvisionOutcome::Configured { attempts: 1 } => "configured".into(),
        ProvisionOutcome::Configured { attempts } => format!("configured ({attempts} attempts)"),
    }
}

fn report_row(r: &ProvisionReport) -> ReportRow {
    ReportRow {
        interface: r.interface.clone(),
        switch: r.switch_address.to_string(),
        outcome: outcome_label(&r.outcome),
    }
}

pub async fn handle(cfg: &camrig_config::Config, global: &GlobalOpts) -> Result<(), CliError> {
    let controller = Controller::new(fleet_config(cfg, global)?, build_services(cfg)?);
    let reports = controller.provision().await?;
    print_reports(&reports, global)
}

pub(crate) fn print_reports(
    reports: &[ProvisionReport],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = output::render_list(global.output, reports, report_row)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
