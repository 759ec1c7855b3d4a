//! Commands talking to a running irrigation agent

use anyhow::Result;
use colored::Colorize;
use irrigation_engine::{
    ActuatorState, ControlMode, CycleReport, HealthResponse, ModelSummary, ReadinessResponse,
};
use serde::Serialize;

use super::local::{print_advice, print_prediction};
use super::ReadingArgs;
use crate::client::{ApiClient, ModeRequest, ToggleResponse};
use crate::output::{
    bar, color_status, format_percent, print_heading, print_info, print_json, print_success,
    OutputFormat,
};

#[derive(Serialize)]
struct StatusOutput {
    health: HealthResponse,
    readiness: ReadinessResponse,
    actuator: ActuatorState,
}

fn print_actuator(state: &ActuatorState) {
    println!("Mode: {}", color_status(&state.mode.to_string()));
    println!("Pump: {}", color_status(&state.pump.to_string()));
}

/// Show agent health, readiness and actuator state
pub async fn status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (bool, HealthResponse) = client.probe("healthz").await?;
    let (_, readiness): (bool, ReadinessResponse) = client.probe("readyz").await?;
    let actuator: ActuatorState = client.get("api/v1/actuator").await?;

    match format {
        OutputFormat::Json => print_json(&StatusOutput {
            health,
            readiness,
            actuator,
        })?,
        OutputFormat::Table => {
            print_heading("Agent Status");
            println!("Health: {}", color_status(health.status.as_str()));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            match &readiness.reason {
                Some(reason) => println!("Ready:  {} ({})", color_status(ready), reason),
                None => println!("Ready:  {}", color_status(ready)),
            }
            for (name, component) in &health.components {
                let status = component.status.as_str();
                match &component.message {
                    Some(message) => {
                        println!("  {:<12} {} - {}", name, color_status(status), message)
                    }
                    None => println!("  {:<12} {}", name, color_status(status)),
                }
            }
            println!();
            print_actuator(&actuator);
        }
    }

    Ok(())
}

/// Submit a reading and run one monitoring cycle on the agent
pub async fn cycle(client: &ApiClient, reading: ReadingArgs, format: OutputFormat) -> Result<()> {
    let features: irrigation_engine::FeatureVector = reading.into();
    let report: CycleReport = client.post("api/v1/cycle", &features).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{} #{}", "Cycle".bold(), report.cycle);
            print_prediction(&report.features, &report.prediction, &report.sensors);
            print_advice(&report.recommendations, &report.alerts);
            println!();
            print_actuator(&report.actuator);
            if let Some(t) = report.transition {
                print_success(&format!("Pump switched {} -> {} ({})", t.from, t.to, t.reason));
            }
        }
    }

    Ok(())
}

/// Switch the controller between auto and manual mode
pub async fn set_mode(client: &ApiClient, mode: ControlMode, format: OutputFormat) -> Result<()> {
    let state: ActuatorState = client
        .put("api/v1/actuator/mode", &ModeRequest { mode })
        .await?;

    match format {
        OutputFormat::Json => print_json(&state)?,
        OutputFormat::Table => {
            print_success(&format!("Mode set to {}", state.mode));
            print_actuator(&state);
        }
    }

    Ok(())
}

/// Flip the pump (manual mode only)
pub async fn toggle(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: ToggleResponse = client.post_empty("api/v1/actuator/toggle").await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Pump switched {} -> {}",
                response.transition.from, response.transition.to
            ));
        }
    }

    Ok(())
}

/// Show the model the agent is serving
pub async fn model(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary: ModelSummary = client.get("api/v1/model").await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            print_heading("Agent Model");
            if !summary.trained {
                print_info("No model published yet");
                return Ok(());
            }
            if let Some(report) = &summary.report {
                println!("Trees:    {}", report.n_trees);
                println!("Samples:  {}", report.total_samples);
                println!("Accuracy: {}", format_percent(report.accuracy).bold());
            }
            if let Some(importance) = &summary.feature_importance {
                println!();
                for (name, weight) in importance.entries() {
                    println!(
                        "  {:<11} {} {}",
                        name.label(),
                        bar(weight, 20),
                        format_percent(weight)
                    );
                }
            }
        }
    }

    Ok(())
}
