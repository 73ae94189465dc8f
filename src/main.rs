// Main entry point - Dependency injection and test execution
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use pack_acceptance::application::cancel::cancel_pair;
use pack_acceptance::application::events::{EventSink, RunStatus};
use pack_acceptance::application::session::TestSession;
use pack_acceptance::infrastructure::config::load_station_config;
use pack_acceptance::infrastructure::report_writer::JsonReportWriter;
use pack_acceptance::infrastructure::simulated_pack::SimulatedPack;
use pack_acceptance::presentation::console::{render_events, render_summary};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout belongs to the operator log
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let serial = args
        .next()
        .context("usage: pack-acceptance <serial-number> [config-path]")?;
    let config_path = args.next().unwrap_or_else(|| "config/station".to_string());

    // Load configuration
    let station = load_station_config(&config_path)
        .with_context(|| format!("failed to load station config from {}", config_path))?;
    let plan = station.to_plan()?;

    // Create adapters (infrastructure layer)
    let port = Arc::new(
        SimulatedPack::new(station.device.slave_address)
            .with_response_delay(Duration::from_millis(20)),
    );
    let reports = Arc::new(JsonReportWriter::new(&station.report.directory));

    // Operator log
    let (events, stream) = EventSink::channel();
    let console = tokio::spawn(render_events(stream));

    let (cancel, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    // Create the use case (application layer) and run it
    let session = TestSession::new(port, reports, plan, events);
    let outcome = session.execute(&serial, signal).await;

    // Last event producer gone, let the console drain
    drop(session);
    match console.await {
        Ok(Some(RunStatus::Completed)) => tracing::info!("unit {} accepted", serial),
        Ok(Some(RunStatus::Aborted(reason))) => {
            tracing::error!("unit {} not accepted: {}", serial, reason)
        }
        Ok(None) => tracing::warn!("event stream closed before the run finished"),
        Err(e) => tracing::warn!("console task ended abnormally: {}", e),
    }

    let report = outcome?;
    println!("{}", render_summary(&report.run));

    Ok(())
}
