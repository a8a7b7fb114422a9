use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel as channel;
use thiserror::Error;
use tracing::{info, warn};

use projwatch::registry::ProjectorRegistry;
use projwatch::stats::TimestampedCheckpoint;

use crate::cli::{ReportFormat, Simulate};

#[derive(Debug, Error)]
pub enum SimulateError {
    #[error("at least one projector is required (--projectors)")]
    NoProjectors,
    #[error("rate must be positive, got {rate} (--rate)")]
    NonPositiveRate { rate: i64 },
}

// One observation from a reporter thread, applied by the tracking thread.
struct ProgressReport {
    projector_id: String,
    checkpoint: i64,
    timestamp_utc: DateTime<Utc>,
}

pub(crate) fn validate(sim: &Simulate) -> Result<(), SimulateError> {
    if sim.projectors == 0 {
        return Err(SimulateError::NoProjectors);
    }
    if sim.rate <= 0 {
        return Err(SimulateError::NonPositiveRate { rate: sim.rate });
    }
    Ok(())
}

pub fn run_simulate(sim: Simulate) -> Result<()> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    {
        let stop = stop_flag.clone();
        let _ = ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        });
    }

    run_simulate_with_shutdown(sim, stop_flag)
}

pub(crate) fn run_simulate_with_shutdown(sim: Simulate, stop_flag: Arc<AtomicBool>) -> Result<()> {
    validate(&sim)?;
    info!(
        projectors = sim.projectors,
        rate = sim.rate,
        target = sim.target,
        "Starting projwatch simulation"
    );

    let registry = Arc::new(ProjectorRegistry::new());

    // Reports flow from the reporter threads to one tracking thread, which is
    // the only caller of the registry's write operations.
    let (report_tx, report_rx) = channel::bounded::<ProgressReport>(1024);

    // Reporter threads: each plays one projector advancing at a fixed rate.
    let mut reporters = Vec::new();
    for index in 0..sim.projectors {
        let report_tx = report_tx.clone();
        let stop = stop_flag.clone();
        let sim = sim.clone();
        reporters.push(thread::spawn(move || {
            let projector_id = format!("projector-{index}");
            // stagger rates so the ETAs diverge
            let rate = sim.rate * (index as i64 + 1);
            let mut checkpoint: i64 = 0;
            let mut tick: u64 = 0;
            while !stop.load(Ordering::Relaxed) {
                if sim.ticks > 0 && tick >= sim.ticks {
                    break;
                }
                checkpoint += rate;
                tick += 1;
                let report = ProgressReport {
                    projector_id: projector_id.clone(),
                    checkpoint,
                    timestamp_utc: Utc::now(),
                };
                if report_tx.send(report).is_err() {
                    // tracker gone; shutting down
                    break;
                }
                thread::sleep(Duration::from_millis(sim.interval_ms));
            }
        }));
    }
    drop(report_tx);

    // Tracking thread: drains reports into the registry.
    let registry_for_tracker = Arc::clone(&registry);
    let tracker = thread::spawn(move || {
        while let Ok(report) = report_rx.recv() {
            let stats = registry_for_tracker.get_or_create(&report.projector_id);
            if stats.last_checkpoint().is_none() {
                stats.log_event("first progress observed", report.timestamp_utc);
            }
            stats.track_progress(report.checkpoint, report.timestamp_utc);
            stats.store_property(
                "last-checkpoint",
                report.checkpoint.to_string(),
                report.timestamp_utc,
            );
        }
    });

    // Supervisor: once every reporter and the tracker are done, raise the
    // stop flag so the report loop below exits.
    let stop_for_supervisor = stop_flag.clone();
    let supervisor = thread::spawn(move || {
        for reporter in reporters {
            if reporter.join().is_err() {
                warn!("Reporter thread panicked");
            }
        }
        if tracker.join().is_err() {
            warn!("Tracking thread panicked");
        }
        stop_for_supervisor.store(true, Ordering::Relaxed);
    });

    // Report loop (main thread): periodically read ETAs for every projector.
    // Sleep in small slices so Ctrl+C stays responsive on long intervals.
    while !stop_flag.load(Ordering::Relaxed) {
        let mut remaining = sim.report_every_ms.max(1);
        while remaining > 0 && !stop_flag.load(Ordering::Relaxed) {
            let slice = remaining.min(200);
            thread::sleep(Duration::from_millis(slice));
            remaining -= slice;
        }
        if !stop_flag.load(Ordering::Relaxed) {
            emit_report(&registry, &sim);
        }
    }

    let _ = supervisor.join();

    // final snapshot after all reports are applied
    emit_report(&registry, &sim);
    info!("Shutting down");
    Ok(())
}

#[derive(serde::Serialize)]
struct ProjectorRow {
    id: String,
    last_checkpoint: Option<TimestampedCheckpoint>,
    eta_seconds: Option<i64>,
}

fn emit_report(registry: &ProjectorRegistry, sim: &Simulate) {
    let mut stats = registry.snapshot();
    stats.sort_by(|a, b| a.id().cmp(b.id()));

    match sim.format {
        ReportFormat::Text => {
            for s in &stats {
                let checkpoint = s.last_checkpoint().map(|c| c.checkpoint);
                let eta = s.time_to_reach(sim.target).map(|d| d.num_seconds());
                info!(
                    id = %s.id(),
                    checkpoint = ?checkpoint,
                    eta_seconds = ?eta,
                    target = sim.target,
                    "Progress"
                );
            }
        }
        ReportFormat::Json => {
            let rows: Vec<ProjectorRow> = stats
                .iter()
                .map(|s| ProjectorRow {
                    id: s.id().to_string(),
                    last_checkpoint: s.last_checkpoint(),
                    eta_seconds: s.time_to_reach(sim.target).map(|d| d.num_seconds()),
                })
                .collect();
            match serde_json::to_string_pretty(&rows) {
                Ok(out) => println!("{out}"),
                Err(e) => warn!(?e, "Failed to serialize report"),
            }
        }
    }
}
