//! # Farm
//!
//! A farm starts one named OS thread per farmer instance, all before any is
//! joined, and waits for every one of them. Farmer threads share nothing
//! but the configuration tree and the runtime context; each owns its
//! profile state and connections.

use crate::config::{schema, ConfigTree};
use crate::context::RuntimeContext;
use crate::error::{FloodError, Result};
use crate::farmer::run_farmer;
use crate::pipeline::RunSummary;
use serde::Serialize;
use std::process;
use std::thread;
use tracing::{error, info};

/// Per-thread results of a farm run, in start order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FarmSummary {
    pub farmers: Vec<(String, RunSummary)>,
}

impl FarmSummary {
    pub fn total(&self) -> RunSummary {
        self.farmers
            .iter()
            .fold(RunSummary::default(), |mut total, (_, summary)| {
                total += *summary;
                total
            })
    }
}

/// Farmer name and thread name of one worker.
#[derive(Debug, Clone)]
struct Worker {
    farmer: String,
    thread: String,
}

fn workers(config: &ConfigTree, farm_name: &str) -> Result<Vec<Worker>> {
    let farm = config
        .find_root()
        .find_child_matching(schema::FARM, schema::NAME, farm_name)
        .ok_or_else(|| FloodError::missing(schema::FARM, format!("no farm named '{}'", farm_name)))?;

    let mut workers = Vec::new();
    for usefarmer in farm.children_named(schema::FARM_USEFARMER) {
        let count = usefarmer
            .parse_attribute::<usize>(schema::FARM_USEFARMER_COUNT)?
            .unwrap_or(1);
        for i in 0..count {
            workers.push(Worker {
                farmer: usefarmer.text().to_string(),
                thread: format!("{}-{}", usefarmer.text(), i),
            });
        }
    }

    if workers.is_empty() {
        return Err(FloodError::Config(format!(
            "farm '{}' has no <{}> elements to run",
            farm_name,
            schema::FARM_USEFARMER
        )));
    }
    Ok(workers)
}

fn farmer_worker(ctx: &RuntimeContext, config: &ConfigTree, farmer: &str) -> Result<RunSummary> {
    run_farmer(ctx, config, farmer).map_err(|err| {
        error!("Error running farmer '{}': {}", farmer, err);
        if err.is_fatal() && ctx.exit_on_fatal() {
            process::exit(-1);
        }
        err
    })
}

/// Run every farmer of the farm named `farm_name` concurrently.
///
/// All workers are joined even when one fails; the first failure in start
/// order is returned.
pub fn run_farm(ctx: &RuntimeContext, config: &ConfigTree, farm_name: &str) -> Result<FarmSummary> {
    let workers = workers(config, farm_name)?;
    info!("Farm '{}' starting {} farmer threads", farm_name, workers.len());

    thread::scope(|scope| -> Result<FarmSummary> {
        let mut handles = Vec::with_capacity(workers.len());
        for worker in &workers {
            ctx.output()
                .line(format_args!("Starting farmer_worker thread '{}'.", worker.thread))?;
            let handle = thread::Builder::new()
                .name(worker.thread.clone())
                .spawn_scoped(scope, move || farmer_worker(ctx, config, &worker.farmer))?;
            handles.push((worker, handle));
        }

        let mut summary = FarmSummary::default();
        let mut failure = None;
        for (i, (worker, handle)) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(run)) => {
                    ctx.output().line(format_args!(
                        "Farmer '{}' ('{}') completed successfully.",
                        i, worker.thread
                    ))?;
                    summary.farmers.push((worker.thread.clone(), run));
                }
                Ok(Err(source)) => {
                    failure.get_or_insert(FloodError::FarmerFailed {
                        name: worker.thread.clone(),
                        source: Box::new(source),
                    });
                }
                Err(_) => {
                    error!("Error joining farmer thread '{}' ('{}')", i, worker.thread);
                    failure.get_or_insert(FloodError::FarmerPanicked(worker.thread.clone()));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OutputSink;

    #[test]
    fn test_usefarmer_count_spawns_copies() {
        let config = ConfigTree::parse(
            r#"<flood><farm><name>Bingo</name>
                <usefarmer count="2">Joe</usefarmer>
                <usefarmer>Ann</usefarmer>
            </farm></flood>"#,
        )
        .unwrap();
        let names: Vec<String> = workers(&config, "Bingo")
            .unwrap()
            .into_iter()
            .map(|w| w.thread)
            .collect();
        assert_eq!(names, vec!["Joe-0", "Joe-1", "Ann-0"]);
    }

    #[test]
    fn test_empty_farm_is_an_error() {
        let config = ConfigTree::parse("<flood><farm><name>Bingo</name></farm></flood>").unwrap();
        assert!(matches!(workers(&config, "Bingo"), Err(FloodError::Config(_))));
        assert!(matches!(
            workers(&config, "Other"),
            Err(FloodError::MissingNode { .. })
        ));
    }

    #[test]
    fn test_failed_farmer_is_reported_after_join() {
        let config = ConfigTree::parse(
            "<flood><farm><name>Bingo</name><usefarmer>Ghost</usefarmer></farm></flood>",
        )
        .unwrap();
        let (sink, captured) = OutputSink::memory();
        let ctx = RuntimeContext::new(sink).unwrap();

        let err = run_farm(&ctx, &config, "Bingo").unwrap_err();
        assert!(matches!(err, FloodError::FarmerFailed { ref name, .. } if name == "Ghost-0"));
        assert!(!err.is_fatal());
        assert_eq!(captured.lines(), vec!["Starting farmer_worker thread 'Ghost-0'."]);
    }

    #[test]
    fn test_summary_total() {
        let one = RunSummary {
            cycles: 3,
            valid: 2,
            invalid: 1,
        };
        let summary = FarmSummary {
            farmers: vec![("a-0".into(), one), ("b-0".into(), one)],
        };
        assert_eq!(summary.total().cycles, 6);
        assert_eq!(summary.total().invalid, 2);
    }
}
