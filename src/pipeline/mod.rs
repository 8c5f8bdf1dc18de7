//! # Event Pipeline
//!
//! A profile run walks a fixed list of stages. The implementation behind
//! each stage comes from a static [`registry`]: every stage starts with its
//! generic implementation, handler groups named by the profile replace whole
//! families, and elements named after single stages override last.
//!
//! Per iteration the runner calls, in order:
//!
//! ```text
//! get_next_url -> begin_conn -> create_req -> send_req -> recv_resp
//!   -> postprocess -> verify_resp -> end_conn -> process_stats
//!   -> request_destroy -> response_destroy -> socket_destroy -> loop_condition
//! ```
//!
//! and once the loop ends, `report_stats`, `destroy_report` and
//! `profile_destroy`. The first stage to fail aborts the run and its error
//! is returned to the farmer.

mod dispatch;
pub mod registry;
pub mod stage;

pub use registry::{EventHandlers, Handler, Registration, REGISTRY};
pub use stage::{Concern, Stage};

use crate::config::ConfigTree;
use crate::context::RuntimeContext;
use crate::error::{FloodError, Result};
use crate::http::Timer;
use crate::report::Sample;
use crate::verify::Verification;
use serde::Serialize;
use std::ops::AddAssign;
use tracing::{debug, error, info};

/// Iteration counts of one or more profile runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub valid: u64,
    pub invalid: u64,
}

impl RunSummary {
    pub fn record(&mut self, verification: Verification) {
        self.cycles += 1;
        if verification.is_valid() {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }
    }
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.cycles += other.cycles;
        self.valid += other.valid;
        self.invalid += other.invalid;
    }
}

fn stage_failed(stage: Stage) -> impl FnOnce(FloodError) -> FloodError {
    move |err| {
        error!("{} failed: {}", stage, err);
        err
    }
}

/// Run the profile named `profile_name` to completion.
pub fn run_profile(ctx: &RuntimeContext, config: &ConfigTree, profile_name: &str) -> Result<RunSummary> {
    let handlers = EventHandlers::resolve(config, profile_name)?;
    debug!(
        "Profile '{}' resolved: {}",
        profile_name,
        Stage::ALL
            .iter()
            .map(|stage| handlers.name(*stage))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut profile = handlers
        .profile_init(ctx, config, profile_name)
        .map_err(stage_failed(Stage::ProfileInit))?;
    let mut report = handlers
        .report_init(config, profile_name)
        .map_err(stage_failed(Stage::ReportInit))?;
    let mut socket = handlers.socket_init().map_err(stage_failed(Stage::SocketInit))?;

    let mut summary = RunSummary::default();
    loop {
        let mut request = handlers
            .get_next_url(&mut profile)
            .map_err(stage_failed(Stage::GetNextUrl))?;

        let mut timer = Timer::start();
        handlers
            .begin_conn(ctx, &mut socket, &mut request)
            .map_err(stage_failed(Stage::BeginConn))?;
        timer.mark_connect();

        handlers
            .create_req(&profile, &mut request)
            .map_err(stage_failed(Stage::CreateReq))?;

        handlers
            .send_req(ctx, &mut socket, &request)
            .map_err(stage_failed(Stage::SendReq))?;
        timer.mark_write();

        let response = handlers
            .recv_resp(ctx, &mut socket, &request)
            .map_err(stage_failed(Stage::RecvResp))?;
        timer.mark_read();

        handlers
            .postprocess(&mut profile, &response)
            .map_err(stage_failed(Stage::Postprocess))?;

        let verification = handlers
            .verify_resp(&response)
            .map_err(stage_failed(Stage::VerifyResp))?;

        handlers
            .end_conn(&mut socket, &response)
            .map_err(stage_failed(Stage::EndConn))?;
        timer.mark_close();

        let sample = Sample {
            request: &request,
            response: &response,
            verification,
            timer: &timer,
        };
        handlers
            .process_stats(ctx.output(), &mut report, &sample)
            .map_err(stage_failed(Stage::ProcessStats))?;
        summary.record(verification);

        handlers
            .request_destroy(request)
            .map_err(stage_failed(Stage::RequestDestroy))?;
        handlers
            .response_destroy(response)
            .map_err(stage_failed(Stage::ResponseDestroy))?;
        handlers
            .socket_destroy(&socket)
            .map_err(stage_failed(Stage::SocketDestroy))?;

        if !handlers
            .loop_condition(&mut profile)
            .map_err(stage_failed(Stage::LoopCondition))?
        {
            break;
        }
    }

    handlers
        .report_stats(ctx.output(), &report)
        .map_err(stage_failed(Stage::ReportStats))?;
    handlers
        .destroy_report(report)
        .map_err(stage_failed(Stage::DestroyReport))?;
    handlers
        .profile_destroy(profile)
        .map_err(stage_failed(Stage::ProfileDestroy))?;
    drop(socket);

    info!(
        "Profile '{}' finished: {} requests, {} OK, {} failed",
        profile_name, summary.cycles, summary.valid, summary.invalid
    );
    Ok(summary)
}
