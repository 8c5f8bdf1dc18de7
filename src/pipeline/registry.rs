//! Static registry of stage implementations and their resolution from a
//! profile's configuration.
//!
//! Every stage starts out with its generic implementation. Groups
//! (`<profiletype>`, `<socket>`, `<report>`) are applied next, then any
//! element named after a stage overrides that one stage. Names are matched
//! ASCII case-insensitively and must be registered for that exact stage.

use super::stage::{Concern, Stage};
use crate::config::{schema, ConfigNode, ConfigTree};
use crate::error::{FloodError, Result};
use tracing::debug;

/// Implementation family chosen for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Generic,
    RoundRobin,
    KeepAlive,
    Simple,
    Easy,
    RelativeTimes,
    Latency,
    Verify200,
    VerifyStatusCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub stage: Stage,
    pub name: &'static str,
    pub handler: Handler,
}

const fn reg(stage: Stage, name: &'static str, handler: Handler) -> Registration {
    Registration {
        stage,
        name,
        handler,
    }
}

/// Every known (stage, implementation) pair. The first entry of a stage is
/// its default.
pub static REGISTRY: &[Registration] = &[
    reg(Stage::ProfileInit, "generic_profile_init", Handler::Generic),
    reg(Stage::ProfileInit, "round_robin_profile_init", Handler::RoundRobin),
    reg(Stage::ReportInit, "generic_report_init", Handler::Generic),
    reg(Stage::ReportInit, "simple_report_init", Handler::Simple),
    reg(Stage::ReportInit, "easy_report_init", Handler::Easy),
    reg(Stage::ReportInit, "relative_times_report_init", Handler::RelativeTimes),
    reg(Stage::ReportInit, "latency_report_init", Handler::Latency),
    reg(Stage::SocketInit, "generic_socket_init", Handler::Generic),
    reg(Stage::SocketInit, "keepalive_socket_init", Handler::KeepAlive),
    reg(Stage::GetNextUrl, "generic_get_next_url", Handler::Generic),
    reg(Stage::GetNextUrl, "round_robin_get_next_url", Handler::RoundRobin),
    reg(Stage::CreateReq, "generic_create_req", Handler::Generic),
    reg(Stage::CreateReq, "round_robin_create_req", Handler::RoundRobin),
    reg(Stage::BeginConn, "generic_begin_conn", Handler::Generic),
    reg(Stage::BeginConn, "keepalive_begin_conn", Handler::KeepAlive),
    reg(Stage::SendReq, "generic_send_req", Handler::Generic),
    reg(Stage::SendReq, "keepalive_send_req", Handler::KeepAlive),
    reg(Stage::RecvResp, "generic_recv_resp", Handler::Generic),
    reg(Stage::RecvResp, "keepalive_recv_resp", Handler::KeepAlive),
    reg(Stage::Postprocess, "generic_postprocess", Handler::Generic),
    reg(Stage::Postprocess, "round_robin_postprocess", Handler::RoundRobin),
    reg(Stage::VerifyResp, "generic_verify_resp", Handler::Generic),
    reg(Stage::VerifyResp, "verify_200", Handler::Verify200),
    reg(Stage::VerifyResp, "verify_status_code", Handler::VerifyStatusCode),
    reg(Stage::EndConn, "generic_end_conn", Handler::Generic),
    reg(Stage::EndConn, "keepalive_end_conn", Handler::KeepAlive),
    reg(Stage::ProcessStats, "generic_process_stats", Handler::Generic),
    reg(Stage::ProcessStats, "simple_process_stats", Handler::Simple),
    reg(Stage::ProcessStats, "easy_process_stats", Handler::Easy),
    reg(Stage::ProcessStats, "relative_times_process_stats", Handler::RelativeTimes),
    reg(Stage::ProcessStats, "latency_process_stats", Handler::Latency),
    reg(Stage::RequestDestroy, "generic_request_destroy", Handler::Generic),
    reg(Stage::ResponseDestroy, "generic_response_destroy", Handler::Generic),
    reg(Stage::SocketDestroy, "generic_socket_destroy", Handler::Generic),
    reg(Stage::SocketDestroy, "keepalive_socket_destroy", Handler::KeepAlive),
    reg(Stage::LoopCondition, "generic_loop_condition", Handler::Generic),
    reg(Stage::LoopCondition, "round_robin_loop_condition", Handler::RoundRobin),
    reg(Stage::ReportStats, "generic_report_stats", Handler::Generic),
    reg(Stage::ReportStats, "simple_report_stats", Handler::Simple),
    reg(Stage::ReportStats, "easy_report_stats", Handler::Easy),
    reg(Stage::ReportStats, "relative_times_report_stats", Handler::RelativeTimes),
    reg(Stage::ReportStats, "latency_report_stats", Handler::Latency),
    reg(Stage::DestroyReport, "generic_destroy_report", Handler::Generic),
    reg(Stage::DestroyReport, "simple_destroy_report", Handler::Simple),
    reg(Stage::DestroyReport, "easy_destroy_report", Handler::Easy),
    reg(Stage::DestroyReport, "relative_times_destroy_report", Handler::RelativeTimes),
    reg(Stage::DestroyReport, "latency_destroy_report", Handler::Latency),
    reg(Stage::ProfileDestroy, "generic_profile_destroy", Handler::Generic),
    reg(Stage::ProfileDestroy, "round_robin_profile_destroy", Handler::RoundRobin),
];

/// A named bundle of implementations selected by one configuration element.
#[derive(Debug, Clone, Copy)]
struct Group {
    element: &'static str,
    value: &'static str,
    concern: Concern,
    handler: Handler,
}

static GROUPS: &[Group] = &[
    Group {
        element: schema::PROFILE_TYPE,
        value: "round_robin",
        concern: Concern::Profile,
        handler: Handler::RoundRobin,
    },
    Group {
        element: schema::PROFILE_SOCKET,
        value: "generic",
        concern: Concern::Socket,
        handler: Handler::Generic,
    },
    Group {
        element: schema::PROFILE_SOCKET,
        value: "keepalive",
        concern: Concern::Socket,
        handler: Handler::KeepAlive,
    },
    Group {
        element: schema::PROFILE_REPORT,
        value: "simple",
        concern: Concern::Report,
        handler: Handler::Simple,
    },
    Group {
        element: schema::PROFILE_REPORT,
        value: "easy",
        concern: Concern::Report,
        handler: Handler::Easy,
    },
    Group {
        element: schema::PROFILE_REPORT,
        value: "relative_times",
        concern: Concern::Report,
        handler: Handler::RelativeTimes,
    },
    Group {
        element: schema::PROFILE_REPORT,
        value: "latency",
        concern: Concern::Report,
        handler: Handler::Latency,
    },
];

const GROUP_ELEMENTS: [&str; 3] = [schema::PROFILE_TYPE, schema::PROFILE_SOCKET, schema::PROFILE_REPORT];

/// Look up a registered implementation by stage and name.
pub fn lookup(stage: Stage, name: &str) -> Option<&'static Registration> {
    REGISTRY
        .iter()
        .find(|r| r.stage == stage && r.name.eq_ignore_ascii_case(name.trim()))
}

/// The implementation chosen for every stage of one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHandlers {
    slots: [&'static Registration; Stage::COUNT],
}

impl Default for EventHandlers {
    fn default() -> Self {
        let slots = Stage::ALL.map(|stage| {
            REGISTRY
                .iter()
                .find(|r| r.stage == stage)
                .unwrap_or(&REGISTRY[0])
        });
        Self { slots }
    }
}

impl EventHandlers {
    /// Resolve the handlers of the profile named `profile_name`.
    pub fn resolve(config: &ConfigTree, profile_name: &str) -> Result<Self> {
        let profile = config
            .find_root()
            .find_child_matching(schema::PROFILE, schema::NAME, profile_name)
            .ok_or_else(|| {
                FloodError::missing(schema::PROFILE, format!("no profile named '{}'", profile_name))
            })?;
        Self::from_profile(profile)
    }

    /// Resolve handlers from a `<profile>` element.
    pub fn from_profile(profile: &ConfigNode) -> Result<Self> {
        let mut handlers = Self::default();

        for element in GROUP_ELEMENTS {
            if let Some(value) = profile.child_text(element) {
                handlers.apply_group(element, value)?;
            }
        }

        for stage in Stage::ALL {
            if let Some(name) = profile.child_text(stage.name()) {
                let registration = lookup(stage, name).ok_or_else(|| FloodError::UnknownHandler {
                    stage: stage.name(),
                    name: name.to_string(),
                })?;
                debug!("Stage '{}' overridden with '{}'", stage, registration.name);
                handlers.slots[stage.index()] = registration;
            }
        }

        Ok(handlers)
    }

    fn apply_group(&mut self, element: &'static str, value: &str) -> Result<()> {
        let group = GROUPS
            .iter()
            .find(|g| g.element == element && g.value.eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| FloodError::UnknownHandler {
                stage: element,
                name: value.to_string(),
            })?;

        for registration in REGISTRY
            .iter()
            .filter(|r| r.stage.concern() == group.concern && r.handler == group.handler)
        {
            self.slots[registration.stage.index()] = registration;
        }
        debug!("Applied {} group '{}'", element, group.value);
        Ok(())
    }

    pub fn handler(&self, stage: Stage) -> Handler {
        self.slots[stage.index()].handler
    }

    /// Registered name of the implementation assigned to `stage`.
    pub fn name(&self, stage: Stage) -> &'static str {
        self.slots[stage.index()].name
    }
}
