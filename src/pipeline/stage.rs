use std::fmt;

/// Which per-run state a stage operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concern {
    Profile,
    Report,
    Socket,
    Verify,
    Cleanup,
}

/// One step of a profile run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ProfileInit,
    ReportInit,
    SocketInit,
    GetNextUrl,
    BeginConn,
    CreateReq,
    SendReq,
    RecvResp,
    Postprocess,
    VerifyResp,
    EndConn,
    ProcessStats,
    RequestDestroy,
    ResponseDestroy,
    SocketDestroy,
    LoopCondition,
    ReportStats,
    DestroyReport,
    ProfileDestroy,
}

impl Stage {
    pub const COUNT: usize = 19;

    pub const ALL: [Stage; Stage::COUNT] = [
        Stage::ProfileInit,
        Stage::ReportInit,
        Stage::SocketInit,
        Stage::GetNextUrl,
        Stage::BeginConn,
        Stage::CreateReq,
        Stage::SendReq,
        Stage::RecvResp,
        Stage::Postprocess,
        Stage::VerifyResp,
        Stage::EndConn,
        Stage::ProcessStats,
        Stage::RequestDestroy,
        Stage::ResponseDestroy,
        Stage::SocketDestroy,
        Stage::LoopCondition,
        Stage::ReportStats,
        Stage::DestroyReport,
        Stage::ProfileDestroy,
    ];

    /// Configuration element name of the stage.
    pub fn name(self) -> &'static str {
        match self {
            Stage::ProfileInit => "profile_init",
            Stage::ReportInit => "report_init",
            Stage::SocketInit => "socket_init",
            Stage::GetNextUrl => "get_next_url",
            Stage::BeginConn => "begin_conn",
            Stage::CreateReq => "create_req",
            Stage::SendReq => "send_req",
            Stage::RecvResp => "recv_resp",
            Stage::Postprocess => "postprocess",
            Stage::VerifyResp => "verify_resp",
            Stage::EndConn => "end_conn",
            Stage::ProcessStats => "process_stats",
            Stage::RequestDestroy => "request_destroy",
            Stage::ResponseDestroy => "response_destroy",
            Stage::SocketDestroy => "socket_destroy",
            Stage::LoopCondition => "loop_condition",
            Stage::ReportStats => "report_stats",
            Stage::DestroyReport => "destroy_report",
            Stage::ProfileDestroy => "profile_destroy",
        }
    }

    pub fn concern(self) -> Concern {
        match self {
            Stage::ProfileInit
            | Stage::GetNextUrl
            | Stage::CreateReq
            | Stage::Postprocess
            | Stage::LoopCondition
            | Stage::ProfileDestroy => Concern::Profile,
            Stage::ReportInit | Stage::ProcessStats | Stage::ReportStats | Stage::DestroyReport => {
                Concern::Report
            }
            Stage::SocketInit
            | Stage::BeginConn
            | Stage::SendReq
            | Stage::RecvResp
            | Stage::EndConn
            | Stage::SocketDestroy => Concern::Socket,
            Stage::VerifyResp => Concern::Verify,
            Stage::RequestDestroy | Stage::ResponseDestroy => Concern::Cleanup,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_declaration_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Stage::ALL.len());
    }
}
