//! Stage dispatch: each method runs the implementation resolved for its
//! stage against the matching per-run state.

use super::registry::{EventHandlers, Handler};
use super::stage::Stage;
use crate::config::ConfigTree;
use crate::context::{OutputSink, RuntimeContext};
use crate::error::{FloodError, Result};
use crate::http::{Request, Response};
use crate::profile::{ProfileState, RoundRobinProfile};
use crate::report::{
    EasyReport, LatencyReport, RelativeTimesReport, ReportState, Sample, SimpleReport,
};
use crate::socket::{GenericSocket, KeepAliveSocket, SocketState};
use crate::verify::{self, Verification};

impl EventHandlers {
    fn mismatch(&self, stage: Stage, state: &'static str) -> FloodError {
        FloodError::HandlerMismatch {
            stage: stage.name(),
            handler: self.name(stage),
            state,
        }
    }

    pub(crate) fn profile_init(
        &self,
        ctx: &RuntimeContext,
        config: &ConfigTree,
        profile_name: &str,
    ) -> Result<ProfileState> {
        match self.handler(Stage::ProfileInit) {
            Handler::RoundRobin => Ok(ProfileState::RoundRobin(Box::new(
                RoundRobinProfile::init(ctx, config, profile_name)?,
            ))),
            Handler::Generic => Err(FloodError::NotImplemented(Stage::ProfileInit.name())),
            _ => Err(self.mismatch(Stage::ProfileInit, "no profile")),
        }
    }

    pub(crate) fn report_init(&self, config: &ConfigTree, profile_name: &str) -> Result<ReportState> {
        Ok(match self.handler(Stage::ReportInit) {
            Handler::Generic => ReportState::Empty,
            Handler::Simple => ReportState::Simple(SimpleReport::new()),
            Handler::Easy => ReportState::Easy(EasyReport::new()),
            Handler::RelativeTimes => ReportState::RelativeTimes(RelativeTimesReport::new()),
            Handler::Latency => {
                ReportState::Latency(Box::new(LatencyReport::init(config, profile_name)?))
            }
            _ => return Err(self.mismatch(Stage::ReportInit, "no report")),
        })
    }

    pub(crate) fn socket_init(&self) -> Result<SocketState> {
        match self.handler(Stage::SocketInit) {
            Handler::Generic => Ok(SocketState::Generic(GenericSocket::new())),
            Handler::KeepAlive => Ok(SocketState::KeepAlive(KeepAliveSocket::new())),
            _ => Err(self.mismatch(Stage::SocketInit, "no socket")),
        }
    }

    pub(crate) fn get_next_url(&self, profile: &mut ProfileState) -> Result<Request> {
        match (self.handler(Stage::GetNextUrl), profile) {
            (Handler::RoundRobin, ProfileState::RoundRobin(rr)) => rr.get_next_url(),
            (Handler::Generic, _) => Err(FloodError::NotImplemented(Stage::GetNextUrl.name())),
            (_, state) => Err(self.mismatch(Stage::GetNextUrl, state.kind())),
        }
    }

    pub(crate) fn create_req(&self, profile: &ProfileState, request: &mut Request) -> Result<()> {
        match (self.handler(Stage::CreateReq), profile) {
            (Handler::RoundRobin, ProfileState::RoundRobin(rr)) => rr.create_req(request),
            (Handler::Generic, _) => {
                request.serialize(&[]);
                Ok(())
            }
            (_, state) => Err(self.mismatch(Stage::CreateReq, state.kind())),
        }
    }

    pub(crate) fn begin_conn(
        &self,
        ctx: &RuntimeContext,
        socket: &mut SocketState,
        request: &mut Request,
    ) -> Result<()> {
        match (self.handler(Stage::BeginConn), socket) {
            (Handler::Generic, SocketState::Generic(s)) => s.begin_conn(ctx, request),
            (Handler::KeepAlive, SocketState::KeepAlive(s)) => s.begin_conn(ctx, request),
            (_, state) => Err(self.mismatch(Stage::BeginConn, state.kind())),
        }
    }

    pub(crate) fn send_req(
        &self,
        ctx: &RuntimeContext,
        socket: &mut SocketState,
        request: &Request,
    ) -> Result<()> {
        match (self.handler(Stage::SendReq), socket) {
            (Handler::Generic, SocketState::Generic(s)) => s.send_req(request),
            (Handler::KeepAlive, SocketState::KeepAlive(s)) => s.send_req(ctx, request),
            (_, state) => Err(self.mismatch(Stage::SendReq, state.kind())),
        }
    }

    pub(crate) fn recv_resp(
        &self,
        ctx: &RuntimeContext,
        socket: &mut SocketState,
        request: &Request,
    ) -> Result<Response> {
        match (self.handler(Stage::RecvResp), socket) {
            (Handler::Generic, SocketState::Generic(s)) => s.recv_resp(request),
            (Handler::KeepAlive, SocketState::KeepAlive(s)) => s.recv_resp(ctx, request),
            (_, state) => Err(self.mismatch(Stage::RecvResp, state.kind())),
        }
    }

    pub(crate) fn postprocess(&self, profile: &mut ProfileState, response: &Response) -> Result<()> {
        match (self.handler(Stage::Postprocess), profile) {
            (Handler::RoundRobin, ProfileState::RoundRobin(rr)) => rr.postprocess(response),
            (Handler::Generic, _) => Ok(()),
            (_, state) => Err(self.mismatch(Stage::Postprocess, state.kind())),
        }
    }

    pub(crate) fn verify_resp(&self, response: &Response) -> Result<Verification> {
        match self.handler(Stage::VerifyResp) {
            Handler::Verify200 => Ok(verify::verify_200(response)),
            Handler::VerifyStatusCode => Ok(verify::verify_status_code(response)),
            Handler::Generic => Err(FloodError::NotImplemented(Stage::VerifyResp.name())),
            _ => Err(self.mismatch(Stage::VerifyResp, "response")),
        }
    }

    pub(crate) fn end_conn(&self, socket: &mut SocketState, response: &Response) -> Result<()> {
        match (self.handler(Stage::EndConn), socket) {
            (Handler::Generic, SocketState::Generic(s)) => s.end_conn(),
            (Handler::KeepAlive, SocketState::KeepAlive(s)) => s.end_conn(response),
            (_, state) => return Err(self.mismatch(Stage::EndConn, state.kind())),
        }
        Ok(())
    }

    pub(crate) fn process_stats(
        &self,
        out: &OutputSink,
        report: &mut ReportState,
        sample: &Sample<'_>,
    ) -> Result<()> {
        match (self.handler(Stage::ProcessStats), report) {
            (Handler::Generic, _) => Ok(()),
            (Handler::Simple, ReportState::Simple(r)) => r.process_stats(out, sample),
            (Handler::Easy, ReportState::Easy(r)) => r.process_stats(out, sample),
            (Handler::RelativeTimes, ReportState::RelativeTimes(r)) => r.process_stats(out, sample),
            (Handler::Latency, ReportState::Latency(r)) => r.process_stats(sample),
            (_, state) => Err(self.mismatch(Stage::ProcessStats, state.kind())),
        }
    }

    pub(crate) fn request_destroy(&self, request: Request) -> Result<()> {
        drop(request);
        Ok(())
    }

    pub(crate) fn response_destroy(&self, response: Response) -> Result<()> {
        drop(response);
        Ok(())
    }

    /// Connections outlive the iteration; see `end_conn`.
    pub(crate) fn socket_destroy(&self, socket: &SocketState) -> Result<()> {
        match (self.handler(Stage::SocketDestroy), socket) {
            (Handler::Generic, SocketState::Generic(_))
            | (Handler::KeepAlive, SocketState::KeepAlive(_)) => Ok(()),
            (_, state) => Err(self.mismatch(Stage::SocketDestroy, state.kind())),
        }
    }

    pub(crate) fn loop_condition(&self, profile: &mut ProfileState) -> Result<bool> {
        match (self.handler(Stage::LoopCondition), profile) {
            (Handler::RoundRobin, ProfileState::RoundRobin(rr)) => Ok(rr.loop_condition()),
            (Handler::Generic, _) => Ok(false),
            (_, state) => Err(self.mismatch(Stage::LoopCondition, state.kind())),
        }
    }

    pub(crate) fn report_stats(&self, out: &OutputSink, report: &ReportState) -> Result<()> {
        match (self.handler(Stage::ReportStats), report) {
            (Handler::Generic, _)
            | (Handler::Easy, ReportState::Easy(_))
            | (Handler::RelativeTimes, ReportState::RelativeTimes(_)) => Ok(()),
            (Handler::Simple, ReportState::Simple(r)) => r.report_stats(out),
            (Handler::Latency, ReportState::Latency(r)) => r.report_stats(out),
            (_, state) => Err(self.mismatch(Stage::ReportStats, state.kind())),
        }
    }

    pub(crate) fn destroy_report(&self, report: ReportState) -> Result<()> {
        match (self.handler(Stage::DestroyReport), &report) {
            (Handler::Generic, _)
            | (Handler::Simple, ReportState::Simple(_))
            | (Handler::Easy, ReportState::Easy(_))
            | (Handler::RelativeTimes, ReportState::RelativeTimes(_))
            | (Handler::Latency, ReportState::Latency(_)) => Ok(()),
            (_, state) => Err(self.mismatch(Stage::DestroyReport, state.kind())),
        }
    }

    pub(crate) fn profile_destroy(&self, profile: ProfileState) -> Result<()> {
        match (self.handler(Stage::ProfileDestroy), &profile) {
            (Handler::Generic, _) | (Handler::RoundRobin, ProfileState::RoundRobin(_)) => Ok(()),
            (_, state) => Err(self.mismatch(Stage::ProfileDestroy, state.kind())),
        }
    }
}
