//! Consumers of inbound report messages.

use imp_wire::Message;

const REPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reports");

/// Receives `STATUS`, `DONE`, `ERROR`, `WARNING` and `FATAL` messages that
/// arrive at an agent. Implementations must not block for long; they run on
/// the connection's thread.
pub trait ReportSink: Send + Sync {
    /// Consumes one report.
    fn receive(&self, report: &Message);
}

impl<F> ReportSink for F
where
    F: Fn(&Message) + Send + Sync,
{
    fn receive(&self, report: &Message) {
        self(report);
    }
}

/// Sink that logs each report with `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn receive(&self, report: &Message) {
        tracing::info!(
            target: REPORT_TARGET,
            source = %report.source(),
            kind = %report.kind(),
            body = report.body(),
            "report received"
        );
    }
}
