use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use imp_agent::{
    ShutdownSignal, StructuredLifecycleReporter, SystemConfigLoader, SystemShutdownSignal,
    bootstrap,
};

fn main() -> ExitCode {
    let runtime = match bootstrap(
        &SystemConfigLoader,
        Arc::new(StructuredLifecycleReporter::new()),
    ) {
        Ok(runtime) => runtime,
        Err(error) => return report_failure(&error),
    };

    let waited = SystemShutdownSignal.wait();
    let stopped = runtime.shutdown();
    if let Err(error) = waited {
        return report_failure(&error);
    }
    match stopped {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report_failure(&error),
    }
}

fn report_failure(error: &dyn std::error::Error) -> ExitCode {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "imp-agent: {error}");
    ExitCode::FAILURE
}
