//! Drive a run to a terminal status, confirming it when its gate opens.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::cancel::CancelToken;
use crate::core::confirmation::{is_terminal, needs_confirmation};
use crate::core::types::{Run, Workspace};
use crate::io::remote::RemoteService;

/// How to poll a run.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between two status reads.
    pub interval: Duration,
    /// Comment sent with each confirmation.
    pub apply_comment: Option<String>,
    /// Interrupts the delay between reads.
    pub cancel: CancelToken,
}

impl PollConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            apply_comment: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Poll `run_id` until it is terminal and return its final state.
///
/// A confirmation is issued whenever the run's active gate requires one. The
/// service moves the run out of the gated status once confirmed, so the same
/// status is never confirmed twice. There is no iteration limit; the caller
/// bounds the wait by cancelling `config.cancel` (surfaced as
/// [`crate::cancel::Cancelled`]) or by terminating the process.
#[instrument(skip_all, fields(run_id = %run_id, interval_secs = config.interval.as_secs()))]
pub fn wait_for_run<S: RemoteService>(
    service: &S,
    workspace: &Workspace,
    run_id: &str,
    config: &PollConfig,
) -> Result<Run> {
    let mut polls = 0u64;
    loop {
        let run = service.read_run(run_id).context("retrieving run")?;
        polls += 1;
        debug!(status = %run.status, polls, "polled run");

        if needs_confirmation(&run, workspace) {
            info!(status = %run.status, "confirming run");
            service
                .apply_run(run_id, config.apply_comment.as_deref())
                .context("applying run")?;
        }
        if is_terminal(&run) {
            info!(status = %run.status, polls, "run finished");
            return Ok(run);
        }
        config.cancel.wait(config.interval)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancelled;
    use crate::core::types::RunStatus;
    use crate::test_support::{Call, Op, ScriptedService, run_with_status};

    fn config() -> PollConfig {
        PollConfig::new(Duration::ZERO)
    }

    fn workspace() -> Workspace {
        Workspace {
            id: "ws-foo".to_string(),
            cost_estimation_enabled: false,
        }
    }

    fn confirmable(status: RunStatus) -> Run {
        let mut run = run_with_status("run-1", status);
        run.is_confirmable = true;
        run.has_changes = true;
        run
    }

    #[test]
    fn confirms_planned_run_once_and_waits_for_apply() {
        let service = ScriptedService::new().with_run_reads(vec![
            confirmable(RunStatus::Planning),
            confirmable(RunStatus::Planned),
            run_with_status("run-1", RunStatus::Applying),
            run_with_status("run-1", RunStatus::Applied),
        ]);
        let mut config = config();
        config.apply_comment = Some("Applying!".to_string());

        let run = wait_for_run(&service, &workspace(), "run-1", &config).expect("wait");
        assert_eq!(run.status, RunStatus::Applied);
        assert_eq!(service.calls_of(Op::ReadRun).len(), 4);
        assert_eq!(
            service.calls_of(Op::ApplyRun),
            vec![Call::ApplyRun {
                run_id: "run-1".to_string(),
                comment: Some("Applying!".to_string()),
            }]
        );
    }

    #[test]
    fn terminal_run_returns_after_one_read() {
        let service = ScriptedService::new()
            .with_run_reads(vec![run_with_status("run-1", RunStatus::PlannedAndFinished)]);
        let run = wait_for_run(&service, &workspace(), "run-1", &config()).expect("wait");
        assert_eq!(run.status, RunStatus::PlannedAndFinished);
        assert!(service.calls_of(Op::ApplyRun).is_empty());
    }

    #[test]
    fn read_error_aborts_without_retry() {
        let service = ScriptedService::new().failing(Op::ReadRun, "foo");
        let err = wait_for_run(&service, &workspace(), "run-1", &config()).unwrap_err();
        assert_eq!(format!("{err:#}"), "retrieving run: foo");
        assert_eq!(service.calls().len(), 1);
    }

    #[test]
    fn apply_error_aborts() {
        let service = ScriptedService::new()
            .with_run_reads(vec![confirmable(RunStatus::Planned)])
            .failing(Op::ApplyRun, "locked");
        let err = wait_for_run(&service, &workspace(), "run-1", &config()).unwrap_err();
        assert_eq!(format!("{err:#}"), "applying run: locked");
    }

    #[test]
    fn cancelled_wait_stops_polling() {
        let service = ScriptedService::new()
            .with_run_reads(vec![run_with_status("run-1", RunStatus::Planning)]);
        let config = PollConfig::new(Duration::from_secs(3600));
        config.cancel.cancel();

        let err = wait_for_run(&service, &workspace(), "run-1", &config).unwrap_err();
        assert!(err.downcast_ref::<Cancelled>().is_some());
        assert_eq!(service.calls_of(Op::ReadRun).len(), 1);
    }
}
