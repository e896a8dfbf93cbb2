//! Response-lifecycle workflows.
//!
//! Two procedures are built from three operations:
//!
//! - **snapshot-and-clear**: list responses, write them to the snapshot file,
//!   and only then delete them remotely.
//! - **accept-toggle**: read-modify-write of the form's accepting flag.
//! - **rebuild**: fetch the ballot, run the [`TransformStrategy`], push it back.
//!
//! `reset_suggestions` is snapshot-and-clear on the suggestions form.
//! `update_ballot` reads the suggestions snapshot, closes the ballot, archives
//! and clears it, rebuilds it, and reopens it. Every step returns early on
//! error; nothing is rolled back. A failure after the close leaves the ballot
//! closed until the next successful run.
//!
//! `run_all` runs both procedures in order and records each outcome without
//! letting one failure stop the other.
use crate::config::FormTarget;
use crate::forms::{ApiError, FormsClient, ResponseFilter};
use crate::snapshot;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;

mod cancel;
mod report;
mod transform;

pub use cancel::CancelToken;
pub use report::{write_report, RunReport, WorkflowOutcome};
pub use transform::{transform_for, TransformStrategy};

pub const RESET_SUGGESTIONS: &str = "reset_suggestions";
pub const UPDATE_BALLOT: &str = "update_ballot";

/// Everything a workflow needs, passed explicitly instead of held globally.
pub struct WorkflowContext<'a> {
    pub client: &'a dyn FormsClient,
    pub suggestions: FormTarget,
    pub ballot: FormTarget,
    pub transform: Box<dyn TransformStrategy>,
    pub cancel: CancelToken,
}

/// Archive every response on `target` to its snapshot file, then delete them.
///
/// The delete is issued only after the snapshot is on disk. Returns the number
/// of archived responses.
pub fn snapshot_and_clear(ctx: &WorkflowContext<'_>, target: &FormTarget) -> Result<usize> {
    let form_id = target.form_id.as_str();
    let count = download(ctx, target, &target.snapshot_path)?;

    ctx.cancel.check("delete responses")?;
    ctx.client
        .batch_delete_responses(form_id, &ResponseFilter::all())
        .context("delete responses")?;
    tracing::info!(form_id, count, "responses cleared");
    Ok(count)
}

/// List responses on `target` and write them to `out` without clearing.
pub fn download(ctx: &WorkflowContext<'_>, target: &FormTarget, out: &Path) -> Result<usize> {
    let form_id = target.form_id.as_str();

    ctx.cancel.check("list responses")?;
    let responses = ctx
        .client
        .list_responses(form_id)
        .context("list responses")?;

    ctx.cancel.check("write snapshot")?;
    snapshot::write_snapshot(out, &responses).context("write snapshot")?;
    tracing::info!(
        form_id,
        path = %out.display(),
        count = responses.len(),
        "snapshot written"
    );
    Ok(responses.len())
}

/// Set whether `form_id` accepts submissions.
///
/// Always fetches and pushes, even when the flag already matches. There is no
/// compare-and-swap: a concurrent edit between the get and the update is
/// overwritten.
pub fn set_accepting(ctx: &WorkflowContext<'_>, form_id: &str, accepting: bool) -> Result<()> {
    ctx.cancel.check("get form")?;
    let mut form = ctx.client.get_form(form_id).context("get form")?;
    form.set_accepting_responses(accepting);

    ctx.cancel.check("update form")?;
    ctx.client
        .update_form(form_id, &form)
        .context("update form")?;
    tracing::info!(form_id, accepting, "accepting responses set");
    Ok(())
}

/// Archive and clear the suggestions form. The form stays open throughout.
pub fn reset_suggestions(ctx: &WorkflowContext<'_>) -> Result<()> {
    let target = &ctx.suggestions;
    snapshot_and_clear(ctx, target)
        .with_context(|| format!("snapshot and clear suggestions form {}", target.form_id))?;
    Ok(())
}

/// Rotate the ballot form from the saved suggestions snapshot.
pub fn update_ballot(ctx: &WorkflowContext<'_>) -> Result<()> {
    let ballot_id = ctx.ballot.form_id.as_str();

    ctx.cancel.check("read suggestions snapshot")?;
    let suggestions = snapshot::read_snapshot(&ctx.suggestions.snapshot_path)
        .context("read suggestions snapshot")?;
    tracing::debug!(count = suggestions.len(), "loaded suggestions snapshot");

    set_accepting(ctx, ballot_id, false)
        .with_context(|| format!("close ballot form {ballot_id}"))?;

    snapshot_and_clear(ctx, &ctx.ballot)
        .with_context(|| format!("snapshot and clear ballot form {ballot_id}"))?;

    ctx.cancel.check("fetch ballot form")?;
    let form = ctx
        .client
        .get_form(ballot_id)
        .with_context(|| format!("fetch ballot form {ballot_id}"))?;

    let form = ctx
        .transform
        .apply(&suggestions, form)
        .with_context(|| format!("apply {} transform", ctx.transform.name()))?;

    ctx.cancel.check("push ballot form")?;
    ctx.client
        .update_form(ballot_id, &form)
        .with_context(|| format!("push ballot form {ballot_id}"))?;

    set_accepting(ctx, ballot_id, true)
        .with_context(|| format!("reopen ballot form {ballot_id}"))?;
    Ok(())
}

/// Run both workflows in order. Failures are logged and recorded, never fatal.
pub fn run_all(ctx: &WorkflowContext<'_>) -> RunReport {
    let started_at_epoch_ms = report::now_epoch_ms();
    let workflows = vec![
        run_logged(RESET_SUGGESTIONS, || reset_suggestions(ctx)),
        run_logged(UPDATE_BALLOT, || update_ballot(ctx)),
    ];
    RunReport {
        started_at_epoch_ms,
        finished_at_epoch_ms: report::now_epoch_ms(),
        workflows,
    }
}

fn run_logged(name: &str, workflow: impl FnOnce() -> Result<()>) -> WorkflowOutcome {
    tracing::info!(workflow = name, "workflow started");
    let start = Instant::now();
    let result = workflow();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => {
            tracing::info!(workflow = name, elapsed_ms, "workflow finished");
            WorkflowOutcome {
                name: name.to_string(),
                ok: true,
                error: None,
                elapsed_ms,
            }
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::error!(workflow = name, elapsed_ms, error = %message, "workflow failed");
            if is_auth_failure(&err) {
                tracing::warn!("the forms API rejected the access token; refresh FORMS_ACCESS_TOKEN");
            }
            WorkflowOutcome {
                name: name.to_string(),
                ok: false,
                error: Some(message),
                elapsed_ms,
            }
        }
    }
}

fn is_auth_failure(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_auth_failure)
}
