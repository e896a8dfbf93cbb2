use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod config;
mod forms;
mod snapshot;
mod tally;
mod workflow;

use cli::{
    AcceptingArgs, Command, DownloadArgs, FormArgs, RootArgs, RunArgs, ShowArgs, TallyArgs,
};
use config::{Config, FormRole};
use forms::{FormMetadata, HttpFormsClient};
use workflow::{CancelToken, WorkflowContext};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let config = config::load_config(&args.config)?;
    let command = match args.command {
        Command::Tally(tally_args) => return cmd_tally(&config, tally_args),
        command => command,
    };
    let client = HttpFormsClient::new(
        config.require_api_base()?,
        config.require_access_token()?,
        config.timeout,
    );
    let cancel = match &command {
        Command::Run(RunArgs {
            max_runtime_secs: Some(secs),
            ..
        }) => CancelToken::with_deadline(Duration::from_secs(*secs)),
        _ => CancelToken::never(),
    };
    let ctx = WorkflowContext {
        client: &client,
        suggestions: config.suggestions.clone(),
        ballot: config.ballot.clone(),
        transform: workflow::transform_for(&config.transform),
        cancel,
    };
    tracing::debug!(
        suggest_form_id = %config.suggestions.form_id,
        ballot_form_id = %config.ballot.form_id,
        transform = ctx.transform.name(),
        "configuration loaded"
    );

    match command {
        Command::Run(args) => cmd_run(&ctx, args),
        Command::ResetSuggestions => workflow::reset_suggestions(&ctx),
        Command::UpdateBallot => workflow::update_ballot(&ctx),
        Command::Show(args) => cmd_show(&ctx, &config, args),
        Command::Download(args) => cmd_download(&ctx, &config, args),
        Command::Clear(args) => cmd_clear(&ctx, &config, args),
        Command::Accepting(args) => cmd_accepting(&ctx, &config, args),
        Command::Tally(args) => cmd_tally(&config, args),
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug and the default is info.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal()),
        )
        .init();
}

fn cmd_run(ctx: &WorkflowContext<'_>, args: RunArgs) -> Result<()> {
    let report = workflow::run_all(ctx);
    if let Some(path) = &args.report {
        workflow::write_report(path, &report)
            .with_context(|| format!("write run report {}", path.display()))?;
        tracing::info!(path = %path.display(), "run report written");
    }

    let failed: Vec<&str> = report
        .failures()
        .map(|outcome| outcome.name.as_str())
        .collect();
    if failed.is_empty() {
        tracing::info!("all workflows finished");
        return Ok(());
    }
    if args.strict {
        return Err(anyhow!("workflows failed: {}", failed.join(", ")));
    }
    tracing::warn!(failed = %failed.join(", "), "run finished with failures");
    Ok(())
}

fn cmd_show(ctx: &WorkflowContext<'_>, config: &Config, args: ShowArgs) -> Result<()> {
    let roles = match args.form {
        Some(role) => vec![role],
        None => vec![FormRole::Suggestions, FormRole::Ballot],
    };
    for role in roles {
        let form_id = config.target(role).form_id.as_str();
        let form = ctx
            .client
            .get_form(form_id)
            .with_context(|| format!("get form {form_id}"))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&form)?);
        } else {
            print_form(role, &form);
        }
    }
    Ok(())
}

fn print_form(role: FormRole, form: &FormMetadata) {
    let heading = match role {
        FormRole::Suggestions => "Suggest Form Details:",
        FormRole::Ballot => "Ballot Form Details:",
    };
    println!("{heading}");
    println!("  Form ID: {}", form.form_id);
    println!("  Title: {}", form.info.title);
    println!("  Document Title: {}", form.info.document_title);
    println!("  Description: {}", form.info.description);
    println!("  Accepting Responses: {}", form.accepting_responses());
}

fn cmd_download(ctx: &WorkflowContext<'_>, config: &Config, args: DownloadArgs) -> Result<()> {
    let target = config.target(args.form);
    let out = args.out.as_deref().unwrap_or(&target.snapshot_path);
    let count = workflow::download(ctx, target, out)
        .with_context(|| format!("download responses for form {}", target.form_id))?;
    println!("Saved {count} responses to {}", out.display());
    Ok(())
}

fn cmd_clear(ctx: &WorkflowContext<'_>, config: &Config, args: FormArgs) -> Result<()> {
    let target = config.target(args.form);
    let count = workflow::snapshot_and_clear(ctx, target)
        .with_context(|| format!("snapshot and clear form {}", target.form_id))?;
    println!(
        "Archived and cleared {count} responses ({})",
        target.snapshot_path.display()
    );
    Ok(())
}

fn cmd_accepting(ctx: &WorkflowContext<'_>, config: &Config, args: AcceptingArgs) -> Result<()> {
    let form_id = config.target(args.form).form_id.as_str();
    let accepting = args.state.accepting();
    workflow::set_accepting(ctx, form_id, accepting)
        .with_context(|| format!("set accepting responses on form {form_id}"))?;
    println!("Form {form_id} accepting responses: {accepting}");
    Ok(())
}

/// Offline: counts a ballot snapshot without touching the forms API.
fn cmd_tally(config: &Config, args: TallyArgs) -> Result<()> {
    let path = args.from.as_deref().unwrap_or(&config.ballot.snapshot_path);
    let set = snapshot::read_snapshot(path)?;
    let election = tally::election_from_responses(&set, &config.candidates)
        .with_context(|| format!("read ballots from {}", path.display()))?;
    let num_winners = usize::try_from(args.num_winners)?;
    let result = tally::tally(&election, args.method, num_winners)?;
    if !result.eliminated.is_empty() {
        tracing::info!(order = %result.eliminated.join(", "), "elimination order");
    }
    if result.tie {
        tracing::warn!("tie encountered while counting");
    }
    println!("{}", tally::render(args.method, &result));
    Ok(())
}
