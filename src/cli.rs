//! CLI argument parsing for the form rotation commands.
//!
//! Config flags are global so they can follow any subcommand, and each one can
//! also come from the environment.
use crate::config::{CandidateLabel, FormRole};
use crate::tally::Method;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "forms-rotate",
    version,
    about = "Snapshot, clear and rotate survey-form responses",
    after_help = "Commands:\n  run                 Reset suggestions, then rebuild the ballot\n  reset-suggestions   Snapshot and clear the suggestions form\n  update-ballot       Close, archive, rebuild and reopen the ballot form\n  show                Print form details\n  download            Save a form's responses without clearing them\n  clear               Snapshot and clear one form\n  accepting           Open or close a form for submissions\n  tally               Count the archived ballot responses\n\nExamples:\n  forms-rotate run\n  forms-rotate show --form ballot\n  forms-rotate download --form suggestions --out /tmp/suggestions.json\n  forms-rotate accepting --form ballot --state closed\n  forms-rotate tally --method instant-reorder --num-winners 2",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Emit debug-level logs (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Form ids, snapshot paths, and API access.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON config file (default: <config dir>/forms-rotate/config.json when present)
    #[arg(long, value_name = "PATH", env = "FORMS_ROTATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Suggestions form id
    #[arg(long, value_name = "ID", env = "SUGGEST_FORM_ID", global = true)]
    pub suggest_form_id: Option<String>,

    /// Ballot form id
    #[arg(long, value_name = "ID", env = "BALLOTS_FORM_ID", global = true)]
    pub ballot_form_id: Option<String>,

    /// Snapshot file for suggestions responses
    #[arg(long, value_name = "PATH", env = "SUGGEST_SNAPSHOT_PATH", global = true)]
    pub suggest_snapshot: Option<PathBuf>,

    /// Snapshot file for ballot responses
    #[arg(long, value_name = "PATH", env = "BALLOT_SNAPSHOT_PATH", global = true)]
    pub ballot_snapshot: Option<PathBuf>,

    /// Forms API base URL
    #[arg(long, value_name = "URL", env = "FORMS_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// OAuth bearer token for the forms API
    #[arg(
        long,
        value_name = "TOKEN",
        env = "FORMS_ACCESS_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", env = "FORMS_TIMEOUT_SECS", global = true)]
    pub timeout_secs: Option<u64>,

    /// Question id holding the suggested title; enables the feature-list ballot description
    #[arg(
        long,
        value_name = "ID",
        env = "SUGGEST_TITLE_QUESTION_ID",
        global = true
    )]
    pub title_question_id: Option<String>,

    /// Question id holding the release year
    #[arg(long, value_name = "ID", env = "SUGGEST_YEAR_QUESTION_ID", global = true)]
    pub year_question_id: Option<String>,

    /// Question id holding the runtime as H:MM:SS
    #[arg(
        long,
        value_name = "ID",
        env = "SUGGEST_RUNTIME_QUESTION_ID",
        global = true
    )]
    pub runtime_question_id: Option<String>,

    /// Question id holding the pitch
    #[arg(long, value_name = "ID", env = "SUGGEST_PITCH_QUESTION_ID", global = true)]
    pub pitch_question_id: Option<String>,

    /// Question id holding extra notes
    #[arg(long, value_name = "ID", env = "SUGGEST_NOTES_QUESTION_ID", global = true)]
    pub notes_question_id: Option<String>,

    /// Ballot candidate label as QUESTION_ID=TITLE (repeatable)
    #[arg(
        long = "candidate",
        value_name = "QID=TITLE",
        value_parser = parse_candidate,
        global = true
    )]
    pub candidates: Vec<CandidateLabel>,
}

fn parse_candidate(raw: &str) -> Result<CandidateLabel, String> {
    let (question_id, title) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected QUESTION_ID=TITLE, got {raw:?}"))?;
    let (question_id, title) = (question_id.trim(), title.trim());
    if question_id.is_empty() || title.is_empty() {
        return Err(format!("expected QUESTION_ID=TITLE, got {raw:?}"));
    }
    Ok(CandidateLabel {
        question_id: question_id.to_string(),
        title: title.to_string(),
    })
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    /// Snapshot and clear the suggestions form
    ResetSuggestions,
    /// Close, archive, rebuild and reopen the ballot form
    UpdateBallot,
    Show(ShowArgs),
    Download(DownloadArgs),
    Clear(FormArgs),
    Accepting(AcceptingArgs),
    Tally(TallyArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Reset suggestions, then rebuild the ballot")]
pub struct RunArgs {
    /// Exit non-zero when either workflow fails
    #[arg(long)]
    pub strict: bool,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Abort before the next remote call once this many seconds have passed
    #[arg(long, value_name = "SECS")]
    pub max_runtime_secs: Option<u64>,
}

#[derive(Parser, Debug)]
#[command(about = "Print form details")]
pub struct ShowArgs {
    /// Form to show (default: both)
    #[arg(long, value_enum)]
    pub form: Option<FormRole>,

    /// Emit the full form record as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Save a form's responses without clearing them")]
pub struct DownloadArgs {
    #[arg(long, value_enum)]
    pub form: FormRole,

    /// Output path (default: the form's snapshot path)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Snapshot and clear one form")]
pub struct FormArgs {
    #[arg(long, value_enum)]
    pub form: FormRole,
}

#[derive(Parser, Debug)]
#[command(about = "Open or close a form for submissions")]
pub struct AcceptingArgs {
    #[arg(long, value_enum)]
    pub form: FormRole,

    #[arg(long, value_enum)]
    pub state: AcceptState,
}

#[derive(Parser, Debug)]
#[command(about = "Count the archived ballot responses")]
pub struct TallyArgs {
    #[arg(long, value_enum, default_value_t = Method::Schulze)]
    pub method: Method,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub num_winners: u32,

    /// Ballot snapshot to count (default: the ballot snapshot path)
    #[arg(long, value_name = "PATH")]
    pub from: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AcceptState {
    Open,
    Closed,
}

impl AcceptState {
    pub fn accepting(self) -> bool {
        matches!(self, AcceptState::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn global_config_flags_follow_the_subcommand() {
        let args = RootArgs::try_parse_from([
            "forms-rotate",
            "accepting",
            "--form",
            "ballot",
            "--state",
            "closed",
            "--ballot-form-id",
            "b-1",
        ])
        .expect("parse args");
        assert_eq!(args.config.ballot_form_id.as_deref(), Some("b-1"));
        match args.command {
            Command::Accepting(accepting) => {
                assert_eq!(accepting.form, FormRole::Ballot);
                assert!(!accepting.state.accepting());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn tally_flags_and_candidate_labels_parse() {
        let args = RootArgs::try_parse_from([
            "forms-rotate",
            "tally",
            "--method",
            "instant-reorder",
            "--num-winners",
            "2",
            "--candidate",
            "q1=Alien",
            "--candidate",
            " q2 = Heat ",
        ])
        .expect("parse args");
        assert_eq!(
            args.config.candidates,
            vec![
                CandidateLabel {
                    question_id: "q1".to_string(),
                    title: "Alien".to_string(),
                },
                CandidateLabel {
                    question_id: "q2".to_string(),
                    title: "Heat".to_string(),
                },
            ]
        );
        match args.command {
            Command::Tally(tally) => {
                assert_eq!(tally.method, Method::InstantReorder);
                assert_eq!(tally.num_winners, 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn tally_rejects_zero_winners_and_bad_labels() {
        assert!(RootArgs::try_parse_from(["forms-rotate", "tally", "--num-winners", "0"]).is_err());
        assert!(
            RootArgs::try_parse_from(["forms-rotate", "tally", "--candidate", "no-title"]).is_err()
        );
    }

    #[test]
    fn run_flags_parse() {
        let args = RootArgs::try_parse_from([
            "forms-rotate",
            "run",
            "--strict",
            "--report",
            "report.json",
        ])
        .expect("parse args");
        match args.command {
            Command::Run(run) => {
                assert!(run.strict);
                assert_eq!(run.report, Some(PathBuf::from("report.json")));
                assert_eq!(run.max_runtime_secs, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
