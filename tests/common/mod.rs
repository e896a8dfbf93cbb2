//! Shared test infrastructure for integration tests.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const SUGGEST_ID: &str = "suggest-1";
pub const BALLOT_ID: &str = "ballot-1";

/// A scratch directory plus a mock forms API, wired into the binary via flags.
pub struct Harness {
    pub dir: TempDir,
    pub server: ServerGuard,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
            server: Server::new(),
        }
    }

    pub fn suggest_snapshot(&self) -> PathBuf {
        self.dir.path().join("suggestions/responses.json")
    }

    pub fn ballot_snapshot(&self) -> PathBuf {
        self.dir.path().join("ballots/responses.json")
    }

    /// Run the binary with a clean environment so user config never leaks in.
    pub fn run(&self, args: &[&str]) -> Output {
        let home = self.dir.path().join("home");
        Command::new(env!("CARGO_BIN_EXE_forms-rotate"))
            .args(args)
            .arg("--suggest-form-id")
            .arg(SUGGEST_ID)
            .arg("--ballot-form-id")
            .arg(BALLOT_ID)
            .arg("--suggest-snapshot")
            .arg(self.suggest_snapshot())
            .arg("--ballot-snapshot")
            .arg(self.ballot_snapshot())
            .arg("--api-base")
            .arg(self.server.url())
            .arg("--timeout-secs")
            .arg("5")
            .env_clear()
            .env("FORMS_ACCESS_TOKEN", "test-token")
            .env("HOME", &home)
            .env("XDG_CONFIG_HOME", home.join(".config"))
            .env("RUST_LOG", "info")
            .current_dir(self.dir.path())
            .output()
            .expect("run forms-rotate")
    }

    pub fn mock_form(&mut self, form_id: &str, title: &str, calls: usize) -> Mock {
        self.server
            .mock("GET", format!("/v1/forms/{form_id}").as_str())
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(form_body(form_id, title).to_string())
            .expect(calls)
            .create()
    }

    pub fn mock_update(&mut self, form_id: &str, calls: usize) -> Mock {
        self.server
            .mock("PUT", format!("/v1/forms/{form_id}").as_str())
            .match_body(Matcher::PartialJson(json!({"formId": form_id})))
            .with_status(200)
            .with_body("{}")
            .expect(calls)
            .create()
    }

    pub fn mock_responses(&mut self, form_id: &str, response_ids: &[&str]) -> Mock {
        let responses: Vec<Value> = response_ids
            .iter()
            .map(|id| json!({"responseId": id, "answers": {}}))
            .collect();
        self.server
            .mock("GET", format!("/v1/forms/{form_id}/responses").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"responses": responses}).to_string())
            .expect(1)
            .create()
    }

    pub fn mock_delete(&mut self, form_id: &str, calls: usize) -> Mock {
        self.server
            .mock(
                "POST",
                format!("/v1/forms/{form_id}/responses:batchDelete").as_str(),
            )
            .match_body(Matcher::Json(json!({"filter": {}})))
            .with_status(200)
            .with_body("{}")
            .expect(calls)
            .create()
    }
}

pub fn form_body(form_id: &str, title: &str) -> Value {
    json!({
        "formId": form_id,
        "info": {"title": title, "documentTitle": format!("{title} doc")},
        "items": [{"itemId": "q1", "title": "Pick one"}],
        "publishSettings": {"publishState": {"isPublished": true, "isAcceptingResponses": true}}
    })
}

pub fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
    serde_json::from_str(&text).unwrap_or_else(|err| panic!("parse {}: {err}", path.display()))
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
