//! Form resources and the remote client seam.
//!
//! The record types mirror the Google Forms REST resources closely enough to
//! round-trip them: every field this crate does not interpret is kept in an
//! `extra` map so a fetched form can be pushed back without losing items,
//! settings, or revision data.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

mod http;

pub use http::{ApiError, HttpFormsClient};

/// Form metadata as returned by `GET /v1/forms/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMetadata {
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub info: FormInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_settings: Option<PublishSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Title and description block of a form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub document_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_state: Option<PublishState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_accepting_responses: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormMetadata {
    /// Whether the form currently takes submissions. A form without publish
    /// state reads as closed.
    pub fn accepting_responses(&self) -> bool {
        self.publish_settings
            .as_ref()
            .and_then(|settings| settings.publish_state.as_ref())
            .and_then(|state| state.is_accepting_responses)
            .unwrap_or(false)
    }

    pub fn set_accepting_responses(&mut self, accepting: bool) {
        let settings = self.publish_settings.get_or_insert_with(PublishSettings::default);
        let state = settings
            .publish_state
            .get_or_insert_with(PublishState::default);
        state.is_accepting_responses = Some(accepting);
    }
}

/// All submitted responses for one form, in API order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSet {
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub responses: Vec<FormResponse>,
}

impl ResponseSet {
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// One submission. Answers are keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    #[serde(default)]
    pub response_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_submitted_time: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub answers: BTreeMap<String, Answer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormResponse {
    /// First text answer given for `question_id`, if any.
    pub fn text_answer(&self, question_id: &str) -> Option<&str> {
        self.answers
            .get(question_id)?
            .text_answers
            .as_ref()?
            .answers
            .first()
            .map(|answer| answer.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_answers: Option<TextAnswers>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextAnswers {
    #[serde(default)]
    pub answers: Vec<TextAnswer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextAnswer {
    #[serde(default)]
    pub value: String,
}

/// Selects responses for deletion. The default (empty) filter matches every
/// response on the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_ids: Vec<String>,
}

impl ResponseFilter {
    pub fn all() -> Self {
        Self::default()
    }
}

/// The four remote calls the workflows are built from.
///
/// Implementations block until the call completes or times out. None of them
/// retry.
pub trait FormsClient {
    fn get_form(&self, form_id: &str) -> Result<FormMetadata>;

    /// Replace the form record. The whole object is sent, not a patch.
    fn update_form(&self, form_id: &str, form: &FormMetadata) -> Result<()>;

    fn list_responses(&self, form_id: &str) -> Result<ResponseSet>;

    fn batch_delete_responses(&self, form_id: &str, filter: &ResponseFilter) -> Result<()>;
}
