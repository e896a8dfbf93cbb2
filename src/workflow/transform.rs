//! Ballot rebuild strategies.
//!
//! A strategy receives the archived suggestions and the freshly fetched ballot
//! form and returns the record to push back. The default is identity: the
//! ballot is pushed unchanged.
use crate::config::{FeatureListConfig, TransformConfig};
use crate::forms::{FormMetadata, FormResponse, ResponseSet};
use anyhow::Result;

const FEATURE_LIST_PREFIX: &str = "This Weeks' Feature Films: ";

pub trait TransformStrategy {
    fn name(&self) -> &'static str;

    fn apply(&self, suggestions: &ResponseSet, ballot: FormMetadata) -> Result<FormMetadata>;
}

/// Pushes the ballot back exactly as fetched.
#[derive(Debug, Default)]
pub struct IdentityTransform;

impl TransformStrategy for IdentityTransform {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn apply(&self, _suggestions: &ResponseSet, ballot: FormMetadata) -> Result<FormMetadata> {
        Ok(ballot)
    }
}

/// Rewrites the ballot description from the suggested films.
///
/// The description opens with `This Weeks' Feature Films: ` and the titles.
/// When any detail question is configured, two more blocks follow: one
/// `Title (year, XhMMm)` label per line, then each label padded to the longest
/// one with ` - pitch` and an optional `[notes]` line.
#[derive(Debug)]
pub struct FeatureListTransform {
    questions: FeatureListConfig,
}

#[derive(Debug, PartialEq)]
struct Feature {
    title: String,
    label: String,
    blurb: String,
}

impl FeatureListTransform {
    pub fn new(questions: FeatureListConfig) -> Self {
        Self { questions }
    }

    fn detailed(&self) -> bool {
        let q = &self.questions;
        q.year_question_id.is_some()
            || q.runtime_question_id.is_some()
            || q.pitch_question_id.is_some()
            || q.notes_question_id.is_some()
    }

    fn answer<'r>(&self, response: &'r FormResponse, question_id: Option<&String>) -> &'r str {
        question_id
            .and_then(|id| response.text_answer(id))
            .map(str::trim)
            .unwrap_or_default()
    }

    /// One entry per distinct trimmed title, in submission order.
    fn features(&self, suggestions: &ResponseSet) -> Vec<Feature> {
        let q = &self.questions;
        let mut features: Vec<Feature> = Vec::new();
        for response in &suggestions.responses {
            let title = self.answer(response, Some(&q.title_question_id));
            if title.is_empty() || features.iter().any(|seen| seen.title == title) {
                continue;
            }
            let year = self.answer(response, q.year_question_id.as_ref());
            let runtime = self.answer(response, q.runtime_question_id.as_ref());
            let runtime = match format_runtime(runtime) {
                Some(formatted) => formatted,
                None => {
                    if !runtime.is_empty() {
                        tracing::warn!(title, runtime, "unreadable runtime; left off the label");
                    }
                    String::new()
                }
            };
            let details: Vec<&str> = [year, runtime.as_str()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect();
            let label = if details.is_empty() {
                title.to_string()
            } else {
                format!("{title} ({})", details.join(", "))
            };

            let pitch = self.answer(response, q.pitch_question_id.as_ref());
            let notes = self.answer(response, q.notes_question_id.as_ref());
            let blurb = if notes.is_empty() {
                pitch.to_string()
            } else {
                format!("{pitch}\n[{notes}]")
            };
            features.push(Feature {
                title: title.to_string(),
                label,
                blurb,
            });
        }
        features
    }

    fn describe(&self, features: &[Feature]) -> String {
        let titles: Vec<&str> = features.iter().map(|f| f.title.as_str()).collect();
        let heading = format!("{FEATURE_LIST_PREFIX}{}", titles.join(", "));
        if !self.detailed() {
            return heading;
        }

        let width = features
            .iter()
            .map(|f| f.label.chars().count())
            .max()
            .unwrap_or(0);
        let key: Vec<&str> = features.iter().map(|f| f.label.as_str()).collect();
        let blurbs: Vec<String> = features
            .iter()
            .map(|f| {
                format!("{:<width$} - {}", f.label, f.blurb)
                    .trim_end()
                    .to_string()
            })
            .collect();
        [heading, key.join("\n"), blurbs.join("\n\n")].join("\n\n")
    }
}

/// `H:MM:SS` (or `H:MM`) as `XhMMm`; seconds are dropped.
fn format_runtime(raw: &str) -> Option<String> {
    let parts = raw
        .split(':')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let (hours, minutes) = match parts.as_slice() {
        [hours, minutes] | [hours, minutes, _] => (*hours, *minutes),
        _ => return None,
    };
    Some(format!("{hours}h{minutes:0>2}m"))
}

impl TransformStrategy for FeatureListTransform {
    fn name(&self) -> &'static str {
        "feature_list"
    }

    fn apply(&self, suggestions: &ResponseSet, mut ballot: FormMetadata) -> Result<FormMetadata> {
        if suggestions.is_empty() {
            tracing::warn!("suggestions snapshot is empty; ballot description left as is");
            return Ok(ballot);
        }
        let features = self.features(suggestions);
        if features.is_empty() {
            tracing::warn!(
                question_id = %self.questions.title_question_id,
                "no suggested titles found; ballot description left as is"
            );
            return Ok(ballot);
        }
        tracing::info!(titles = features.len(), "rewriting ballot description");
        ballot.info.description = self.describe(&features);
        Ok(ballot)
    }
}

pub fn transform_for(config: &TransformConfig) -> Box<dyn TransformStrategy> {
    match config {
        TransformConfig::Identity => Box::new(IdentityTransform),
        TransformConfig::FeatureList(questions) => {
            Box::new(FeatureListTransform::new(questions.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn suggestions() -> ResponseSet {
        serde_json::from_value(json!({
            "formId": "suggest-1",
            "responses": [
                {"responseId": "r1", "answers": {"q-title": {"textAnswers": {"answers": [{"value": " Alien "}]}}}},
                {"responseId": "r2", "answers": {"q-other": {"textAnswers": {"answers": [{"value": "ignored"}]}}}},
                {"responseId": "r3", "answers": {"q-title": {"textAnswers": {"answers": [{"value": "Heat"}]}}}},
                {"responseId": "r4", "answers": {"q-title": {"textAnswers": {"answers": [{"value": "Alien"}]}}}}
            ]
        }))
        .expect("parse suggestions")
    }

    fn ballot() -> FormMetadata {
        serde_json::from_value(json!({
            "formId": "ballot-1",
            "info": {"title": "Runoff Votes", "description": "old"},
            "items": [{"itemId": "q1"}]
        }))
        .expect("parse ballot")
    }

    #[test]
    fn identity_returns_ballot_unchanged() {
        let out = IdentityTransform
            .apply(&suggestions(), ballot())
            .expect("apply");
        assert_eq!(out, ballot());
    }

    fn text(value: &str) -> serde_json::Value {
        json!({"textAnswers": {"answers": [{"value": value}]}})
    }

    fn detailed_questions() -> FeatureListConfig {
        FeatureListConfig {
            title_question_id: "q-title".to_string(),
            year_question_id: Some("q-year".to_string()),
            runtime_question_id: Some("q-runtime".to_string()),
            pitch_question_id: Some("q-pitch".to_string()),
            notes_question_id: Some("q-notes".to_string()),
        }
    }

    #[test]
    fn feature_list_lists_unique_titles_in_order() {
        let out = FeatureListTransform::new(FeatureListConfig::titles_only("q-title"))
            .apply(&suggestions(), ballot())
            .expect("apply");
        assert_eq!(
            out.info.description,
            "This Weeks' Feature Films: Alien, Heat"
        );
        assert_eq!(out.info.title, "Runoff Votes");
        assert_eq!(out.extra, ballot().extra);
    }

    #[test]
    fn detailed_feature_list_pads_labels_and_appends_notes() {
        let suggestions: ResponseSet = serde_json::from_value(json!({
            "formId": "suggest-1",
            "responses": [
                {"responseId": "r1", "answers": {
                    "q-title": text("Alien"),
                    "q-year": text("1979"),
                    "q-runtime": text("1:57:00"),
                    "q-pitch": text("  In space no one can hear you scream. "),
                    "q-notes": text("Director's cut")
                }},
                {"responseId": "r2", "answers": {
                    "q-title": text("Heat"),
                    "q-year": text("1995"),
                    "q-runtime": text("2:50:00"),
                    "q-pitch": text("Pacino vs De Niro")
                }},
                {"responseId": "r3", "answers": {
                    "q-title": text("Up"),
                    "q-pitch": text("Balloons")
                }}
            ]
        }))
        .expect("parse suggestions");

        let out = FeatureListTransform::new(detailed_questions())
            .apply(&suggestions, ballot())
            .expect("apply");
        assert_eq!(
            out.info.description,
            "This Weeks' Feature Films: Alien, Heat, Up\n\n\
             Alien (1979, 1h57m)\nHeat (1995, 2h50m)\nUp\n\n\
             Alien (1979, 1h57m) - In space no one can hear you scream.\n[Director's cut]\n\n\
             Heat (1995, 2h50m)  - Pacino vs De Niro\n\n\
             Up                  - Balloons"
        );
    }

    #[test]
    fn runtime_formats_hours_and_padded_minutes() {
        assert_eq!(format_runtime("1:57:00").as_deref(), Some("1h57m"));
        assert_eq!(format_runtime("2:05:59").as_deref(), Some("2h05m"));
        assert_eq!(format_runtime("0:09").as_deref(), Some("0h09m"));
        assert_eq!(format_runtime("117 min"), None);
        assert_eq!(format_runtime(""), None);
    }

    #[test]
    fn labels_fall_back_to_whatever_details_exist() {
        let suggestions: ResponseSet = serde_json::from_value(json!({
            "responses": [
                {"responseId": "r1", "answers": {"q-title": text("Alien"), "q-runtime": text("soon")}},
                {"responseId": "r2", "answers": {"q-title": text("Heat"), "q-year": text("1995")}}
            ]
        }))
        .expect("parse suggestions");

        let transform = FeatureListTransform::new(detailed_questions());
        let labels: Vec<String> = transform
            .features(&suggestions)
            .into_iter()
            .map(|feature| feature.label)
            .collect();
        assert_eq!(labels, vec!["Alien", "Heat (1995)"]);
    }

    #[test]
    fn empty_suggestions_snapshot_keeps_description() {
        let empty = ResponseSet {
            form_id: "suggest-1".to_string(),
            responses: Vec::new(),
        };
        let out = FeatureListTransform::new(detailed_questions())
            .apply(&empty, ballot())
            .expect("apply");
        assert_eq!(out, ballot());
    }

    #[test]
    fn feature_list_without_matches_keeps_description() {
        let out = FeatureListTransform::new(FeatureListConfig::titles_only("q-missing"))
            .apply(&suggestions(), ballot())
            .expect("apply");
        assert_eq!(out.info.description, "old");
    }

    #[test]
    fn transform_for_config() {
        assert_eq!(transform_for(&TransformConfig::Identity).name(), "identity");
        let config = TransformConfig::FeatureList(FeatureListConfig::titles_only("q"));
        assert_eq!(transform_for(&config).name(), "feature_list");
    }
}
