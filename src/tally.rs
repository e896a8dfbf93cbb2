//! Ranked-ballot counting over an archived ballot snapshot.
//!
//! Each ranked question on the ballot form is one candidate; the answer text
//! is the voter's rank for it (`1` is the favourite). A question left blank is
//! unranked and stored as [`UNRANKED`].
use crate::config::CandidateLabel;
use crate::forms::ResponseSet;
use anyhow::{anyhow, Result};

mod runoff;
mod schulze;

pub const UNRANKED: i32 = -1;

/// Counting method, selected with `tally --method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Method {
    Schulze,
    /// Instant runoff; ranks keep their gaps after an elimination.
    Instant,
    /// Instant runoff; ranks are renumbered 1..n after every elimination.
    InstantReorder,
}

impl Method {
    fn heading(self) -> &'static str {
        match self {
            Method::Schulze => "Schulze",
            Method::Instant => "Instant",
            Method::InstantReorder => "Instant-Reorder",
        }
    }
}

/// One voter's ranks, indexed like [`Election::candidates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub ranks: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Election {
    pub candidates: Vec<String>,
    pub ballots: Vec<Ballot>,
}

/// A finishing position: one candidate, or several that could not be separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Single(String),
    Tie(Vec<String>),
}

impl Placement {
    fn len(&self) -> usize {
        match self {
            Placement::Single(_) => 1,
            Placement::Tie(names) => names.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub placements: Vec<Placement>,
    pub tie: bool,
    /// Runoff only: candidates in the order they were knocked out.
    pub eliminated: Vec<String>,
}

/// Build an election from ballot responses.
///
/// With `labels`, exactly those questions are candidates, in label order.
/// Without, every question that carries a numeric answer on some response is a
/// candidate named by its question id, in first-seen order.
pub fn election_from_responses(set: &ResponseSet, labels: &[CandidateLabel]) -> Result<Election> {
    let question_ids: Vec<String> = if labels.is_empty() {
        let mut seen: Vec<String> = Vec::new();
        for response in &set.responses {
            for question_id in response.answers.keys() {
                let ranked = response
                    .text_answer(question_id)
                    .and_then(parse_rank)
                    .is_some();
                if ranked && !seen.contains(question_id) {
                    seen.push(question_id.clone());
                }
            }
        }
        seen
    } else {
        labels.iter().map(|label| label.question_id.clone()).collect()
    };
    if question_ids.is_empty() {
        return Err(anyhow!(
            "no ranked answers found in {} ballot responses",
            set.len()
        ));
    }

    let ballots = set
        .responses
        .iter()
        .map(|response| Ballot {
            ranks: question_ids
                .iter()
                .map(|question_id| {
                    response
                        .text_answer(question_id)
                        .and_then(parse_rank)
                        .unwrap_or(UNRANKED)
                })
                .collect(),
        })
        .collect();
    let candidates = if labels.is_empty() {
        question_ids
    } else {
        labels.iter().map(|label| label.title.clone()).collect()
    };
    Ok(Election {
        candidates,
        ballots,
    })
}

/// Leading digits of a rank answer, so `"1"` and `"1st"` both read as 1.
fn parse_rank(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    let digits = raw
        .find(|ch: char| !ch.is_ascii_digit())
        .map_or(raw, |end| &raw[..end]);
    digits.parse::<i32>().ok().filter(|rank| *rank > 0)
}

pub fn tally(election: &Election, method: Method, num_winners: usize) -> Result<Tally> {
    if num_winners == 0 {
        return Err(anyhow!("num_winners must be at least 1"));
    }
    if election.candidates.is_empty() {
        return Err(anyhow!("no candidates to count"));
    }
    if let Some(bad) = election
        .ballots
        .iter()
        .position(|ballot| ballot.ranks.len() != election.candidates.len())
    {
        return Err(anyhow!(
            "ballot {bad} ranks {} candidates, expected {}",
            election.ballots[bad].ranks.len(),
            election.candidates.len()
        ));
    }
    tracing::info!(
        method = method.heading(),
        candidates = election.candidates.len(),
        ballots = election.ballots.len(),
        num_winners,
        "counting ballots"
    );
    let tally = match method {
        Method::Schulze => schulze::count(election, num_winners),
        Method::Instant => runoff::count(election, num_winners, false),
        Method::InstantReorder => runoff::count(election, num_winners, true),
    };
    Ok(tally)
}

/// Results in the movie-night format:
///
/// ```text
/// ~~~~~ Using Schulze Method ~~~~~
/// Winner: Alien
///     #2: Heat
/// ```
pub fn render(method: Method, tally: &Tally) -> String {
    let mut out = format!("~~~~~ Using {} Method ~~~~~\n", method.heading());
    for (index, placement) in tally.placements.iter().enumerate() {
        let position = if index == 0 {
            "Winner".to_string()
        } else {
            format!("#{}", index + 1)
        };
        let line = match placement {
            Placement::Single(name) => format!("{position:>6}: {name}"),
            Placement::Tie(names) => format!("Tie for {position}: {}*", names.join(", ")),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Keep whole placements until at least `num_winners` candidates are placed.
fn take_placements(groups: Vec<Placement>, num_winners: usize) -> Vec<Placement> {
    let mut placed = 0;
    let mut kept = Vec::new();
    for group in groups {
        if placed >= num_winners {
            break;
        }
        placed += group.len();
        kept.push(group);
    }
    kept
}

#[cfg(test)]
#[path = "tally_tests.rs"]
mod tests;
