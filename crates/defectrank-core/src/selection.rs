//! Picking the next survey question.
//!
//! Coverage comes first: while any question has no answer from anyone, one of
//! those is drawn at random. After that the user gets the question they have
//! not answered yet whose answers are least settled, measured by
//! `1/(1 + votes) + normalised vote entropy`.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::catalog::{DefectId, ResponseRecord, SubmissionId};

/// A survey question: one submission and the defects offered as answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub submission: SubmissionId,
    pub defects: Vec<DefectId>,
}

impl Question {
    /// Number of distinct answer options.
    pub fn options(&self) -> usize {
        self.defects.iter().collect::<BTreeSet<_>>().len()
    }

    /// The votes for defects this question offers; other answers are dropped.
    pub fn offered_votes(&self, votes: &BTreeMap<DefectId, u32>) -> BTreeMap<DefectId, u32> {
        votes
            .iter()
            .filter(|(d, _)| self.defects.contains(d))
            .map(|(d, c)| (d.clone(), *c))
            .collect()
    }
}

/// Outcome of [`select_next_question`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextQuestion {
    /// Nobody has answered this question yet.
    Unanswered { submission: SubmissionId },
    /// The user's most uncertain unanswered question.
    MostUncertain {
        submission: SubmissionId,
        uncertainty: f64,
    },
    /// The user has answered every question.
    Exhausted,
}

impl NextQuestion {
    pub fn submission(&self) -> Option<&str> {
        match self {
            Self::Unanswered { submission } | Self::MostUncertain { submission, .. } => {
                Some(submission)
            }
            Self::Exhausted => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Vote statistics
// ---------------------------------------------------------------------------

/// Chosen-defect histogram for one submission.
pub fn vote_counts(responses: &[ResponseRecord], submission: &str) -> BTreeMap<DefectId, u32> {
    let mut counts = BTreeMap::new();
    for r in responses.iter().filter(|r| r.submission == submission) {
        *counts.entry(r.answer.clone()).or_insert(0) += 1;
    }
    counts
}

/// Shannon entropy (bits) of the vote distribution divided by `log2(k)`.
/// Zero when `k <= 1` or there are no votes. If the votes name more distinct
/// defects than `k`, their count is used instead so the result stays in [0, 1].
pub fn normalized_entropy(votes: &BTreeMap<DefectId, u32>, k: usize) -> f64 {
    let total: u32 = votes.values().sum();
    let k = k.max(votes.values().filter(|&&c| c > 0).count());
    if k <= 1 || total == 0 {
        return 0.0;
    }
    let total = f64::from(total);
    let entropy: f64 = votes
        .values()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = f64::from(c) / total;
            -p * p.log2()
        })
        .sum();
    entropy / (k as f64).log2()
}

/// `1/(1 + total votes) + normalized_entropy(votes, k)`.
pub fn uncertainty(votes: &BTreeMap<DefectId, u32>, k: usize) -> f64 {
    let total: u32 = votes.values().sum();
    1.0 / (1.0 + f64::from(total)) + normalized_entropy(votes, k)
}

/// True when `user` has answered a positive multiple of `frequency` questions.
pub fn is_feedback_checkpoint(responses: &[ResponseRecord], user: &str, frequency: usize) -> bool {
    let answered = responses.iter().filter(|r| r.respondent == user).count();
    frequency > 0 && answered > 0 && answered % frequency == 0
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Choose the next question for `user`.
///
/// Responses to submissions outside `questions`, and answers naming a defect
/// the question does not offer, are ignored. Among equally uncertain
/// questions the one listed first wins.
pub fn select_next_question<R: Rng + ?Sized>(
    responses: &[ResponseRecord],
    questions: &[Question],
    user: &str,
    rng: &mut R,
) -> NextQuestion {
    let mut votes: BTreeMap<&str, BTreeMap<DefectId, u32>> = BTreeMap::new();
    let mut answered_by_user: BTreeSet<&str> = BTreeSet::new();
    for r in responses {
        *votes
            .entry(r.submission.as_str())
            .or_default()
            .entry(r.answer.clone())
            .or_insert(0) += 1;
        if r.respondent == user {
            answered_by_user.insert(r.submission.as_str());
        }
    }

    let unanswered: Vec<&Question> = questions
        .iter()
        .filter(|q| !votes.contains_key(q.submission.as_str()))
        .collect();
    if let Some(q) = unanswered.choose(rng) {
        log::debug!("{} questions still without answers", unanswered.len());
        return NextQuestion::Unanswered {
            submission: q.submission.clone(),
        };
    }

    let empty = BTreeMap::new();
    let mut best: Option<(&Question, f64)> = None;
    for q in questions
        .iter()
        .filter(|q| !answered_by_user.contains(q.submission.as_str()))
    {
        let offered = q.offered_votes(votes.get(q.submission.as_str()).unwrap_or(&empty));
        let score = uncertainty(&offered, q.options());
        if best.is_none_or(|(_, b)| score > b) {
            best = Some((q, score));
        }
    }

    match best {
        Some((q, uncertainty)) => NextQuestion::MostUncertain {
            submission: q.submission.clone(),
            uncertainty,
        },
        None => NextQuestion::Exhausted,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
