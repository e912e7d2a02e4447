//! # defectrank-core
//!
//! **Which defect should a novice hear about first?**
//!
//! `defectrank-core` scores the code-quality defects a linter found in a
//! beginner's submission, turns those scores into priorities and coarse
//! human-readable levels, resolves pairwise "explain this one first"
//! predictions into one ranking per submission, and picks the next question
//! for the educator survey that collects ground truth.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use defectrank_core::{
//!     Defect, DefectCatalog, DefectCounts, ModelKind, Observation, RankerConfig,
//!     ScoringModel, Submission,
//! };
//!
//! let defect = |id: &str| Defect {
//!     id: id.into(),
//!     name: id.into(),
//!     description: String::new(),
//!     severity: 3,
//!     kind: "style".into(),
//!     detector_codes: vec![],
//!     example: None,
//!     fix: None,
//! };
//! let catalog = Arc::new(DefectCatalog::new(vec![defect("D1"), defect("D2")]).unwrap());
//! let mut model = ScoringModel::build(ModelKind::TaskCommon, catalog, &RankerConfig::default());
//!
//! let submission = Submission {
//!     id: "s1".into(),
//!     student: "alice".into(),
//!     task: "fizzbuzz".into(),
//!     code: String::new(),
//!     correct: false,
//!     timestamp: chrono::Utc::now(),
//! };
//! let counts: DefectCounts = [("D1", 2)].into_iter().collect();
//! model.update(&[Observation::new(submission.clone(), counts.clone())]).unwrap();
//!
//! let priorities = model.prioritize(&submission, &counts);
//! assert_eq!(priorities, vec![1.0, 0.0]);
//! ```
//!
//! ## Architecture
//!
//! Observations → [`ScoringModel::update`] → score / prioritize / discretize
//! → pairwise comparisons → [`rank_defects`] → [`explain_ranking`]
//!
//! A [`ScoringModel`] is a [`ContextStrategy`] (what was learned, keyed by
//! nothing, task or student) composed with a [`Discretizer`] (how scores
//! become levels). Learned state only grows through [`combine_stats`], so
//! models train online without keeping history.
//!
//! ## Concurrency
//!
//! Everything here is synchronous and single-threaded. Models are plain
//! values: callers that share one between threads must serialise the
//! "read responses → update model → record answer" sequence per context
//! themselves, otherwise concurrent updates to the same context lose writes.

pub mod catalog;
pub mod config;
pub mod discretize;
pub mod error;
pub mod explain;
pub mod model;
pub mod ordering;
pub mod prioritize;
pub mod selection;
pub mod stats;

pub use catalog::{
    Defect, DefectCatalog, DefectCounts, DefectId, Observation, ResponseRecord, StudentId,
    Submission, SubmissionId, Task, TaskId,
};
pub use config::{RankerConfig, load_config_from_path};
pub use discretize::{Discretizer, Scale, ThresholdPolicy, digitize, weighted_quantile};
pub use error::{RankError, Result};
pub use explain::{DefectExplanation, explain_ranking};
pub use model::{
    ContextStrategy, ContextType, ModelInfo, ModelKind, ModelState, SavedModel, ScoringModel,
    WeightTable,
};
pub use ordering::{
    Basis, PairwiseComparison, Side, pairwise_from_scores, rank_all, rank_defects,
    rank_submission,
};
pub use prioritize::softmax_present;
pub use selection::{
    NextQuestion, Question, is_feedback_checkpoint, normalized_entropy, select_next_question,
    uncertainty, vote_counts,
};
pub use stats::{BatchStats, StatsVector, combine_stats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
