pub mod models;
pub mod prioritize;
pub mod question;
pub mod rank;
pub mod train;
pub mod weights;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use defectrank_core::selection::Question;
use defectrank_core::{
    Defect, DefectCatalog, DefectCounts, Observation, RankerConfig, ResponseRecord, ScoringModel,
    Submission, SubmissionId, Task,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// In-memory snapshot of a dataset directory.
///
/// `defects.json` is required. `tasks.json`, `submissions.json`,
/// `defect_counts.json`, `responses.json` and `questions.json` load as empty
/// when absent.
pub struct Dataset {
    pub catalog: Arc<DefectCatalog>,
    pub tasks: Vec<Task>,
    pub submissions: Vec<Submission>,
    pub counts: BTreeMap<SubmissionId, DefectCounts>,
    pub responses: Vec<ResponseRecord>,
    pub questions: Vec<Question>,
}

impl Dataset {
    pub fn load(dir: &Path) -> defectrank_core::Result<Self> {
        let defects: Vec<Defect> = read_json(&dir.join("defects.json"))?;
        let catalog = Arc::new(DefectCatalog::new(defects)?);
        let submissions: Vec<Submission> = read_optional(&dir.join("submissions.json"))?;
        let counts: BTreeMap<SubmissionId, DefectCounts> =
            read_optional(&dir.join("defect_counts.json"))?;
        let mut questions: Vec<Question> = read_optional(&dir.join("questions.json"))?;
        if questions.is_empty() {
            questions = derive_questions(&submissions, &counts);
        }
        let dataset = Self {
            catalog,
            tasks: read_optional(&dir.join("tasks.json"))?,
            submissions,
            counts,
            responses: read_optional(&dir.join("responses.json"))?,
            questions,
        };
        log::info!(
            "loaded {} defects, {} submissions, {} responses from {}",
            dataset.catalog.len(),
            dataset.submissions.len(),
            dataset.responses.len(),
            dir.display()
        );
        Ok(dataset)
    }

    pub fn submission(&self, id: &str) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.id == id)
    }

    /// Display name of a task, if `tasks.json` lists it.
    pub fn task_name(&self, id: &str) -> Option<&str> {
        self.tasks.iter().find(|t| t.id == id).map(|t| t.name.as_str())
    }

    /// Linter counts of a submission; none recorded means no defects.
    pub fn counts_for(&self, id: &str) -> DefectCounts {
        self.counts.get(id).cloned().unwrap_or_default()
    }

    /// Every submission paired with its counts, in log order.
    pub fn observations(&self) -> Vec<Observation> {
        self.submissions
            .iter()
            .map(|s| Observation::new(s.clone(), self.counts_for(&s.id)))
            .collect()
    }

    /// Catalog ids of the defects present in a submission, in catalog order.
    pub fn present_defects(&self, id: &str) -> Vec<String> {
        let counts = self.counts_for(id);
        self.catalog
            .ids()
            .filter(|d| counts.is_present(d))
            .map(str::to_string)
            .collect()
    }
}

/// One question per submission that has at least two present defects.
fn derive_questions(
    submissions: &[Submission],
    counts: &BTreeMap<SubmissionId, DefectCounts>,
) -> Vec<Question> {
    submissions
        .iter()
        .filter_map(|s| {
            let defects: Vec<String> = counts.get(&s.id)?.present().map(str::to_string).collect();
            (defects.len() > 1).then(|| Question {
                submission: s.id.clone(),
                defects,
            })
        })
        .collect()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> defectrank_core::Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn read_optional<T: DeserializeOwned + Default>(path: &Path) -> defectrank_core::Result<T> {
    if path.exists() {
        read_json(path)
    } else {
        log::debug!("{} not found, using an empty table", path.display());
        Ok(T::default())
    }
}

// ---------------------------------------------------------------------------
// Shared command helpers
// ---------------------------------------------------------------------------

/// Print an error and exit with status 1.
pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

pub fn load_dataset(dir: &str) -> Dataset {
    Dataset::load(Path::new(dir)).unwrap_or_else(|e| fail(format!("cannot load dataset {dir}: {e}")))
}

/// Config from `--config`, or the defaults.
pub fn load_config(path: Option<&str>) -> RankerConfig {
    match path {
        Some(p) => defectrank_core::load_config_from_path(Path::new(p))
            .unwrap_or_else(|e| fail(format!("cannot load config {p}: {e}"))),
        None => RankerConfig::default(),
    }
}

pub fn load_model(path: &str, catalog: &Arc<DefectCatalog>) -> ScoringModel {
    ScoringModel::load(Path::new(path), catalog.clone())
        .unwrap_or_else(|e| fail(format!("cannot load model {path}: {e}")))
}

pub fn write_json<T: Serialize>(path: &str, value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| fail(e));
    std::fs::write(path, json).unwrap_or_else(|e| fail(format!("cannot write {path}: {e}")));
    println!("Wrote {path}");
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => fail(e),
    }
}
