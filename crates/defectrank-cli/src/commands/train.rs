//! `defectrank train`: fit a scoring model on a dataset directory.

use std::path::Path;

use defectrank_core::{ModelKind, ScoringModel};

use super::Dataset;

pub struct TrainCommandConfig<'a> {
    pub data_dir: &'a str,
    pub model: &'a str,
    pub output_path: &'a str,
    pub resume: bool,
    pub config_path: Option<&'a str>,
}

pub fn run(cfg: TrainCommandConfig<'_>) {
    let kind: ModelKind = cfg.model.parse().unwrap_or_else(|e| super::fail(e));
    let config = super::load_config(cfg.config_path);
    let data = super::load_dataset(cfg.data_dir);

    let output = Path::new(cfg.output_path);
    let mut model = if cfg.resume && output.exists() {
        ScoringModel::load_as(output, data.catalog.clone(), kind)
            .unwrap_or_else(|e| super::fail(format!("cannot resume from {}: {e}", cfg.output_path)))
    } else {
        ScoringModel::build(kind, data.catalog.clone(), &config)
    };

    if data.submissions.is_empty() {
        eprintln!("Warning: no submissions in {}; saving an untrained model", cfg.data_dir);
    }
    let learned = learn_new(&mut model, &data).unwrap_or_else(|e| super::fail(e));

    let info = model.info();
    let weights = model.weights();
    println!("Model:        {} ({})", info.name, info.measure_description);
    println!(
        "Submissions:  {learned} new, {} learned in total",
        model.learned().len()
    );
    println!("Contexts:     {}", weights.rows.len());
    println!("Scale:        {}", info.scale);
    if model.thresholds().is_empty() {
        println!("Thresholds:   (undefined, not enough data)");
    } else {
        let formatted: Vec<String> = model.thresholds().iter().map(|t| format!("{t:.4}")).collect();
        println!("Thresholds:   {}", formatted.join(", "));
    }

    model
        .save(output)
        .unwrap_or_else(|e| super::fail(format!("cannot save {}: {e}", cfg.output_path)));
    println!("\nSaved to {}", cfg.output_path);
}

/// Update `model` with the dataset submissions it has not learned from yet.
/// Returns how many were new.
fn learn_new(model: &mut ScoringModel, data: &Dataset) -> defectrank_core::Result<usize> {
    let fresh = model.unlearned(&data.observations());
    if fresh.is_empty() {
        log::info!("nothing new to learn, model already covers every submission");
    }
    model.update(&fresh)?;
    Ok(fresh.len())
}
