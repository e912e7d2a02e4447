use defectrank_core::prioritize::mask_absent;
use serde::Serialize;

#[derive(Serialize)]
struct PrioritizedDefect<'a> {
    defect: &'a str,
    count: u32,
    score: f64,
    priority: f64,
    level: Option<i32>,
    label: Option<&'static str>,
}

pub fn run(data_dir: &str, state_path: &str, submission_id: &str, json: bool) {
    let data = super::load_dataset(data_dir);
    let model = super::load_model(state_path, &data.catalog);
    let Some(submission) = data.submission(submission_id) else {
        super::fail(format!("unknown submission '{submission_id}'"));
    };
    let counts = data.counts_for(submission_id);
    let present = data.catalog.presence(&counts);
    let scale = model.info().scale;

    let scores = mask_absent(&model.score(submission, &counts), &present);
    let priorities = model.prioritize(submission, &counts);
    let levels = model.discretize(submission, &counts);

    let mut rows: Vec<PrioritizedDefect<'_>> = data
        .catalog
        .ids()
        .enumerate()
        .filter(|(i, _)| present[*i])
        .map(|(i, id)| PrioritizedDefect {
            defect: id,
            count: counts.count(id),
            score: scores[i],
            priority: priorities[i],
            level: levels[i],
            label: levels[i].and_then(|l| scale.label(l)),
        })
        .collect();
    rows.sort_by(|a, b| b.priority.total_cmp(&a.priority).then(a.defect.cmp(b.defect)));

    if json {
        super::print_json(&rows);
        return;
    }

    let info = model.info();
    let task = match data.task_name(&submission.task) {
        Some(name) => format!("{} \"{name}\"", submission.task),
        None => submission.task.clone(),
    };
    println!(
        "Submission {} (student {}, task {task}), model {}",
        submission.id, submission.student, info.name
    );
    if rows.is_empty() {
        println!("  (no defects present)");
        return;
    }
    println!(
        "  {:<24} {:>5} {:>9} {:>9}  {}",
        "Defect", "Count", "Score", "Priority", info.measure_description
    );
    println!("  {}", "-".repeat(72));
    for row in &rows {
        let level = match (row.level, row.label) {
            (Some(l), Some(label)) => format!("{l} ({label})"),
            _ => "undefined".to_string(),
        };
        println!(
            "  {:<24} {:>5} {:>9.4} {:>9.4}  {}",
            row.defect, row.count, row.score, row.priority, level
        );
    }
}
