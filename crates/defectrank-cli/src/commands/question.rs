use defectrank_core::{NextQuestion, is_feedback_checkpoint, select_next_question, vote_counts};
use rand::SeedableRng;
use rand::rngs::StdRng;

pub fn run(data_dir: &str, user: &str, seed: Option<u64>, config_path: Option<&str>) {
    let config = super::load_config(config_path);
    let data = super::load_dataset(data_dir);

    if is_feedback_checkpoint(&data.responses, user, config.feedback_frequency) {
        println!("Feedback checkpoint: {user} has answered a multiple of {} questions.\n", config.feedback_frequency);
    }

    let next = match seed {
        Some(seed) => {
            select_next_question(&data.responses, &data.questions, user, &mut StdRng::seed_from_u64(seed))
        }
        None => select_next_question(&data.responses, &data.questions, user, &mut rand::rng()),
    };

    let submission = match &next {
        NextQuestion::Exhausted => {
            println!("No more questions for {user}.");
            return;
        }
        NextQuestion::Unanswered { submission } => {
            println!("Next question: {submission} (no answers yet)");
            submission
        }
        NextQuestion::MostUncertain {
            submission,
            uncertainty,
        } => {
            println!("Next question: {submission} (uncertainty {uncertainty:.3})");
            submission
        }
    };

    let votes = vote_counts(&data.responses, submission);
    let Some(question) = data.questions.iter().find(|q| &q.submission == submission) else {
        return;
    };
    println!("\n  {:<24} {:<32} {:>5}", "Defect", "Name", "Votes");
    println!("  {}", "-".repeat(63));
    for id in &question.defects {
        let name = data.catalog.get(id).map(|d| d.name.as_str()).unwrap_or("?");
        println!(
            "  {:<24} {:<32.32} {:>5}",
            id,
            name,
            votes.get(id).copied().unwrap_or(0)
        );
    }
}
