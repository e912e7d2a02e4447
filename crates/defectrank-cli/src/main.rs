//! CLI for defectrank: decide which code-quality defect a novice should hear about first.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "defectrank")]
#[command(about = "defectrank: score, rank and survey the defects in novice programs")]
#[command(version = defectrank_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every scoring model with its context and discretization scale
    Models,

    /// Train a scoring model on a dataset and save its state as JSON
    Train {
        /// Dataset directory (defects.json, submissions.json, defect_counts.json, ...)
        #[arg(long)]
        data: String,

        /// Model kind, see `defectrank models`
        #[arg(long, default_value = "task-common")]
        model: String,

        /// Where to write the trained model state
        #[arg(long)]
        output: String,

        /// Continue from the state already saved at --output instead of starting fresh
        #[arg(long)]
        resume: bool,

        /// JSON file overriding the default ranker configuration
        #[arg(long)]
        config: Option<String>,
    },

    /// Print the learned weight table of a trained model
    Weights {
        #[arg(long)]
        data: String,

        /// Saved model state produced by `defectrank train`
        #[arg(long)]
        state: String,

        /// Show at most this many rows (contexts)
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Print the full table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score, prioritize and discretize the defects of one submission
    Prioritize {
        #[arg(long)]
        data: String,

        #[arg(long)]
        state: String,

        /// Submission id
        #[arg(long)]
        submission: String,

        #[arg(long)]
        json: bool,
    },

    /// Rank the defects of each submission from pairwise comparisons.
    /// Comparisons come from --pairs, or are predicted from two trained models.
    Rank {
        #[arg(long)]
        data: String,

        /// JSON array of pairwise comparisons to resolve
        #[arg(long, conflicts_with_all = ["primary", "secondary"])]
        pairs: Option<String>,

        /// Saved model whose scores decide each comparison
        #[arg(long, requires = "secondary")]
        primary: Option<String>,

        /// Saved model whose scores break primary ties
        #[arg(long, requires = "primary")]
        secondary: Option<String>,

        /// Only rank this submission
        #[arg(long)]
        submission: Option<String>,

        /// Explain each defect's position
        #[arg(long)]
        explain: bool,

        /// Write rankings (and explanations) as JSON
        #[arg(long)]
        output: Option<String>,

        #[arg(long)]
        config: Option<String>,
    },

    /// Pick the next survey question for a respondent
    NextQuestion {
        #[arg(long)]
        data: String,

        /// Respondent id
        #[arg(long)]
        user: String,

        /// Seed for the random choice among unanswered questions
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        config: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Models => commands::models::run(),
        Commands::Train {
            data,
            model,
            output,
            resume,
            config,
        } => commands::train::run(commands::train::TrainCommandConfig {
            data_dir: &data,
            model: &model,
            output_path: &output,
            resume,
            config_path: config.as_deref(),
        }),
        Commands::Weights {
            data,
            state,
            limit,
            json,
        } => commands::weights::run(&data, &state, limit, json),
        Commands::Prioritize {
            data,
            state,
            submission,
            json,
        } => commands::prioritize::run(&data, &state, &submission, json),
        Commands::Rank {
            data,
            pairs,
            primary,
            secondary,
            submission,
            explain,
            output,
            config,
        } => commands::rank::run(commands::rank::RankCommandConfig {
            data_dir: &data,
            pairs_path: pairs.as_deref(),
            primary_path: primary.as_deref(),
            secondary_path: secondary.as_deref(),
            submission: submission.as_deref(),
            explain,
            output_path: output.as_deref(),
            config_path: config.as_deref(),
        }),
        Commands::NextQuestion {
            data,
            user,
            seed,
            config,
        } => commands::question::run(&data, &user, seed, config.as_deref()),
    }
}
