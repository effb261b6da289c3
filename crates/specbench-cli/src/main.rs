use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use specbench_runner::{
    ensure_sufficient, load_dataset, run_sweep, CommandBackend, HarnessContext, ModelCatalog,
    OutputPaths, PolicyKind, PolicySelection, PromptSet, SweepConfig, SweepSummary,
    DEFAULT_BATCH_SIZES,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "specbench",
    version,
    about = "Benchmark formal spec translation and conflict detection"
)]
struct Cli {
    /// Model identifier from the models file
    #[arg(long)]
    model: String,
    #[arg(long = "n_runs", default_value_t = 5)]
    n_runs: usize,
    #[arg(long = "policy_file", default_value = "assets/step_1_policies.jsonl")]
    policy_file: PathBuf,
    #[arg(long = "batch_size", num_args = 1.., default_values_t = DEFAULT_BATCH_SIZES.to_vec())]
    batch_size: Vec<usize>,
    #[arg(long = "policy_types", value_enum, num_args = 1.., default_values_t = vec![PolicyTypeArg::Reachability])]
    policy_types: Vec<PolicyTypeArg>,
    #[arg(long = "results_path", default_value = "results_conflict_detection")]
    results_path: PathBuf,
    /// Use the combined prompt template set
    #[arg(long)]
    combined: bool,
    #[arg(long = "models_file", default_value = "models.yaml")]
    models_file: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyTypeArg {
    #[value(name = "reachability")]
    Reachability,
    #[value(name = "waypoint")]
    Waypoint,
    #[value(name = "loadbalancing")]
    LoadBalancing,
}

impl From<PolicyTypeArg> for PolicyKind {
    fn from(value: PolicyTypeArg) -> Self {
        match value {
            PolicyTypeArg::Reachability => PolicyKind::Reachability,
            PolicyTypeArg::Waypoint => PolicyKind::Waypoint,
            PolicyTypeArg::LoadBalancing => PolicyKind::LoadBalancing,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .without_time()
        .with_target(false)
        .with_writer(std::io::stdout)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(summary) => print_summary(&summary),
        Err(err) => {
            error!("{:#}. Aborting...", err);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<SweepSummary> {
    let selection = PolicySelection::new(cli.policy_types.iter().copied().map(PolicyKind::from))?;
    let config = SweepConfig::new(cli.n_runs, &cli.batch_size, selection)?;

    let catalog = ModelCatalog::load(&cli.models_file)
        .with_context(|| format!("loading models file {}", cli.models_file.display()))?;
    let model = catalog.get(&cli.model)?;

    let dataset = load_dataset(&cli.policy_file, config.selection())
        .with_context(|| format!("loading policy file {}", cli.policy_file.display()))?;
    if dataset.is_empty() {
        return Err(anyhow!(
            "policy file {} has no records of the requested types",
            cli.policy_file.display()
        ));
    }
    // run_sweep repeats this check; here it runs before any output file exists
    ensure_sufficient(&dataset, config.max_n_requirements(), config.selection())?;

    std::fs::create_dir_all(&cli.results_path)?;
    let paths = OutputPaths::timestamped(
        &cli.results_path,
        &cli.model,
        cli.combined,
        config.selection(),
    );
    let mut ctx = HarnessContext::create(&paths)?;
    info!("results: {}", paths.results.display());
    info!("log: {}", paths.log.display());

    let prompt_set = if cli.combined {
        PromptSet::Combined
    } else {
        PromptSet::ConflictDetection
    };
    info!(
        "model {} ({}) with {} prompts",
        cli.model,
        model.backend_type,
        prompt_set.as_str()
    );
    let mut backend = CommandBackend::new(model, prompt_set);

    let summary = run_sweep(&mut ctx, &mut backend, &dataset, &config)?;
    println!("results: {}", paths.results.display());
    println!("log: {}", paths.log.display());
    Ok(summary)
}

fn print_summary(summary: &SweepSummary) {
    println!("trials: {}", summary.trials);
    println!("compared: {}", summary.compared);
    println!("mean_accuracy: {:.4}", summary.mean_accuracy);
    println!("conflicts_injected: {}", summary.conflicts_injected);
    println!("conflicts_detected: {}", summary.conflicts_detected);
    println!("format_errors: {}", summary.format_errors);
    println!("model_errors: {}", summary.model_errors);
}
