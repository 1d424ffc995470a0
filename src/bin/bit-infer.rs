use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context};
use bitree::{
    lang::{parse_program, parse_term},
    prover::{visualization::generate_graphviz_dot, BitConfig, BitRoot, InferenceMetrics, MetricsLevel},
};
use clap::Parser;
use log::info;
use serde_json::json;

/// Backward inference over a textual knowledge base
#[derive(Clone, Debug, Parser)]
struct Opt {
    /// Knowledge base with facts and Horn rules
    file: PathBuf,
    /// Target term, e.g. `P(?X)`
    #[arg(long, short)]
    query: String,
    /// Number of node expansions
    #[arg(long, default_value_t = 100)]
    budget: usize,
    /// Minimum confidence for a result to be reported
    #[arg(long, default_value_t = 0.000001)]
    min_store: f32,
    /// Stop as soon as a result reaches this confidence
    #[arg(long, default_value_t = 1.0)]
    min_abort: f32,
    /// JSON file with tree settings (max_depth, spawn_mode, generalize_constants)
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,
    /// none, counts or verbose
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    metrics: MetricsLevel,
    /// Print the justification trail of every result
    #[arg(long)]
    plan: bool,
    /// Write the final tree in Graphviz format
    #[arg(long, value_name = "FILE")]
    dot: Option<PathBuf>,
    /// Print results and metrics as JSON
    #[arg(long)]
    json: bool,
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<BitConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(BitConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));
    let opt = Opt::parse();

    let source = fs::read_to_string(&opt.file)
        .with_context(|| format!("reading {}", opt.file.display()))?;
    let program = parse_program(&source).map_err(|e| anyhow!("{}: {}", opt.file.display(), e))?;
    let query = parse_term(&opt.query).map_err(|e| anyhow!("query: {}", e))?;
    let config = load_config(&opt.config)?;
    info!(
        "{} facts, {} rules, config {:?}",
        program.facts.len(),
        program.rules.len(),
        config
    );

    let mut root = BitRoot::with_config(query, program.rule_set(), config);
    let mut metrics = InferenceMetrics::new(opt.metrics);
    let outcome = root.infer(opt.budget, opt.min_store, opt.min_abort, &mut metrics);

    if let Some(path) = &opt.dot {
        fs::write(path, generate_graphviz_dot(&root))
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let plans: Vec<_> = if opt.plan {
        outcome
            .results
            .keys()
            .filter_map(|term| root.extract_plan(term))
            .collect()
    } else {
        Vec::new()
    };

    if opt.json {
        let out = json!({
            "outcome": outcome,
            "metrics": metrics,
            "plans": plans,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for (term, tv) in &outcome.results {
        println!("{} {}", term, tv);
    }
    for plan in &plans {
        print!("\n{}", plan);
    }
    eprintln!(
        "{} steps, {} budget left{}{}",
        outcome.steps,
        outcome.remaining,
        if outcome.pool_exhausted { ", pool exhausted" } else { "" },
        if outcome.aborted { ", aborted" } else { "" }
    );
    if opt.metrics != MetricsLevel::None {
        for (counter, n) in &metrics.counters {
            eprintln!("{:>20} {}", counter, n);
        }
        if let Some(elapsed) = metrics.elapsed {
            eprintln!("{:>20} {:?}", "elapsed", elapsed);
        }
    }
    Ok(())
}
