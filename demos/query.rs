use clap::Parser;
use color_eyre::eyre::{bail, eyre};

use ac_eval::eval::Evaluator;
use ac_eval::evidence::Evidence;
use ac_eval::model::Network;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Compiled circuit (`.nnf`).
    #[arg(value_name = "FILE")]
    circuit: std::path::PathBuf,

    /// Literal map (`.lmap`).
    #[arg(value_name = "FILE")]
    literal_map: std::path::PathBuf,

    /// Observation `VAR=VALUE`, by value name. May be repeated.
    #[clap(short, long = "evidence", value_name = "VAR=VALUE")]
    evidence: Vec<String>,

    /// Also print parameter posteriors.
    #[clap(long)]
    parameters: bool,

    /// Log evaluation passes.
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        if args.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let network = Network::load(&args.circuit, &args.literal_map)?;
    println!(
        "circuit: {} nodes, {} edges; {} variables, {} potentials",
        network.circuit().num_nodes(),
        network.circuit().num_edges(),
        network.variables().len(),
        network.potentials().len()
    );

    let mut evidence = Evidence::new(&network);
    for obs in &args.evidence {
        let (name, value) = obs
            .split_once('=')
            .ok_or_else(|| eyre!("evidence must look like VAR=VALUE: {}", obs))?;
        let Some(var) = network.variable(name) else {
            bail!("unknown variable {}", name);
        };
        let Some(index) = var.values().iter().position(|v| v == value) else {
            bail!("{} has no value {}; domain is {:?}", name, value, var.values());
        };
        evidence.var_commit(var, index)?;
    }

    let mut evaluator = Evaluator::new(&network);
    let pe = evaluator.evaluate_with_derivatives(&evidence)?;
    println!("P(e) = {}", pe);

    for (name, posteriors) in evaluator.variables_posteriors(network.variables())? {
        let var = network.variable(name).ok_or_else(|| eyre!("variable {} vanished", name))?;
        let dist: Vec<String> = var
            .values()
            .iter()
            .zip(&posteriors)
            .map(|(v, p)| format!("{}: {:.6}", v, p))
            .collect();
        println!("{} = {{{}}}", name, dist.join(", "));
    }

    if args.parameters {
        for (name, posteriors) in evaluator.potentials_posteriors(network.potentials())? {
            println!("{} = {:?}", name, posteriors);
        }
    }

    println!("Total time: {:.3} s", time_total.elapsed().as_secs_f64());

    Ok(())
}
