use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use smarty::*;
use tracing::*;

/// Sample atom type hierarchies that reproduce a reference typing.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Molecules, one SMILES per line with an optional title
    #[arg(short, long)]
    molecules: PathBuf,

    /// Base types that together type every atom
    #[arg(short, long)]
    basetypes: PathBuf,

    /// Decorators used to refine types
    #[arg(short, long)]
    decorators: PathBuf,

    /// `$name` replacement bindings
    #[arg(short, long)]
    substitutions: Option<PathBuf>,

    /// Reference types as CSV with columns molecule, atom, type
    #[arg(short, long, conflicts_with = "reference_types")]
    reference: Option<PathBuf>,

    /// Reference types given by a rule file
    #[arg(long)]
    reference_types: Option<PathBuf>,

    #[arg(short, long, default_value_t = 150)]
    iterations: usize,

    #[arg(short, long, default_value_t = 0.1)]
    temperature: f64,

    /// Random seed; a random one is drawn if omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Turn implicit hydrogens into atoms before typing
    #[arg(long)]
    explicit_hydrogens: bool,

    /// Log every iteration's verdict and type table
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the final types here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write final type statistics here as CSV
    #[arg(long)]
    statistics: Option<PathBuf>,

    /// Write a DOT drawing of every typed molecule into this directory
    #[arg(long)]
    dot_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut corpus = Corpus::read_smiles_file(&cli.molecules)?;
    if cli.explicit_hydrogens {
        corpus = corpus.with_explicit_hydrogens();
    }
    let base = RuleList::read(&cli.basetypes).context("Failed to read base types")?;
    let decorators = Decorator::read_list(&cli.decorators).context("Failed to read decorators")?;
    let bindings = match &cli.substitutions {
        Some(path) => ReplacementBinding::read_list(path).context("Failed to read substitutions")?,
        None => Vec::new(),
    };

    let matcher = SmartsMatcher::new();
    let reference = if let Some(path) = &cli.reference {
        Some(load_reference_csv(path, &corpus)?)
    } else if let Some(path) = &cli.reference_types {
        let rules = RuleList::read(path).context("Failed to read reference types")?;
        Some(reference_from_rules(&rules, &bindings, &corpus, &matcher)?)
    } else {
        warn!("No reference given; every valid proposal will be accepted");
        None
    };

    let seed = cli.seed.unwrap_or_else(rand::random);
    info!("Random seed {}", seed);
    let config = SamplerConfig {
        temperature: cli.temperature,
        verbose: cli.verbose,
    };
    let mut sampler = HierarchySampler::new(
        &corpus,
        &matcher,
        base,
        decorators,
        bindings,
        config,
        StdRng::seed_from_u64(seed),
    )?;
    if let Some(reference) = reference {
        sampler = sampler.with_reference(reference)?;
    }

    sampler.run(cli.iterations);
    let state = sampler.into_state();

    let statistics = state.statistics();
    println!("{}", statistics.render(state.matches.as_ref()));
    if let Some(matches) = &state.matches {
        println!("{matches}");
    }

    match &cli.output {
        Some(path) => {
            state.rules.write(path)?;
            info!("Final types written to {}", path.display());
        }
        None => print!("{}", state.rules),
    }
    if let Some(path) = &cli.statistics {
        statistics.write_csv(path, state.matches.as_ref())?;
    }
    if let Some(dir) = &cli.dot_dir {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        for (index, molecule) in corpus.molecules().iter().enumerate() {
            let path = dir.join(format!("{:04}-{}.dot", index, file_stem(molecule.title())));
            visualize_molecule(molecule, Some(state.labels.molecule(index)), &path, None)?;
        }
        info!("Drew {} molecules in {}", corpus.len(), dir.display());
    }
    Ok(())
}

fn file_stem(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
