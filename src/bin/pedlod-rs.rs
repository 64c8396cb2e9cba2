use anyhow::Context;
use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;

use pedlod_rs::args::Arguments;
use pedlod_rs::chain::{ChainOptions, MarkovChain};
use pedlod_rs::disease::DiseaseModel;
use pedlod_rs::gmap::GeneticMap;
use pedlod_rs::lod::LodScores;
use pedlod_rs::pedigree::Pedigree;

fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    eprintln!("{args:#?}");

    let map = GeneticMap::from_map_file(&args.map_file)
        .with_context(|| format!("failed to read map file {}", args.map_file))?;
    let disease = DiseaseModel::from_toml_file(&args.disease_file)
        .with_context(|| format!("failed to read disease model {}", args.disease_file))?;
    let pedigrees = Pedigree::from_ped_file(&args.ped_file)
        .with_context(|| format!("failed to read pedigree file {}", args.ped_file))?;
    for ped in &pedigrees {
        ped.validate_against_map(map.num_markers())?;
    }
    eprintln!(
        "PROGRESS loaded {} pedigrees, {} markers",
        pedigrees.len(),
        map.num_markers()
    );

    let options = ChainOptions {
        iterations: args.iterations,
        burnin: args.burnin,
        sample_period: args.sample_period,
        si_trials: args.si_trials,
        lsampler_prob: args.lsampler_prob,
        temperature: args.temperature,
        print_progress: args.print_progress,
    };
    let seed = args.seed.unwrap_or_else(rand::random);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .build()?;

    // each pedigree is an independent chain with its own seeded stream
    let results: Vec<Option<LodScores>> = pool.install(|| {
        pedigrees
            .par_iter()
            .enumerate()
            .map(|(i, ped)| {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(i as u64));
                let chain = MarkovChain::new(ped, &map, disease, options.clone());
                match chain.run(&mut rng) {
                    Ok(peeler) => Some(peeler.lod_scores(&map)),
                    Err(e) => {
                        eprintln!("pedigree {} skipped: {e}", ped.id());
                        None
                    }
                }
            })
            .collect()
    });

    let mut merged: Option<LodScores> = None;
    let mut used = 0usize;
    for scores in results.into_iter().flatten() {
        used += 1;
        match merged.as_mut() {
            None => merged = Some(scores),
            Some(m) => m.merge(&scores)?,
        }
    }
    let merged = merged.context("no pedigree produced LOD scores")?;
    merged
        .write_to(&args.output)
        .with_context(|| format!("failed to write {}", args.output))?;
    eprintln!(
        "PROGRESS wrote {} positions from {}/{} pedigrees to {}",
        merged.len(),
        used,
        pedigrees.len(),
        args.output
    );
    Ok(())
}
