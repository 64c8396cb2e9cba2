//! MCMC driver for one pedigree: finds a legal starting descent state by
//! repeated sequential imputation, then alternates locus and meiosis Gibbs
//! updates, handing post-burn-in states to the peeler at a fixed period.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::descent_graph::DescentGraph;
use crate::disease::DiseaseModel;
use crate::gmap::GeneticMap;
use crate::locus_sampler::LocusSampler;
use crate::meiosis_sampler::MeiosisSampler;
use crate::pedigree::Pedigree;
use crate::peeler::Peeler;
use crate::peeling::PeelSequenceGenerator;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("peel error: {0}")]
    Peel(#[from] crate::peeling::Error),
    #[error("peeler error: {0}")]
    Peeler(#[from] crate::peeler::Error),
    #[error("sampler error: {0}")]
    Sampler(#[from] crate::rfunction::Error),
    #[error("pedigree {pedigree}: no legal starting descent state found")]
    IllegalStartingGraph { pedigree: String },
}

#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub iterations: usize,
    /// fraction of iterations discarded before sampling starts
    pub burnin: f64,
    /// iterations between peeler samples
    pub sample_period: usize,
    /// sequential imputation attempts for the starting state
    pub si_trials: usize,
    /// probability of a locus update per iteration, the rest are meiosis
    /// updates
    pub lsampler_prob: f64,
    pub temperature: f64,
    pub print_progress: bool,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            iterations: 100_000,
            burnin: 0.1,
            sample_period: 10,
            si_trials: 100,
            lsampler_prob: 0.5,
            temperature: 0.0,
            print_progress: false,
        }
    }
}

pub struct MarkovChain<'a> {
    ped: &'a Pedigree,
    map: GeneticMap,
    disease: DiseaseModel,
    options: ChainOptions,
}

impl<'a> MarkovChain<'a> {
    pub fn new(
        ped: &'a Pedigree,
        map: &GeneticMap,
        disease: DiseaseModel,
        options: ChainOptions,
    ) -> Self {
        let mut map = map.clone();
        map.set_temperature(options.temperature);
        Self {
            ped,
            map,
            disease,
            options,
        }
    }

    pub fn run(&self, rng: &mut SmallRng) -> Result<Peeler> {
        let mut generator = PeelSequenceGenerator::new(self.ped);
        generator.build_peel_order()?;
        let order = generator.peel_order().to_vec();

        let mut lsampler = LocusSampler::new(self.ped, &order);
        let mut msampler = MeiosisSampler::new(self.map.num_markers());
        let mut peeler = Peeler::new(self.ped, &self.map, self.disease, &order)?;

        let mut dg = self.initialise(rng, &mut lsampler)?;

        let iterations = self.options.iterations;
        let burnin = (self.options.burnin * iterations as f64) as usize;
        let sample_period = self.options.sample_period.max(1);
        let report_every = (iterations / 10).max(1);
        let num_loci = self.map.num_markers();
        let lsampler_prob = if self.ped.num_nonfounders() == 0 {
            1.0
        } else {
            self.options.lsampler_prob.clamp(0.0, 1.0)
        };

        let mut locus = 0;
        let mut person = self.ped.num_founders();
        for i in 0..iterations {
            if rng.gen_bool(lsampler_prob) {
                lsampler.step(rng, &mut dg, self.ped, &self.map, locus)?;
                locus = (locus + 1) % num_loci;
            } else {
                msampler.step(rng, &mut dg, self.ped, &self.map, person)?;
                person += 1;
                if person == self.ped.num_members() {
                    person = self.ped.num_founders();
                }
            }

            if i >= burnin && (i - burnin + 1) % sample_period == 0 {
                peeler.process(&dg, self.ped, &self.map);
            }

            if self.options.print_progress && (i + 1) % report_every == 0 {
                eprintln!(
                    "PROGRESS pedigree {}: iteration {}/{}, {} samples",
                    self.ped.id(),
                    i + 1,
                    iterations,
                    peeler.count()
                );
            }
        }

        Ok(peeler)
    }

    /// Best legal state out of `si_trials` sequential imputations. Trials
    /// that paint themselves into an inconsistent corner are discarded.
    fn initialise(
        &self,
        rng: &mut SmallRng,
        lsampler: &mut LocusSampler,
    ) -> Result<DescentGraph> {
        let mut best: Option<DescentGraph> = None;
        for _ in 0..self.options.si_trials.max(1) {
            let mut dg = DescentGraph::new(self.ped, &self.map);
            if lsampler
                .sequential_imputation(rng, &mut dg, self.ped, &self.map)
                .is_err()
            {
                continue;
            }
            dg.likelihood(self.ped, &self.map);
            if dg.is_illegal() {
                continue;
            }
            match &best {
                Some(b) if dg <= *b => {}
                _ => best = Some(dg),
            }
        }
        best.ok_or_else(|| Error::IllegalStartingGraph {
            pedigree: self.ped.id().to_owned(),
        })
    }
}
