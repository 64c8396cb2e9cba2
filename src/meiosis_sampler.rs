//! Gibbs update of one person's meiosis chains: for each parental meiosis,
//! run a two-state forward pass along the map with the founder-allele
//! likelihood as emission and recombination fractions as transitions, then
//! sample the whole chain backward.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::descent_graph::DescentGraph;
use crate::founder_graph;
use crate::genotype::{Parentage, PARENTAGES};
use crate::gmap::GeneticMap;
use crate::pedigree::Pedigree;
use crate::rfunction::{Error, Result};

pub struct MeiosisSampler {
    emissions: Vec<[f64; 2]>,
    alpha: Vec<[f64; 2]>,
}

impl MeiosisSampler {
    pub fn new(num_loci: usize) -> Self {
        Self {
            emissions: vec![[0.0; 2]; num_loci],
            alpha: vec![[0.0; 2]; num_loci],
        }
    }

    /// Resamples both meiosis chains of one non-founder.
    pub fn step(
        &mut self,
        rng: &mut SmallRng,
        dg: &mut DescentGraph,
        ped: &Pedigree,
        map: &GeneticMap,
        person: usize,
    ) -> Result<()> {
        for parentage in PARENTAGES {
            self.sample_chain(rng, dg, ped, map, person, parentage)?;
        }
        Ok(())
    }

    fn sample_chain(
        &mut self,
        rng: &mut SmallRng,
        dg: &mut DescentGraph,
        ped: &Pedigree,
        map: &GeneticMap,
        person: usize,
        parentage: Parentage,
    ) -> Result<()> {
        let n = dg.num_loci();

        for locus in 0..n {
            let saved = dg.get(person, locus, parentage);
            for v in 0..2u8 {
                dg.set(person, locus, parentage, v);
                self.emissions[locus][v as usize] =
                    founder_graph::locus_likelihood(dg, ped, map, locus).map_or(0.0, f64::exp);
            }
            dg.set(person, locus, parentage, saved);
        }

        // forward pass, each column rescaled to sum 1
        for v in 0..2 {
            self.alpha[0][v] = 0.5 * self.emissions[0][v];
        }
        normalize_column(&mut self.alpha[0], person)?;
        for locus in 1..n {
            let prev = self.alpha[locus - 1];
            let theta = map.theta(locus - 1);
            for v in 0..2 {
                let stay = prev[v] * (1.0 - theta);
                let switch = prev[1 - v] * theta;
                self.alpha[locus][v] = self.emissions[locus][v] * (stay + switch);
            }
            normalize_column(&mut self.alpha[locus], person)?;
        }

        // backward sample
        let mut next = sample_binary(rng, self.alpha[n - 1], person)?;
        dg.set(person, n - 1, parentage, next);
        for locus in (0..n - 1).rev() {
            let theta = map.theta(locus);
            let mut w = [0.0; 2];
            for v in 0..2usize {
                let trans = if v == next as usize { 1.0 - theta } else { theta };
                w[v] = self.alpha[locus][v] * trans;
            }
            next = sample_binary(rng, w, person)?;
            dg.set(person, locus, parentage, next);
        }
        Ok(())
    }
}

fn normalize_column(col: &mut [f64; 2], person: usize) -> Result<()> {
    let s = col[0] + col[1];
    if s <= 0.0 {
        return Err(Error::ZeroConditional { pivot: person });
    }
    col[0] /= s;
    col[1] /= s;
    Ok(())
}

fn sample_binary(rng: &mut SmallRng, w: [f64; 2], person: usize) -> Result<u8> {
    let s = w[0] + w[1];
    if s <= 0.0 {
        return Err(Error::ZeroConditional { pivot: person });
    }
    Ok(u8::from(rng.gen::<f64>() >= w[0] / s))
}
