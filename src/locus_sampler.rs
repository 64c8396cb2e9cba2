//! Gibbs update of one locus column of the descent state: peel the phased
//! marker genotypes conditioned on the flanking loci, sample them backward,
//! then translate the sampled genotypes back into meiosis indicators.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::descent_graph::DescentGraph;
use crate::genotype::{Parentage, PhasedTrait, PARENTAGES};
use crate::gmap::GeneticMap;
use crate::pedigree::Pedigree;
use crate::peeling::PeelOperation;
use crate::rfunction::{build_rfunctions, EvalTarget, Result, Rfunction, TraitSpace};

pub struct LocusSampler {
    rfunctions: Vec<Rfunction>,
    ignore_left: bool,
    ignore_right: bool,
}

impl LocusSampler {
    pub fn new(ped: &Pedigree, peel_order: &[PeelOperation]) -> Self {
        Self {
            rfunctions: build_rfunctions(ped, peel_order, TraitSpace::Marker),
            ignore_left: false,
            ignore_right: false,
        }
    }

    /// Restricts which flanking loci condition the update. Left-to-right
    /// imputation ignores the right flank because it is not yet meaningful.
    pub fn set_ignores(&mut self, left: bool, right: bool) {
        self.ignore_left = left;
        self.ignore_right = right;
        for rf in self.rfunctions.iter_mut() {
            rf.set_ignores(left, right);
        }
    }

    /// Resamples every meiosis indicator at `locus`.
    pub fn step(
        &mut self,
        rng: &mut SmallRng,
        dg: &mut DescentGraph,
        ped: &Pedigree,
        map: &GeneticMap,
        locus: usize,
    ) -> Result<()> {
        let target = EvalTarget::MarkerLocus(locus);
        for i in 0..self.rfunctions.len() {
            let (done, rest) = self.rfunctions.split_at_mut(i);
            rest[0].evaluate(done, dg, ped, map, target);
        }

        let mut traits = vec![0u8; ped.num_members()];
        for rf in self.rfunctions.iter().rev() {
            rf.sample(rng, &mut traits)?;
        }

        for person in ped.num_founders()..ped.num_members() {
            let child = PhasedTrait::from_index(traits[person] as usize);
            for parentage in PARENTAGES {
                let parent = match ped.member(person).parent(parentage) {
                    Some(p) => p,
                    None => continue,
                };
                let parent_trait = PhasedTrait::from_index(traits[parent] as usize);
                let allele = child.allele(parentage);
                let mi = if parent_trait.is_heterozygous() {
                    u8::from(parent_trait.maternal() != allele)
                } else {
                    // a homozygous parent leaves the meiosis unconstrained
                    self.sample_homo_mi(rng, dg, map, person, locus, parentage)
                };
                dg.set(person, locus, parentage, mi);
            }
        }
        Ok(())
    }

    fn homo_mi_weights(
        &self,
        dg: &DescentGraph,
        map: &GeneticMap,
        person: usize,
        locus: usize,
        parentage: Parentage,
    ) -> [f64; 2] {
        let mut w = [0.5, 0.5];
        if !self.ignore_left && locus > 0 {
            let b = dg.get(person, locus - 1, parentage) as usize;
            w[b] *= map.inverse_theta(locus - 1);
            w[1 - b] *= map.theta(locus - 1);
        }
        if !self.ignore_right && locus + 1 < dg.num_loci() {
            let b = dg.get(person, locus + 1, parentage) as usize;
            w[b] *= map.inverse_theta(locus);
            w[1 - b] *= map.theta(locus);
        }
        let s = w[0] + w[1];
        [w[0] / s, w[1] / s]
    }

    fn sample_homo_mi(
        &self,
        rng: &mut SmallRng,
        dg: &DescentGraph,
        map: &GeneticMap,
        person: usize,
        locus: usize,
        parentage: Parentage,
    ) -> u8 {
        let w = self.homo_mi_weights(dg, map, person, locus, parentage);
        u8::from(rng.gen::<f64>() >= w[0])
    }

    /// Builds a starting descent state by imputing each locus left to right,
    /// conditioned on the loci already imputed.
    pub fn sequential_imputation(
        &mut self,
        rng: &mut SmallRng,
        dg: &mut DescentGraph,
        ped: &Pedigree,
        map: &GeneticMap,
    ) -> Result<()> {
        self.set_ignores(false, true);
        let result = (0..dg.num_loci()).try_for_each(|l| self.step(rng, dg, ped, map, l));
        self.set_ignores(false, false);
        result
    }
}
