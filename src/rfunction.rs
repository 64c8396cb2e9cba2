//! Peel tables. Each `Rfunction` realises one elimination step of the peel
//! order as a table over the cutset's phased traits, either in marker space
//! (conditioning on a locus of the descent state) or in disease-trait space
//! (conditioning on a candidate position between markers).

use rand::rngs::SmallRng;
use rand::Rng;

use crate::descent_graph::DescentGraph;
use crate::disease::DiseaseModel;
use crate::genotype::{Parentage, PhasedTrait, NUM_PHASED_TRAITS};
use crate::gmap::GeneticMap;
use crate::pedigree::Pedigree;
use crate::peeling::PeelOperation;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("conditional distribution for member {pivot} sums to zero; the descent state is illegal")]
    ZeroConditional { pivot: usize },
}

/// What the peel tables range over.
#[derive(Clone, Copy, Debug)]
pub enum TraitSpace {
    /// phased marker genotypes, emitted against the observed genotypes
    Marker,
    /// phased disease traits, emitted against affection statuses
    Disease(DiseaseModel),
}

/// Where the meiosis weights come from.
#[derive(Clone, Copy, Debug)]
pub enum EvalTarget {
    /// marker locus, weighted by the flanking descent-state bits
    MarkerLocus(usize),
    /// midpoint of inter-marker interval, weighted by both flanking bits
    DiseaseInterval(usize),
    /// no linked markers, uniform meioses
    DiseaseUnlinked,
}

struct Transmission {
    child: usize,
    mother: usize,
    father: usize,
}

pub struct Rfunction {
    pivot: usize,
    cutset: Vec<usize>,
    space: TraitSpace,
    /// earlier tables consumed by this step, as indices into the peel order
    previous: Vec<usize>,
    /// transmission factors first fully instantiated at this step
    transmissions: Vec<Transmission>,
    /// summed table over the cutset, scaled to a max of 1 after evaluation
    matrix: Vec<f64>,
    /// per cutset cell, the unsummed distribution over the pivot's trait
    pivot_cells: Vec<[f64; NUM_PHASED_TRAITS]>,
    ignore_left: bool,
    ignore_right: bool,
}

impl Rfunction {
    fn new(
        op: &PeelOperation,
        transmissions: Vec<Transmission>,
        previous: Vec<usize>,
        space: TraitSpace,
    ) -> Self {
        let num_cells = 1usize << (2 * op.cutset_size());
        Self {
            pivot: op.pivot(),
            cutset: op.cutset().to_vec(),
            space,
            previous,
            transmissions,
            matrix: vec![0.0; num_cells],
            pivot_cells: vec![[0.0; NUM_PHASED_TRAITS]; num_cells],
            ignore_left: false,
            ignore_right: false,
        }
    }

    pub fn pivot(&self) -> usize {
        self.pivot
    }

    pub fn set_ignores(&mut self, left: bool, right: bool) {
        self.ignore_left = left;
        self.ignore_right = right;
    }

    fn cutset_code(&self, traits: &[u8]) -> usize {
        self.cutset
            .iter()
            .enumerate()
            .map(|(j, &m)| (traits[m] as usize) << (2 * j))
            .sum()
    }

    fn lookup(&self, traits: &[u8]) -> f64 {
        self.matrix[self.cutset_code(traits)]
    }

    /// Fills the table for one target, reading earlier tables from `done`
    /// (indexed by peel-order position). Returns the log of the scaling
    /// factor divided out, so that summing the returns over a whole forward
    /// pass yields the log-likelihood.
    pub fn evaluate(
        &mut self,
        done: &[Rfunction],
        dg: &DescentGraph,
        ped: &Pedigree,
        map: &GeneticMap,
        target: EvalTarget,
    ) -> f64 {
        let mut traits = vec![0u8; ped.num_members()];
        let mut max_cell = 0.0f64;

        for code in 0..self.matrix.len() {
            let mut c = code;
            for &m in &self.cutset {
                traits[m] = (c & 3) as u8;
                c >>= 2;
            }
            let mut cells = [0.0; NUM_PHASED_TRAITS];
            for (t, cell) in cells.iter_mut().enumerate() {
                traits[self.pivot] = t as u8;
                *cell = self.cell_value(done, dg, ped, map, target, &traits);
            }
            let sum: f64 = cells.iter().sum();
            self.pivot_cells[code] = cells;
            self.matrix[code] = sum;
            if sum > max_cell {
                max_cell = sum;
            }
        }

        if max_cell <= 0.0 {
            return f64::NEG_INFINITY;
        }
        for cell in self.matrix.iter_mut() {
            *cell /= max_cell;
        }
        max_cell.ln()
    }

    fn cell_value(
        &self,
        done: &[Rfunction],
        dg: &DescentGraph,
        ped: &Pedigree,
        map: &GeneticMap,
        target: EvalTarget,
        traits: &[u8],
    ) -> f64 {
        let person = ped.member(self.pivot);
        let pt = PhasedTrait::from_index(traits[self.pivot] as usize);

        let mut v = match (self.space, target) {
            (TraitSpace::Marker, EvalTarget::MarkerLocus(locus)) => {
                if pt.consistent_with(person.genotype(locus)) {
                    1.0
                } else {
                    0.0
                }
            }
            (TraitSpace::Marker, _) => 0.0,
            (TraitSpace::Disease(dm), _) => dm.penetrance_prob(person.affection(), pt),
        };
        if v == 0.0 {
            return 0.0;
        }

        if person.is_founder() {
            v *= match (self.space, target) {
                (TraitSpace::Marker, EvalTarget::MarkerLocus(locus)) => {
                    let marker = map.marker(locus);
                    marker.allele_freq(pt.maternal()) * marker.allele_freq(pt.paternal())
                }
                (TraitSpace::Disease(dm), _) => dm.apriori_prob(pt),
                _ => 0.0,
            };
        }

        for tr in &self.transmissions {
            let child = PhasedTrait::from_index(traits[tr.child] as usize);
            for (parentage, parent) in [
                (Parentage::Maternal, tr.mother),
                (Parentage::Paternal, tr.father),
            ] {
                let parent_trait = PhasedTrait::from_index(traits[parent] as usize);
                let w = self.meiosis_weights(dg, map, target, tr.child, parentage);
                let child_allele = child.allele(parentage);
                let mut p = 0.0;
                if parent_trait.maternal() == child_allele {
                    p += w[0];
                }
                if parent_trait.paternal() == child_allele {
                    p += w[1];
                }
                v *= p;
                if v == 0.0 {
                    return 0.0;
                }
            }
        }

        for &j in &self.previous {
            v *= done[j].lookup(traits);
            if v == 0.0 {
                return 0.0;
            }
        }
        v
    }

    /// Probability that a meiosis picks the parent's maternal (index 0) or
    /// paternal (index 1) allele, conditioned on the descent state around the
    /// target.
    fn meiosis_weights(
        &self,
        dg: &DescentGraph,
        map: &GeneticMap,
        target: EvalTarget,
        person: usize,
        parentage: Parentage,
    ) -> [f64; 2] {
        match target {
            EvalTarget::MarkerLocus(locus) => {
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
                normalized(w)
            }
            EvalTarget::DiseaseInterval(interval) => {
                let th = map.theta_halfway(interval);
                let left = dg.get(person, interval, parentage) as usize;
                let right = dg.get(person, interval + 1, parentage) as usize;
                let mut w = [1.0, 1.0];
                w[left] *= 1.0 - th;
                w[1 - left] *= th;
                w[right] *= 1.0 - th;
                w[1 - right] *= th;
                normalized(w)
            }
            EvalTarget::DiseaseUnlinked => [0.5, 0.5],
        }
    }

    /// Draws the pivot's trait conditioned on already-sampled cutset traits.
    /// Must follow an `evaluate` call for the same target.
    pub fn sample(&self, rng: &mut SmallRng, traits: &mut [u8]) -> Result<()> {
        let cells = &self.pivot_cells[self.cutset_code(traits)];
        let total: f64 = cells.iter().sum();
        if total <= 0.0 {
            return Err(Error::ZeroConditional { pivot: self.pivot });
        }
        let mut r = rng.gen::<f64>() * total;
        let mut chosen = 0;
        for (t, &c) in cells.iter().enumerate() {
            if c <= 0.0 {
                continue;
            }
            chosen = t;
            r -= c;
            if r <= 0.0 {
                break;
            }
        }
        traits[self.pivot] = chosen as u8;
        Ok(())
    }
}

fn normalized(w: [f64; 2]) -> [f64; 2] {
    let s = w[0] + w[1];
    [w[0] / s, w[1] / s]
}

/// Instantiates one table per peel operation, assigning each transmission
/// factor to the step where its trio is first cut and wiring up table
/// consumption.
pub fn build_rfunctions(
    ped: &Pedigree,
    peel_order: &[PeelOperation],
    space: TraitSpace,
) -> Vec<Rfunction> {
    let mut position = vec![usize::MAX; ped.num_members()];
    for (i, op) in peel_order.iter().enumerate() {
        position[op.pivot()] = i;
    }

    let mut consumed = vec![false; peel_order.len()];
    let mut rfunctions = Vec::with_capacity(peel_order.len());
    for (i, op) in peel_order.iter().enumerate() {
        let mut transmissions = Vec::new();
        for m in ped.members() {
            if let (Some(mother), Some(father)) = (m.maternal_index(), m.paternal_index()) {
                let first = position[m.index()]
                    .min(position[mother])
                    .min(position[father]);
                if first == i {
                    transmissions.push(Transmission {
                        child: m.index(),
                        mother,
                        father,
                    });
                }
            }
        }
        let mut previous = Vec::new();
        for (j, c) in consumed.iter_mut().enumerate().take(i) {
            if !*c && peel_order[j].in_cutset(op.pivot()) {
                *c = true;
                previous.push(j);
            }
        }
        rfunctions.push(Rfunction::new(op, transmissions, previous, space));
    }
    rfunctions
}

/// Forward pass over all tables; the sum of the per-table scale factors is
/// the log-likelihood of the target.
pub fn peel_forward(
    rfunctions: &mut [Rfunction],
    dg: &DescentGraph,
    ped: &Pedigree,
    map: &GeneticMap,
    target: EvalTarget,
) -> f64 {
    let mut total = 0.0;
    for i in 0..rfunctions.len() {
        let (done, rest) = rfunctions.split_at_mut(i);
        total += rest[0].evaluate(done, dg, ped, map, target);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmap::{GeneticMap, Marker};
    use crate::pedigree::fixtures;
    use crate::peeling::PeelSequenceGenerator;
    use rand::SeedableRng;

    fn one_marker_map() -> GeneticMap {
        let mut map = GeneticMap::new();
        map.add(Marker::new("rs1", 0.0, 0.3));
        map
    }

    fn peel_order(ped: &Pedigree) -> Vec<crate::peeling::PeelOperation> {
        let mut gen = PeelSequenceGenerator::new(ped);
        gen.build_peel_order().unwrap();
        gen.peel_order().to_vec()
    }

    #[test]
    fn marker_forward_pass_matches_enumeration() {
        // trio dad AB, mum AA, kid AB at one marker with minor freq 0.3.
        // P(dad het) * P(mum AA) * P(kid draws B from dad and A from mum)
        //   = (2 * 0.3 * 0.7) * 0.7^2 * 0.5 = 0.1029
        let ped = fixtures::trio();
        let map = one_marker_map();
        let order = peel_order(&ped);
        let mut rfs = build_rfunctions(&ped, &order, TraitSpace::Marker);
        let dg = DescentGraph::new(&ped, &map);
        let ll = peel_forward(&mut rfs, &dg, &ped, &map, EvalTarget::MarkerLocus(0));
        assert!((ll - 0.1029f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn backward_sampling_respects_constraints() {
        let ped = fixtures::trio();
        let map = one_marker_map();
        let order = peel_order(&ped);
        let mut rfs = build_rfunctions(&ped, &order, TraitSpace::Marker);
        let dg = DescentGraph::new(&ped, &map);
        peel_forward(&mut rfs, &dg, &ped, &map, EvalTarget::MarkerLocus(0));

        let kid = ped.members().iter().find(|p| p.id() == "kid").unwrap().index();
        let mum = ped.members().iter().find(|p| p.id() == "mum").unwrap().index();
        let dad = ped.members().iter().find(|p| p.id() == "dad").unwrap().index();

        let mut rng = SmallRng::seed_from_u64(42);
        let mut traits = vec![0u8; ped.num_members()];
        let mut dad_ab = 0;
        let n = 2000;
        for _ in 0..n {
            for rf in rfs.iter().rev() {
                rf.sample(&mut rng, &mut traits).unwrap();
            }
            // mum is AA, kid must carry maternal A and paternal B
            assert_eq!(traits[mum], PhasedTrait::AA.index() as u8);
            assert_eq!(traits[kid], PhasedTrait::AB.index() as u8);
            assert!(PhasedTrait::from_index(traits[dad] as usize).is_heterozygous());
            if traits[dad] == PhasedTrait::AB.index() as u8 {
                dad_ab += 1;
            }
        }
        // dad's phase is symmetric
        let frac = dad_ab as f64 / n as f64;
        assert!(frac > 0.45 && frac < 0.55, "dad AB fraction {frac}");
    }

    #[test]
    fn disease_unlinked_matches_enumeration() {
        let ped = fixtures::trio();
        let map = one_marker_map();
        let dm = DiseaseModel::new(0.1, [0.05, 0.8, 0.9]).unwrap();
        let order = peel_order(&ped);
        let mut rfs = build_rfunctions(&ped, &order, TraitSpace::Disease(dm));
        let dg = DescentGraph::new(&ped, &map);
        let ll = peel_forward(&mut rfs, &dg, &ped, &map, EvalTarget::DiseaseUnlinked);

        // brute force over all phased trait combinations
        let dad = ped.members().iter().find(|p| p.id() == "dad").unwrap();
        let mum = ped.members().iter().find(|p| p.id() == "mum").unwrap();
        let kid = ped.members().iter().find(|p| p.id() == "kid").unwrap();
        let mut expected = 0.0;
        for d in 0..4 {
            for m in 0..4 {
                for k in 0..4 {
                    let (dt, mt, kt) = (
                        PhasedTrait::from_index(d),
                        PhasedTrait::from_index(m),
                        PhasedTrait::from_index(k),
                    );
                    let inherit = |parent: PhasedTrait, allele: u8| {
                        let mut p = 0.0;
                        if parent.maternal() == allele {
                            p += 0.5;
                        }
                        if parent.paternal() == allele {
                            p += 0.5;
                        }
                        p
                    };
                    expected += dm.apriori_prob(dt)
                        * dm.penetrance_prob(dad.affection(), dt)
                        * dm.apriori_prob(mt)
                        * dm.penetrance_prob(mum.affection(), mt)
                        * dm.penetrance_prob(kid.affection(), kt)
                        * inherit(mt, kt.maternal())
                        * inherit(dt, kt.paternal());
                }
            }
        }
        assert!((ll - expected.ln()).abs() < 1e-10);
    }

    #[test]
    fn impossible_genotypes_give_zero_likelihood() {
        use crate::genotype::{Affection as Aff, Genotype as G};
        let mut b = crate::pedigree::PedigreeBuilder::new("bad");
        b.add_founder("dad", Aff::Unknown, vec![G::AA]).unwrap();
        b.add_founder("mum", Aff::Unknown, vec![G::AA]).unwrap();
        b.add_child("kid", "mum", "dad", Aff::Unknown, vec![G::BB]).unwrap();
        let ped = b.finish().unwrap();
        let map = one_marker_map();
        let order = peel_order(&ped);
        let mut rfs = build_rfunctions(&ped, &order, TraitSpace::Marker);
        let dg = DescentGraph::new(&ped, &map);
        let ll = peel_forward(&mut rfs, &dg, &ped, &map, EvalTarget::MarkerLocus(0));
        assert_eq!(ll, f64::NEG_INFINITY);
    }
}
