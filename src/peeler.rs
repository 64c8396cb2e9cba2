//! Accumulates the linkage evidence. Given sampled descent states, peels the
//! disease trait at the midpoint of every marker interval and averages the
//! likelihood ratio against the unlinked baseline.

use crate::descent_graph::DescentGraph;
use crate::disease::DiseaseModel;
use crate::gmap::GeneticMap;
use crate::lod::LodScores;
use crate::pedigree::Pedigree;
use crate::peeling::PeelOperation;
use crate::rfunction::{build_rfunctions, peel_forward, EvalTarget, Rfunction, TraitSpace};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "pedigree {pedigree}: affection statuses are impossible under the disease model"
    )]
    ImpossibleTraitData { pedigree: String },
}

pub struct Peeler {
    rfunctions: Vec<Rfunction>,
    lod_sums: Vec<f64>,
    count: u64,
    unlinked_log_lik: f64,
}

impl Peeler {
    pub fn new(
        ped: &Pedigree,
        map: &GeneticMap,
        disease: DiseaseModel,
        peel_order: &[PeelOperation],
    ) -> Result<Self> {
        let mut rfunctions = build_rfunctions(ped, peel_order, TraitSpace::Disease(disease));
        // the unlinked target never reads the descent state
        let dg = DescentGraph::new(ped, map);
        let unlinked_log_lik =
            peel_forward(&mut rfunctions, &dg, ped, map, EvalTarget::DiseaseUnlinked);
        if unlinked_log_lik == f64::NEG_INFINITY {
            return Err(Error::ImpossibleTraitData {
                pedigree: ped.id().to_owned(),
            });
        }
        Ok(Self {
            rfunctions,
            lod_sums: vec![0.0; map.num_intervals()],
            count: 0,
            unlinked_log_lik,
        })
    }

    /// Folds one sampled descent state into the running likelihood-ratio
    /// means.
    pub fn process(&mut self, dg: &DescentGraph, ped: &Pedigree, map: &GeneticMap) {
        for (interval, sum) in self.lod_sums.iter_mut().enumerate() {
            let ll = peel_forward(
                &mut self.rfunctions,
                dg,
                ped,
                map,
                EvalTarget::DiseaseInterval(interval),
            );
            *sum += (ll - self.unlinked_log_lik).exp();
        }
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn unlinked_log_lik(&self) -> f64 {
        self.unlinked_log_lik
    }

    /// LOD score per interval midpoint: log10 of the averaged likelihood
    /// ratio. All zeros when nothing was sampled.
    pub fn lod_scores(&self, map: &GeneticMap) -> LodScores {
        let positions = (0..self.lod_sums.len())
            .map(|i| map.position_halfway(i))
            .collect();
        let lods = self
            .lod_sums
            .iter()
            .map(|&s| {
                if self.count == 0 {
                    0.0
                } else {
                    (s / self.count as f64).log10()
                }
            })
            .collect();
        LodScores::new(positions, lods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmap::map_two_loci;
    use crate::pedigree::fixtures;
    use crate::peeling::PeelSequenceGenerator;

    fn peel_order(ped: &Pedigree) -> Vec<PeelOperation> {
        let mut gen = PeelSequenceGenerator::new(ped);
        gen.build_peel_order().unwrap();
        gen.peel_order().to_vec()
    }

    #[test]
    fn counts_processed_states() {
        let ped = fixtures::trio();
        let map = map_two_loci(0.1);
        let dm = DiseaseModel::new(0.1, [0.05, 0.8, 0.9]).unwrap();
        let order = peel_order(&ped);
        let mut peeler = Peeler::new(&ped, &map, dm, &order).unwrap();
        assert_eq!(peeler.count(), 0);

        let dg = DescentGraph::new(&ped, &map);
        peeler.process(&dg, &ped, &map);
        peeler.process(&dg, &ped, &map);
        assert_eq!(peeler.count(), 2);

        let scores = peeler.lod_scores(&map);
        assert_eq!(scores.len(), 1);
        assert!(scores.lods()[0].is_finite());
    }

    #[test]
    fn empty_run_gives_zero_lods() {
        let ped = fixtures::trio();
        let map = map_two_loci(0.1);
        let dm = DiseaseModel::new(0.1, [0.05, 0.8, 0.9]).unwrap();
        let order = peel_order(&ped);
        let peeler = Peeler::new(&ped, &map, dm, &order).unwrap();
        let scores = peeler.lod_scores(&map);
        assert_eq!(scores.lods(), &[0.0]);
    }

    #[test]
    fn impossible_affections_are_detected() {
        // zero penetrance everywhere cannot produce an affected member
        let ped = fixtures::trio();
        let map = map_two_loci(0.1);
        let dm = DiseaseModel::new(0.1, [0.0, 0.0, 0.0]).unwrap();
        let order = peel_order(&ped);
        assert!(matches!(
            Peeler::new(&ped, &map, dm, &order),
            Err(Error::ImpossibleTraitData { .. })
        ));
    }
}
