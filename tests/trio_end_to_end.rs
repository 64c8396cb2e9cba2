//! Checks the MCMC estimate against exact enumeration on a pedigree small
//! enough to enumerate: a trio has only the child's four meiosis indicators,
//! so the posterior over descent states and the resulting LOD score can be
//! computed directly.

use pedlod_rs::chain::{ChainOptions, MarkovChain};
use pedlod_rs::descent_graph::{DescentGraph, LOG_ILLEGAL};
use pedlod_rs::disease::DiseaseModel;
use pedlod_rs::genotype::Parentage;
use pedlod_rs::gmap::GeneticMap;
use pedlod_rs::pedigree::Pedigree;
use pedlod_rs::peeling::PeelSequenceGenerator;
use pedlod_rs::rfunction::{build_rfunctions, peel_forward, EvalTarget, TraitSpace};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn load() -> (Pedigree, GeneticMap, DiseaseModel) {
    let mut peds = Pedigree::from_ped_file("testdata/trio.ped").unwrap();
    let map = GeneticMap::from_map_file("testdata/trio.map").unwrap();
    let dm = DiseaseModel::from_toml_file("testdata/disease.toml").unwrap();
    let ped = peds.remove(0);
    ped.validate_against_map(map.num_markers()).unwrap();
    (ped, map, dm)
}

fn exact_lod(ped: &Pedigree, map: &GeneticMap, dm: DiseaseModel) -> f64 {
    let mut generator = PeelSequenceGenerator::new(ped);
    generator.build_peel_order().unwrap();
    let order = generator.peel_order().to_vec();
    let mut rfs = build_rfunctions(ped, &order, TraitSpace::Disease(dm));

    let base = peel_forward(
        &mut rfs,
        &DescentGraph::new(ped, map),
        ped,
        map,
        EvalTarget::DiseaseUnlinked,
    );

    let kid = ped.members().iter().find(|p| p.id() == "kid").unwrap().index();
    let mut weight_sum = 0.0;
    let mut ratio_sum = 0.0;
    for bits in 0..16u32 {
        let mut dg = DescentGraph::new(ped, map);
        dg.set(kid, 0, Parentage::Maternal, (bits & 1) as u8);
        dg.set(kid, 0, Parentage::Paternal, ((bits >> 1) & 1) as u8);
        dg.set(kid, 1, Parentage::Maternal, ((bits >> 2) & 1) as u8);
        dg.set(kid, 1, Parentage::Paternal, ((bits >> 3) & 1) as u8);
        let ll = dg.likelihood(ped, map);
        if ll == LOG_ILLEGAL {
            continue;
        }
        let w = ll.exp();
        let linked = peel_forward(&mut rfs, &dg, ped, map, EvalTarget::DiseaseInterval(0));
        weight_sum += w;
        ratio_sum += w * (linked - base).exp();
    }
    (ratio_sum / weight_sum).log10()
}

#[test]
fn mcmc_lod_matches_enumeration() {
    let (ped, map, dm) = load();
    let expected = exact_lod(&ped, &map, dm);

    let options = ChainOptions {
        iterations: 20_000,
        burnin: 0.1,
        sample_period: 5,
        si_trials: 20,
        ..ChainOptions::default()
    };
    let chain = MarkovChain::new(&ped, &map, dm, options);
    let mut rng = SmallRng::seed_from_u64(1234);
    let peeler = chain.run(&mut rng).unwrap();
    let scores = peeler.lod_scores(&map);

    assert_eq!(scores.len(), 1);
    let got = scores.lods()[0];
    assert!(
        (got - expected).abs() < 0.1,
        "mcmc lod {got} vs exact {expected}"
    );
}

#[test]
fn exact_lod_is_finite_and_modest() {
    // one trio cannot carry strong linkage evidence
    let (ped, map, dm) = load();
    let lod = exact_lod(&ped, &map, dm);
    assert!(lod.is_finite());
    assert!(lod.abs() < 1.0, "trio lod {lod}");
}
