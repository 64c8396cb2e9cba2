//! File-to-file pipeline: read the input trio, run the chain, write and
//! re-read the LOD table, plus a smoke test of the installed binary.

use pedlod_rs::chain::{ChainOptions, MarkovChain};
use pedlod_rs::disease::DiseaseModel;
use pedlod_rs::gmap::GeneticMap;
use pedlod_rs::lod::LodScores;
use pedlod_rs::pedigree::Pedigree;
use rand::rngs::SmallRng;
use rand::SeedableRng;

#[test]
fn files_in_lod_table_out() {
    let pedigrees = Pedigree::from_ped_file("testdata/trio.ped").unwrap();
    let map = GeneticMap::from_map_file("testdata/trio.map").unwrap();
    let dm = DiseaseModel::from_toml_file("testdata/disease.toml").unwrap();

    let options = ChainOptions {
        iterations: 1000,
        si_trials: 10,
        ..ChainOptions::default()
    };
    let mut merged: Option<LodScores> = None;
    for (i, ped) in pedigrees.iter().enumerate() {
        ped.validate_against_map(map.num_markers()).unwrap();
        let mut rng = SmallRng::seed_from_u64(99 + i as u64);
        let chain = MarkovChain::new(ped, &map, dm, options.clone());
        let scores = chain.run(&mut rng).unwrap().lod_scores(&map);
        match merged.as_mut() {
            None => merged = Some(scores),
            Some(m) => m.merge(&scores).unwrap(),
        }
    }
    let merged = merged.unwrap();
    assert_eq!(merged.len(), map.num_intervals());

    let dir = std::env::temp_dir().join("pedlod_pipeline_test");
    std::fs::create_dir_all(&dir).unwrap();
    let out = dir.join("lod.txt");
    merged.write_to(&out).unwrap();

    let text = std::fs::read_to_string(&out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("position_cm\tlod"));
    assert_eq!(lines.count(), merged.len());
}

#[test]
fn binary_runs_on_testdata() {
    let dir = std::env::temp_dir().join("pedlod_cli_test");
    std::fs::create_dir_all(&dir).unwrap();
    let out = dir.join("lod.txt");

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_pedlod-rs"))
        .args([
            "-p",
            "testdata/trio.ped",
            "-m",
            "testdata/trio.map",
            "-d",
            "testdata/disease.toml",
            "-o",
            out.to_str().unwrap(),
            "-i",
            "500",
            "--seed",
            "7",
            "--num-threads",
            "1",
        ])
        .status()
        .unwrap();
    assert!(status.success());

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("position_cm\tlod\n"));
    assert_eq!(text.lines().count(), 2);
}
