//! Founder-allele likelihood of one locus. The descent state traces every
//! meiosis back to a founder allele slot; observed genotypes then become
//! constraints between those slots, and the locus likelihood is the sum over
//! consistent allele assignments weighted by population frequencies.

use crate::descent_graph::DescentGraph;
use crate::genotype::{Genotype, Parentage};
use crate::gmap::{GeneticMap, Marker};
use crate::pedigree::Pedigree;

/// Founder allele slot a meiosis transmits at this locus. Founder f owns
/// slots 2f (maternal) and 2f+1 (paternal).
pub fn founder_allele(
    dg: &DescentGraph,
    ped: &Pedigree,
    person: usize,
    locus: usize,
    parentage: Parentage,
) -> usize {
    let mut person = person;
    let mut parentage = parentage;
    loop {
        match ped.member(person).parent(parentage) {
            None => return 2 * person + parentage.index(),
            Some(parent) => {
                let bit = dg.get(person, locus, parentage);
                person = parent;
                parentage = if bit == 0 {
                    Parentage::Maternal
                } else {
                    Parentage::Paternal
                };
            }
        }
    }
}

/// Log-likelihood of the observed genotypes at `locus` given the descent
/// state, or None when no founder-allele assignment is consistent.
pub fn locus_likelihood(
    dg: &DescentGraph,
    ped: &Pedigree,
    map: &GeneticMap,
    locus: usize,
) -> Option<f64> {
    let num_slots = 2 * ped.num_founders();
    let mut adj: Vec<Vec<(usize, Genotype)>> = vec![Vec::new(); num_slots];

    for person in ped.members() {
        let g = person.genotype(locus);
        if g == Genotype::Untyped {
            continue;
        }
        let u = founder_allele(dg, ped, person.index(), locus, Parentage::Maternal);
        let v = founder_allele(dg, ped, person.index(), locus, Parentage::Paternal);
        if u == v {
            if g == Genotype::AB {
                // one founder allele cannot be heterozygous
                return None;
            }
            adj[u].push((u, g));
            continue;
        }
        adj[u].push((v, g));
        adj[v].push((u, g));
    }

    let marker = map.marker(locus);
    let mut visited = vec![false; num_slots];
    let mut assign = vec![u8::MAX; num_slots];
    let mut total = 0.0;

    for start in 0..num_slots {
        if visited[start] || adj[start].is_empty() {
            // unconstrained slots integrate to 1
            continue;
        }
        let mut nodes = vec![start];
        visited[start] = true;
        let mut i = 0;
        while i < nodes.len() {
            let n = nodes[i];
            i += 1;
            for &(m, _) in &adj[n] {
                if !visited[m] {
                    visited[m] = true;
                    nodes.push(m);
                }
            }
        }

        // a connected component admits at most one assignment per seed value
        let mut component_sum = 0.0;
        for seed in 0..2u8 {
            if let Some(p) = try_assignment(&adj, &nodes, start, seed, marker, &mut assign) {
                component_sum += p;
            }
        }
        if component_sum <= 0.0 {
            return None;
        }
        total += component_sum.ln();
    }

    Some(total)
}

/// Propagates `seed` at `start` through the component, returning the product
/// of allele frequencies, or None on a constraint violation.
fn try_assignment(
    adj: &[Vec<(usize, Genotype)>],
    nodes: &[usize],
    start: usize,
    seed: u8,
    marker: &Marker,
    assign: &mut [u8],
) -> Option<f64> {
    for &n in nodes {
        assign[n] = u8::MAX;
    }
    assign[start] = seed;
    let mut queue = vec![start];
    let mut i = 0;
    while i < queue.len() {
        let n = queue[i];
        i += 1;
        let a = assign[n];
        for &(m, g) in &adj[n] {
            let expected = match g {
                Genotype::AB => 1 - a,
                Genotype::AA if a == 0 => 0,
                Genotype::BB if a == 1 => 1,
                _ => return None,
            };
            if assign[m] == u8::MAX {
                assign[m] = expected;
                queue.push(m);
            } else if assign[m] != expected {
                return None;
            }
        }
    }
    Some(nodes.iter().map(|&n| marker.allele_freq(assign[n])).product())
}
