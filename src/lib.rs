//! Multipoint linkage analysis on general pedigrees.
//!
//! The likelihood model follows Lander-Green: the hidden state is a descent
//! graph (one meiosis indicator per non-founder, locus and parental meiosis),
//! explored by MCMC with two complementary Gibbs kernels. Sampled states are
//! scored by peeling the disease trait at every inter-marker midpoint, and
//! the averaged likelihood ratios against the unlinked baseline become LOD
//! scores. Evidence from independent pedigrees adds on the log10 scale.

pub mod args;
pub mod chain;
pub mod descent_graph;
pub mod disease;
pub mod founder_graph;
pub mod genotype;
pub mod gmap;
pub mod locus_sampler;
pub mod lod;
pub mod meiosis_sampler;
pub mod pedigree;
pub mod peeler;
pub mod peeling;
pub mod rfunction;
