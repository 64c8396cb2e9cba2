use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::genotype::{Affection, PhasedTrait};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error, source: {source:?}, path: {path:?}")]
    Io {
        source: std::io::Error,
        path: std::path::PathBuf,
    },
    #[error("toml parsing error: {0:?}")]
    TomlParsingError(#[from] toml::de::Error),

    #[error("DiseaseModelError: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("disease allele frequency {0} not strictly between 0 and 1")]
    FrequencyOutOfRange(f64),
    #[error("penetrance[{0}] = {1} not between 0 and 1")]
    PenetranceOutOfRange(usize, f64),
}

#[derive(Deserialize, Debug)]
struct DiseaseFile {
    frequency: f64,
    /// probability of being affected given 0, 1 or 2 disease alleles
    penetrance: [f64; 3],
}

impl DiseaseFile {
    fn check(&self) -> Result<()> {
        if !(self.frequency > 0.0 && self.frequency < 1.0) {
            return Err(ValidationError::FrequencyOutOfRange(self.frequency).into());
        }
        for (i, p) in self.penetrance.iter().enumerate() {
            if !(0.0..=1.0).contains(p) {
                return Err(ValidationError::PenetranceOutOfRange(i, *p).into());
            }
        }
        Ok(())
    }
}

/// Single-locus disease model: population frequency of the disease allele
/// plus penetrance by disease-allele count.
#[derive(Debug, Clone, Copy)]
pub struct DiseaseModel {
    frequency: f64,
    penetrance: [f64; 3],
}

impl DiseaseModel {
    pub fn new(frequency: f64, penetrance: [f64; 3]) -> Result<Self> {
        let f = DiseaseFile {
            frequency,
            penetrance,
        };
        f.check()?;
        Ok(Self {
            frequency,
            penetrance,
        })
    }

    pub fn from_toml_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let mut s = String::new();
        let p: &Path = path.as_ref();
        std::fs::File::open(p)
            .map_err(|e| Error::Io {
                source: e,
                path: p.to_owned(),
            })?
            .read_to_string(&mut s)
            .map_err(|e| Error::Io {
                source: e,
                path: p.to_owned(),
            })?;
        let dfile: DiseaseFile = toml::from_str(&s)?;
        dfile.check()?;
        Ok(Self {
            frequency: dfile.frequency,
            penetrance: dfile.penetrance,
        })
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Population prior of a phased disease trait under Hardy-Weinberg.
    pub fn apriori_prob(&self, t: PhasedTrait) -> f64 {
        let allele_freq = |a: u8| {
            if a == 1 {
                self.frequency
            } else {
                1.0 - self.frequency
            }
        };
        allele_freq(t.maternal()) * allele_freq(t.paternal())
    }

    /// Probability of the observed affection status given a phased trait.
    pub fn penetrance_prob(&self, affection: Affection, t: PhasedTrait) -> f64 {
        let pen = self.penetrance[t.minor_count()];
        match affection {
            Affection::Unknown => 1.0,
            Affection::Affected => pen,
            Affection::Unaffected => 1.0 - pen,
        }
    }
}
