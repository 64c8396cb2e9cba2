use std::path::Path;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error, source: {source:?}, path: {path:?}")]
    Io {
        source: std::io::Error,
        path: std::path::PathBuf,
    },
    #[error("csv error: {0:?}")]
    CsvError(#[from] csv::Error),
    #[error("csv not enough column error: expect {expect} columns, found {actual} columns")]
    CsvNotEnoughColumns { expect: usize, actual: usize },
    #[error("{0:?}")]
    ParseFloatError(#[from] std::num::ParseFloatError),
    #[error("marker {index} out of order: {position} cM after {previous} cM")]
    UnorderedMarker {
        index: usize,
        position: f64,
        previous: f64,
    },
    #[error("map has {num_markers} markers but {num_thetas} thetas")]
    InconsistentThetas {
        num_markers: usize,
        num_thetas: usize,
    },
    #[error("allele frequency out of range at marker {index}: {freq}")]
    BadFrequency { index: usize, freq: f64 },
    #[error("map needs at least one marker")]
    EmptyMap,
}

/// One biallelic marker on the map.
#[derive(Debug, Clone)]
pub struct Marker {
    name: String,
    /// position in centimorgans
    genetic_position: f64,
    major_freq: f64,
    minor_freq: f64,
}

impl Marker {
    pub fn new(name: impl Into<String>, genetic_position: f64, minor_freq: f64) -> Self {
        Self {
            name: name.into(),
            genetic_position,
            major_freq: 1.0 - minor_freq,
            minor_freq,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn genetic_position(&self) -> f64 {
        self.genetic_position
    }
    pub fn major(&self) -> f64 {
        self.major_freq
    }
    pub fn minor(&self) -> f64 {
        self.minor_freq
    }
    /// Frequency of allele 0 (major) or allele 1 (minor).
    pub fn allele_freq(&self, allele: u8) -> f64 {
        if allele == 0 {
            self.major_freq
        } else {
            self.minor_freq
        }
    }
}

/// Ordered marker map with pairwise recombination fractions. Thetas are kept
/// in linear space; log views are cached and rebuilt when the temperature
/// changes. Invariant: `thetas.len() == markers.len() - 1`.
#[derive(Debug, Clone, Default)]
pub struct GeneticMap {
    markers: Vec<Marker>,
    thetas: Vec<f64>,
    log_thetas: Vec<f64>,
    log_inverse_thetas: Vec<f64>,
    temperature: f64,
}

/// Haldane map function: genetic distance in Morgans to recombination
/// fraction.
pub fn haldane(m: f64) -> f64 {
    0.5 * (1.0 - (-2.0 * m).exp())
}

impl GeneticMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a map file: one marker per line, tab-delimited
    /// `<name> <position cM> <minor allele freq>`, ordered by position.
    pub fn from_map_file(p: impl AsRef<Path>) -> Result<Self> {
        let mut map = Self::new();
        let mut record = csv::StringRecord::new();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_path(&p)?;

        while reader.read_record(&mut record)? {
            if record.len() < 3 {
                return Err(Error::CsvNotEnoughColumns {
                    expect: 3,
                    actual: record.len(),
                });
            }
            let name = &record[0];
            let cm = record[1].parse::<f64>()?;
            let minor = record[2].parse::<f64>()?;

            if let Some(last) = map.markers.last() {
                if cm <= last.genetic_position() {
                    return Err(Error::UnorderedMarker {
                        index: map.markers.len(),
                        position: cm,
                        previous: last.genetic_position(),
                    });
                }
                // cM to Morgans for the map function
                let d = (cm - last.genetic_position()) / 100.0;
                map.add_theta(haldane(d));
            }
            map.add(Marker::new(name, cm, minor));
        }

        map.sanity_check()?;
        Ok(map)
    }

    pub fn add(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    pub fn add_theta(&mut self, theta: f64) {
        self.thetas.push(theta);
        self.log_thetas.push(theta.ln());
        self.log_inverse_thetas.push((-theta).ln_1p());
    }

    pub fn sanity_check(&self) -> Result<()> {
        if self.markers.is_empty() {
            return Err(Error::EmptyMap);
        }
        if self.thetas.len() + 1 != self.markers.len() {
            return Err(Error::InconsistentThetas {
                num_markers: self.markers.len(),
                num_thetas: self.thetas.len(),
            });
        }
        for (i, m) in self.markers.iter().enumerate() {
            if !(0.0..=1.0).contains(&m.minor()) {
                return Err(Error::BadFrequency {
                    index: i,
                    freq: m.minor(),
                });
            }
        }
        Ok(())
    }

    pub fn num_markers(&self) -> usize {
        self.markers.len()
    }

    /// Number of inter-marker intervals, i.e. candidate disease positions.
    pub fn num_intervals(&self) -> usize {
        self.thetas.len()
    }

    pub fn marker(&self, i: usize) -> &Marker {
        &self.markers[i]
    }

    /// Flattening used for annealing: moves a recombination fraction toward
    /// 0.5 as the temperature goes to 1.
    fn temper(&self, theta: f64) -> f64 {
        theta + self.temperature * (0.5 - theta)
    }

    /// Recombination fraction for the interval between markers i and i+1.
    pub fn theta(&self, i: usize) -> f64 {
        self.temper(self.thetas[i])
    }

    pub fn inverse_theta(&self, i: usize) -> f64 {
        1.0 - self.theta(i)
    }

    pub fn log_theta(&self, i: usize) -> f64 {
        self.log_thetas[i]
    }

    pub fn log_inverse_theta(&self, i: usize) -> f64 {
        self.log_inverse_thetas[i]
    }

    /// Recombination fraction from either flanking marker to the midpoint of
    /// interval i, through the Haldane map function.
    pub fn theta_halfway(&self, i: usize) -> f64 {
        let d = self.markers[i + 1].genetic_position() - self.markers[i].genetic_position();
        self.temper(haldane(0.5 * d / 100.0))
    }

    /// Genetic position (cM) of the midpoint of interval i.
    pub fn position_halfway(&self, i: usize) -> f64 {
        0.5 * (self.markers[i].genetic_position() + self.markers[i + 1].genetic_position())
    }

    /// Flattens all derived recombination fractions; 0.0 leaves the map
    /// untempered. The log caches follow the tempered values.
    pub fn set_temperature(&mut self, t: f64) {
        self.temperature = t;
        self.log_thetas.clear();
        self.log_inverse_thetas.clear();
        for i in 0..self.thetas.len() {
            let theta = self.theta(i);
            self.log_thetas.push(theta.ln());
            self.log_inverse_thetas.push((-theta).ln_1p());
        }
    }
}

#[cfg(test)]
pub(crate) fn map_two_loci(theta: f64) -> GeneticMap {
    // invert haldane to place the second marker
    let d_morgans = -0.5 * (1.0 - 2.0 * theta).ln();
    let mut map = GeneticMap::new();
    map.add(Marker::new("rs1", 0.0, 0.3));
    map.add(Marker::new("rs2", d_morgans * 100.0, 0.3));
    map.add_theta(theta);
    map
}

#[test]
fn haldane_bounds() {
    assert_eq!(haldane(0.0), 0.0);
    assert!((haldane(1e3) - 0.5).abs() < 1e-12);
    // 10 cM is just under 0.1 recombination
    let t = haldane(0.1);
    assert!(t > 0.09 && t < 0.1);
}

#[test]
fn theta_halfway_is_midpoint() {
    let map = map_two_loci(0.1);
    let th = map.theta_halfway(0);
    // two half-interval steps must compose back to the full theta
    let composed = th * (1.0 - th) + (1.0 - th) * th;
    assert!((composed - 0.1).abs() < 1e-10);
    let mid = map.position_halfway(0);
    assert!(mid > 0.0 && mid < map.marker(1).genetic_position());
}

#[test]
fn temperature_flattens_thetas() {
    let mut map = map_two_loci(0.1);
    assert!((map.theta(0) - 0.1).abs() < 1e-12);
    map.set_temperature(1.0);
    assert!((map.theta(0) - 0.5).abs() < 1e-12);
    assert!((map.log_theta(0) - 0.5f64.ln()).abs() < 1e-12);
    map.set_temperature(0.0);
    assert!((map.theta(0) - 0.1).abs() < 1e-12);
}

#[test]
fn sanity_check_catches_missing_theta() {
    let mut map = GeneticMap::new();
    map.add(Marker::new("rs1", 0.0, 0.2));
    map.add(Marker::new("rs2", 5.0, 0.2));
    assert!(matches!(
        map.sanity_check(),
        Err(Error::InconsistentThetas { .. })
    ));
}
