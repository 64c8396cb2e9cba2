use std::io::Write;
use std::path::Path;

use itertools::izip;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error, source: {source:?}, path: {path:?}")]
    Io {
        source: std::io::Error,
        path: std::path::PathBuf,
    },
    #[error("lod score tracks disagree on evaluation positions")]
    PositionMismatch,
}

/// LOD scores at the candidate positions, in map order. Scores from
/// different pedigrees over the same map add.
#[derive(Debug, Clone)]
pub struct LodScores {
    positions_cm: Vec<f64>,
    lods: Vec<f64>,
}

impl LodScores {
    pub fn new(positions_cm: Vec<f64>, lods: Vec<f64>) -> Self {
        assert_eq!(positions_cm.len(), lods.len());
        Self { positions_cm, lods }
    }

    pub fn len(&self) -> usize {
        self.lods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lods.is_empty()
    }

    pub fn positions_cm(&self) -> &[f64] {
        &self.positions_cm
    }

    pub fn lods(&self) -> &[f64] {
        &self.lods
    }

    /// Adds another pedigree's evidence, position by position.
    pub fn merge(&mut self, other: &LodScores) -> Result<()> {
        if self.positions_cm.len() != other.positions_cm.len()
            || izip!(&self.positions_cm, &other.positions_cm).any(|(a, b)| (a - b).abs() > 1e-9)
        {
            return Err(Error::PositionMismatch);
        }
        for (mine, theirs) in izip!(&mut self.lods, &other.lods) {
            *mine += theirs;
        }
        Ok(())
    }

    /// Writes a tab-separated table with a header line.
    pub fn write_to(&self, p: impl AsRef<Path>) -> Result<()> {
        let p = p.as_ref();
        let map_io = |source: std::io::Error| Error::Io {
            source,
            path: p.to_owned(),
        };
        let mut out = std::io::BufWriter::new(std::fs::File::create(p).map_err(map_io)?);
        writeln!(out, "position_cm\tlod").map_err(map_io)?;
        for (pos, lod) in izip!(&self.positions_cm, &self.lods) {
            writeln!(out, "{pos:.4}\t{lod:.6}").map_err(map_io)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_elementwise() {
        let mut a = LodScores::new(vec![5.0, 15.0], vec![0.5, -0.25]);
        let b = LodScores::new(vec![5.0, 15.0], vec![1.0, 0.75]);
        a.merge(&b).unwrap();
        assert_eq!(a.lods(), &[1.5, 0.5]);
    }

    #[test]
    fn merge_rejects_different_positions() {
        let mut a = LodScores::new(vec![5.0], vec![0.5]);
        let b = LodScores::new(vec![6.0], vec![1.0]);
        assert!(matches!(a.merge(&b), Err(Error::PositionMismatch)));
    }

    #[test]
    fn writes_table() {
        let dir = std::env::temp_dir().join("pedlod_lod_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scores.txt");
        let scores = LodScores::new(vec![5.5786], vec![0.301]);
        scores.write_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("position_cm\tlod\n"));
        assert!(text.contains("5.5786\t0.301000"));
    }
}
