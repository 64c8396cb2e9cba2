//! Allele, genotype and phased-trait vocabularies shared by the samplers and
//! the peeler. Marker alleles are biallelic: allele 0 is the major allele (A),
//! allele 1 the minor allele (B). In the disease-trait space allele 1 is the
//! disease allele.

/// Which parental allele a meiosis transmits.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Parentage {
    Maternal = 0,
    Paternal = 1,
}

pub const PARENTAGES: [Parentage; 2] = [Parentage::Maternal, Parentage::Paternal];

impl Parentage {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Unordered genotype as observed at a marker.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Genotype {
    Untyped,
    AA,
    AB,
    BB,
}

impl Genotype {
    /// Codes used in pedigree files: 0 untyped, 1 AA, 2 AB, 3 BB.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Genotype::Untyped),
            1 => Some(Genotype::AA),
            2 => Some(Genotype::AB),
            3 => Some(Genotype::BB),
            _ => None,
        }
    }
}

/// Phased two-allele state, maternal allele first. Doubles as the disease
/// trait state, where B is the disease allele.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PhasedTrait {
    AA = 0,
    AB = 1,
    BA = 2,
    BB = 3,
}

pub const NUM_PHASED_TRAITS: usize = 4;

pub const PHASED_TRAITS: [PhasedTrait; NUM_PHASED_TRAITS] = [
    PhasedTrait::AA,
    PhasedTrait::AB,
    PhasedTrait::BA,
    PhasedTrait::BB,
];

impl PhasedTrait {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Self {
        PHASED_TRAITS[i]
    }

    pub fn from_alleles(maternal: u8, paternal: u8) -> Self {
        PHASED_TRAITS[(maternal as usize) * 2 + paternal as usize]
    }

    pub fn maternal(self) -> u8 {
        (self.index() / 2) as u8
    }

    pub fn paternal(self) -> u8 {
        (self.index() % 2) as u8
    }

    pub fn allele(self, parentage: Parentage) -> u8 {
        match parentage {
            Parentage::Maternal => self.maternal(),
            Parentage::Paternal => self.paternal(),
        }
    }

    pub fn is_heterozygous(self) -> bool {
        self.maternal() != self.paternal()
    }

    /// Number of copies of the B (minor / disease) allele.
    pub fn minor_count(self) -> usize {
        (self.maternal() + self.paternal()) as usize
    }

    /// Whether this phased state is consistent with an observed unordered
    /// genotype. Untyped observations are consistent with everything.
    pub fn consistent_with(self, g: Genotype) -> bool {
        match g {
            Genotype::Untyped => true,
            Genotype::AA => self == PhasedTrait::AA,
            Genotype::BB => self == PhasedTrait::BB,
            Genotype::AB => self.is_heterozygous(),
        }
    }
}

/// Affection status with respect to the disease trait.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Affection {
    Unknown,
    Unaffected,
    Affected,
}

impl Affection {
    /// Codes used in pedigree files: 0 unknown, 1 unaffected, 2 affected.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Affection::Unknown),
            1 => Some(Affection::Unaffected),
            2 => Some(Affection::Affected),
            _ => None,
        }
    }
}

#[test]
fn phased_trait_roundtrip() {
    for (i, t) in PHASED_TRAITS.iter().enumerate() {
        assert_eq!(t.index(), i);
        assert_eq!(PhasedTrait::from_alleles(t.maternal(), t.paternal()), *t);
    }
    assert!(PhasedTrait::AB.is_heterozygous());
    assert!(PhasedTrait::BA.is_heterozygous());
    assert_eq!(PhasedTrait::BA.minor_count(), 1);
    assert_eq!(PhasedTrait::BB.minor_count(), 2);
}

#[test]
fn genotype_consistency() {
    assert!(PhasedTrait::AB.consistent_with(Genotype::AB));
    assert!(PhasedTrait::BA.consistent_with(Genotype::AB));
    assert!(!PhasedTrait::AA.consistent_with(Genotype::AB));
    assert!(PhasedTrait::AA.consistent_with(Genotype::Untyped));
    assert!(!PhasedTrait::BB.consistent_with(Genotype::AA));
}
