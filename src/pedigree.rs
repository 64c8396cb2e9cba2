use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::genotype::{Affection, Genotype, Parentage};
use crate::peeling::{PeelOperation, PeelType, PeelingState};

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
    #[error("csv not enough column error: expect at least {expect} columns, found {actual}")]
    CsvNotEnoughColumns { expect: usize, actual: usize },
    #[error("pedigree {pedigree}: duplicated person id {person}")]
    DuplicatePerson { pedigree: String, person: String },
    #[error("pedigree {pedigree}: person {person} references unknown parent {parent}")]
    UnknownParent {
        pedigree: String,
        person: String,
        parent: String,
    },
    #[error("pedigree {pedigree}: person {person} has exactly one parent recorded")]
    OneParentMissing { pedigree: String, person: String },
    #[error("pedigree {pedigree}: person {person} has bad affection code {code}")]
    BadAffectionCode {
        pedigree: String,
        person: String,
        code: String,
    },
    #[error("pedigree {pedigree}: person {person} has bad genotype code {code} at marker {index}")]
    BadGenotypeCode {
        pedigree: String,
        person: String,
        code: String,
        index: usize,
    },
    #[error("pedigree {pedigree}: members disagree on genotype count")]
    InconsistentGenotypeCount { pedigree: String },
    #[error("pedigree {pedigree}: has {found} genotypes per member, map has {expected} markers")]
    GenotypeCountVsMap {
        pedigree: String,
        found: usize,
        expected: usize,
    },
    #[error("pedigree {pedigree}: parent links contain a cycle")]
    Cycle { pedigree: String },
    #[error("pedigree {pedigree}: members are not all connected")]
    Disconnected { pedigree: String },
    #[error("pedigree file {path:?} contains no members")]
    EmptyFile { path: std::path::PathBuf },
}

/// One pedigree member. Parent links are indices into the owning pedigree's
/// member arena; founders have neither.
#[derive(Debug, Clone)]
pub struct Person {
    id: String,
    index: usize,
    maternal: Option<usize>,
    paternal: Option<usize>,
    children: Vec<usize>,
    mates: Vec<usize>,
    affection: Affection,
    genotypes: Vec<Genotype>,
}

impl Person {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn is_founder(&self) -> bool {
        self.maternal.is_none()
    }
    pub fn maternal_index(&self) -> Option<usize> {
        self.maternal
    }
    pub fn paternal_index(&self) -> Option<usize> {
        self.paternal
    }
    pub fn parent(&self, parentage: Parentage) -> Option<usize> {
        match parentage {
            Parentage::Maternal => self.maternal,
            Parentage::Paternal => self.paternal,
        }
    }
    pub fn children(&self) -> &[usize] {
        &self.children
    }
    pub fn mates(&self) -> &[usize] {
        &self.mates
    }
    pub fn affection(&self) -> Affection {
        self.affection
    }
    pub fn genotype(&self, locus: usize) -> Genotype {
        self.genotypes[locus]
    }
    pub fn num_genotypes(&self) -> usize {
        self.genotypes.len()
    }

    /// Propose the elimination step this person would perform given the
    /// current peeling state, or None when its couplings do not yet fit a
    /// single nuclear-family context.
    pub fn peel_operation(&self, ped: &Pedigree, state: &PeelingState) -> Option<PeelOperation> {
        if state.is_peeled(self.index) {
            return None;
        }

        let mut cutset: BTreeSet<usize> = BTreeSet::new();

        // own transmission factor; open until the first of the trio is peeled
        if let (Some(m), Some(f)) = (self.maternal, self.paternal) {
            if !state.is_peeled(m) && !state.is_peeled(f) {
                cutset.insert(m);
                cutset.insert(f);
            }
        }

        // children's transmission factors still open
        for &c in &self.children {
            if state.is_peeled(c) {
                continue;
            }
            if let Some(mate) = ped.other_parent(c, self.index) {
                if !state.is_peeled(mate) {
                    cutset.insert(c);
                    cutset.insert(mate);
                }
            }
        }

        // couplings through tables produced by earlier peels
        for live in state.live_cutsets_containing(self.index) {
            cutset.extend(live.iter().copied().filter(|&m| !state.is_peeled(m)));
        }
        cutset.remove(&self.index);

        let peel_type = self.classify_cutset(&cutset)?;
        Some(PeelOperation::new(
            self.index,
            cutset.into_iter().collect(),
            peel_type,
        ))
    }

    fn classify_cutset(&self, cutset: &BTreeSet<usize>) -> Option<PeelType> {
        if cutset.is_empty() {
            return Some(PeelType::Last);
        }
        if cutset
            .iter()
            .all(|&m| Some(m) == self.maternal || Some(m) == self.paternal)
        {
            return Some(PeelType::Child);
        }
        // otherwise everyone must belong to one nuclear family around self
        let mates: Vec<usize> = cutset
            .iter()
            .copied()
            .filter(|m| self.mates.contains(m))
            .collect();
        if mates.len() > 1 {
            return None;
        }
        let mate = mates.first().copied();
        let mut has_child = false;
        for &m in cutset.iter() {
            if Some(m) == mate {
                continue;
            }
            if self.children.contains(&m) {
                has_child = true;
                continue;
            }
            return None;
        }
        if has_child {
            Some(PeelType::Parent)
        } else {
            Some(PeelType::Partner)
        }
    }
}

/// A single family: an arena of persons with founders laid out first.
#[derive(Debug, Clone)]
pub struct Pedigree {
    id: String,
    members: Vec<Person>,
    num_founders: usize,
}

impl Pedigree {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn num_members(&self) -> usize {
        self.members.len()
    }
    pub fn num_founders(&self) -> usize {
        self.num_founders
    }
    pub fn num_nonfounders(&self) -> usize {
        self.members.len() - self.num_founders
    }
    pub fn member(&self, i: usize) -> &Person {
        &self.members[i]
    }
    pub fn members(&self) -> &[Person] {
        &self.members
    }

    /// The other parent of `child` besides `parent`, if `parent` is one of
    /// its parents.
    pub fn other_parent(&self, child: usize, parent: usize) -> Option<usize> {
        let c = &self.members[child];
        match (c.maternal, c.paternal) {
            (Some(m), Some(f)) if m == parent => Some(f),
            (Some(m), Some(f)) if f == parent => Some(m),
            _ => None,
        }
    }

    pub fn validate_against_map(&self, num_markers: usize) -> Result<()> {
        let found = self.members.first().map(|p| p.num_genotypes()).unwrap_or(0);
        if found != num_markers {
            return Err(Error::GenotypeCountVsMap {
                pedigree: self.id.clone(),
                found,
                expected: num_markers,
            });
        }
        Ok(())
    }

    /// Read a pre-LINKAGE style pedigree file: one member per line,
    /// tab-delimited `<family> <person> <father> <mother> <affection>
    /// <genotype>...` with "0" for a missing parent, affection coded
    /// 0/1/2 = unknown/unaffected/affected and genotypes coded
    /// 0/1/2/3 = untyped/AA/AB/BB. Returns one pedigree per family, in file
    /// order.
    pub fn from_ped_file(p: impl AsRef<Path>) -> Result<Vec<Pedigree>> {
        let mut record = csv::StringRecord::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .from_path(&p)?;

        let mut order: Vec<String> = Vec::new();
        let mut builders: HashMap<String, PedigreeBuilder> = HashMap::new();

        while reader.read_record(&mut record)? {
            if record.len() < 5 {
                return Err(Error::CsvNotEnoughColumns {
                    expect: 5,
                    actual: record.len(),
                });
            }
            let famid = record[0].to_owned();
            let id = record[1].to_owned();
            let father = record[2].to_owned();
            let mother = record[3].to_owned();
            let affection = Affection::from_code(record[4].parse::<u8>().unwrap_or(u8::MAX))
                .ok_or_else(|| Error::BadAffectionCode {
                    pedigree: famid.clone(),
                    person: id.clone(),
                    code: record[4].to_owned(),
                })?;
            let mut genotypes = Vec::with_capacity(record.len() - 5);
            for (i, field) in record.iter().skip(5).enumerate() {
                let g = Genotype::from_code(field.parse::<u8>().unwrap_or(u8::MAX)).ok_or_else(
                    || Error::BadGenotypeCode {
                        pedigree: famid.clone(),
                        person: id.clone(),
                        code: field.to_owned(),
                        index: i,
                    },
                )?;
                genotypes.push(g);
            }

            let builder = builders.entry(famid.clone()).or_insert_with(|| {
                order.push(famid.clone());
                PedigreeBuilder::new(&famid)
            });
            let father = (father != "0").then_some(father);
            let mother = (mother != "0").then_some(mother);
            builder.add_member(&id, mother, father, affection, genotypes)?;
        }

        if order.is_empty() {
            return Err(Error::EmptyFile {
                path: p.as_ref().to_owned(),
            });
        }

        order
            .into_iter()
            .map(|famid| {
                builders
                    .remove(&famid)
                    .expect("builder exists for recorded family id")
                    .finish()
            })
            .collect()
    }
}

struct RawMember {
    id: String,
    mother: Option<String>,
    father: Option<String>,
    affection: Affection,
    genotypes: Vec<Genotype>,
}

/// Assembles one pedigree: resolves string ids to arena indices, lays
/// founders out first and checks the structural invariants.
pub struct PedigreeBuilder {
    id: String,
    records: Vec<RawMember>,
}

impl PedigreeBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            records: Vec::new(),
        }
    }

    pub fn add_founder(
        &mut self,
        id: &str,
        affection: Affection,
        genotypes: Vec<Genotype>,
    ) -> Result<()> {
        self.add_member(id, None, None, affection, genotypes)
    }

    pub fn add_child(
        &mut self,
        id: &str,
        mother: &str,
        father: &str,
        affection: Affection,
        genotypes: Vec<Genotype>,
    ) -> Result<()> {
        self.add_member(
            id,
            Some(mother.to_owned()),
            Some(father.to_owned()),
            affection,
            genotypes,
        )
    }

    fn add_member(
        &mut self,
        id: &str,
        mother: Option<String>,
        father: Option<String>,
        affection: Affection,
        genotypes: Vec<Genotype>,
    ) -> Result<()> {
        if self.records.iter().any(|r| r.id == id) {
            return Err(Error::DuplicatePerson {
                pedigree: self.id.clone(),
                person: id.to_owned(),
            });
        }
        self.records.push(RawMember {
            id: id.to_owned(),
            mother,
            father,
            affection,
            genotypes,
        });
        Ok(())
    }

    pub fn finish(self) -> Result<Pedigree> {
        let pedid = self.id;

        // founders first, so the chain driver can round-robin non-founders
        // from a contiguous tail
        let (founders, nonfounders): (Vec<_>, Vec<_>) = self
            .records
            .into_iter()
            .partition(|r| r.mother.is_none() && r.father.is_none());
        let num_founders = founders.len();
        let ordered: Vec<RawMember> = founders.into_iter().chain(nonfounders).collect();

        let index_of: HashMap<String, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let genotype_count = ordered.first().map(|r| r.genotypes.len()).unwrap_or(0);
        let mut members = Vec::with_capacity(ordered.len());
        for (index, raw) in ordered.iter().enumerate() {
            if raw.genotypes.len() != genotype_count {
                return Err(Error::InconsistentGenotypeCount {
                    pedigree: pedid.clone(),
                });
            }
            let resolve = |name: &Option<String>| -> Result<Option<usize>> {
                match name {
                    None => Ok(None),
                    Some(n) => index_of.get(n).copied().map(Some).ok_or_else(|| {
                        Error::UnknownParent {
                            pedigree: pedid.clone(),
                            person: raw.id.clone(),
                            parent: n.clone(),
                        }
                    }),
                }
            };
            let maternal = resolve(&raw.mother)?;
            let paternal = resolve(&raw.father)?;
            if maternal.is_some() != paternal.is_some() {
                return Err(Error::OneParentMissing {
                    pedigree: pedid.clone(),
                    person: raw.id.clone(),
                });
            }
            members.push(Person {
                id: raw.id.clone(),
                index,
                maternal,
                paternal,
                children: Vec::new(),
                mates: Vec::new(),
                affection: raw.affection,
                genotypes: raw.genotypes.clone(),
            });
        }

        // child and mate caches
        for i in 0..members.len() {
            if let (Some(m), Some(f)) = (members[i].maternal, members[i].paternal) {
                members[m].children.push(i);
                members[f].children.push(i);
                if !members[m].mates.contains(&f) {
                    members[m].mates.push(f);
                }
                if !members[f].mates.contains(&m) {
                    members[f].mates.push(m);
                }
            }
        }

        let ped = Pedigree {
            id: pedid,
            members,
            num_founders,
        };
        ped.check_acyclic()?;
        ped.check_connected()?;
        Ok(ped)
    }
}

impl Pedigree {
    fn check_acyclic(&self) -> Result<()> {
        // walk parent links from every member; a cycle shows up as a revisit
        // on the current path
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }
        fn visit(ped: &Pedigree, i: usize, marks: &mut [Mark]) -> bool {
            match marks[i] {
                Mark::Black => return true,
                Mark::Grey => return false,
                Mark::White => {}
            }
            marks[i] = Mark::Grey;
            for parentage in crate::genotype::PARENTAGES {
                if let Some(p) = ped.members[i].parent(parentage) {
                    if !visit(ped, p, marks) {
                        return false;
                    }
                }
            }
            marks[i] = Mark::Black;
            true
        }
        let mut marks = vec![Mark::White; self.members.len()];
        for i in 0..self.members.len() {
            if !visit(self, i, &mut marks) {
                return Err(Error::Cycle {
                    pedigree: self.id.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_connected(&self) -> Result<()> {
        if self.members.is_empty() {
            return Ok(());
        }
        let mut seen = vec![false; self.members.len()];
        let mut stack = vec![0usize];
        seen[0] = true;
        while let Some(i) = stack.pop() {
            let p = &self.members[i];
            let neighbours = p
                .maternal
                .iter()
                .chain(p.paternal.iter())
                .chain(p.children.iter());
            for &n in neighbours {
                if !seen[n] {
                    seen[n] = true;
                    stack.push(n);
                }
            }
        }
        if seen.iter().all(|&s| s) {
            Ok(())
        } else {
            Err(Error::Disconnected {
                pedigree: self.id.clone(),
            })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotype::{Affection as Aff, Genotype as G};

    #[test]
    fn founders_come_first() {
        let ped = fixtures::three_generations();
        assert_eq!(ped.num_members(), 5);
        assert_eq!(ped.num_founders(), 3);
        for i in 0..ped.num_founders() {
            assert!(ped.member(i).is_founder());
        }
        for i in ped.num_founders()..ped.num_members() {
            assert!(!ped.member(i).is_founder());
        }
    }

    #[test]
    fn child_and_mate_caches() {
        let ped = fixtures::trio();
        let dad = ped.members().iter().find(|p| p.id() == "dad").unwrap();
        let mum = ped.members().iter().find(|p| p.id() == "mum").unwrap();
        let kid = ped.members().iter().find(|p| p.id() == "kid").unwrap();
        assert_eq!(dad.children(), &[kid.index()]);
        assert_eq!(mum.mates(), &[dad.index()]);
        assert_eq!(ped.other_parent(kid.index(), dad.index()), Some(mum.index()));
        assert_eq!(kid.maternal_index(), Some(mum.index()));
    }

    #[test]
    fn one_parent_is_rejected() {
        let mut b = PedigreeBuilder::new("bad");
        b.add_founder("a", Aff::Unknown, vec![G::AA]).unwrap();
        b.add_member("c", Some("a".into()), None, Aff::Unknown, vec![G::AA])
            .unwrap();
        assert!(matches!(b.finish(), Err(Error::OneParentMissing { .. })));
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut b = PedigreeBuilder::new("bad");
        b.add_child("c", "ghost", "phantom", Aff::Unknown, vec![G::AA])
            .unwrap();
        assert!(matches!(b.finish(), Err(Error::UnknownParent { .. })));
    }

    #[test]
    fn disconnected_family_is_rejected() {
        let mut b = PedigreeBuilder::new("bad");
        b.add_founder("a", Aff::Unknown, vec![G::AA]).unwrap();
        b.add_founder("b", Aff::Unknown, vec![G::AA]).unwrap();
        assert!(matches!(b.finish(), Err(Error::Disconnected { .. })));
    }

    #[test]
    fn parses_ped_file() {
        let peds = Pedigree::from_ped_file("testdata/trio.ped").unwrap();
        assert_eq!(peds.len(), 1);
        let ped = &peds[0];
        assert_eq!(ped.id(), "fam1");
        assert_eq!(ped.num_members(), 3);
        assert_eq!(ped.num_founders(), 2);
        let kid = ped.members().iter().find(|p| p.id() == "kid").unwrap();
        assert_eq!(kid.genotype(0), G::AB);
        assert_eq!(kid.affection(), Aff::Affected);
    }
}
