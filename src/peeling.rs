use crate::pedigree::Pedigree;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "pedigree {pedigree}: no peelable member found with {remaining} members left; \
         the pedigree cannot be evaluated"
    )]
    NoPeelableMember { pedigree: String, remaining: usize },
}

/// Which nuclear-family context a peel eliminates its pivot in. Determines
/// nothing about the numerics, but is kept for diagnostics and tests.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PeelType {
    /// pivot peeled up onto its parents
    Child,
    /// pivot peeled across onto its mate
    Partner,
    /// pivot peeled down onto a mate and children
    Parent,
    /// final member, empty cutset
    Last,
}

/// One elimination step: remove `pivot` by summing it out against the
/// members in `cutset` (sorted, never containing the pivot).
#[derive(Clone, Debug)]
pub struct PeelOperation {
    pivot: usize,
    cutset: Vec<usize>,
    peel_type: PeelType,
}

impl PeelOperation {
    pub fn new(pivot: usize, cutset: Vec<usize>, peel_type: PeelType) -> Self {
        debug_assert!(cutset.windows(2).all(|w| w[0] < w[1]));
        Self {
            pivot,
            cutset,
            peel_type,
        }
    }

    pub fn pivot(&self) -> usize {
        self.pivot
    }
    pub fn cutset(&self) -> &[usize] {
        &self.cutset
    }
    pub fn cutset_size(&self) -> usize {
        self.cutset.len()
    }
    pub fn peel_type(&self) -> PeelType {
        self.peel_type
    }
    pub fn in_cutset(&self, member: usize) -> bool {
        self.cutset.binary_search(&member).is_ok()
    }
}

struct LiveTable {
    cutset: Vec<usize>,
    consumed: bool,
}

/// Tracks which members have been eliminated and which intermediate tables
/// are still waiting to be consumed by a later peel.
pub struct PeelingState {
    peeled: Vec<bool>,
    live: Vec<LiveTable>,
}

impl PeelingState {
    pub fn new(num_members: usize) -> Self {
        Self {
            peeled: vec![false; num_members],
            live: Vec::new(),
        }
    }

    pub fn is_peeled(&self, member: usize) -> bool {
        self.peeled[member]
    }

    pub fn num_peeled(&self) -> usize {
        self.peeled.iter().filter(|&&p| p).count()
    }

    pub fn live_cutsets_containing(&self, member: usize) -> impl Iterator<Item = &[usize]> {
        self.live
            .iter()
            .filter(move |t| !t.consumed && t.cutset.contains(&member))
            .map(|t| t.cutset.as_slice())
    }

    /// Applies one peel: the pivot becomes peeled, every live table coupled
    /// to it is consumed, and the operation's own cutset becomes a new live
    /// table.
    pub fn toggle_peel_operation(&mut self, op: &PeelOperation) {
        self.peeled[op.pivot()] = true;
        for table in self.live.iter_mut() {
            if !table.consumed && table.cutset.contains(&op.pivot()) {
                table.consumed = true;
            }
        }
        if !op.cutset().is_empty() {
            self.live.push(LiveTable {
                cutset: op.cutset().to_vec(),
                consumed: false,
            });
        }
    }
}

/// Builds an elimination order greedily, always committing the cheapest
/// currently peelable member and preferring upward peels on ties.
pub struct PeelSequenceGenerator<'a> {
    ped: &'a Pedigree,
    state: PeelingState,
    order: Vec<PeelOperation>,
}

impl<'a> PeelSequenceGenerator<'a> {
    pub fn new(ped: &'a Pedigree) -> Self {
        Self {
            ped,
            state: PeelingState::new(ped.num_members()),
            order: Vec::new(),
        }
    }

    pub fn build_peel_order(&mut self) -> Result<()> {
        while self.state.num_peeled() < self.ped.num_members() {
            let mut proposals: Vec<PeelOperation> = self
                .ped
                .members()
                .iter()
                .filter_map(|p| p.peel_operation(self.ped, &self.state))
                .collect();
            if proposals.is_empty() {
                return Err(Error::NoPeelableMember {
                    pedigree: self.ped.id().to_owned(),
                    remaining: self.ped.num_members() - self.state.num_peeled(),
                });
            }
            proposals.sort_by_key(|op| (op.cutset_size(), op.pivot()));
            let min_size = proposals[0].cutset_size();
            let best = proposals
                .iter()
                .take_while(|op| op.cutset_size() == min_size)
                .find(|op| op.peel_type() == PeelType::Child)
                .unwrap_or(&proposals[0])
                .clone();
            self.state.toggle_peel_operation(&best);
            self.order.push(best);
        }
        Ok(())
    }

    pub fn peel_order(&self) -> &[PeelOperation] {
        &self.order
    }

    /// Cost proxy for the whole sequence: each operation enumerates
    /// 4^cutset_size cells.
    pub fn score_peel_sequence(&self) -> u64 {
        self.order
            .iter()
            .map(|op| 4u64.pow(op.cutset_size() as u32))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pedigree::fixtures;

    fn order_for(ped: &Pedigree) -> Vec<PeelOperation> {
        let mut gen = PeelSequenceGenerator::new(ped);
        gen.build_peel_order().unwrap();
        gen.peel_order().to_vec()
    }

    fn by_id(ped: &Pedigree, id: &str) -> usize {
        ped.members().iter().find(|p| p.id() == id).unwrap().index()
    }

    #[test]
    fn trio_peels_child_first() {
        let ped = fixtures::trio();
        let order = order_for(&ped);
        assert_eq!(order.len(), 3);

        let kid = by_id(&ped, "kid");
        assert_eq!(order[0].pivot(), kid);
        assert_eq!(order[0].peel_type(), PeelType::Child);
        assert_eq!(order[0].cutset_size(), 2);

        assert_eq!(order[1].peel_type(), PeelType::Partner);
        assert_eq!(order[1].cutset_size(), 1);
        assert_eq!(order[2].peel_type(), PeelType::Last);
        assert!(order[2].cutset().is_empty());
    }

    #[test]
    fn three_generations_peel_in_order() {
        let ped = fixtures::three_generations();
        let order = order_for(&ped);
        assert_eq!(order.len(), 5);

        // every member exactly once
        let mut pivots: Vec<usize> = order.iter().map(|op| op.pivot()).collect();
        pivots.sort_unstable();
        assert_eq!(pivots, vec![0, 1, 2, 3, 4]);

        // cutsets only ever reference unpeeled members
        let mut peeled = vec![false; ped.num_members()];
        for op in &order {
            for &m in op.cutset() {
                assert!(!peeled[m]);
            }
            peeled[op.pivot()] = true;
        }
        assert_eq!(order.last().unwrap().peel_type(), PeelType::Last);
    }

    #[test]
    fn peel_order_is_deterministic() {
        let ped = fixtures::three_generations();
        let a = order_for(&ped);
        let b = order_for(&ped);
        let pivots = |o: &[PeelOperation]| o.iter().map(|op| op.pivot()).collect::<Vec<_>>();
        assert_eq!(pivots(&a), pivots(&b));
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.cutset(), y.cutset());
            assert_eq!(x.peel_type(), y.peel_type());
        }
    }

    #[test]
    fn score_counts_table_cells() {
        let ped = fixtures::trio();
        let mut gen = PeelSequenceGenerator::new(&ped);
        gen.build_peel_order().unwrap();
        // 4^2 + 4^1 + 4^0
        assert_eq!(gen.score_peel_sequence(), 21);
    }
}
