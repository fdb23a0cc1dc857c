use super::CatalogError;
use crate::domain::{Decimal, Rank};
use rand::seq::SliceRandom;
use rand::Rng;

/// Validated rank catalog ordered by position ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankLadder {
    ranks: Vec<Rank>,
}

impl RankLadder {
    pub fn new(mut ranks: Vec<Rank>) -> Result<Self, CatalogError> {
        if ranks.is_empty() {
            return Err(CatalogError::Empty("rank"));
        }
        ranks.sort_by_key(|r| r.position);

        let mut by_min: Vec<&Rank> = ranks.iter().collect();
        by_min.sort_by(|a, b| a.min_sales.cmp(&b.min_sales));
        for rank in &by_min {
            if rank.min_sales > rank.max_sales {
                return Err(CatalogError::InvalidBand(rank.name.clone()));
            }
        }
        for pair in by_min.windows(2) {
            if pair[0].max_sales >= pair[1].min_sales {
                return Err(CatalogError::Overlap(
                    pair[0].name.clone(),
                    pair[1].name.clone(),
                ));
            }
        }

        Ok(Self { ranks })
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn lowest(&self) -> &Rank {
        &self.ranks[0]
    }

    pub fn by_name(&self, name: &str) -> Option<&Rank> {
        self.ranks.iter().find(|r| r.name == name)
    }

    /// The rank whose inclusive band holds `sales`. A gap in the bands is a
    /// misconfiguration.
    pub fn matching(&self, sales: Decimal) -> Result<&Rank, CatalogError> {
        self.ranks
            .iter()
            .find(|r| r.contains(sales))
            .ok_or_else(|| CatalogError::NoMatchingRank(sales.to_money_string()))
    }

    /// Promotion is decided by position, not by band. An unknown old rank
    /// (e.g. renamed since) counts as below every rank.
    pub fn is_rank_up(&self, old: &str, new: &Rank) -> bool {
        match self.by_name(old) {
            Some(previous) => new.position > previous.position,
            None => true,
        }
    }

    pub fn is_lowest(&self, rank: &Rank) -> bool {
        rank.position == self.lowest().position
    }
}

/// Pick a reward uniformly from the non-zero entries of the pool.
pub fn pick_reward<R: Rng + ?Sized>(rank: &Rank, rng: &mut R) -> Option<Decimal> {
    let candidates: Vec<Decimal> = rank
        .reward_pool
        .iter()
        .copied()
        .filter(|v| !v.is_zero())
        .collect();
    candidates.choose(rng).copied()
}
