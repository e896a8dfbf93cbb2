use super::{Election, Placement, Tally, UNRANKED};

/// Instant runoff with ranked tie-breaking.
///
/// Candidates with no first-choice votes are dropped up front. Each round then
/// eliminates the candidate with the fewest first choices, breaking ties by
/// fewest second choices, then third, and so on. A tie that survives every
/// rank is resolved by eliminating the whole group when enough candidates
/// remain, or otherwise reported as a tied final placement.
///
/// When a candidate is eliminated, each ballot that ranked them first promotes
/// its next-best candidate to 1. With `reorder` every ballot is additionally
/// renumbered to consecutive ranks, so later tie-breaks compare like with like.
pub(super) fn count(election: &Election, num_winners: usize, reorder: bool) -> Tally {
    let mut round = Round {
        names: election.candidates.clone(),
        ballots: election
            .ballots
            .iter()
            .map(|ballot| ballot.ranks.clone())
            .collect(),
        max_rank: election.candidates.len(),
        reorder,
        eliminated: Vec::new(),
    };
    round.drop_without_first_choices(num_winners);

    let mut tie = false;
    while round.names.len() > num_winners {
        let tied = round.lowest();
        if let [loser] = tied.as_slice() {
            round.eliminate(*loser);
            continue;
        }

        tie = true;
        let tied_names: Vec<String> = tied.iter().map(|&i| round.names[i].clone()).collect();
        if round.names.len() - tied.len() >= num_winners {
            tracing::warn!(tied = ?tied_names, "unbreakable tie for last; eliminating all");
            for name in &tied_names {
                if let Some(index) = round.names.iter().position(|n| n == name) {
                    round.eliminate(index);
                }
            }
            continue;
        }

        tracing::warn!(tied = ?tied_names, "unbreakable tie for the final places");
        let mut placements = round.standings(|name| !tied_names.contains(name));
        placements.push(Placement::Tie(tied_names));
        return Tally {
            placements,
            tie,
            eliminated: round.eliminated,
        };
    }

    Tally {
        placements: round.standings(|_| true),
        tie,
        eliminated: round.eliminated,
    }
}

struct Round {
    names: Vec<String>,
    ballots: Vec<Vec<i32>>,
    max_rank: usize,
    reorder: bool,
    eliminated: Vec<String>,
}

impl Round {
    fn votes_at(&self, rank: i32, candidate: usize) -> usize {
        self.ballots
            .iter()
            .filter(|ranks| ranks[candidate] == rank)
            .count()
    }

    fn drop_without_first_choices(&mut self, num_winners: usize) {
        let mut index = 0;
        while index < self.names.len() && self.names.len() > num_winners {
            if self.votes_at(1, index) == 0 {
                tracing::info!(candidate = %self.names[index], "dropped: no first-choice votes");
                self.eliminate(index);
            } else {
                index += 1;
            }
        }
    }

    /// Indices still tied for last after comparing counts at every rank.
    fn lowest(&self) -> Vec<usize> {
        let mut tied: Vec<usize> = (0..self.names.len()).collect();
        for rank in 1..=self.max_rank {
            let rank = i32::try_from(rank).unwrap_or(i32::MAX);
            let counts: Vec<usize> = tied.iter().map(|&i| self.votes_at(rank, i)).collect();
            let fewest = counts.iter().copied().min().unwrap_or(0);
            tied = tied
                .into_iter()
                .zip(counts)
                .filter(|&(_, count)| count == fewest)
                .map(|(i, _)| i)
                .collect();
            if tied.len() == 1 {
                break;
            }
        }
        tied
    }

    fn eliminate(&mut self, candidate: usize) {
        for ranks in &mut self.ballots {
            if ranks[candidate] == 1 {
                let next = ranks
                    .iter()
                    .copied()
                    .filter(|&rank| rank > 1)
                    .min();
                if let Some(slot) = next.and_then(|next| ranks.iter().position(|&r| r == next)) {
                    ranks[slot] = 1;
                }
            }
            ranks.remove(candidate);
        }
        let name = self.names.remove(candidate);
        tracing::info!(candidate = %name, remaining = self.names.len(), "eliminated");
        self.eliminated.push(name);

        if self.reorder {
            self.max_rank = self.max_rank.saturating_sub(1);
            for ranks in &mut self.ballots {
                renumber(ranks);
            }
        }
    }

    /// Remaining candidates by first-choice votes, most first.
    fn standings(&self, include: impl Fn(&String) -> bool) -> Vec<Placement> {
        let mut order: Vec<(usize, usize)> = (0..self.names.len())
            .filter(|&i| include(&self.names[i]))
            .map(|i| (self.votes_at(1, i), i))
            .collect();
        order.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        order
            .into_iter()
            .map(|(_, i)| Placement::Single(self.names[i].clone()))
            .collect()
    }
}

/// Renumber ranked entries to 1..k keeping their order; unranked stay unranked.
pub(super) fn renumber(ranks: &mut [i32]) {
    let mut ranked: Vec<usize> = (0..ranks.len())
        .filter(|&i| ranks[i] != UNRANKED)
        .collect();
    ranked.sort_by_key(|&i| (ranks[i], i));
    for (position, index) in ranked.into_iter().enumerate() {
        ranks[index] = i32::try_from(position + 1).unwrap_or(i32::MAX);
    }
}
