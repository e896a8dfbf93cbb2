use super::{take_placements, Election, Placement, Tally, UNRANKED};

/// `d[i][j]`: voters ranking candidate `i` above `j`. Unranked candidates
/// take part in no pairwise comparison.
pub(super) fn pairwise_preferences(election: &Election) -> Vec<Vec<u32>> {
    let n = election.candidates.len();
    let mut d = vec![vec![0; n]; n];
    for ballot in &election.ballots {
        for (i, &rank_i) in ballot.ranks.iter().enumerate() {
            for (j, &rank_j) in ballot.ranks.iter().enumerate() {
                if i != j && rank_i != UNRANKED && rank_j != UNRANKED && rank_i < rank_j {
                    d[i][j] += 1;
                }
            }
        }
    }
    d
}

/// `p[i][j]`: strength of the strongest path from `i` to `j` (Floyd-Warshall
/// over the widest-path semiring).
pub(super) fn strongest_paths(d: &[Vec<u32>]) -> Vec<Vec<u32>> {
    let n = d.len();
    let mut p = vec![vec![0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j && d[i][j] > d[j][i] {
                p[i][j] = d[i][j];
            }
        }
    }
    for via in 0..n {
        for from in 0..n {
            if from == via {
                continue;
            }
            for to in 0..n {
                if to != via && to != from {
                    p[from][to] = p[from][to].max(p[from][via].min(p[via][to]));
                }
            }
        }
    }
    p
}

/// Candidates ordered by how many rivals they beat on path strength; equal
/// counts share a placement.
pub(super) fn count(election: &Election, num_winners: usize) -> Tally {
    let d = pairwise_preferences(election);
    let p = strongest_paths(&d);
    let n = election.candidates.len();

    let mut wins: Vec<(usize, usize)> = (0..n)
        .map(|i| {
            let beaten = (0..n).filter(|&j| j != i && p[i][j] > p[j][i]).count();
            (beaten, i)
        })
        .collect();
    wins.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    tracing::debug!(?wins, "schulze path wins");

    let mut groups: Vec<Placement> = Vec::new();
    let mut start = 0;
    while start < wins.len() {
        let score = wins[start].0;
        let end = wins[start..]
            .iter()
            .position(|(beaten, _)| *beaten != score)
            .map_or(wins.len(), |offset| start + offset);
        let mut names: Vec<String> = wins[start..end]
            .iter()
            .map(|&(_, i)| election.candidates[i].clone())
            .collect();
        groups.push(if names.len() == 1 {
            Placement::Single(names.remove(0))
        } else {
            Placement::Tie(names)
        });
        start = end;
    }

    let placements = take_placements(groups, num_winners);
    let tie = placements
        .iter()
        .any(|placement| matches!(placement, Placement::Tie(_)));
    Tally {
        placements,
        tie,
        eliminated: Vec::new(),
    }
}
