use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::*;

/// Orders the parties of a tally from the most voted to the least voted.
///
/// Ties are broken by party code, in increasing byte order. Invalid counts are placed
/// after all the valid ones. The ranking is therefore a pure function of the tally.
pub fn rank(votes: &VoteTally) -> RankedVotes {
    let mut sorted: Vec<(&String, VoteCount)> = votes.iter().map(|(p, vc)| (p, *vc)).collect();
    sorted.sort_by(|(p1, vc1), (p2, vc2)| compare_counts(*vc1, *vc2).then_with(|| p1.cmp(p2)));

    let ordered_parties: Vec<String> = sorted.into_iter().map(|(p, _)| p.clone()).collect();
    let rank_of: HashMap<String, usize> = ordered_parties
        .iter()
        .enumerate()
        .map(|(idx, p)| (p.clone(), idx))
        .collect();
    RankedVotes {
        ordered_parties,
        rank_of,
    }
}

// Descending order on the valid counts, invalid counts last.
fn compare_counts(vc1: VoteCount, vc2: VoteCount) -> Ordering {
    match (vc1, vc2) {
        (VoteCount::Valid(a), VoteCount::Valid(b)) => b.cmp(&a),
        (VoteCount::Valid(_), VoteCount::Invalid) => Ordering::Less,
        (VoteCount::Invalid, VoteCount::Valid(_)) => Ordering::Greater,
        (VoteCount::Invalid, VoteCount::Invalid) => Ordering::Equal,
    }
}
