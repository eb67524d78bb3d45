use log::debug;
use std::collections::BTreeMap;

use crate::config::*;
use crate::ranking::rank;
use crate::tally::accumulate;

/// The key of the single nationwide group.
pub const NATIONWIDE_KEY: &str = "*";

/// The aggregation levels of an election.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum GroupingStrategy {
    /// Every ballot box on its own: `<municipality id>/<ballot id>`.
    Ballot,
    /// Ballot boxes sharing the part of their id before the first `.`, within a
    /// municipality: `<municipality id>/<ballot id prefix>`.
    BallotGroup,
    /// All the ballot boxes of a municipality: `<municipality id>`.
    Municipality,
    /// All the ballot boxes: `NATIONWIDE_KEY`.
    Nationwide,
}

impl GroupingStrategy {
    pub const ALL: [GroupingStrategy; 4] = [
        GroupingStrategy::Ballot,
        GroupingStrategy::BallotGroup,
        GroupingStrategy::Municipality,
        GroupingStrategy::Nationwide,
    ];

    /// The grouping key of a ballot. Never empty.
    pub fn key(&self, ballot: &BallotRecord) -> String {
        match self {
            GroupingStrategy::Ballot => ballot.id(),
            GroupingStrategy::BallotGroup => format!(
                "{}/{}",
                ballot.municipality_id,
                ballot_group_id(&ballot.ballot_id)
            ),
            GroupingStrategy::Municipality => ballot.municipality_id.clone(),
            GroupingStrategy::Nationwide => NATIONWIDE_KEY.to_string(),
        }
    }
}

/// The part of a ballot id before its first `.`, or the whole id if there is none.
///
/// Sub-ballots such as `1234.5` are grouped with their parent ballot `1234`.
pub fn ballot_group_id(ballot_id: &str) -> &str {
    match ballot_id.split_once('.') {
        Some((prefix, _)) => prefix,
        None => ballot_id,
    }
}

/// Partitions the ballots by key, then sums and ranks each partition.
///
/// The key function must be pure. All the partitions are completely summed before
/// any of them is ranked.
pub fn group_by<F>(records: &[BallotRecord], key_fn: F) -> BTreeMap<String, AggregateRecord>
where
    F: Fn(&BallotRecord) -> String,
{
    let mut partitions: BTreeMap<String, Vec<&VotingTotals>> = BTreeMap::new();
    for r in records.iter() {
        partitions.entry(key_fn(r)).or_default().push(&r.totals);
    }

    let sums: BTreeMap<String, VotingTotals> = partitions
        .into_iter()
        .map(|(key, members)| {
            debug!("group_by: group {:?}: {} ballots", key, members.len());
            (key, accumulate(members))
        })
        .collect();

    sums.into_iter()
        .map(|(group_key, totals)| {
            let ranked = rank(&totals.votes);
            (
                group_key.clone(),
                AggregateRecord {
                    group_key,
                    totals,
                    ranked,
                },
            )
        })
        .collect()
}

/// Groups the ballots with one of the standard aggregation levels.
pub fn group_by_strategy(
    records: &[BallotRecord],
    strategy: GroupingStrategy,
) -> BTreeMap<String, AggregateRecord> {
    group_by(records, |b| strategy.key(b))
}
