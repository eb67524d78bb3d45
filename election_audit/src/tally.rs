use crate::config::*;

/// Sums a collection of tallies into a single one.
///
/// Every counter is summed independently. For the votes, the result contains the union
/// of all the parties seen, a party missing from a record counting as zero for that
/// record. No validation is performed: negative and invalid counts flow through the
/// sums as they are.
///
/// An empty collection gives all-zero counters and no parties.
pub fn accumulate<'a, I>(records: I) -> VotingTotals
where
    I: IntoIterator<Item = &'a VotingTotals>,
{
    let mut res = VotingTotals::default();
    for r in records {
        res += r;
    }
    res
}
