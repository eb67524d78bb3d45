// ********* Input data structures ***********

use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::ops::{Add, AddAssign};

/// A number of votes, as read from an input row.
///
/// A cell that could not be parsed as an integer is kept as `Invalid` instead of
/// failing the ingestion. The invalid state is contagious in arithmetic, and every
/// comparison involving it is false. As a consequence, a ballot with unreadable
/// counts is silently excluded from the anomaly heuristic: this is a false-negative
/// risk that callers should be aware of.
///
/// Counts are signed so that negative inputs propagate through the sums unchanged.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VoteCount {
    Valid(i64),
    Invalid,
}

impl VoteCount {
    pub const EMPTY: VoteCount = VoteCount::Valid(0);

    /// Parses a cell the way the published spreadsheets were read historically: the
    /// optional sign and leading digits are used and the rest is ignored, so `"12abc"` is
    /// 12 and `"1.5"` is 1. A cell without leading digits, or a value beyond the `i64`
    /// range, yields `Invalid`.
    pub fn parse(s: &str) -> VoteCount {
        let s = s.trim();
        let unsigned = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
        let digits = unsigned
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(unsigned.len());
        if digits == 0 {
            return VoteCount::Invalid;
        }
        let sign_len = s.len() - unsigned.len();
        match s[..sign_len + digits].parse::<i64>() {
            Ok(x) => VoteCount::Valid(x),
            Err(_) => VoteCount::Invalid,
        }
    }

    pub fn value(&self) -> Option<i64> {
        match self {
            VoteCount::Valid(x) => Some(*x),
            VoteCount::Invalid => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VoteCount::Valid(_))
    }

    /// True only for a valid count equal to zero.
    pub fn is_zero(&self) -> bool {
        *self == VoteCount::EMPTY
    }

    /// Strict comparison `count > threshold`, false for an invalid count.
    pub fn exceeds(&self, threshold: i64) -> bool {
        match self {
            VoteCount::Valid(x) => *x > threshold,
            VoteCount::Invalid => false,
        }
    }
}

impl Default for VoteCount {
    fn default() -> Self {
        VoteCount::EMPTY
    }
}

impl From<i64> for VoteCount {
    fn from(x: i64) -> Self {
        VoteCount::Valid(x)
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        match (self, rhs) {
            // An overflow is as unusable as an unreadable cell.
            (VoteCount::Valid(a), VoteCount::Valid(b)) => {
                a.checked_add(b).map_or(VoteCount::Invalid, VoteCount::Valid)
            }
            _ => VoteCount::Invalid,
        }
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(VoteCount::EMPTY, |acc, vc| acc + vc)
    }
}

impl Display for VoteCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteCount::Valid(x) => write!(f, "{}", x),
            VoteCount::Invalid => write!(f, "invalid"),
        }
    }
}

/// The votes received by each party, keyed by party code.
///
/// The set of party codes is whatever the input declared; it is not known in advance.
/// Reading a party that is not present returns a count of zero.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VoteTally(BTreeMap<String, VoteCount>);

impl VoteTally {
    pub fn new() -> VoteTally {
        VoteTally(BTreeMap::new())
    }

    pub fn get_or_zero(&self, party: &str) -> VoteCount {
        self.0.get(party).cloned().unwrap_or(VoteCount::EMPTY)
    }

    /// Sets the count of a party, replacing any previous value.
    pub fn insert(&mut self, party: &str, count: VoteCount) {
        self.0.insert(party.to_string(), count);
    }

    /// Adds to the count of a party, starting from zero if the party is new.
    pub fn add(&mut self, party: &str, count: VoteCount) {
        *self
            .0
            .entry(party.to_string())
            .or_insert(VoteCount::EMPTY) += count;
    }

    pub fn contains(&self, party: &str) -> bool {
        self.0.contains_key(party)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The parties and their counts, in party code order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, VoteCount> {
        self.0.iter()
    }

    pub fn parties(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl<S: Into<String>> FromIterator<(S, VoteCount)> for VoteTally {
    fn from_iter<T: IntoIterator<Item = (S, VoteCount)>>(iter: T) -> Self {
        VoteTally(iter.into_iter().map(|(p, c)| (p.into(), c)).collect())
    }
}

/// The counters reported by a ballot box, or summed over a group of boxes.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VotingTotals {
    pub voters: VoteCount,
    pub total_votes: VoteCount,
    pub disqualified: VoteCount,
    pub valid_votes: VoteCount,
    pub votes: VoteTally,
}

impl AddAssign<&VotingTotals> for VotingTotals {
    fn add_assign(&mut self, rhs: &VotingTotals) {
        self.voters += rhs.voters;
        self.total_votes += rhs.total_votes;
        self.disqualified += rhs.disqualified;
        self.valid_votes += rhs.valid_votes;
        for (party, count) in rhs.votes.iter() {
            self.votes.add(party, *count);
        }
    }
}

/// One row of the input: the tally of a single ballot box.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotRecord {
    pub municipality_name: String,
    pub municipality_id: String,
    pub ballot_id: String,
    pub totals: VotingTotals,
    /// The ranking of the parties within this ballot box only.
    /// Empty until the ballot goes through `build_election_view`.
    pub ranked: RankedVotes,
}

impl BallotRecord {
    pub fn new(
        municipality_name: &str,
        municipality_id: &str,
        ballot_id: &str,
        totals: VotingTotals,
    ) -> BallotRecord {
        BallotRecord {
            municipality_name: municipality_name.to_string(),
            municipality_id: municipality_id.to_string(),
            ballot_id: ballot_id.to_string(),
            totals,
            ranked: RankedVotes::default(),
        }
    }

    /// The unique identifier of a ballot box: `<municipality id>/<ballot id>`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.municipality_id, self.ballot_id)
    }

    pub fn votes(&self) -> &VoteTally {
        &self.totals.votes
    }
}

// ******** Output data structures *********

/// The parties of a tally, from the most voted to the least voted.
///
/// Invariant: `rank_of(ordered_parties[i]) == Some(i)` for every position `i`.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RankedVotes {
    pub ordered_parties: Vec<String>,
    pub rank_of: HashMap<String, usize>,
}

impl RankedVotes {
    /// The zero-based rank of a party, if the party appears in the tally.
    pub fn rank_of(&self, party: &str) -> Option<usize> {
        self.rank_of.get(party).cloned()
    }

    /// The party at the given zero-based rank.
    pub fn party_at(&self, rank: usize) -> Option<&str> {
        self.ordered_parties.get(rank).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.ordered_parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_parties.is_empty()
    }
}

/// The sum of all the ballot boxes that share the same grouping key.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AggregateRecord {
    pub group_key: String,
    pub totals: VotingTotals,
    pub ranked: RankedVotes,
}

/// All the aggregation levels computed over one election.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionView {
    /// The input ballots, each annotated with its own ranking.
    pub ballots: Vec<BallotRecord>,
    pub by_ballot: BTreeMap<String, AggregateRecord>,
    pub by_ballot_group: BTreeMap<String, AggregateRecord>,
    pub by_municipality: BTreeMap<String, AggregateRecord>,
    /// The nationwide aggregate, keyed by `NATIONWIDE_KEY`.
    pub totals: AggregateRecord,
}

/// Header of the CSV report. The names and their order are relied upon by downstream
/// tools and must not change.
pub const REPORT_HEADER: [&str; 6] = [
    "Location",
    "Location ID",
    "Ballot ID",
    "Number of Votes",
    "Counted As",
    "Should Be",
];

/// A high-confidence case: votes counted for a party that most likely belong to
/// another one.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportRow {
    pub municipality_name: String,
    pub municipality_id: String,
    pub ballot_id: String,
    pub votes: i64,
    pub counted_as: String,
    pub should_be: String,
}

impl ReportRow {
    /// The fields in the order of `REPORT_HEADER`.
    pub fn fields(&self) -> [String; 6] {
        [
            self.municipality_name.clone(),
            self.municipality_id.clone(),
            self.ballot_id.clone(),
            self.votes.to_string(),
            self.counted_as.clone(),
            self.should_be.clone(),
        ]
    }
}

/// A human-readable notice for every anomaly candidate, including the ones that did
/// not make it to the report.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Diagnostic {
    /// A party does much better locally than nationally, but no nationally strong
    /// party is missing from this ballot box.
    OverPerformance {
        ballot: String,
        municipality_name: String,
        party: String,
        /// 1-based position of the party in the ballot box.
        local_position: usize,
        votes: i64,
        /// 0-based rank of the party nationwide.
        national_rank: usize,
    },
    /// A party does much better locally than nationally, and some of the nationally
    /// strongest parties received no votes at all in this ballot box.
    Substitution {
        ballot: String,
        municipality_name: String,
        party: String,
        votes: i64,
        candidates: Vec<String>,
    },
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::OverPerformance {
                ballot,
                municipality_name,
                party,
                local_position,
                votes,
                national_rank,
            } => write!(
                f,
                "Ballot {} ({}): {} is in position {} ({} votes) but nationally at position {}",
                ballot, municipality_name, party, local_position, votes, national_rank
            ),
            Diagnostic::Substitution {
                ballot,
                municipality_name,
                party,
                votes,
                candidates,
            } => write!(
                f,
                "Ballot {} ({}): votes potentially recorded to {} ({} votes) instead of {} (with 0 votes)",
                ballot,
                municipality_name,
                party,
                votes,
                candidates.join(",")
            ),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct DetectionResult {
    pub report_rows: Vec<ReportRow>,
    pub diagnostics: Vec<Diagnostic>,
    /// Votes of the flagged parties, summed per party.
    pub loss_by_party: BTreeMap<String, i64>,
    /// Votes of the flagged parties, summed per substitution candidate.
    pub gain_by_party: BTreeMap<String, i64>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AuditOutcome {
    pub view: ElectionView,
    pub detection: DetectionResult,
}

// ********* Configuration **********

/// The thresholds of the detection heuristic.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct DetectionRules {
    /// How many of the locally strongest parties are examined in each ballot box.
    pub top_n: usize,
    /// A party at local position `i` is suspicious when its national rank is strictly
    /// greater than `national_rank_threshold_base + i`.
    pub national_rank_threshold_base: usize,
    /// How many of the nationally strongest parties are checked for a zero count.
    pub zero_scan_depth: usize,
    /// The local count must be strictly greater than this to be an anomaly candidate.
    pub min_votes_to_flag: i64,
    /// The local count must be strictly greater than this to be reported.
    pub min_votes_to_report: i64,
}

impl DetectionRules {
    pub const DEFAULT_RULES: DetectionRules = DetectionRules {
        top_n: 3,
        national_rank_threshold_base: 12,
        zero_scan_depth: 4,
        min_votes_to_flag: 2,
        min_votes_to_report: 10,
    };
}

impl Default for DetectionRules {
    fn default() -> Self {
        DetectionRules::DEFAULT_RULES
    }
}
