mod config;
pub mod grouping;
pub mod manual;
pub mod ranking;
pub mod tally;

use log::{debug, info};
use std::collections::BTreeMap;

pub use crate::config::*;
pub use crate::grouping::{GroupingStrategy, NATIONWIDE_KEY};

/// Computes all the aggregation levels of an election.
///
/// Every ballot is also ranked on its own votes, so that the detector can compare
/// the local order of the parties with the nationwide one.
pub fn build_election_view(records: Vec<BallotRecord>) -> ElectionView {
    info!("build_election_view: Processing {} ballots", records.len());

    let by_ballot = grouping::group_by_strategy(&records, GroupingStrategy::Ballot);
    let by_ballot_group = grouping::group_by_strategy(&records, GroupingStrategy::BallotGroup);
    let by_municipality = grouping::group_by_strategy(&records, GroupingStrategy::Municipality);
    let mut nationwide = grouping::group_by_strategy(&records, GroupingStrategy::Nationwide);
    let totals = nationwide
        .remove(NATIONWIDE_KEY)
        .unwrap_or_else(|| AggregateRecord {
            group_key: NATIONWIDE_KEY.to_string(),
            totals: VotingTotals::default(),
            ranked: RankedVotes::default(),
        });
    info!(
        "build_election_view: {} ballot boxes, {} ballot groups, {} municipalities, {} parties",
        by_ballot.len(),
        by_ballot_group.len(),
        by_municipality.len(),
        totals.ranked.len()
    );
    debug!(
        "build_election_view: nationwide order: {:?}",
        totals.ranked.ordered_parties
    );

    let ballots: Vec<BallotRecord> = records
        .into_iter()
        .map(|mut b| {
            b.ranked = ranking::rank(&b.totals.votes);
            b
        })
        .collect();

    ElectionView {
        ballots,
        by_ballot,
        by_ballot_group,
        by_municipality,
        totals,
    }
}

/// Looks for ballot boxes where votes may have been recorded under the wrong party.
///
/// For each of the `top_n` locally strongest parties of a ballot box, the party is an
/// anomaly candidate when it ranks much lower nationwide than locally, and it got more
/// than `min_votes_to_flag` votes. The nationally strongest parties that received no
/// vote at all in the box are then the likely destinations of these votes. A report
/// row is produced only when there is exactly one such destination and the count is
/// above `min_votes_to_report`. Every candidate produces a diagnostic.
///
/// Invalid counts never compare: ballots with unreadable counts are skipped, and so
/// are the parties whose nationwide total is invalid.
pub fn detect_suspicious_ballots(view: &ElectionView, rules: &DetectionRules) -> DetectionResult {
    let national = &view.totals.ranked;
    let national_totals = &view.totals.totals.votes;
    let mut res = DetectionResult::default();

    for b in view.ballots.iter() {
        for local_rank in 0..rules.top_n {
            let party = match b.ranked.party_at(local_rank) {
                Some(p) => p,
                None => break,
            };
            // An invalid nationwide total has no meaningful rank.
            let national_rank = match national.rank_of(party) {
                Some(r) if national_totals.get_or_zero(party).is_valid() => r,
                _ => continue,
            };
            let vote_count = b.votes().get_or_zero(party);
            if national_rank <= rules.national_rank_threshold_base.saturating_add(local_rank)
                || !vote_count.exceeds(rules.min_votes_to_flag)
            {
                continue;
            }
            // Checked by exceeds() above.
            let votes = match vote_count.value() {
                Some(x) => x,
                None => continue,
            };
            debug!(
                "detect_suspicious_ballots: ballot {}: party {} at local rank {} with {} votes, national rank {}",
                b.id(),
                party,
                local_rank,
                votes,
                national_rank
            );

            // Nationally strong parties that got nothing here.
            let candidates: Vec<String> = national
                .ordered_parties
                .iter()
                .take(rules.zero_scan_depth)
                .filter(|p| national_totals.get_or_zero(p).is_valid())
                .filter(|p| b.votes().get_or_zero(p).is_zero())
                .cloned()
                .collect();

            if candidates.is_empty() {
                res.diagnostics.push(Diagnostic::OverPerformance {
                    ballot: b.id(),
                    municipality_name: b.municipality_name.clone(),
                    party: party.to_string(),
                    local_position: local_rank + 1,
                    votes,
                    national_rank,
                });
            } else {
                if candidates.len() == 1 && vote_count.exceeds(rules.min_votes_to_report) {
                    res.report_rows.push(ReportRow {
                        municipality_name: b.municipality_name.clone(),
                        municipality_id: b.municipality_id.clone(),
                        ballot_id: b.ballot_id.clone(),
                        votes,
                        counted_as: party.to_string(),
                        should_be: candidates[0].clone(),
                    });
                }
                res.diagnostics.push(Diagnostic::Substitution {
                    ballot: b.id(),
                    municipality_name: b.municipality_name.clone(),
                    party: party.to_string(),
                    votes,
                    candidates: candidates.clone(),
                });
            }

            let loss = res.loss_by_party.entry(party.to_string()).or_insert(0);
            *loss = loss.saturating_add(votes);
            for c in candidates {
                let gain = res.gain_by_party.entry(c).or_insert(0);
                *gain = gain.saturating_add(votes);
            }
        }
    }

    info!(
        "detect_suspicious_ballots: {} ballots examined, {} anomaly candidates, {} reported",
        view.ballots.len(),
        res.diagnostics.len(),
        res.report_rows.len()
    );
    res
}

/// Builds the election view and runs the detector on it.
pub fn run_audit(records: Vec<BallotRecord>, rules: &DetectionRules) -> AuditOutcome {
    let view = build_election_view(records);
    let detection = detect_suspicious_ballots(&view, rules);
    AuditOutcome { view, detection }
}

/// Sums the votes of each party over a collection of aggregates.
pub fn sum_aggregates<'a, I>(aggregates: I) -> BTreeMap<String, VoteCount>
where
    I: IntoIterator<Item = &'a AggregateRecord>,
{
    let mut res: BTreeMap<String, VoteCount> = BTreeMap::new();
    for agg in aggregates {
        for (party, count) in agg.totals.votes.iter() {
            *res.entry(party.clone()).or_insert(VoteCount::EMPTY) += *count;
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn ballot(name: &str, mid: &str, bid: &str, votes: &[(&str, i64)]) -> BallotRecord {
        let tally: VoteTally = votes
            .iter()
            .map(|(p, c)| (*p, VoteCount::Valid(*c)))
            .collect();
        let valid: VoteCount = tally.iter().map(|(_, c)| *c).sum();
        let totals = VotingTotals {
            voters: valid + VoteCount::Valid(10),
            total_votes: valid,
            disqualified: VoteCount::EMPTY,
            valid_votes: valid,
            votes: tally,
        };
        BallotRecord::new(name, mid, bid, totals)
    }

    fn party_codes() -> Vec<String> {
        // P00 .. P24, P00 being the strongest nationally.
        (0..25).map(|i| format!("P{:02}", i)).collect()
    }

    /// A background of ballots that fixes the nationwide order P00 > P01 > ... > P24,
    /// with every party present in every ballot box.
    fn background() -> Vec<BallotRecord> {
        let parties = party_codes();
        (0..4)
            .map(|i| {
                let votes: Vec<(&str, i64)> = parties
                    .iter()
                    .enumerate()
                    .map(|(idx, p)| (p.as_str(), 1000 - 10 * idx as i64))
                    .collect();
                ballot("Big City", "99", &format!("{}", i + 1), &votes)
            })
            .collect()
    }

    /// A ballot in which party P20 (national rank 20) leads with the given count,
    /// and the given strong parties received no vote.
    fn suspicious_ballot(lead_votes: i64, missing: &[&str]) -> BallotRecord {
        let parties = party_codes();
        let votes: Vec<(&str, i64)> = parties
            .iter()
            .map(|p| {
                let count = if p == "P20" {
                    lead_votes
                } else if missing.contains(&p.as_str()) {
                    0
                } else {
                    1
                };
                (p.as_str(), count)
            })
            .collect();
        ballot("M1", "10", "3", &votes)
    }

    #[test]
    fn view_has_all_levels() {
        init();
        let records = vec![
            ballot("North", "1", "1", &[("A", 5), ("B", 1)]),
            ballot("North", "1", "1.1", &[("A", 1), ("B", 2)]),
            ballot("North", "1", "2", &[("C", 4)]),
            ballot("South", "2", "1", &[("B", 7), ("C", 1)]),
        ];
        let view = build_election_view(records);
        assert_eq!(view.ballots.len(), 4);
        assert_eq!(view.by_ballot.len(), 4);
        assert_eq!(view.by_ballot_group.len(), 3);
        assert_eq!(view.by_municipality.len(), 2);
        assert_eq!(view.totals.group_key, NATIONWIDE_KEY);
        assert_eq!(view.totals.totals.votes.get_or_zero("B"), VoteCount::Valid(10));
        assert_eq!(view.totals.ranked.ordered_parties, vec!["B", "A", "C"]);

        // Each ballot carries the ranking of its own votes.
        assert_eq!(view.ballots[1].ranked.ordered_parties, vec!["B", "A"]);
        assert_eq!(view.ballots[2].ranked.ordered_parties, vec!["C"]);
    }

    #[test]
    fn nationwide_matches_municipalities() {
        let records = vec![
            ballot("North", "1", "1", &[("A", 5), ("B", 1)]),
            ballot("North", "1", "2", &[("C", 4)]),
            ballot("South", "2", "1", &[("B", 7), ("D", 1)]),
        ];
        let view = build_election_view(records);
        let from_municipalities = sum_aggregates(view.by_municipality.values());
        let nationwide: BTreeMap<String, VoteCount> = view
            .totals
            .totals
            .votes
            .iter()
            .map(|(p, c)| (p.clone(), *c))
            .collect();
        assert_eq!(from_municipalities, nationwide);
        assert_eq!(sum_aggregates(view.by_ballot_group.values()), nationwide);
    }

    #[test]
    fn empty_election() {
        let view = build_election_view(Vec::new());
        assert!(view.ballots.is_empty());
        assert_eq!(view.totals.group_key, NATIONWIDE_KEY);
        assert!(view.totals.ranked.is_empty());
        let res = detect_suspicious_ballots(&view, &DetectionRules::DEFAULT_RULES);
        assert_eq!(res, DetectionResult::default());
    }

    #[test]
    fn reports_single_substitution() {
        init();
        let mut records = background();
        records.push(suspicious_ballot(15, &["P01"]));
        let view = build_election_view(records);
        assert_eq!(view.totals.ranked.rank_of("P20"), Some(20));

        let res = detect_suspicious_ballots(&view, &DetectionRules::default());
        assert_eq!(
            res.report_rows,
            vec![ReportRow {
                municipality_name: "M1".to_string(),
                municipality_id: "10".to_string(),
                ballot_id: "3".to_string(),
                votes: 15,
                counted_as: "P20".to_string(),
                should_be: "P01".to_string(),
            }]
        );
        assert_eq!(res.diagnostics.len(), 1);
        assert_eq!(
            res.diagnostics[0].to_string(),
            "Ballot 10/3 (M1): votes potentially recorded to P20 (15 votes) instead of P01 (with 0 votes)"
        );
        assert_eq!(res.loss_by_party.get("P20"), Some(&15));
        assert_eq!(res.gain_by_party.get("P01"), Some(&15));
        assert_eq!(res.gain_by_party.len(), 1);
    }

    #[test]
    fn two_candidates_are_not_reported() {
        let mut records = background();
        records.push(suspicious_ballot(15, &["P00", "P03"]));
        let view = build_election_view(records);
        let res = detect_suspicious_ballots(&view, &DetectionRules::default());
        assert!(res.report_rows.is_empty());
        assert_eq!(
            res.diagnostics,
            vec![Diagnostic::Substitution {
                ballot: "10/3".to_string(),
                municipality_name: "M1".to_string(),
                party: "P20".to_string(),
                votes: 15,
                candidates: vec!["P00".to_string(), "P03".to_string()],
            }]
        );
        assert_eq!(res.gain_by_party.get("P00"), Some(&15));
        assert_eq!(res.gain_by_party.get("P03"), Some(&15));
    }

    #[test]
    fn missing_strong_party_beyond_scan_depth_is_ignored() {
        let mut records = background();
        // P04 is the fifth party nationally, outside of the default scan depth.
        records.push(suspicious_ballot(15, &["P04"]));
        let view = build_election_view(records);
        let res = detect_suspicious_ballots(&view, &DetectionRules::default());
        assert!(res.report_rows.is_empty());
        assert_eq!(
            res.diagnostics,
            vec![Diagnostic::OverPerformance {
                ballot: "10/3".to_string(),
                municipality_name: "M1".to_string(),
                party: "P20".to_string(),
                local_position: 1,
                votes: 15,
                national_rank: 20,
            }]
        );
        assert_eq!(
            res.diagnostics[0].to_string(),
            "Ballot 10/3 (M1): P20 is in position 1 (15 votes) but nationally at position 20"
        );
        assert_eq!(res.loss_by_party.get("P20"), Some(&15));
        assert!(res.gain_by_party.is_empty());
    }

    #[test]
    fn flag_threshold_is_strict() {
        for (lead, flagged) in [(2, false), (3, true)] {
            let mut records = background();
            records.push(suspicious_ballot(lead, &["P01"]));
            let view = build_election_view(records);
            let res = detect_suspicious_ballots(&view, &DetectionRules::default());
            assert_eq!(res.diagnostics.len(), flagged as usize, "lead votes {}", lead);
            // Flagged, but far below the report threshold.
            assert!(res.report_rows.is_empty());
        }
    }

    #[test]
    fn report_threshold_is_strict() {
        for (lead, reported) in [(10, false), (11, true)] {
            let mut records = background();
            records.push(suspicious_ballot(lead, &["P01"]));
            let view = build_election_view(records);
            let res = detect_suspicious_ballots(&view, &DetectionRules::default());
            assert_eq!(res.diagnostics.len(), 1);
            assert_eq!(res.report_rows.len(), reported as usize, "lead votes {}", lead);
        }
    }

    #[test]
    fn rank_threshold_grows_with_local_position() {
        // With base 19, the leading party (rank 20 > 19 + 0) is flagged.
        // With base 20, it is not (20 > 20 + 0 is false).
        let mut records = background();
        records.push(suspicious_ballot(15, &["P01"]));
        let view = build_election_view(records);
        let mut rules = DetectionRules::default();
        rules.national_rank_threshold_base = 19;
        assert_eq!(detect_suspicious_ballots(&view, &rules).diagnostics.len(), 1);
        rules.national_rank_threshold_base = 20;
        assert!(detect_suspicious_ballots(&view, &rules).diagnostics.is_empty());
    }

    #[test]
    fn invalid_counts_are_never_flagged() {
        let mut records = background();
        let mut b = suspicious_ballot(15, &["P01"]);
        b.totals.votes.insert("P20", VoteCount::Invalid);
        // Give P21 a large count so that it leads the ballot box instead.
        b.totals.votes.insert("P21", VoteCount::Valid(40));
        records.push(b);
        let view = build_election_view(records);
        let res = detect_suspicious_ballots(&view, &DetectionRules::default());
        // The invalid count propagates to the nationwide tally and P20 drops last.
        assert_eq!(view.totals.ranked.party_at(24), Some("P20"));
        assert_eq!(res.report_rows.len(), 1);
        assert_eq!(res.report_rows[0].counted_as, "P21");
        assert!(res
            .diagnostics
            .iter()
            .all(|d| !d.to_string().contains("P20 ")));
    }

    #[test]
    fn invalid_nationwide_total_flags_nothing() {
        init();
        let mut records: Vec<BallotRecord> = background().into_iter().take(3).collect();
        let mut b = background().remove(0);
        b.municipality_name = "Elsewhere".to_string();
        b.municipality_id = "11".to_string();
        b.totals.votes.insert("P00", VoteCount::Invalid);
        records.push(b);
        let view = build_election_view(records);
        assert_eq!(
            view.totals.totals.votes.get_or_zero("P00"),
            VoteCount::Invalid
        );
        assert_eq!(view.totals.ranked.rank_of("P00"), Some(24));

        let res = detect_suspicious_ballots(&view, &DetectionRules::default());
        assert!(res.diagnostics.is_empty(), "{:?}", res.diagnostics);
        assert!(res.report_rows.is_empty());
        assert!(res.loss_by_party.is_empty());
    }

    #[test]
    fn invalid_nationwide_total_is_not_a_destination() {
        let mut records = background();
        let mut b = background().remove(0);
        b.municipality_id = "11".to_string();
        b.totals.votes.insert("P01", VoteCount::Invalid);
        records.push(b);
        // P01 and P03 got nothing here, but the nationwide total of P01 is unusable.
        records.push(suspicious_ballot(15, &["P01", "P03"]));
        let view = build_election_view(records);
        // Deep enough to reach P01, ranked last nationwide.
        let rules = DetectionRules {
            zero_scan_depth: 25,
            ..DetectionRules::default()
        };
        let res = detect_suspicious_ballots(&view, &rules);
        assert_eq!(res.report_rows.len(), 1);
        assert_eq!(res.report_rows[0].should_be, "P03");
        assert!(!res.gain_by_party.contains_key("P01"));
    }

    #[test]
    fn huge_counts_do_not_panic() {
        let records = vec![
            ballot("North", "1", "1", &[("A", i64::MAX)]),
            ballot("North", "1", "2", &[("A", 1)]),
        ];
        let view = build_election_view(records);
        assert_eq!(view.totals.totals.votes.get_or_zero("A"), VoteCount::Invalid);
        assert_eq!(
            view.by_municipality["1"].totals.votes.get_or_zero("A"),
            VoteCount::Invalid
        );
        assert_eq!(
            view.by_ballot["1/2"].totals.votes.get_or_zero("A"),
            VoteCount::Valid(1)
        );
    }

    #[test]
    fn loss_and_gain_saturate() {
        let half = i64::MAX / 2;
        let mut records = background();
        // Negative counts keep the nationwide total of P20 small and valid.
        records.push(ballot("Neg", "50", "1", &[("P20", -half)]));
        records.push(ballot("Neg", "50", "2", &[("P20", -half)]));
        records.push(suspicious_ballot(half + 1, &["P01"]));
        records.push(suspicious_ballot(half + 1, &["P01"]));
        let view = build_election_view(records);
        assert_eq!(view.totals.ranked.rank_of("P20"), Some(20));

        let res = detect_suspicious_ballots(&view, &DetectionRules::default());
        assert_eq!(res.report_rows.len(), 2);
        assert_eq!(res.loss_by_party.get("P20"), Some(&i64::MAX));
        assert_eq!(res.gain_by_party.get("P01"), Some(&i64::MAX));
    }

    #[test]
    fn huge_rank_threshold_flags_nothing() {
        let mut records = background();
        records.push(suspicious_ballot(15, &["P01"]));
        let view = build_election_view(records);
        let rules = DetectionRules {
            national_rank_threshold_base: usize::MAX,
            ..DetectionRules::default()
        };
        assert!(detect_suspicious_ballots(&view, &rules).diagnostics.is_empty());
    }

    #[test]
    fn short_ballots_are_examined_partially() {
        let mut records = background();
        records.push(ballot("Tiny", "5", "1", &[("P22", 30)]));
        let view = build_election_view(records);
        let res = detect_suspicious_ballots(&view, &DetectionRules::default());
        // All four strong parties are missing: diagnostic only.
        assert!(res.report_rows.is_empty());
        assert_eq!(res.diagnostics.len(), 1);
        assert_eq!(res.gain_by_party.len(), 4);
    }

    #[test]
    fn idempotent() {
        let build = || {
            let mut records = background();
            records.push(suspicious_ballot(15, &["P01"]));
            records.push(suspicious_ballot(25, &["P00", "P02"]));
            run_audit(records, &DetectionRules::default())
        };
        let first = build();
        let second = build();
        assert_eq!(first, second);
        assert_eq!(first.detection.report_rows.len(), 1);
        assert_eq!(first.detection.diagnostics.len(), 2);
    }
}
