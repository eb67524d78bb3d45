// Rendering of the detection results.

use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::audit::*;

/// Renders the report rows as CSV, header included.
pub fn report_to_csv(rows: &[ReportRow]) -> AuditResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(REPORT_HEADER).context(WritingCsvSnafu {})?;
    for row in rows.iter() {
        wtr.write_record(row.fields()).context(WritingCsvSnafu {})?;
    }
    let bytes = match wtr.into_inner() {
        Ok(b) => b,
        Err(e) => whatever!("Could not flush the CSV report: {}", e.error()),
    };
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => whatever!("The CSV report is not valid UTF-8: {}", e),
    }
}

/// Writes to the given path, or to the standard output if the path is `stdout`.
pub fn write_output(path: &str, content: &str) -> AuditResult<()> {
    if path == "stdout" {
        print!("{}", content);
        Ok(())
    } else {
        info!("Writing {} bytes to {:?}", content.len(), path);
        fs::write(path, content).context(WritingOutputSnafu {
            path: path.to_string(),
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRules {
    #[serde(rename = "topN")]
    pub top_n: usize,
    #[serde(rename = "nationalRankThresholdBase")]
    pub national_rank_threshold_base: usize,
    #[serde(rename = "zeroScanDepth")]
    pub zero_scan_depth: usize,
    #[serde(rename = "minVotesToFlag")]
    pub min_votes_to_flag: i64,
    #[serde(rename = "minVotesToReport")]
    pub min_votes_to_report: i64,
}

impl From<&DetectionRules> for SummaryRules {
    fn from(r: &DetectionRules) -> Self {
        SummaryRules {
            top_n: r.top_n,
            national_rank_threshold_base: r.national_rank_threshold_base,
            zero_scan_depth: r.zero_scan_depth,
            min_votes_to_flag: r.min_votes_to_flag,
            min_votes_to_report: r.min_votes_to_report,
        }
    }
}

fn count_to_json(vc: VoteCount) -> JSValue {
    match vc.value() {
        Some(x) => json!(x),
        None => JSValue::Null,
    }
}

fn per_party_to_json(m: &BTreeMap<String, i64>) -> JSMap<String, JSValue> {
    m.iter().map(|(p, x)| (p.clone(), json!(x))).collect()
}

/// The JSON summary of a run: the nationwide ranking and what the detector found.
pub fn build_summary_js(outcome: &AuditOutcome, rules: &DetectionRules) -> JSValue {
    let view = &outcome.view;
    let detection = &outcome.detection;
    let nationwide: Vec<JSValue> = view
        .totals
        .ranked
        .ordered_parties
        .iter()
        .enumerate()
        .map(|(rank, party)| {
            json!({
                "rank": rank,
                "party": party,
                "votes": count_to_json(view.totals.totals.votes.get_or_zero(party)),
            })
        })
        .collect();
    let totals = &view.totals.totals;
    json!({
        "rules": SummaryRules::from(rules),
        "ballots": view.ballots.len(),
        "ballotGroups": view.by_ballot_group.len(),
        "municipalities": view.by_municipality.len(),
        "totals": {
            "voters": count_to_json(totals.voters),
            "totalVotes": count_to_json(totals.total_votes),
            "disqualified": count_to_json(totals.disqualified),
            "validVotes": count_to_json(totals.valid_votes),
        },
        "nationwide": nationwide,
        "lossByParty": per_party_to_json(&detection.loss_by_party),
        "gainByParty": per_party_to_json(&detection.gain_by_party),
        "diagnostics": detection.diagnostics.len(),
        "reportRows": detection.report_rows.len(),
    })
}
