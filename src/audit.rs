use log::{debug, info, warn};

use election_audit::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use text_diff::print_diff;

use crate::args::Args;
use crate::audit::io_csv::SourceLayout;

mod io_csv;
mod report_writer;

#[derive(Debug, Snafu)]
pub enum AuditError {
    #[snafu(display("Error opening file {path}"))]
    OpeningInput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown encoding {label:?}"))]
    UnknownEncoding { label: String },
    #[snafu(display("The input has no header row"))]
    EmptyInput {},
    #[snafu(display("Error parsing CSV content"))]
    CsvParse { source: csv::Error },
    #[snafu(display("Line {lineno} is too short: expected at least {expected} fields, found {found}"))]
    CsvLineTooShort {
        lineno: usize,
        expected: usize,
        found: usize,
    },
    #[snafu(display("Error writing CSV report"))]
    WritingCsv { source: csv::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Difference detected between the generated report and the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Everything a run needs, checked and resolved from the command line.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub input: String,
    pub encoding: String,
    pub layout: SourceLayout,
    pub rules: DetectionRules,
    pub out: String,
    pub summary: Option<String>,
    pub reference: Option<String>,
}

impl RunSettings {
    pub fn from_args(args: &Args) -> AuditResult<RunSettings> {
        // Column indices on the command line start at 1, like in a spreadsheet.
        let first_party = match args.first_party_column {
            0 => whatever!("--first-party-column starts at 1, got 0"),
            x => x - 1,
        };
        let layout = SourceLayout {
            first_party,
            ..SourceLayout::DEFAULT_LAYOUT
        };
        let rules = DetectionRules {
            top_n: args.top_n,
            national_rank_threshold_base: args.national_rank_threshold_base,
            zero_scan_depth: args.zero_scan_depth,
            min_votes_to_flag: args.min_votes_to_flag,
            min_votes_to_report: args.min_votes_to_report,
        };
        if rules.top_n == 0 {
            warn!("--top-n is 0: no ballot will be examined");
        }
        if rules.min_votes_to_report < rules.min_votes_to_flag {
            warn!(
                "--min-votes-to-report ({}) is below --min-votes-to-flag ({}): the flag threshold applies first",
                rules.min_votes_to_report, rules.min_votes_to_flag
            );
        }
        Ok(RunSettings {
            input: args.input.clone(),
            encoding: args.encoding.clone(),
            layout,
            rules,
            out: args.out.clone().unwrap_or_else(|| "stdout".to_string()),
            summary: args.summary.clone(),
            reference: args.reference.clone(),
        })
    }
}

/// Reads the ballots, runs the detection and writes the outputs.
///
/// Returns the CSV report that was written.
pub fn run_audit_file(settings: &RunSettings) -> AuditResult<String> {
    info!("settings: {:?}", settings);
    let ballots = io_csv::read_ballots(&settings.input, &settings.encoding, &settings.layout)?;
    info!("Read {} ballots from {:?}", ballots.len(), settings.input);

    let outcome = run_audit(ballots, &settings.rules);
    let detection = &outcome.detection;

    for d in detection.diagnostics.iter() {
        info!("{}", d);
    }
    for (party, votes) in detection.loss_by_party.iter() {
        debug!("{} loses: {}", party, votes);
    }
    for (party, votes) in detection.gain_by_party.iter() {
        debug!("{} gains: {}", party, votes);
    }

    let report = report_writer::report_to_csv(&detection.report_rows)?;
    report_writer::write_output(&settings.out, &report)?;

    if let Some(summary_p) = &settings.summary {
        let summary_js = report_writer::build_summary_js(&outcome, &settings.rules);
        let pretty_js = serde_json::to_string_pretty(&summary_js).context(SerializingJsonSnafu {})?;
        report_writer::write_output(summary_p, &format!("{}\n", pretty_js))?;
    }

    // The reference report, if provided for comparison
    if let Some(reference_p) = &settings.reference {
        let reference = fs::read_to_string(reference_p).context(OpeningInputSnafu {
            path: reference_p.clone(),
        })?;
        if reference.trim_end() != report.trim_end() {
            warn!("Found differences with the reference report");
            print_diff(reference.trim_end(), report.trim_end(), "\n");
            return ReferenceMismatchSnafu {
                path: reference_p.clone(),
            }
            .fail();
        }
        info!("The report matches the reference {:?}", reference_p);
    }

    Ok(report)
}
