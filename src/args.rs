use clap::Parser;
use election_audit::DetectionRules;

/// Finds ballot boxes where votes were likely recorded under the wrong party.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The results per ballot box, in CSV format with a header row.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (default utf-8) The character encoding of the input. The older files of the election
    /// committee use iso-8859-8.
    #[clap(long, value_parser, default_value = "utf-8")]
    pub encoding: String,

    /// (default 12) The first column that contains party votes, starting at 1. All the columns
    /// after it are also parties.
    #[clap(long, value_parser, default_value_t = 12)]
    pub first_party_column: usize,

    /// (file path, 'stdout' or empty) Where to write the CSV report. Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, 'stdout' or empty) If specified, a summary of the analysis will be written in
    /// JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub summary: Option<String>,

    /// (file path) A reference report in CSV format. If provided, elaudit will
    /// check that the generated report matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// How many of the locally strongest parties are examined in each ballot box.
    #[clap(long, value_parser, default_value_t = DetectionRules::DEFAULT_RULES.top_n)]
    pub top_n: usize,

    /// A party at local position i (starting at 0) is suspicious when its national rank is
    /// greater than this value plus i.
    #[clap(long, value_parser, default_value_t = DetectionRules::DEFAULT_RULES.national_rank_threshold_base)]
    pub national_rank_threshold_base: usize,

    /// How many of the nationally strongest parties are checked for having no vote.
    #[clap(long, value_parser, default_value_t = DetectionRules::DEFAULT_RULES.zero_scan_depth)]
    pub zero_scan_depth: usize,

    /// A suspicious party must have more votes than this to be considered.
    #[clap(long, value_parser, default_value_t = DetectionRules::DEFAULT_RULES.min_votes_to_flag)]
    pub min_votes_to_flag: i64,

    /// A suspicious party must have more votes than this to be written to the report.
    #[clap(long, value_parser, default_value_t = DetectionRules::DEFAULT_RULES.min_votes_to_report)]
    pub min_votes_to_report: i64,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
