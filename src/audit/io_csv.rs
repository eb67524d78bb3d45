// Reading the per-ballot-box results.

use std::fs;

use encoding_rs::Encoding;

use crate::audit::*;

/// The location of the fields in a row (0-based column indices).
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct SourceLayout {
    pub municipality_name: usize,
    pub municipality_id: usize,
    pub ballot_id: usize,
    pub voters: usize,
    pub total_votes: usize,
    pub disqualified: usize,
    pub valid_votes: usize,
    /// All the columns from this one to the end of the header are parties.
    pub first_party: usize,
}

impl SourceLayout {
    /// The layout of the files published by the election committee.
    pub const DEFAULT_LAYOUT: SourceLayout = SourceLayout {
        municipality_name: 2,
        municipality_id: 3,
        ballot_id: 4,
        voters: 7,
        total_votes: 8,
        disqualified: 9,
        valid_votes: 10,
        first_party: 11,
    };

    // The identity columns must be present in every row.
    fn min_row_len(&self) -> usize {
        self.municipality_name
            .max(self.municipality_id)
            .max(self.ballot_id)
            + 1
    }
}

/// Reads and decodes a file, then parses the ballots it contains.
pub fn read_ballots(
    path: &str,
    encoding_label: &str,
    layout: &SourceLayout,
) -> AuditResult<Vec<BallotRecord>> {
    let encoding = Encoding::for_label(encoding_label.as_bytes()).context(UnknownEncodingSnafu {
        label: encoding_label.to_string(),
    })?;
    info!(
        "Attempting to read ballot file {:?} with encoding {}",
        path,
        encoding.name()
    );
    let bytes = fs::read(path).context(OpeningInputSnafu {
        path: path.to_string(),
    })?;
    let (text, used_encoding, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(
            "read_ballots: {:?} contains bytes that are not valid {}, they were replaced",
            path,
            used_encoding.name()
        );
    }
    let ballots = parse_ballots(&text, layout)?;
    if ballots.is_empty() {
        warn!("read_ballots: no ballot found in {:?}", path);
    }
    Ok(ballots)
}

/// Parses the ballots from already decoded content. The first row is the header.
pub fn parse_ballots(content: &str, layout: &SourceLayout) -> AuditResult<Vec<BallotRecord>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut records = rdr.into_records();

    let header = records
        .next()
        .context(EmptyInputSnafu {})?
        .context(CsvParseSnafu {})?;
    let mut column_names: Vec<String> = header.iter().map(|s| s.to_string()).collect();
    while column_names.last().map(|s| s.is_empty()).unwrap_or(false) {
        column_names.pop();
    }
    debug!("parse_ballots: header: {:?}", column_names);
    let parties: Vec<(usize, String)> = column_names
        .iter()
        .enumerate()
        .skip(layout.first_party)
        .map(|(idx, name)| (idx, name.clone()))
        .collect();
    if parties.is_empty() {
        whatever!(
            "No party column found: the header has {} columns, parties are expected from column {}",
            column_names.len(),
            layout.first_party + 1
        )
    }
    info!(
        "parse_ballots: {} parties: {:?}",
        parties.len(),
        parties.iter().map(|(_, p)| p).collect::<Vec<_>>()
    );

    let mut res: Vec<BallotRecord> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvParseSnafu {})?;
        if line.iter().all(|s| s.is_empty()) {
            debug!("parse_ballots: line {}: empty, skipped", lineno);
            continue;
        }
        ensure!(
            line.len() >= layout.min_row_len(),
            CsvLineTooShortSnafu {
                lineno,
                expected: layout.min_row_len(),
                found: line.len(),
            }
        );

        let count = |col: usize, label: &str| -> VoteCount {
            let cell = line.get(col).unwrap_or("");
            let vc = VoteCount::parse(cell);
            if !vc.is_valid() {
                warn!(
                    "parse_ballots: line {}: could not read {} from {:?}",
                    lineno, label, cell
                );
            }
            vc
        };

        let mut votes = VoteTally::new();
        for (col, party) in parties.iter() {
            votes.insert(party, count(*col, party.as_str()));
        }
        let totals = VotingTotals {
            voters: count(layout.voters, "voters"),
            total_votes: count(layout.total_votes, "total votes"),
            disqualified: count(layout.disqualified, "disqualified"),
            valid_votes: count(layout.valid_votes, "valid votes"),
            votes,
        };
        let ballot = BallotRecord::new(
            &line[layout.municipality_name],
            &line[layout.municipality_id],
            &line[layout.ballot_id],
            totals,
        );
        debug!("parse_ballots: line {}: ballot {}", lineno, ballot.id());
        res.push(ballot);
    }
    Ok(res)
}
