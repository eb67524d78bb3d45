/*!

This is the long-form manual for `election_audit` and `elaudit`.

## Input format

`elaudit` reads the per-ballot-box results published by the election committee, as a
comma-separated file with one header row and one row per ballot box. The default column
layout (0-based) is:

| column | content                 |
|--------|-------------------------|
| 2      | municipality name       |
| 3      | municipality id         |
| 4      | ballot box id           |
| 7      | registered voters       |
| 8      | votes cast              |
| 9      | disqualified votes      |
| 10     | valid votes             |
| 11 ..  | one column per party    |

The party columns are named by the party code in the header row. Empty trailing
header columns are ignored. The older files are not in UTF-8: use
`--encoding iso-8859-8` to read them.

Counts are read from their leading digits, with an optional sign: `12abc` reads as 12
and `1.5` as 1. Cells without leading digits do not stop the processing. They are kept
as invalid counts, which are contagious in sums and never satisfy a threshold. A ballot
box with an invalid count for a party will never be flagged for that party, and a party
whose nationwide total is invalid is neither flagged nor proposed as the real
destination of votes. A sum that does not fit in 64 bits is also invalid.

## Aggregation levels

The ballots are aggregated at four levels:
- ballot box: `<municipality id>/<ballot id>`
- ballot group: `<municipality id>/<ballot id before the first '.'>`. The sub-ballots
  `1234.1`, `1234.2` are grouped with `1234`.
- municipality: `<municipality id>`
- nationwide: a single group

At every level, the parties are ranked by decreasing number of votes. Ties are broken by
party code, so that the outcome does not depend on the order of the input.

## Detection heuristic

A common data entry error is to type the count of a party in the row of another
party. When this happens, a small party suddenly gets the votes of a large one,
and the large party gets nothing.

For each ballot box, the 3 locally strongest parties are examined. The party at local
position `i` (0-based) is an anomaly candidate when:
- its nationwide rank is strictly greater than `12 + i`, and
- it got strictly more than 2 votes in this ballot box.

The 4 nationally strongest parties that received exactly 0 votes in the ballot box are
the possible destinations of these votes. A line is written to the report only when
there is exactly one possible destination, and the count is strictly greater than 10.
All the candidates are logged, whether they are reported or not.

All these values can be changed on the command line:

```bash
elaudit -i expb.csv --encoding iso-8859-8 \
  --top-n 3 --national-rank-threshold-base 12 --zero-scan-depth 4 \
  --min-votes-to-flag 2 --min-votes-to-report 10
```

## Output

The report is written in CSV format, with the header:

```text
Location,Location ID,Ballot ID,Number of Votes,Counted As,Should Be
```

Use `--summary stdout` to also print a JSON summary with the nationwide ranking and
the number of votes flagged per party.

 */
