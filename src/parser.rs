// Tolerant CSV reader for published spreadsheet exports.
//
// Exports mix CR/LF line endings, quote fields with embedded commas and
// newlines, and sometimes carry ragged trailing rows. This reader never fails:
// malformed quoting degrades to a best-effort row instead of an error.
use std::mem::take;

use crate::types::RawRow;

/// Split `text` into rows of fields with a character-level state machine.
///
/// Quotes toggle quoted mode and are not emitted; `""` inside quotes is a
/// literal quote. CR, LF and CRLF end a row outside quotes. Rows whose fields
/// are all empty (blank lines, `,,`) are dropped. An unterminated quote runs to
/// the end of input and the pending row is still flushed.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row: Vec<String> = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\r' | '\n' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                push_row(&mut rows, take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        push_row(&mut rows, row);
    }

    rows
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    if row.iter().any(|f| !f.is_empty()) {
        rows.push(row);
    }
}

/// Header cell: trimmed, with one layer of surrounding quotes removed.
fn clean_header(raw: &str) -> String {
    let h = raw.trim();
    let h = h.strip_prefix('"').unwrap_or(h);
    let h = h.strip_suffix('"').unwrap_or(h);
    h.trim().to_string()
}

/// Parse an export into header-keyed rows.
///
/// The first row names the columns. Data rows shorter than the header are
/// dropped; cells past the header width are ignored. Values are kept as-is;
/// trimming is the normalizer's job.
pub fn parse_records(text: &str) -> Vec<RawRow> {
    let mut rows = parse_rows(text).into_iter();
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row.iter().map(|h| clean_header(h)).collect();

    rows.filter(|values| values.len() >= headers.len())
        .map(|values| {
            headers
                .iter()
                .zip(values)
                .map(|(h, v)| (h.clone(), v))
                .collect::<RawRow>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_rows() {
        let rows = parse_rows("a,b,c\n1,2,3\n");
        assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]);
    }

    #[test]
    fn quoted_delimiters_newlines_and_escaped_quotes() {
        let text = "name,note\n\"Kim, J\",\"line one\nline two\"\n\"say \"\"hi\"\"\",x\n";
        let rows = parse_rows(text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["Kim, J", "line one\nline two"]);
        assert_eq!(rows[2], vec!["say \"hi\"", "x"]);
    }

    #[test]
    fn crlf_is_one_terminator_and_blank_lines_vanish() {
        let rows = parse_rows("a,b\r\n\r\n1,2\r\n,\r\n3,4\r5,6");
        assert_eq!(
            rows,
            vec![vec!["a", "b"], vec!["1", "2"], vec!["3", "4"], vec!["5", "6"]]
        );
    }

    #[test]
    fn crlf_inside_quotes_is_kept() {
        let rows = parse_rows("a\n\"x\r\ny\"\n");
        assert_eq!(rows[1], vec!["x\r\ny"]);
    }

    #[test]
    fn unterminated_quote_still_yields_a_row() {
        let rows = parse_rows("a,b\n1,\"open field\n2,3");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["1", "open field\n2,3"]);
    }

    #[test]
    fn records_are_keyed_by_cleaned_headers() {
        let text = " 수요기관명 ,\"\"\"업체\"\"\"\n서울시청,두발로\n";
        let recs = parse_records(text);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].get("수요기관명"), Some("서울시청"));
        assert_eq!(recs[0].get("업체"), Some("두발로"));
    }

    #[test]
    fn short_rows_dropped_long_rows_truncated() {
        let recs = parse_records("a,b,c\n1,2\n1,2,3,4\n");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].values().collect::<Vec<_>>(), ["1", "2", "3"]);
        assert_eq!(recs[0].get("d"), None);
    }

    #[test]
    fn header_only_or_empty_input_has_no_records() {
        assert!(parse_records("").is_empty());
        assert!(parse_records("a,b\n").is_empty());
        assert!(parse_records("\n\r\n").is_empty());
    }

    #[test]
    fn values_are_not_trimmed() {
        let recs = parse_records("a\n  padded  \n");
        assert_eq!(recs[0].get("a"), Some("  padded  "));
    }
}
