// CSV parsing for lead imports
//
// Spreadsheet exports arrive comma-, semicolon- or tab-separated depending
// on locale, so the delimiter is detected from the header line.

use crate::error::CrmError;
use crate::models::{FieldKind, ListField};

/// Parsed CSV file: header names and one row per non-blank line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub delimiter: char,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<(String, String)>>,
}

impl CsvTable {
    /// List schema derived from the headers
    pub fn fields(&self) -> Vec<ListField> {
        self.headers
            .iter()
            .map(|header| ListField::new(header, FieldKind::infer(header)))
            .collect()
    }
}

/// Pick the delimiter for a header line.
/// Tabs win when at least as common as commas and semicolons.
pub fn detect_delimiter(header_line: &str) -> char {
    let count = |c: char| header_line.matches(c).count();
    let (tabs, commas, semicolons) = (count('\t'), count(','), count(';'));

    if tabs > 0 && tabs >= commas && tabs >= semicolons {
        '\t'
    } else if semicolons > commas {
        ';'
    } else {
        ','
    }
}

/// Split one line, honoring double quotes. `""` inside quotes is a literal quote.
pub fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Parse CSV content into a table.
///
/// Blank lines are skipped, short rows are padded with empty strings and
/// cells beyond the header count are dropped.
pub fn parse_csv(content: &str) -> Result<CsvTable, CrmError> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = normalized.lines().filter(|line| !line.trim().is_empty());

    let header_line = lines
        .next()
        .ok_or_else(|| CrmError::InvalidCsv("file is empty".to_string()))?;
    let delimiter = detect_delimiter(header_line);
    let headers: Vec<String> = split_line(header_line, delimiter);

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CrmError::InvalidCsv("header row has no column names".to_string()));
    }
    if let Some(pos) = headers.iter().position(|h| h.is_empty()) {
        return Err(CrmError::InvalidCsv(format!("column {} has an empty header", pos + 1)));
    }

    let rows = lines
        .map(|line| {
            let mut cells = split_line(line, delimiter).into_iter();
            headers
                .iter()
                .map(|header| (header.clone(), cells.next().unwrap_or_default()))
                .collect()
        })
        .collect();

    Ok(CsvTable { delimiter, headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a;b;c"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a;b,c;d"), ';');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_split_line_quotes() {
        assert_eq!(split_line(r#"Acme, "Vilnius, LT" ,x"#, ','), vec!["Acme", "Vilnius, LT", "x"]);
        assert_eq!(split_line(r#""say ""hi""";2"#, ';'), vec![r#"say "hi""#, "2"]);
        assert_eq!(split_line("a,,", ','), vec!["a", "", ""]);
    }

    #[test]
    fn test_parse_csv() {
        let content = "Name;Phone;Email\r\nAcme;+370 600 12345;a@x.com\r\n\r\nBeta;600\n";
        let table = parse_csv(content).unwrap();
        assert_eq!(table.delimiter, ';');
        assert_eq!(table.headers, vec!["Name", "Phone", "Email"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][2], ("Email".to_string(), String::new()));

        let kinds: Vec<FieldKind> = table.fields().iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FieldKind::Text, FieldKind::Phone, FieldKind::Email]);
    }

    #[test]
    fn test_parse_csv_rejects_bad_headers() {
        assert!(matches!(parse_csv(""), Err(CrmError::InvalidCsv(_))));
        assert!(matches!(parse_csv("\n\n"), Err(CrmError::InvalidCsv(_))));
        assert!(matches!(parse_csv("Name,,Phone\n"), Err(CrmError::InvalidCsv(_))));
    }
}
