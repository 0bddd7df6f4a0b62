use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

use crate::model::models::SubmissionDetailType;

/**
 * Column names of the exported submission rows, in export order.
 */
pub const SUBMISSION_EXPORT_COLUMNS: [&str; 7] = ["id", "division", "submission_month", "submission_year", "warehouse_hours", "created_at", "updated_at"];

/**
 * A single exported value before it is written as a CSV field.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum ExportValue {
    /**
     * Rendered as an empty field. Stored submission columns are all NOT NULL.
     */
    #[cfg_attr(not(test), allow(dead_code))]
    Null,
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl ExportValue {
    /**
     * Renders the value as unescaped text. Nulls become the empty string and timestamps ISO-8601 in UTC.
     */
    fn render(&self) -> String {
        match self {
            ExportValue::Null => String::new(),
            ExportValue::Integer(value) => value.to_string(),
            ExportValue::Decimal(value) => value.normalize().to_string(),
            ExportValue::Text(value) => value.clone(),
            ExportValue::Timestamp(value) => format_timestamp(value),
        }
    }
}

/**
 * Formats a timestamp as ISO-8601 UTC with millisecond precision, e.g. `2025-03-01T10:00:00.000Z`.
 */
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/**
 * Escapes a single CSV field. Quotes are doubled, and the field is quoted when it contains a comma, newline or quote.
 */
pub fn escape_csv_field(value: &str) -> String {
    let escaped = value.replace('"', "\"\"");
    if escaped.contains(',') || escaped.contains('\n') || escaped.contains('"') {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

/**
 * Builds a CSV document from a header and rows. Rows are separated by `\n` with no trailing newline.
 *
 * # Arguments
 * `headers`: Column names, written as the first row.
 * `rows`: The values of each row, in header order.
 *
 * # Returns
 * The CSV document, or an empty string when there are no rows.
 */
pub fn to_csv(headers: &[&str], rows: &[Vec<ExportValue>]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut lines: Vec<String> = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    for row in rows {
        lines.push(row.iter().map(|value| escape_csv_field(&value.render())).collect::<Vec<String>>().join(","));
    }
    lines.join("\n")
}

/**
 * Export values of a submission, in `SUBMISSION_EXPORT_COLUMNS` order.
 */
pub fn submission_export_row(submission: &SubmissionDetailType) -> Vec<ExportValue> {
    vec![
        ExportValue::Integer(submission.id),
        ExportValue::Text(submission.division.clone()),
        ExportValue::Integer(i64::from(submission.submission_month)),
        ExportValue::Integer(i64::from(submission.submission_year)),
        ExportValue::Decimal(submission.warehouse_hours),
        ExportValue::Timestamp(submission.created_at),
        ExportValue::Timestamp(submission.updated_at),
    ]
}

/**
 * Converts submissions to a CSV document with the standard export columns.
 */
pub fn submissions_to_csv(submissions: &[SubmissionDetailType]) -> String {
    let rows: Vec<Vec<ExportValue>> = submissions.iter().map(submission_export_row).collect();
    to_csv(&SUBMISSION_EXPORT_COLUMNS, &rows)
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn submission(id: i64, division: &str, hours: Decimal) -> SubmissionDetailType {
        let created_at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let updated_at = Utc.with_ymd_and_hms(2025, 3, 2, 11, 30, 15).unwrap();
        SubmissionDetailType { id, division: division.to_string(), submission_month: 3, submission_year: 2025, warehouse_hours: hours, created_at, updated_at }
    }

    #[test]
    fn test_escape_plain() {
        assert_eq!(escape_csv_field("100"), "100");
        assert_eq!(escape_csv_field(""), "");
    }

    #[test]
    fn test_escape_comma_newline_quote() {
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("a\nb"), "\"a\nb\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_escape_carriage_return_not_quoted() {
        assert_eq!(escape_csv_field("a\rb"), "a\rb");
    }

    #[test]
    fn test_render_values() {
        assert_eq!(ExportValue::Null.render(), "");
        assert_eq!(ExportValue::Integer(42).render(), "42");
        assert_eq!(ExportValue::Decimal(Decimal::new(4250, 2)).render(), "42.5");
        assert_eq!(ExportValue::Decimal(Decimal::new(5000, 2)).render(), "50");
        assert_eq!(ExportValue::Timestamp(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()).render(), "2025-03-01T10:00:00.000Z");
    }

    #[test]
    fn test_to_csv_empty() {
        assert_eq!(to_csv(&["a", "b"], &[]), "");
    }

    #[test]
    fn test_to_csv_null_field() {
        let csv = to_csv(&["a", "b"], &[vec![ExportValue::Null, ExportValue::Text("x".to_string())]]);
        assert_eq!(csv, "a,b\n,x");
    }

    #[test]
    fn test_submissions_to_csv() {
        let csv = submissions_to_csv(&[submission(2, "100", Decimal::new(4250, 2)), submission(1, "1,2", Decimal::ZERO)]);
        let expected = "id,division,submission_month,submission_year,warehouse_hours,created_at,updated_at\n\
                        2,100,3,2025,42.5,2025-03-01T10:00:00.000Z,2025-03-02T11:30:15.000Z\n\
                        1,\"1,2\",3,2025,0,2025-03-01T10:00:00.000Z,2025-03-02T11:30:15.000Z";
        assert_eq!(csv, expected);
    }

    #[test]
    fn test_submissions_to_csv_parses_back() {
        let submissions = vec![submission(5, "a\"b", Decimal::new(1, 1)), submission(4, "x\ny", Decimal::new(12345, 2))];
        let document = submissions_to_csv(&submissions);
        let mut reader = csv::Reader::from_reader(document.as_bytes());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(headers, SUBMISSION_EXPORT_COLUMNS.iter().map(ToString::to_string).collect::<Vec<String>>());
        let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        for (record, submission) in records.iter().zip(&submissions) {
            assert_eq!(record[0].parse::<i64>().unwrap(), submission.id);
            assert_eq!(&record[1], submission.division);
            assert_eq!(record[4].parse::<Decimal>().unwrap(), submission.warehouse_hours);
            assert_eq!(&record[5], format_timestamp(&submission.created_at));
        }
    }
}
