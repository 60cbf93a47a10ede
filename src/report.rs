//! Plain-text history export, most recent record first.

use chrono::NaiveDateTime;
use std::fmt::Write;

use crate::record::{PredictionRecord, TS_FORMAT};

pub const RULE_WIDTH: usize = 50;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Renders every record with subject, timestamp, classification and
/// probability. Input order is chronological; output is reversed.
pub fn render_report(records: &[PredictionRecord], generated_at: NaiveDateTime) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PREDICTION HISTORY REPORT");
    let _ = writeln!(
        out,
        "Generated: {}  Records: {}",
        generated_at.format(TS_FORMAT),
        records.len()
    );
    let _ = writeln!(out, "{}", rule());

    if records.is_empty() {
        let _ = writeln!(out, "No records.");
        return out;
    }

    let mut ordered: Vec<&PredictionRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.recorded_at);
    for rec in ordered.into_iter().rev() {
        let _ = writeln!(out, "Subject: {}", rec.subject_label);
        let _ = writeln!(out, "Date: {}", rec.recorded_at_text());
        let _ = writeln!(out, "Result: {}", rec.classification().label());
        let _ = writeln!(out, "Probability: {:.2}%", rec.probability() * 100.0);
        if let Some(feedback) = &rec.feedback {
            let _ = writeln!(out, "Feedback: {}", feedback);
        }
        let _ = writeln!(out, "{}", rule());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_timestamp;

    fn at(label: &str, p: f64, ts: &str) -> PredictionRecord {
        PredictionRecord::new(label, p, parse_timestamp(ts).unwrap())
    }

    #[test]
    fn test_most_recent_first_with_all_fields() {
        let records = vec![
            at("first", 0.1234, "2024-01-01 09:00:00"),
            at("second", 0.9, "2024-01-01 10:00:00")
                .with_feedback(Some("confirmed by neurologist".to_string())),
        ];
        let now = parse_timestamp("2024-01-02 00:00:00").unwrap();
        let text = render_report(&records, now);

        let second = text.find("Subject: second").unwrap();
        let first = text.find("Subject: first").unwrap();
        assert!(second < first);
        assert!(text.contains("Probability: 12.34%"));
        assert!(text.contains("Probability: 90.00%"));
        assert!(text.contains("Result: Signs detected"));
        assert!(text.contains("Result: Normal result"));
        assert!(text.contains("Date: 2024-01-01 09:00:00"));
        assert!(text.contains("Feedback: confirmed by neurologist"));
        assert!(text.contains("Records: 2"));
        // header rule plus one per record
        assert_eq!(text.matches(&rule()).count(), 3);
    }

    #[test]
    fn test_empty_history() {
        let now = parse_timestamp("2024-01-02 00:00:00").unwrap();
        let text = render_report(&[], now);
        assert!(text.contains("No records."));
        assert!(text.contains("Records: 0"));
    }
}
