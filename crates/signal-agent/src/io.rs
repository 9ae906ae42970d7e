use std::path::Path;

use anyhow::{Context, Result};
use decision_core::{MetricsSnapshot, OutcomeRecord, TradeProposal};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Snapshot source: a JSON-lines file, or stdin when no path is given
pub async fn open_input(path: Option<&str>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening snapshot file {}", path))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

/// Parse one JSON line. Blank lines yield `None` quietly, malformed ones with a warning.
pub fn parse_line<T: DeserializeOwned>(line: &str, line_no: usize) -> Option<T> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(line = line_no, error = %e, "Skipping malformed JSON line");
            None
        }
    }
}

pub fn parse_snapshot(line: &str, line_no: usize) -> Option<MetricsSnapshot> {
    parse_line(line, line_no)
}

/// Read every settlement record in a JSON-lines file, skipping malformed lines
pub async fn read_outcomes(path: impl AsRef<Path>) -> Result<(Vec<OutcomeRecord>, u64)> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening outcomes file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut records = Vec::new();
    let mut skipped = 0;
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_line::<OutcomeRecord>(&line, line_no) {
            Some(record) => records.push(record),
            None if !line.trim().is_empty() => skipped += 1,
            None => {}
        }
    }
    Ok((records, skipped))
}

/// Write proposals as JSON lines and flush
pub async fn write_proposals<W: AsyncWrite + Unpin>(
    out: &mut W,
    proposals: &[TradeProposal],
) -> Result<()> {
    for proposal in proposals {
        let mut line = serde_json::to_vec(proposal)?;
        line.push(b'\n');
        out.write_all(&line).await?;
    }
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use decision_core::{ApprovalStatus, ReasonCode, Settlement};
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_snapshot_lines() {
        let good = r#"{"symbol":"NIFTY","spot":20000.0,"timestamp":"2026-10-16T09:30:00Z"}"#;
        let snapshot = parse_snapshot(good, 1).unwrap();
        assert_eq!(snapshot.symbol, "NIFTY");
        assert_eq!(snapshot.pcr, None);

        assert!(parse_snapshot("   ", 2).is_none());
        assert!(parse_snapshot("{not json", 3).is_none());
        assert!(parse_snapshot(r#"{"symbol":"NIFTY"}"#, 4).is_none());
    }

    #[test]
    fn test_parse_outcome_line() {
        let record: OutcomeRecord = parse_line(
            r#"{"symbol":"NIFTY","fingerprint":"abc","outcome":"target_hit"}"#,
            1,
        )
        .unwrap();
        assert_eq!(record.outcome, Settlement::TargetHit);
        assert!(record.settled_at.is_none());
    }

    #[tokio::test]
    async fn test_write_proposals_as_json_lines() {
        let proposals = vec![
            TradeProposal::hold(
                "NIFTY",
                Utc::now(),
                Decimal::ONE,
                ApprovalStatus::Rejected,
                ReasonCode::SignalCooldown,
            ),
            TradeProposal::hold(
                "BANKNIFTY",
                Utc::now(),
                Decimal::ONE,
                ApprovalStatus::Failed,
                ReasonCode::EvaluationTimeout,
            ),
        ];
        let mut out: Vec<u8> = Vec::new();
        write_proposals(&mut out, &proposals).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let back: TradeProposal = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back.symbol, "BANKNIFTY");
        assert_eq!(back.reason, "evaluation_timeout");
    }
}
