use chrono::{DateTime, Utc};
use decision_core::{Strategy, TradeLevels};
use sha2::{Digest, Sha256};

/// Stable identifier pairing a proposal with its later settlement:
/// SHA-256 over symbol, timestamp, strategy and levels, first 16 bytes as hex.
pub fn proposal_fingerprint(
    symbol: &str,
    timestamp: DateTime<Utc>,
    strategy: Strategy,
    levels: &TradeLevels,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(symbol.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.to_rfc3339().as_bytes());
    hasher.update(b"|");
    hasher.update(strategy.as_str().as_bytes());
    hasher.update(b"|");
    for price in [levels.entry, levels.target, levels.stop] {
        hasher.update(price.normalize().to_string().as_bytes());
        hasher.update(b"|");
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use decision_core::LevelBasis;
    use rust_decimal_macros::dec;

    fn levels() -> TradeLevels {
        TradeLevels {
            entry: dec!(45500),
            target: dec!(44609),
            stop: dec!(45945.5),
            basis: LevelBasis::Underlying,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let a = proposal_fingerprint("BANKNIFTY", ts, Strategy::DirectionalLong, &levels());
        let b = proposal_fingerprint("BANKNIFTY", ts, Strategy::DirectionalLong, &levels());

        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_ignores_trailing_zeros() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let mut padded = levels();
        padded.entry = dec!(45500.00);

        assert_eq!(
            proposal_fingerprint("BANKNIFTY", ts, Strategy::DirectionalLong, &levels()),
            proposal_fingerprint("BANKNIFTY", ts, Strategy::DirectionalLong, &padded),
        );
    }

    #[test]
    fn test_fingerprint_changes_with_inputs() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
        let base = proposal_fingerprint("BANKNIFTY", ts, Strategy::DirectionalLong, &levels());

        assert_ne!(base, proposal_fingerprint("NIFTY", ts, Strategy::DirectionalLong, &levels()));
        assert_ne!(
            base,
            proposal_fingerprint("BANKNIFTY", ts, Strategy::BearPutSpread, &levels())
        );
        assert_ne!(
            base,
            proposal_fingerprint(
                "BANKNIFTY",
                ts + chrono::Duration::seconds(1),
                Strategy::DirectionalLong,
                &levels()
            )
        );
    }
}
