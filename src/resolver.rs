// 🔎 Rate Resolver - longest-prefix match of a classification code
// Prefixes shorter than the minimum specificity never match

use crate::record::{ResolvedRecord, TradeRecord};
use crate::schedule::RateTable;

/// Rate applied to codes no schedule covers
pub const DEFAULT_RATE: f64 = 0.10;

/// Shortest prefix that may match (HS heading level)
pub const MIN_PREFIX_LEN: usize = 4;

/// Longest code the resolver looks at (HTS statistical suffix level)
pub const MAX_CODE_LEN: usize = 10;

/// Canonical digit-string form: separators dropped ("7606.11.0000" -> "7606110000"),
/// then the leading run of ASCII digits, at most 10 of them.
/// Schedule prefixes are normalised the same way.
pub fn canonical_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .take_while(|c| c.is_ascii_digit())
        .take(MAX_CODE_LEN)
        .collect()
}

/// Resolve with the default minimum prefix length
pub fn resolve(code: &str, table: &RateTable, default_rate: f64) -> f64 {
    RateResolver::new(table, default_rate).resolve(code)
}

pub struct RateResolver<'a> {
    table: &'a RateTable,
    default_rate: f64,
    min_prefix_len: usize,
}

impl<'a> RateResolver<'a> {
    pub fn new(table: &'a RateTable, default_rate: f64) -> Self {
        RateResolver {
            table,
            default_rate,
            min_prefix_len: MIN_PREFIX_LEN,
        }
    }

    pub fn with_min_prefix_len(mut self, min_prefix_len: usize) -> Self {
        self.min_prefix_len = min_prefix_len.max(1);
        self
    }

    pub fn resolve(&self, code: &str) -> f64 {
        let code = canonical_code(code);
        if code.len() < self.min_prefix_len {
            return self.default_rate;
        }

        (self.min_prefix_len..=code.len())
            .rev()
            .find_map(|len| self.table.get(&code[..len]))
            .unwrap_or(self.default_rate)
    }

    pub fn resolve_record(&self, record: TradeRecord) -> ResolvedRecord {
        let rate = self.resolve(&record.classification_code);
        ResolvedRecord::new(record, rate)
    }

    pub fn resolve_all(&self, records: Vec<TradeRecord>) -> Vec<ResolvedRecord> {
        records.into_iter().map(|r| self.resolve_record(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleEntry;

    fn aluminum_table() -> RateTable {
        RateTable::build(&[
            ScheduleEntry::new("aluminum", 0.25, &["7606"], &[]),
            ScheduleEntry::new("exemptions", 0.0, &[], &["760611"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_exception_beats_shorter_prefix() {
        let table = aluminum_table();

        assert_eq!(resolve("7606110000", &table, DEFAULT_RATE), 0.0);
        assert_eq!(resolve("760690", &table, DEFAULT_RATE), 0.25);
        assert_eq!(resolve("12", &table, DEFAULT_RATE), DEFAULT_RATE);
    }

    #[test]
    fn test_trailing_digits_do_not_matter() {
        let table = aluminum_table();
        let resolver = RateResolver::new(&table, DEFAULT_RATE);

        for code in ["7606", "760612", "7606123456", "7606999999"] {
            assert_eq!(resolver.resolve(code), 0.25, "code {}", code);
        }
    }

    #[test]
    fn test_short_codes_get_default() {
        // A 3-digit prefix in the table is below the floor and never consulted
        let table = RateTable::build(&[ScheduleEntry::new("x", 0.5, &["760", "76"], &[])]).unwrap();
        let resolver = RateResolver::new(&table, 0.10);

        assert_eq!(resolver.resolve("760"), 0.10);
        assert_eq!(resolver.resolve("76"), 0.10);
        assert_eq!(resolver.resolve(""), 0.10);
        assert_eq!(resolver.resolve("7601000000"), 0.10);
    }

    #[test]
    fn test_uncovered_code_gets_default() {
        let table = aluminum_table();
        assert_eq!(resolve("0101210000", &table, 0.10), 0.10);
    }

    #[test]
    fn test_canonical_code() {
        assert_eq!(canonical_code(" 7606110000 "), "7606110000");
        assert_eq!(canonical_code("7606110000 ALUMINUM PLATES"), "7606110000");
        assert_eq!(canonical_code("760611000099"), "7606110000");
        assert_eq!(canonical_code("n/a"), "");
        assert_eq!(canonical_code("7606.11.0000"), "7606110000");
        assert_eq!(canonical_code("8703.23.01.90"), "8703230190");
    }

    #[test]
    fn test_dotted_code_reaches_dotted_exception() {
        let table = RateTable::build(&[
            ScheduleEntry::new("aluminum", 0.25, &["7606"], &[]),
            ScheduleEntry::from_json("exemptions", r#"{"rate": 0.0, "exceptions": ["7606.11"]}"#).unwrap(),
        ])
        .unwrap();

        assert_eq!(table.get("760611"), Some(0.0));
        assert_eq!(resolve("7606110000", &table, DEFAULT_RATE), 0.0);
        assert_eq!(resolve("7606.11.0000", &table, DEFAULT_RATE), 0.0);
        assert_eq!(resolve("7606.90.0000", &table, DEFAULT_RATE), 0.25);
    }

    #[test]
    fn test_custom_min_prefix_len() {
        let table = RateTable::build(&[ScheduleEntry::new("x", 0.5, &["76"], &[])]).unwrap();
        let resolver = RateResolver::new(&table, 0.10).with_min_prefix_len(2);

        assert_eq!(resolver.resolve("7606"), 0.5);
    }

    #[test]
    fn test_resolve_all_assigns_one_rate_per_record() {
        let table = aluminum_table();
        let resolver = RateResolver::new(&table, DEFAULT_RATE);
        let records = vec![
            TradeRecord::new("7606110000", Some(1.0)),
            TradeRecord::new("7606900000", Some(2.0)),
            TradeRecord::new("0101", None),
        ];

        let resolved = resolver.resolve_all(records);
        let rates: Vec<f64> = resolved.iter().map(|r| r.rate).collect();
        assert_eq!(rates, vec![0.0, 0.25, 0.10]);
    }
}
