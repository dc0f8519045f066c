//! The fiscal registry: a process-wide, read-only table of per-company fiscal
//! calendars consulted by [`crate::fiscal`].
//!
//! Built once at startup and shared across workers via `Arc` — the "global mutable
//! fiscal state" the source crate carries is replaced here with an immutable table
//! plus whatever per-worker override cache a caller layers on top (this crate keeps
//! none, since attribution needs no cross-filing memory).

use std::collections::HashMap;

/// One company's fiscal calendar: the month its fiscal year ends in, plus any known
/// past period-end dates useful for disambiguating edge cases.
#[derive(Debug, Clone)]
pub struct FiscalCalendar {
    /// 1-12, the calendar month in which the fiscal year ends.
    pub fiscal_year_end_month: u32,
    /// Known historical period-end dates, for future heuristics; not consulted by the
    /// core classification algorithm today.
    pub known_period_ends: Vec<chrono::NaiveDate>,
}

impl FiscalCalendar {
    pub fn december() -> Self {
        Self {
            fiscal_year_end_month: 12,
            known_period_ends: Vec::new(),
        }
    }
}

/// Read-only, ticker-keyed lookup table of fiscal calendars.
///
/// Tickers are normalized to upper-case ASCII, matching [`crate::model::Company`]'s
/// invariant.
#[derive(Debug, Clone, Default)]
pub struct FiscalRegistry {
    entries: HashMap<String, FiscalCalendar>,
}

impl FiscalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: impl Into<String>, calendar: FiscalCalendar) {
        self.entries.insert(ticker.into().to_ascii_uppercase(), calendar);
    }

    pub fn lookup(&self, ticker: &str) -> Option<&FiscalCalendar> {
        self.entries.get(&ticker.to_ascii_uppercase())
    }

    /// The registry seeded with the handful of non-December fiscal-year-end
    /// companies called out in the fiscal attributor's concrete test cases.
    pub fn with_known_entries() -> Self {
        let mut registry = Self::new();
        registry.insert(
            "MSFT",
            FiscalCalendar {
                fiscal_year_end_month: 6,
                known_period_ends: Vec::new(),
            },
        );
        registry.insert(
            "AAPL",
            FiscalCalendar {
                fiscal_year_end_month: 9,
                known_period_ends: Vec::new(),
            },
        );
        registry.insert(
            "NVDA",
            FiscalCalendar {
                fiscal_year_end_month: 1,
                known_period_ends: Vec::new(),
            },
        );
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = FiscalRegistry::with_known_entries();
        assert!(registry.lookup("msft").is_some());
        assert!(registry.lookup("MSFT").is_some());
    }

    #[test]
    fn unregistered_ticker_misses() {
        let registry = FiscalRegistry::with_known_entries();
        assert!(registry.lookup("ZZZZ").is_none());
    }

    #[test]
    fn known_entries_have_expected_fiscal_year_end() {
        let registry = FiscalRegistry::with_known_entries();
        assert_eq!(registry.lookup("MSFT").unwrap().fiscal_year_end_month, 6);
        assert_eq!(registry.lookup("AAPL").unwrap().fiscal_year_end_month, 9);
        assert_eq!(registry.lookup("NVDA").unwrap().fiscal_year_end_month, 1);
    }
}
