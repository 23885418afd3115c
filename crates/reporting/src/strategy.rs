//! Covered-call / cash-secured-put classification of open option positions.
//!
//! The classifier only sees aggregate collateral per account and holdings per
//! symbol and account. It does not know which position the brokerage pledged
//! collateral for, so several short options sharing one pool can each be
//! labelled as covered.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use folio_sync_core::OptionType;

pub const SHARES_PER_CONTRACT: Decimal = dec!(100);
const CSP_CASH_RATIO: Decimal = dec!(0.9);

/// Shares of one symbol held in one account.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Holding {
    pub total_shares: Decimal,
    pub collateral_shares: Decimal,
}

/// Account cash pledged for options and stock holdings, keyed by account id.
#[derive(Debug, Clone, Default)]
pub struct CollateralBook {
    cash_for_options: HashMap<String, Decimal>,
    holdings: HashMap<String, HashMap<String, Holding>>,
}

impl CollateralBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cash_for_options(&mut self, account: impl Into<String>, cash: Decimal) {
        self.cash_for_options.insert(account.into(), cash);
    }

    /// Records a holding; a repeated symbol/account pair replaces the earlier one.
    pub fn add_holding(&mut self, symbol: impl Into<String>, account: impl Into<String>, holding: Holding) {
        self.holdings
            .entry(symbol.into())
            .or_default()
            .insert(account.into(), holding);
    }

    #[must_use]
    pub fn cash_for_options(&self, account: &str) -> Decimal {
        self.cash_for_options
            .get(account)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// `None` when the symbol has no recorded holdings in any account.
    #[must_use]
    pub fn holdings_for(&self, symbol: &str) -> Option<&HashMap<String, Holding>> {
        self.holdings.get(symbol)
    }
}

/// The fields of an option position the classifier reads.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierInput<'a> {
    pub symbol: &'a str,
    pub account: &'a str,
    pub option_type: Option<OptionType>,
    pub strike: Decimal,
    pub contracts: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyLabel {
    CoveredCall,
    CoveredCallHoldings,
    CashSecuredPut,
    /// Fallback, carrying the option type text ("CALL", "PUT" or "N/A").
    Plain(String),
}

impl fmt::Display for StrategyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoveredCall => f.write_str("Covered Call (CC)"),
            Self::CoveredCallHoldings => f.write_str("Covered Call (CC) - Holdings"),
            Self::CashSecuredPut => f.write_str("Cash-Secured Put (CSP)"),
            Self::Plain(kind) => write!(f, "{kind} Position"),
        }
    }
}

/// Labels one position against the collateral book.
#[must_use]
pub fn classify(position: &ClassifierInput<'_>, book: &CollateralBook) -> StrategyLabel {
    let required_shares = position.contracts * SHARES_PER_CONTRACT;

    match position.option_type {
        Some(OptionType::Call) => {
            if let Some(holding) = book
                .holdings_for(position.symbol)
                .and_then(|by_account| by_account.get(position.account))
            {
                if holding.collateral_shares >= required_shares {
                    return StrategyLabel::CoveredCall;
                }
                if holding.total_shares >= required_shares {
                    return StrategyLabel::CoveredCallHoldings;
                }
            }
            StrategyLabel::Plain(OptionType::Call.to_string())
        }
        Some(OptionType::Put) => {
            let required_cash = position.strike * position.contracts * SHARES_PER_CONTRACT;
            if book.cash_for_options(position.account) >= required_cash * CSP_CASH_RATIO {
                return StrategyLabel::CashSecuredPut;
            }
            StrategyLabel::Plain(OptionType::Put.to_string())
        }
        None => StrategyLabel::Plain("N/A".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(symbol: &str, contracts: Decimal) -> ClassifierInput<'_> {
        ClassifierInput {
            symbol,
            account: "ACC1",
            option_type: Some(OptionType::Call),
            strike: dec!(200),
            contracts,
        }
    }

    fn put(strike: Decimal, contracts: Decimal) -> ClassifierInput<'static> {
        ClassifierInput {
            symbol: "SPY",
            account: "ACC1",
            option_type: Some(OptionType::Put),
            strike,
            contracts,
        }
    }

    fn book_with_shares(total: Decimal, collateral: Decimal) -> CollateralBook {
        let mut book = CollateralBook::new();
        book.add_holding(
            "AAPL",
            "ACC1",
            Holding {
                total_shares: total,
                collateral_shares: collateral,
            },
        );
        book
    }

    // ==================== Covered Call Tests ====================

    #[test]
    fn pledged_shares_make_covered_call() {
        for (contracts, pledged) in [(dec!(1), dec!(100)), (dec!(2), dec!(250)), (dec!(3), dec!(300))] {
            let book = book_with_shares(pledged, pledged);
            assert_eq!(
                classify(&call("AAPL", contracts), &book),
                StrategyLabel::CoveredCall,
                "contracts={contracts} pledged={pledged}"
            );
        }
    }

    #[test]
    fn shares_in_another_account_do_not_cover() {
        let mut book = CollateralBook::new();
        book.add_holding(
            "AAPL",
            "ACC2",
            Holding {
                total_shares: dec!(500),
                collateral_shares: dec!(500),
            },
        );
        for contracts in [dec!(0), dec!(1)] {
            assert_eq!(
                classify(&call("AAPL", contracts), &book),
                StrategyLabel::Plain("CALL".to_string()),
                "contracts={contracts}"
            );
        }
    }

    #[test]
    fn unpledged_shares_make_holdings_covered_call() {
        let book = book_with_shares(dec!(200), dec!(0));
        let label = classify(&call("AAPL", dec!(2)), &book);
        assert_eq!(label, StrategyLabel::CoveredCallHoldings);
        assert_eq!(label.to_string(), "Covered Call (CC) - Holdings");
    }

    #[test]
    fn too_few_shares_falls_back() {
        let book = book_with_shares(dec!(150), dec!(100));
        let label = classify(&call("AAPL", dec!(2)), &book);
        assert_eq!(label.to_string(), "CALL Position");
    }

    #[test]
    fn holdings_in_other_account_do_not_cover() {
        let mut book = CollateralBook::new();
        book.add_holding(
            "AAPL",
            "OTHER",
            Holding {
                total_shares: dec!(500),
                collateral_shares: dec!(500),
            },
        );
        assert_eq!(
            classify(&call("AAPL", dec!(1)), &book).to_string(),
            "CALL Position"
        );
    }

    #[test]
    fn call_without_any_holdings() {
        let book = CollateralBook::new();
        assert_eq!(
            classify(&call("TSLA", dec!(1)), &book),
            StrategyLabel::Plain("CALL".to_string())
        );
    }

    // ==================== Cash-Secured Put Tests ====================

    #[test]
    fn put_at_ninety_percent_is_cash_secured() {
        // strike 50 × 2 contracts × 100 = 10,000 required; 90% = 9,000
        let mut book = CollateralBook::new();
        book.set_cash_for_options("ACC1", dec!(9000));
        assert_eq!(
            classify(&put(dec!(50), dec!(2)), &book),
            StrategyLabel::CashSecuredPut
        );
    }

    #[test]
    fn put_just_below_threshold_falls_back() {
        let mut book = CollateralBook::new();
        book.set_cash_for_options("ACC1", dec!(8900));
        let label = classify(&put(dec!(50), dec!(2)), &book);
        assert_eq!(label.to_string(), "PUT Position");
    }

    #[test]
    fn put_with_fully_reserved_cash_across_strikes() {
        for (strike, contracts) in [(dec!(5), dec!(1)), (dec!(120.5), dec!(3)), (dec!(400), dec!(10))] {
            let required = strike * contracts * dec!(100);
            let mut book = CollateralBook::new();
            book.set_cash_for_options("ACC1", required);
            assert_eq!(
                classify(&put(strike, contracts), &book),
                StrategyLabel::CashSecuredPut
            );
        }
    }

    #[test]
    fn put_in_account_without_profile() {
        let book = CollateralBook::new();
        assert_eq!(classify(&put(dec!(10), dec!(1)), &book).to_string(), "PUT Position");
    }

    #[test]
    fn unknown_option_type() {
        let input = ClassifierInput {
            option_type: None,
            ..put(dec!(10), dec!(1))
        };
        assert_eq!(
            classify(&input, &CollateralBook::new()).to_string(),
            "N/A Position"
        );
    }
}
