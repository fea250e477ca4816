//! Coin selection.
//!
//! Chooses which eligible outputs fund a transaction. Eligible outputs are
//! Unspent, have at least `min_confirmations`, and are past their lock
//! height. They are considered in ascending `(value, creation order)`, so a
//! given ledger snapshot always yields the same selection.
//!
//! Selection is pure: it never locks anything. The session locks the chosen
//! inputs under the same critical section it selected them in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use beryl_core::fee::tx_fee;
use beryl_core::types::Commitment;

use crate::error::WalletError;
use crate::ledger::{OutputLedger, OutputRecord};

/// Which eligible outputs to spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Spend every eligible output, consolidating the wallet.
    UseAll,
    /// Spend the fewest small outputs that cover the amount.
    #[default]
    SmallestFirst,
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UseAll => "use_all",
            Self::SmallestFirst => "smallest_first",
        })
    }
}

impl FromStr for SelectionStrategy {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "use_all" | "all" => Ok(Self::UseAll),
            "smallest_first" | "smallest" => Ok(Self::SmallestFirst),
            other => Err(WalletError::InvalidArgument(format!("unknown selection strategy: {other}"))),
        }
    }
}

/// Result of coin selection: which outputs to spend and the fee/change breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinSelection {
    pub strategy: SelectionStrategy,
    /// Selected inputs, in selection order.
    pub inputs: Vec<Commitment>,
    /// Sum of the selected inputs.
    pub total: u64,
    pub amount: u64,
    pub fee: u64,
    /// Change returned to the sender. Zero means no change output.
    pub change: u64,
}

impl CoinSelection {
    /// Number of outputs the transaction will have.
    pub fn num_outputs(&self) -> usize {
        if self.change > 0 { 2 } else { 1 }
    }
}

/// Selection parameters taken from the wallet configuration and the last
/// known chain height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinSelector {
    pub min_confirmations: u64,
    /// Soft cap on the number of inputs.
    pub max_outputs: usize,
    pub fee_base: u64,
    /// Last known chain height, for lock height checks.
    pub tip: u64,
}

impl CoinSelector {
    /// Select outputs from `ledger` to pay `amount` plus fee.
    ///
    /// The fee depends on the number of inputs and outputs, so it is
    /// recomputed after each selection and selection is repeated while the
    /// fee grows. When what is left over after the no-change fee is too
    /// small to pay for a change output, the remainder goes to the fee.
    pub fn select(
        &self,
        ledger: &OutputLedger,
        amount: u64,
        strategy: SelectionStrategy,
    ) -> Result<CoinSelection, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be non-zero".into()));
        }

        let eligible = ledger.eligible(self.min_confirmations, self.tip);
        let available = eligible.iter().fold(0u64, |acc, r| acc.saturating_add(r.value));

        let mut fee = tx_fee(1, 2, 1, self.fee_base);
        // Bounded: the fee can only grow to the weight of a one-input
        // transaction, which is where it started.
        for _ in 0..=eligible.len() {
            let needed = amount.saturating_add(fee);
            let chosen: Vec<&OutputRecord> = match strategy {
                SelectionStrategy::UseAll => eligible.clone(),
                SelectionStrategy::SmallestFirst => self.smallest_first(&eligible, needed),
            };
            let total = chosen.iter().fold(0u64, |acc, r| acc.saturating_add(r.value));
            let n = chosen.len().max(1);

            let fee_without_change = tx_fee(n, 1, 1, self.fee_base);
            let fee_with_change = tx_fee(n, 2, 1, self.fee_base);

            if !chosen.is_empty() {
                if total > amount.saturating_add(fee_with_change) {
                    let change = total - amount - fee_with_change;
                    return Ok(self.finish(strategy, &chosen, total, amount, fee_with_change, change));
                }
                if total >= amount.saturating_add(fee_without_change) {
                    // Too little left over for a change output.
                    return Ok(self.finish(strategy, &chosen, total, amount, total - amount, 0));
                }
            }
            if fee_with_change > fee {
                fee = fee_with_change;
                continue;
            }
            break;
        }

        let needed = amount.saturating_add(tx_fee(eligible.len().max(1), 2, 1, self.fee_base));
        Err(WalletError::InsufficientFunds {
            needed,
            available,
            shortfall: needed.saturating_sub(available),
        })
    }

    /// Preview every strategy that can fund `amount`, without locking.
    pub fn estimate(&self, ledger: &OutputLedger, amount: u64) -> Result<Vec<CoinSelection>, WalletError> {
        let mut previews = Vec::new();
        let mut last_err = None;
        for strategy in [SelectionStrategy::UseAll, SelectionStrategy::SmallestFirst] {
            match self.select(ledger, amount, strategy) {
                Ok(s) => previews.push(s),
                Err(e) => last_err = Some(e),
            }
        }
        match (previews.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(previews),
        }
    }

    /// Shortest ascending prefix reaching `needed`. If that takes more than
    /// `max_outputs` inputs, the first window of `max_outputs` consecutive
    /// outputs that reaches it, or failing that the largest ones.
    fn smallest_first<'a>(&self, eligible: &[&'a OutputRecord], needed: u64) -> Vec<&'a OutputRecord> {
        let mut sum = 0u64;
        let mut count = eligible.len();
        for (i, r) in eligible.iter().enumerate() {
            sum = sum.saturating_add(r.value);
            if sum >= needed {
                count = i + 1;
                break;
            }
        }
        let max = self.max_outputs.max(1);
        if count <= max {
            return eligible[..count].to_vec();
        }

        for window in eligible.windows(max) {
            let total = window.iter().fold(0u64, |acc, r| acc.saturating_add(r.value));
            if total >= needed {
                return window.to_vec();
            }
        }
        eligible[eligible.len() - max..].to_vec()
    }

    fn finish(
        &self,
        strategy: SelectionStrategy,
        chosen: &[&OutputRecord],
        total: u64,
        amount: u64,
        fee: u64,
        change: u64,
    ) -> CoinSelection {
        CoinSelection {
            strategy,
            inputs: chosen.iter().map(|r| r.commitment).collect(),
            total,
            amount,
            fee,
            change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::OutputStatus;
    use crate::ledger::tests::record;
    use proptest::prelude::*;

    fn selector() -> CoinSelector {
        CoinSelector { min_confirmations: 2, max_outputs: 500, fee_base: 1, tip: 100 }
    }

    fn ledger_of(values: &[u64]) -> OutputLedger {
        let mut l = OutputLedger::new();
        for (i, v) in values.iter().enumerate() {
            l.insert(record(i as u8 + 1, *v, OutputStatus::Unspent, 3)).unwrap();
        }
        l
    }

    #[test]
    fn single_output_with_change() {
        let l = ledger_of(&[500]);
        let s = selector().select(&l, 200, SelectionStrategy::SmallestFirst).unwrap();
        assert_eq!(s.inputs, vec![Commitment([1; 32])]);
        assert_eq!(s.fee, 8);
        assert_eq!(s.change, 292);
        assert_eq!(s.num_outputs(), 2);
    }

    #[test]
    fn insufficient_funds_reports_shortfall() {
        let l = ledger_of(&[500]);
        let err = selector().select(&l, 1000, SelectionStrategy::SmallestFirst).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { needed: 1008, available: 500, shortfall: 508 });
    }

    #[test]
    fn exact_amount_needs_no_change() {
        // 1 input, 1 output, 1 kernel: weight 4.
        let l = ledger_of(&[104]);
        let s = selector().select(&l, 100, SelectionStrategy::SmallestFirst).unwrap();
        assert_eq!(s.change, 0);
        assert_eq!(s.fee, 4);
        assert_eq!(s.num_outputs(), 1);
    }

    #[test]
    fn smallest_first_takes_ascending_prefix() {
        let l = ledger_of(&[40, 10, 30, 20]);
        let s = selector().select(&l, 50, SelectionStrategy::SmallestFirst).unwrap();
        // 10 + 20 + 30 = 60 >= 50 + fee(3 inputs) = 56
        assert_eq!(s.total, 60);
        assert_eq!(s.inputs.len(), 3);
        assert_eq!(s.fee, 6);
        assert_eq!(s.change, 4);
    }

    #[test]
    fn use_all_consolidates() {
        let l = ledger_of(&[40, 10, 30, 20]);
        let s = selector().select(&l, 50, SelectionStrategy::UseAll).unwrap();
        assert_eq!(s.inputs.len(), 4);
        assert_eq!(s.total, 100);
        assert_eq!(s.fee, tx_fee(4, 2, 1, 1));
        assert_eq!(s.change, 100 - 50 - s.fee);
    }

    #[test]
    fn ineligible_outputs_skipped() {
        let mut l = ledger_of(&[500]);
        l.insert(record(9, 1000, OutputStatus::Unspent, 1)).unwrap();
        l.insert(record(10, 1000, OutputStatus::Locked, 10)).unwrap();
        l.insert(record(11, 1000, OutputStatus::Unconfirmed, 0)).unwrap();
        let s = selector().select(&l, 200, SelectionStrategy::UseAll).unwrap();
        assert_eq!(s.inputs, vec![Commitment([1; 32])]);
    }

    #[test]
    fn max_outputs_uses_sliding_window() {
        let l = ledger_of(&[1, 1, 1, 1, 50, 60]);
        let sel = CoinSelector { max_outputs: 2, ..selector() };
        let s = sel.select(&l, 100, SelectionStrategy::SmallestFirst).unwrap();
        assert_eq!(s.total, 110);
        assert_eq!(s.inputs.len(), 2);
    }

    #[test]
    fn zero_amount_rejected() {
        let err = selector().select(&ledger_of(&[5]), 0, SelectionStrategy::UseAll).unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[test]
    fn empty_ledger_insufficient() {
        let err = selector().select(&OutputLedger::new(), 1, SelectionStrategy::SmallestFirst).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { available: 0, .. }));
    }

    #[test]
    fn estimate_previews_both_strategies() {
        let l = ledger_of(&[40, 10, 30, 20]);
        let previews = selector().estimate(&l, 50).unwrap();
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].strategy, SelectionStrategy::UseAll);
        assert_eq!(previews[1].strategy, SelectionStrategy::SmallestFirst);
        assert!(selector().estimate(&l, 1_000).is_err());
    }

    #[test]
    fn strategy_parse_and_display() {
        assert_eq!("use_all".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::UseAll);
        assert_eq!(SelectionStrategy::SmallestFirst.to_string(), "smallest_first");
        let err = "largest".parse::<SelectionStrategy>().unwrap_err();
        assert_eq!(err, WalletError::InvalidArgument("unknown selection strategy: largest".into()));
        assert_eq!(err.code(), "invalid_argument");
    }

    proptest! {
        #[test]
        fn selection_is_deterministic(
            values in proptest::collection::vec(1u64..10_000, 1..30),
            amount in 1u64..50_000,
            use_all in any::<bool>(),
        ) {
            let l = ledger_of(&values);
            let strategy = if use_all { SelectionStrategy::UseAll } else { SelectionStrategy::SmallestFirst };
            let a = selector().select(&l, amount, strategy);
            let b = selector().select(&l.clone(), amount, strategy);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn successful_selection_balances(
            values in proptest::collection::vec(1u64..10_000, 1..30),
            amount in 1u64..50_000,
        ) {
            let l = ledger_of(&values);
            if let Ok(s) = selector().select(&l, amount, SelectionStrategy::SmallestFirst) {
                prop_assert_eq!(s.total, s.amount + s.fee + s.change);
                prop_assert!(s.fee >= tx_fee(s.inputs.len(), s.num_outputs(), 1, 1));
                prop_assert!(s.fee <= tx_fee(s.inputs.len(), 2, 1, 1));
            }
        }
    }
}
