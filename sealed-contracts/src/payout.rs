//! Public record of what a contract paid out.
//!
//! Transfers themselves belong to the hosting ledger; contracts only record
//! that a payment is due, once per settled reveal.

use sealed_engine::Party;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payment {
    pub to: Party,
    pub amount: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payouts {
    payments: Vec<Payment>,
}

impl Payouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pay(&mut self, to: Party, amount: u128) {
        tracing::info!(%to, amount, "payout recorded");
        self.payments.push(Payment { to, amount });
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn count(&self) -> usize {
        self.payments.len()
    }

    /// total recorded for `party`
    pub fn total_to(&self, party: &Party) -> u128 {
        self.payments
            .iter()
            .filter(|p| &p.to == party)
            .fold(0u128, |acc, p| acc.saturating_add(p.amount))
    }
}
