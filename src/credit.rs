// SPDX-License-Identifier: AGPL-3.0-or-later
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Credits: refunds and payouts.
//!
//! A credit is either *dependent* on a payment (bounded by that payment's
//! deposited-minus-already-credited amount) or *independent* against the
//! instruction directly. The state machine mirrors the payment's capture
//! flow: `New ──► Crediting ──► Credited | CreditFailed`, with a partial
//! credit falling back to `New` and a full reversal returning `Credited`
//! to `New`.

use crate::base::{CreditId, InstructionId, PaymentId};
use crate::error::PaymentError;
use crate::transaction::FinancialTransaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditState {
    New,
    Crediting,
    Credited,
    CreditFailed,
}

/// A refund/payout, owning its chronological ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    id: CreditId,
    instruction_id: InstructionId,
    payment_id: Option<PaymentId>,
    target_amount: Decimal,
    credited_amount: Decimal,
    reversed_amount: Decimal,
    state: CreditState,
    transactions: Vec<FinancialTransaction>,
}

impl Credit {
    pub(crate) fn new(
        id: CreditId,
        instruction_id: InstructionId,
        payment_id: Option<PaymentId>,
        target_amount: Decimal,
    ) -> Self {
        Self {
            id,
            instruction_id,
            payment_id,
            target_amount,
            credited_amount: Decimal::ZERO,
            reversed_amount: Decimal::ZERO,
            state: CreditState::New,
            transactions: Vec::new(),
        }
    }

    pub fn id(&self) -> CreditId {
        self.id
    }

    pub fn instruction_id(&self) -> InstructionId {
        self.instruction_id
    }

    /// The payment this credit depends on; `None` for independent credits.
    pub fn payment_id(&self) -> Option<PaymentId> {
        self.payment_id
    }

    pub fn is_dependent(&self) -> bool {
        self.payment_id.is_some()
    }

    pub fn target_amount(&self) -> Decimal {
        self.target_amount
    }

    /// Amount credited so far, net of reversals.
    pub fn credited_amount(&self) -> Decimal {
        self.credited_amount
    }

    pub fn reversed_amount(&self) -> Decimal {
        self.reversed_amount
    }

    pub fn state(&self) -> CreditState {
        self.state
    }

    /// Ledger entries in chronological order, oldest first.
    pub fn transactions(&self) -> &[FinancialTransaction] {
        &self.transactions
    }

    /// Target amount not yet credited.
    pub fn remaining_amount(&self) -> Decimal {
        self.target_amount - self.credited_amount
    }

    pub(crate) fn transition(&mut self, next: CreditState) -> Result<(), PaymentError> {
        use CreditState::*;
        let allowed = matches!(
            (self.state, next),
            (New, Crediting)
                | (Crediting, Credited)
                | (Crediting, CreditFailed)
                | (Crediting, New) // partial credit, retryable
                | (Credited, New) // credit fully reversed
        );
        if !allowed {
            return Err(PaymentError::IllegalStateTransition);
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn record_credit(&mut self, amount: Decimal) {
        self.credited_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn reverse_credit(&mut self, amount: Decimal) {
        self.credited_amount -= amount;
        self.reversed_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn push_transaction(&mut self, transaction: FinancialTransaction) {
        self.transactions.push(transaction);
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.credited_amount >= Decimal::ZERO,
            "Invariant violated: credited amount went negative: {}",
            self.credited_amount
        );
        debug_assert!(
            self.credited_amount <= self.target_amount,
            "Invariant violated: credited {} exceeds target {}",
            self.credited_amount,
            self.target_amount
        );
    }
}
