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

//! Payments: one authorization/capture flow against an instruction.
//!
//! State machine:
//!
//! ```text
//! New ──► Approving ──► Approved | ApproveFailed
//! Approved ──► Depositing ──► Deposited | DepositFailed
//!                        └──► Approved            (partial capture)
//! Approved ──reverse_approval──► New              (approval fully reversed)
//! Deposited ──reverse_deposit──► Approved         (deposit fully reversed)
//! New | Approved ──expire──► Expired
//! ```
//!
//! The transient `Approving`/`Depositing` states only exist inside a unit
//! of work; the row lock guarantees no other unit of work ever observes
//! them. Transitions outside this graph fail with
//! [`PaymentError::IllegalStateTransition`].

use crate::base::{InstructionId, PaymentId};
use crate::error::PaymentError;
use crate::transaction::FinancialTransaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentState {
    New,
    Approving,
    Approved,
    ApproveFailed,
    Depositing,
    Deposited,
    DepositFailed,
    Expired,
}

/// One authorization/capture flow, owning its chronological ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    instruction_id: InstructionId,
    requested_amount: Decimal,
    approved_amount: Decimal,
    deposited_amount: Decimal,
    credited_amount: Decimal,
    reversed_approval_amount: Decimal,
    reversed_deposit_amount: Decimal,
    state: PaymentState,
    transactions: Vec<FinancialTransaction>,
}

impl Payment {
    pub(crate) fn new(id: PaymentId, instruction_id: InstructionId, requested_amount: Decimal) -> Self {
        Self {
            id,
            instruction_id,
            requested_amount,
            approved_amount: Decimal::ZERO,
            deposited_amount: Decimal::ZERO,
            credited_amount: Decimal::ZERO,
            reversed_approval_amount: Decimal::ZERO,
            reversed_deposit_amount: Decimal::ZERO,
            state: PaymentState::New,
            transactions: Vec::new(),
        }
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn instruction_id(&self) -> InstructionId {
        self.instruction_id
    }

    pub fn requested_amount(&self) -> Decimal {
        self.requested_amount
    }

    /// Currently approved amount, net of reversals.
    pub fn approved_amount(&self) -> Decimal {
        self.approved_amount
    }

    /// Currently deposited amount, net of reversals.
    pub fn deposited_amount(&self) -> Decimal {
        self.deposited_amount
    }

    /// Amount credited back through dependent credits.
    pub fn credited_amount(&self) -> Decimal {
        self.credited_amount
    }

    pub fn reversed_approval_amount(&self) -> Decimal {
        self.reversed_approval_amount
    }

    pub fn reversed_deposit_amount(&self) -> Decimal {
        self.reversed_deposit_amount
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    /// Ledger entries in chronological order, oldest first.
    pub fn transactions(&self) -> &[FinancialTransaction] {
        &self.transactions
    }

    /// Deposited amount still available to dependent credits.
    pub fn creditable_amount(&self) -> Decimal {
        self.deposited_amount - self.credited_amount
    }

    /// Marks a stale authorization as expired. Valid from `New` and
    /// `Approved`; invoked by housekeeping outside this crate, never by
    /// the operation engine.
    pub fn expire(&mut self) -> Result<(), PaymentError> {
        match self.state {
            PaymentState::New | PaymentState::Approved => {
                self.state = PaymentState::Expired;
                Ok(())
            }
            _ => Err(PaymentError::IllegalStateTransition),
        }
    }

    /// Moves the state along one edge of the transition graph.
    pub(crate) fn transition(&mut self, next: PaymentState) -> Result<(), PaymentError> {
        use PaymentState::*;
        let allowed = matches!(
            (self.state, next),
            (New, Approving)
                | (Approving, Approved)
                | (Approving, ApproveFailed)
                | (Approving, Deposited) // one-step approve-and-deposit
                | (Approved, Depositing)
                | (Depositing, Deposited)
                | (Depositing, DepositFailed)
                | (Depositing, Approved) // partial capture
                | (Approved, New) // approval fully reversed
                | (Deposited, Approved) // deposit fully reversed
        );
        if !allowed {
            return Err(PaymentError::IllegalStateTransition);
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn record_approval(&mut self, amount: Decimal) {
        self.approved_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn reverse_approval(&mut self, amount: Decimal) {
        self.approved_amount -= amount;
        self.reversed_approval_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn record_deposit(&mut self, amount: Decimal) {
        self.deposited_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn reverse_deposit(&mut self, amount: Decimal) {
        self.deposited_amount -= amount;
        self.reversed_deposit_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn record_credit(&mut self, amount: Decimal) {
        self.credited_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn release_credit(&mut self, amount: Decimal) {
        self.credited_amount -= amount;
        self.assert_invariants();
    }

    pub(crate) fn push_transaction(&mut self, transaction: FinancialTransaction) {
        self.transactions.push(transaction);
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.approved_amount >= Decimal::ZERO,
            "Invariant violated: approved amount went negative: {}",
            self.approved_amount
        );
        debug_assert!(
            self.deposited_amount >= Decimal::ZERO,
            "Invariant violated: deposited amount went negative: {}",
            self.deposited_amount
        );
        debug_assert!(
            self.deposited_amount <= self.approved_amount,
            "Invariant violated: deposited {} exceeds approved {}",
            self.deposited_amount,
            self.approved_amount
        );
        debug_assert!(
            self.credited_amount <= self.deposited_amount,
            "Invariant violated: credited {} exceeds deposited {}",
            self.credited_amount,
            self.deposited_amount
        );
    }
}
