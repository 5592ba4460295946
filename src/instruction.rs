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

//! Payment instructions: the root of the payment aggregate.
//!
//! An instruction authorizes a total amount in one currency against one
//! payment system and owns the payments and credits created beneath it.
//! Running totals are maintained by the operation engine; the mutators are
//! crate-private so totals can never drift outside an orchestrated
//! operation.

use crate::base::InstructionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a payment instruction.
///
/// Once `Closed`, no new payments or credits may be created and no
/// operation that creates new financial exposure is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionState {
    Open,
    Closed,
}

/// Root aggregate for a payment flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstruction {
    id: InstructionId,
    amount: Decimal,
    currency: String,
    payment_system: String,
    state: InstructionState,
    approved_amount: Decimal,
    deposited_amount: Decimal,
    credited_amount: Decimal,
}

impl PaymentInstruction {
    pub(crate) fn new(
        id: InstructionId,
        amount: Decimal,
        currency: impl Into<String>,
        payment_system: impl Into<String>,
    ) -> Self {
        Self {
            id,
            amount,
            currency: currency.into(),
            payment_system: payment_system.into(),
            state: InstructionState::Open,
            approved_amount: Decimal::ZERO,
            deposited_amount: Decimal::ZERO,
            credited_amount: Decimal::ZERO,
        }
    }

    pub fn id(&self) -> InstructionId {
        self.id
    }

    /// Total amount authorized by this instruction.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Name of the payment system; selects the processor in the registry.
    pub fn payment_system(&self) -> &str {
        &self.payment_system
    }

    pub fn state(&self) -> InstructionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == InstructionState::Open
    }

    /// Sum approved across all payments, net of reversals.
    pub fn approved_amount(&self) -> Decimal {
        self.approved_amount
    }

    /// Sum deposited across all payments, net of reversals.
    pub fn deposited_amount(&self) -> Decimal {
        self.deposited_amount
    }

    /// Sum credited across all credits, net of reversals.
    pub fn credited_amount(&self) -> Decimal {
        self.credited_amount
    }

    /// Approval capacity still available under the instruction amount.
    pub fn remaining_approval_capacity(&self) -> Decimal {
        self.amount - self.approved_amount
    }

    /// Closing is idempotent; a closed instruction stays closed.
    pub(crate) fn close(&mut self) {
        self.state = InstructionState::Closed;
    }

    pub(crate) fn record_approval(&mut self, amount: Decimal) {
        self.approved_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn release_approval(&mut self, amount: Decimal) {
        self.approved_amount -= amount;
        self.assert_invariants();
    }

    pub(crate) fn record_deposit(&mut self, amount: Decimal) {
        self.deposited_amount += amount;
        self.assert_invariants();
    }

    pub(crate) fn release_deposit(&mut self, amount: Decimal) {
        self.deposited_amount -= amount;
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

    fn assert_invariants(&self) {
        debug_assert!(
            self.approved_amount >= Decimal::ZERO,
            "Invariant violated: approved total went negative: {}",
            self.approved_amount
        );
        debug_assert!(
            self.approved_amount <= self.amount,
            "Invariant violated: approved total {} exceeds instruction amount {}",
            self.approved_amount,
            self.amount
        );
        debug_assert!(
            self.deposited_amount >= Decimal::ZERO,
            "Invariant violated: deposited total went negative: {}",
            self.deposited_amount
        );
        debug_assert!(
            self.credited_amount >= Decimal::ZERO,
            "Invariant violated: credited total went negative: {}",
            self.credited_amount
        );
    }
}
