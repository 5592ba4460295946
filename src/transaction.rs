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

//! Financial transactions: the append-only audit trail.
//!
//! Exactly one [`FinancialTransaction`] is created per orchestrated
//! operation that reaches the processor. Once an entry is finalized to
//! [`ProcessingState::Success`] or [`ProcessingState::Failure`] it is never
//! mutated again; the finalizers are crate-private and assert this.

use crate::base::TransactionId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of monetary operation a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Approve,
    Deposit,
    Credit,
    ReverseApproval,
    ReverseDeposit,
    ReverseCredit,
}

/// Processing state of a ledger entry.
///
/// `Pending` exists for processors that settle asynchronously; this core
/// only ever finalizes entries to `Success` or `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingState {
    New,
    Pending,
    Success,
    Failure,
}

/// Immutable-once-finalized ledger entry recording one attempted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialTransaction {
    id: TransactionId,
    kind: TransactionKind,
    requested_amount: Decimal,
    processed_amount: Decimal,
    state: ProcessingState,
    reason_code: Option<String>,
    response_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl FinancialTransaction {
    pub(crate) fn new(id: TransactionId, kind: TransactionKind, requested_amount: Decimal) -> Self {
        Self {
            id,
            kind,
            requested_amount,
            processed_amount: Decimal::ZERO,
            state: ProcessingState::New,
            reason_code: None,
            response_code: None,
            created_at: Utc::now(),
        }
    }

    /// Finalizes the entry as successful with the amount the processor
    /// actually settled.
    pub(crate) fn succeed(&mut self, processed_amount: Decimal, response_code: Option<String>) {
        debug_assert!(!self.is_final(), "ledger entry finalized twice");
        self.processed_amount = processed_amount;
        self.response_code = response_code;
        self.state = ProcessingState::Success;
    }

    /// Finalizes the entry as declined by the processor.
    pub(crate) fn decline(&mut self, reason_code: String) {
        debug_assert!(!self.is_final(), "ledger entry finalized twice");
        self.reason_code = Some(reason_code);
        self.state = ProcessingState::Failure;
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn requested_amount(&self) -> Decimal {
        self.requested_amount
    }

    /// Amount the processor settled; zero unless the entry succeeded.
    pub fn processed_amount(&self) -> Decimal {
        self.processed_amount
    }

    pub fn state(&self) -> ProcessingState {
        self.state
    }

    pub fn reason_code(&self) -> Option<&str> {
        self.reason_code.as_deref()
    }

    pub fn response_code(&self) -> Option<&str> {
        self.response_code.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the entry has reached a terminal processing state.
    pub fn is_final(&self) -> bool {
        matches!(self.state, ProcessingState::Success | ProcessingState::Failure)
    }
}
