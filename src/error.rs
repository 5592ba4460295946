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

//! Error types for payment orchestration.
//!
//! Structural problems (missing entities, capacity violations, illegal
//! transitions, infrastructure failures) are reported through
//! [`PaymentError`]. A processor *decline* is not an error: it is recorded
//! as a `Failure`-state ledger entry inside a successful result.

use crate::base::{CreditId, InstructionId, PaymentId};
use thiserror::Error;

/// Payment orchestration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// No payment exists for the given identifier
    #[error("payment {0} was not found")]
    PaymentNotFound(PaymentId),

    /// No credit exists for the given identifier
    #[error("credit {0} was not found")]
    CreditNotFound(CreditId),

    /// No payment instruction exists for the given identifier
    #[error("payment instruction {0} was not found")]
    InstructionNotFound(InstructionId),

    /// No processor is registered for the instruction's payment system
    #[error("no processor is registered for payment system {0:?}")]
    ProcessorNotFound(String),

    /// Amount is not positive or violates a remaining-capacity bound
    #[error("invalid amount (must be positive and within remaining capacity)")]
    InvalidAmount,

    /// Operation is not permitted in the entity's current state
    #[error("operation is not valid in the entity's current state")]
    IllegalStateTransition,

    /// Instruction is closed; no new financial exposure may be created
    #[error("payment instruction is closed")]
    InstructionClosed,

    /// Processor lacks a capability that is mandatory for this operation
    #[error("processor does not support the required capability")]
    CapabilityNotSupported,

    /// Processor failed outright (not a decline; nothing was recorded)
    #[error("processor failure: {0}")]
    ProcessorFailure(String),

    /// Infrastructure-level failure (lock timeout, commit conflict)
    #[error("operation failed: {0}")]
    OperationFailed(String),
}
