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

//! Processor capability interface and registry.
//!
//! A [`Processor`] is an external gateway adapter. Every capability method
//! defaults to [`ProcessorError::CapabilityNotSupported`]; a concrete
//! processor overrides exactly the capabilities it implements. The
//! operation engine treats a missing capability as fatal; only the
//! lookup/refresh path (`update_payment`/`update_credit`) swallows it.

use crate::credit::Credit;
use crate::error::PaymentError;
use crate::payment::Payment;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Terminal outcome of a processor capability invocation.
///
/// A decline is a normal business outcome, recorded as a `Failure`-state
/// ledger entry; it is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorOutcome {
    /// The gateway executed the operation, possibly settling a different
    /// amount than requested.
    Success {
        processed_amount: Decimal,
        response_code: Option<String>,
    },
    /// The gateway refused the operation for a business reason.
    Declined { reason_code: String },
}

impl ProcessorOutcome {
    /// Success settling exactly the requested amount.
    pub fn settled(amount: Decimal) -> Self {
        ProcessorOutcome::Success {
            processed_amount: amount,
            response_code: None,
        }
    }
}

/// Failures a processor can raise instead of returning an outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// The processor does not implement the invoked capability
    #[error("capability not supported by this processor")]
    CapabilityNotSupported,

    /// The gateway call failed outright (network, protocol, unexpected)
    #[error("processor failed: {0}")]
    Failed(String),
}

impl From<ProcessorError> for PaymentError {
    fn from(error: ProcessorError) -> Self {
        match error {
            ProcessorError::CapabilityNotSupported => PaymentError::CapabilityNotSupported,
            ProcessorError::Failed(message) => PaymentError::ProcessorFailure(message),
        }
    }
}

/// Capability-based gateway contract.
///
/// The entity references passed to the monetary capabilities are read-only
/// context (card references, external ids carried by earlier ledger
/// entries); all bookkeeping happens in the operation engine.
pub trait Processor: Send + Sync {
    /// Authorizes `amount` against the payment.
    fn approve(&self, _payment: &Payment, _amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }

    /// One-step sale: authorizes and captures `amount` in a single call.
    fn approve_and_deposit(
        &self,
        _payment: &Payment,
        _amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }

    /// Captures `amount` of a previously approved payment.
    fn deposit(&self, _payment: &Payment, _amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }

    /// Pays out `amount` for the credit.
    fn credit(&self, _credit: &Credit, _amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }

    /// Voids `amount` of an authorization.
    fn reverse_approval(
        &self,
        _payment: &Payment,
        _amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }

    /// Undoes `amount` of a capture.
    fn reverse_deposit(
        &self,
        _payment: &Payment,
        _amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }

    /// Undoes `amount` of a payout.
    fn reverse_credit(
        &self,
        _credit: &Credit,
        _amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }

    /// Reconciles the payment with the state the gateway observes.
    /// Only queryable processors implement this.
    fn update_payment(&self, _payment: &mut Payment) -> Result<(), ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }

    /// Reconciles the credit with the state the gateway observes.
    fn update_credit(&self, _credit: &mut Credit) -> Result<(), ProcessorError> {
        Err(ProcessorError::CapabilityNotSupported)
    }
}

/// Resolves processors by payment-system name.
///
/// Built once at startup and handed to the controller; registration after
/// construction is not supported, which keeps resolution lock-free.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, payment_system: impl Into<String>, processor: Arc<dyn Processor>) {
        self.processors.insert(payment_system.into(), processor);
    }

    /// # Errors
    ///
    /// Returns [`PaymentError::ProcessorNotFound`] if no processor is
    /// registered under `payment_system`.
    pub fn resolve(&self, payment_system: &str) -> Result<Arc<dyn Processor>, PaymentError> {
        self.processors
            .get(payment_system)
            .cloned()
            .ok_or_else(|| PaymentError::ProcessorNotFound(payment_system.to_string()))
    }
}
