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

//! # payflow-rs
//!
//! A transactional orchestration core for payment lifecycles:
//! authorization, capture, refund/payout, and reversal, each recorded as
//! an append-only financial transaction and committed as one atomic unit
//! of work under a per-aggregate exclusive lock.
//!
//! ## Core components
//!
//! - [`PaymentController`]: the public operation surface; wraps every
//!   operation in begin / locked fetch / engine / persist-all / commit,
//!   with rollback and session discard on failure
//! - [`Processor`]: capability-based gateway contract; unimplemented
//!   capabilities fail with `CapabilityNotSupported`
//! - [`PaymentInstruction`], [`Payment`], [`Credit`],
//!   [`FinancialTransaction`]: the ledger entities and their state
//!   machines
//! - [`PaymentStore`] / [`UnitOfWork`]: the persistence seam;
//!   [`InMemoryStore`] is the bundled reference implementation
//!
//! ## Example
//!
//! ```
//! use payflow_rs::{
//!     PaymentController, Processor, ProcessorOutcome, ProcessorError,
//!     ProcessorRegistry, Payment, ProcessingState,
//! };
//! use rust_decimal::Decimal;
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! struct AlwaysApproves;
//!
//! impl Processor for AlwaysApproves {
//!     fn approve(
//!         &self,
//!         _payment: &Payment,
//!         amount: Decimal,
//!     ) -> Result<ProcessorOutcome, ProcessorError> {
//!         Ok(ProcessorOutcome::settled(amount))
//!     }
//! }
//!
//! let mut registry = ProcessorRegistry::new();
//! registry.register("acme_psp", Arc::new(AlwaysApproves));
//! let controller = PaymentController::new(registry);
//!
//! let instruction = controller
//!     .create_payment_instruction(dec!(100.00), "EUR", "acme_psp")
//!     .unwrap();
//! let payment = controller.create_payment(instruction.id(), dec!(100.00)).unwrap();
//!
//! let result = controller.approve(payment.id(), dec!(60.00)).unwrap();
//! assert_eq!(result.payment.approved_amount(), dec!(60.00));
//! assert_eq!(result.transaction.state(), ProcessingState::Success);
//! ```
//!
//! ## Concurrency
//!
//! Correctness under concurrent callers is delegated to row-level
//! exclusive locking, not in-process mutual exclusion: operations on the
//! same payment or credit are totally ordered by its row lock, operations
//! on different aggregates are unordered relative to each other, and a
//! unit of work always runs to commit or rollback with no partial effects
//! visible outside it.

pub mod base;
pub mod controller;
pub mod credit;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod journal;
pub mod payment;
pub mod processor;
pub mod store;
pub mod transaction;

pub use base::{CreditId, InstructionId, PaymentId, TransactionId};
pub use controller::{CreditResult, PaymentController, PaymentResult};
pub use credit::{Credit, CreditState};
pub use error::PaymentError;
pub use instruction::{InstructionState, PaymentInstruction};
pub use journal::TransactionJournal;
pub use payment::{Payment, PaymentState};
pub use processor::{Processor, ProcessorError, ProcessorOutcome, ProcessorRegistry};
pub use store::{InMemoryStore, PaymentStore, UnitOfWork};
pub use transaction::{FinancialTransaction, ProcessingState, TransactionKind};
