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

//! Transactional orchestrator: the public operation surface.
//!
//! Every mutating operation has the same shape: begin a unit of work,
//! fetch-and-lock the aggregate (refreshing it through a queryable
//! processor when one is available), run the operation engine, persist
//! every touched entity plus the new ledger entry, commit. On any failure
//! the unit of work is rolled back, the store session is discarded so no
//! possibly-stale cached state can be reused, and the original error
//! propagates unchanged.
//!
//! Row locks are acquired in a fixed order — credit, then payment, then
//! instruction — so concurrent operations cannot form a lock cycle.

use crate::base::{CreditId, InstructionId, PaymentId, TransactionId};
use crate::credit::Credit;
use crate::engine;
use crate::error::PaymentError;
use crate::instruction::PaymentInstruction;
use crate::payment::Payment;
use crate::processor::{Processor, ProcessorError, ProcessorRegistry};
use crate::store::{InMemoryStore, PaymentStore, UnitOfWork};
use crate::transaction::FinancialTransaction;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a payment operation. All three entities were persisted
/// together in the same unit of work; the ledger entry's processing state
/// tells declined from settled.
#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub payment: Payment,
    pub instruction: PaymentInstruction,
    pub transaction: FinancialTransaction,
}

/// Result of a credit operation.
#[derive(Debug, Clone)]
pub struct CreditResult {
    pub credit: Credit,
    pub instruction: PaymentInstruction,
    pub transaction: FinancialTransaction,
}

type PaymentOperation = fn(
    &mut Payment,
    &mut PaymentInstruction,
    &dyn Processor,
    Decimal,
    TransactionId,
) -> Result<FinancialTransaction, PaymentError>;

type CreditOperation = fn(
    &mut Credit,
    Option<&mut Payment>,
    &mut PaymentInstruction,
    &dyn Processor,
    Decimal,
    TransactionId,
) -> Result<FinancialTransaction, PaymentError>;

/// Orchestrates payment operations against an injected store and
/// processor registry.
pub struct PaymentController<S: PaymentStore = InMemoryStore> {
    store: S,
    processors: ProcessorRegistry,
}

impl PaymentController {
    /// Controller over a fresh in-memory store.
    pub fn new(processors: ProcessorRegistry) -> Self {
        Self::with_store(InMemoryStore::new(), processors)
    }
}

impl<S: PaymentStore> PaymentController<S> {
    pub fn with_store(store: S, processors: ProcessorRegistry) -> Self {
        Self { store, processors }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates and persists a new payment instruction.
    ///
    /// # Errors
    ///
    /// Fails with [`PaymentError::InvalidAmount`] for a non-positive
    /// amount.
    pub fn create_payment_instruction(
        &self,
        amount: Decimal,
        currency: impl Into<String>,
        payment_system: impl Into<String>,
    ) -> Result<PaymentInstruction, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        let currency = currency.into();
        let payment_system = payment_system.into();
        self.transactional("create_payment_instruction", |uow| {
            let id = uow.allocate_instruction_id();
            let instruction = PaymentInstruction::new(id, amount, currency, payment_system);
            uow.insert_instruction(instruction.clone());
            Ok(instruction)
        })
    }

    /// Creates a new payment under an open instruction.
    pub fn create_payment(
        &self,
        instruction_id: InstructionId,
        amount: Decimal,
    ) -> Result<Payment, PaymentError> {
        self.transactional("create_payment", |uow| {
            let instruction = uow.fetch_instruction(instruction_id)?;
            let payment = engine::create_payment(uow.allocate_payment_id(), &instruction, amount)?;
            uow.insert_payment(payment.clone());
            Ok(payment)
        })
    }

    /// Closes the instruction; idempotent. No new payments, credits, or
    /// exposure-creating operations are permitted afterwards.
    pub fn close_payment_instruction(
        &self,
        instruction_id: InstructionId,
    ) -> Result<PaymentInstruction, PaymentError> {
        self.transactional("close_payment_instruction", |uow| {
            let mut instruction = uow.fetch_instruction(instruction_id)?;
            instruction.close();
            uow.persist_instruction(&instruction);
            Ok(instruction)
        })
    }

    /// Authorizes `amount` against the payment.
    pub fn approve(&self, payment_id: PaymentId, amount: Decimal) -> Result<PaymentResult, PaymentError> {
        self.payment_operation("approve", payment_id, amount, engine::approve)
    }

    /// Authorizes and captures `amount` in one step.
    pub fn approve_and_deposit(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
    ) -> Result<PaymentResult, PaymentError> {
        self.payment_operation("approve_and_deposit", payment_id, amount, engine::approve_and_deposit)
    }

    /// Captures `amount` of a previously approved payment.
    pub fn deposit(&self, payment_id: PaymentId, amount: Decimal) -> Result<PaymentResult, PaymentError> {
        self.payment_operation("deposit", payment_id, amount, engine::deposit)
    }

    /// Voids `amount` of the payment's authorization.
    pub fn reverse_approval(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
    ) -> Result<PaymentResult, PaymentError> {
        self.payment_operation("reverse_approval", payment_id, amount, engine::reverse_approval)
    }

    /// Undoes `amount` of the payment's captures.
    pub fn reverse_deposit(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
    ) -> Result<PaymentResult, PaymentError> {
        self.payment_operation("reverse_deposit", payment_id, amount, engine::reverse_deposit)
    }

    /// Creates a credit refunding part of a payment's deposited amount.
    pub fn create_dependent_credit(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
    ) -> Result<Credit, PaymentError> {
        self.transactional("create_dependent_credit", |uow| {
            let (payment, instruction, _) = self.load_payment(uow, payment_id)?;
            let credit =
                engine::create_dependent_credit(uow.allocate_credit_id(), &payment, &instruction, amount)?;
            uow.persist_payment(&payment);
            uow.persist_instruction(&instruction);
            uow.insert_credit(credit.clone());
            Ok(credit)
        })
    }

    /// Creates a credit against the instruction directly.
    pub fn create_independent_credit(
        &self,
        instruction_id: InstructionId,
        amount: Decimal,
    ) -> Result<Credit, PaymentError> {
        self.transactional("create_independent_credit", |uow| {
            let instruction = uow.fetch_instruction(instruction_id)?;
            let credit =
                engine::create_independent_credit(uow.allocate_credit_id(), &instruction, amount)?;
            uow.persist_instruction(&instruction);
            uow.insert_credit(credit.clone());
            Ok(credit)
        })
    }

    /// Pays out `amount` of the credit.
    pub fn credit(&self, credit_id: CreditId, amount: Decimal) -> Result<CreditResult, PaymentError> {
        self.credit_operation("credit", credit_id, amount, engine::credit)
    }

    /// Undoes `amount` of the credit's payout.
    pub fn reverse_credit(
        &self,
        credit_id: CreditId,
        amount: Decimal,
    ) -> Result<CreditResult, PaymentError> {
        self.credit_operation("reverse_credit", credit_id, amount, engine::reverse_credit)
    }

    /// Fetches a payment, refreshing it through the processor when the
    /// processor is queryable. A refreshed payment is persisted and
    /// committed; a processor without the query capability leaves the
    /// stored state untouched and raises no error.
    pub fn get_payment(&self, payment_id: PaymentId) -> Result<Payment, PaymentError> {
        self.transactional("get_payment", |uow| {
            let (payment, _, _) = self.load_payment(uow, payment_id)?;
            Ok(payment)
        })
    }

    /// Fetches a credit; same refresh semantics as [`get_payment`](Self::get_payment).
    pub fn get_credit(&self, credit_id: CreditId) -> Result<Credit, PaymentError> {
        self.transactional("get_credit", |uow| {
            let (credit, _, _, _) = self.load_credit(uow, credit_id)?;
            Ok(credit)
        })
    }

    /// Fetches an instruction as stored; no processor involvement.
    pub fn get_payment_instruction(
        &self,
        instruction_id: InstructionId,
    ) -> Result<PaymentInstruction, PaymentError> {
        self.transactional("get_payment_instruction", |uow| uow.fetch_instruction(instruction_id))
    }

    /// Runs `f` inside one atomic unit of work. On failure the unit of
    /// work is rolled back and the store session discarded before the
    /// error propagates, so no stale cached state survives.
    fn transactional<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut S::Uow) -> Result<T, PaymentError>,
    ) -> Result<T, PaymentError> {
        let mut uow = self.store.begin();
        match f(&mut uow) {
            Ok(value) => match uow.commit() {
                Ok(()) => {
                    debug!(operation, "committed");
                    Ok(value)
                }
                Err(error) => {
                    self.store.discard_session();
                    warn!(operation, %error, "commit failed, session discarded");
                    Err(error)
                }
            },
            Err(error) => {
                uow.rollback();
                self.store.discard_session();
                debug!(operation, %error, "rolled back");
                Err(error)
            }
        }
    }

    fn payment_operation(
        &self,
        operation: &'static str,
        payment_id: PaymentId,
        amount: Decimal,
        op: PaymentOperation,
    ) -> Result<PaymentResult, PaymentError> {
        debug!(operation, %payment_id, %amount, "payment operation requested");
        self.transactional(operation, |uow| {
            let (mut payment, mut instruction, processor) = self.load_payment(uow, payment_id)?;
            let entry_id = uow.allocate_transaction_id();
            let transaction =
                op(&mut payment, &mut instruction, processor.as_ref(), amount, entry_id)?;
            uow.persist_payment(&payment);
            uow.persist_instruction(&instruction);
            uow.persist_transaction(&transaction);
            Ok(PaymentResult {
                payment,
                instruction,
                transaction,
            })
        })
    }

    fn credit_operation(
        &self,
        operation: &'static str,
        credit_id: CreditId,
        amount: Decimal,
        op: CreditOperation,
    ) -> Result<CreditResult, PaymentError> {
        debug!(operation, %credit_id, %amount, "credit operation requested");
        self.transactional(operation, |uow| {
            let (mut credit, mut payment, mut instruction, processor) =
                self.load_credit(uow, credit_id)?;
            let entry_id = uow.allocate_transaction_id();
            let transaction = op(
                &mut credit,
                payment.as_mut(),
                &mut instruction,
                processor.as_ref(),
                amount,
                entry_id,
            )?;
            uow.persist_credit(&credit);
            if let Some(payment) = &payment {
                uow.persist_payment(payment);
            }
            uow.persist_instruction(&instruction);
            uow.persist_transaction(&transaction);
            Ok(CreditResult {
                credit,
                instruction,
                transaction,
            })
        })
    }

    /// Locked fetch of a payment aggregate with optional external
    /// refresh. Only [`ProcessorError::CapabilityNotSupported`] is
    /// swallowed here — and only for the refresh call; anything else the
    /// processor raises must surface.
    fn load_payment(
        &self,
        uow: &mut S::Uow,
        payment_id: PaymentId,
    ) -> Result<(Payment, PaymentInstruction, Arc<dyn Processor>), PaymentError> {
        let mut payment = uow.fetch_payment(payment_id)?;
        let instruction = uow.fetch_instruction(payment.instruction_id())?;
        let processor = self.processors.resolve(instruction.payment_system())?;
        match processor.update_payment(&mut payment) {
            Ok(()) => uow.persist_payment(&payment),
            Err(ProcessorError::CapabilityNotSupported) => {}
            Err(error) => return Err(error.into()),
        }
        Ok((payment, instruction, processor))
    }

    /// Locked fetch of a credit aggregate (and its payment, for
    /// dependent credits) with the same refresh semantics as
    /// [`load_payment`](Self::load_payment). Rows are acquired credit
    /// first, then payment, then instruction.
    fn load_credit(
        &self,
        uow: &mut S::Uow,
        credit_id: CreditId,
    ) -> Result<(Credit, Option<Payment>, PaymentInstruction, Arc<dyn Processor>), PaymentError> {
        let mut credit = uow.fetch_credit(credit_id)?;
        let payment = credit
            .payment_id()
            .map(|payment_id| uow.fetch_payment(payment_id))
            .transpose()?;
        let instruction = uow.fetch_instruction(credit.instruction_id())?;
        let processor = self.processors.resolve(instruction.payment_system())?;
        match processor.update_credit(&mut credit) {
            Ok(()) => uow.persist_credit(&credit),
            Err(ProcessorError::CapabilityNotSupported) => {}
            Err(error) => return Err(error.into()),
        }
        Ok((credit, payment, instruction, processor))
    }
}
