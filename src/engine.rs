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

//! Operation engine: pure business logic per operation.
//!
//! Each function takes the locked aggregate entities by `&mut`, validates
//! amount, instruction state, payment/credit state, and capacity — in that
//! order, before any ledger entry is created or any processor call is
//! made — then delegates to the processor capability, updates running
//! totals and state, and appends exactly one [`FinancialTransaction`] to
//! the owning entity.
//!
//! A processor *decline* finalizes a `Failure` ledger entry and moves the
//! entity to its failed state; it is returned as data. A processor *error*
//! (missing capability, gateway fault) propagates; the caller must discard
//! the staged entities via rollback, since the transient `Approving`/
//! `Depositing`/`Crediting` state may already have been entered.

use crate::base::{CreditId, PaymentId, TransactionId};
use crate::credit::{Credit, CreditState};
use crate::error::PaymentError;
use crate::instruction::PaymentInstruction;
use crate::payment::{Payment, PaymentState};
use crate::processor::{Processor, ProcessorOutcome};
use crate::transaction::{FinancialTransaction, TransactionKind};
use rust_decimal::Decimal;

fn ensure_positive(amount: Decimal) -> Result<(), PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount);
    }
    Ok(())
}

fn ensure_open(instruction: &PaymentInstruction) -> Result<(), PaymentError> {
    if !instruction.is_open() {
        return Err(PaymentError::InstructionClosed);
    }
    Ok(())
}

/// Checks the amount the processor reports as settled. A gateway must
/// never settle more than was requested of it.
fn settled_amount(requested: Decimal, processed: Decimal) -> Result<Decimal, PaymentError> {
    if processed > requested || processed < Decimal::ZERO {
        return Err(PaymentError::ProcessorFailure(format!(
            "processor settled {processed}, requested {requested}"
        )));
    }
    Ok(processed)
}

/// Builds a new payment against an open instruction.
pub fn create_payment(
    id: PaymentId,
    instruction: &PaymentInstruction,
    amount: Decimal,
) -> Result<Payment, PaymentError> {
    ensure_positive(amount)?;
    ensure_open(instruction)?;
    if amount > instruction.amount() {
        return Err(PaymentError::InvalidAmount);
    }
    Ok(Payment::new(id, instruction.id(), amount))
}

/// Authorizes `amount` against the payment.
pub fn approve(
    payment: &mut Payment,
    instruction: &mut PaymentInstruction,
    processor: &dyn Processor,
    amount: Decimal,
    entry_id: TransactionId,
) -> Result<FinancialTransaction, PaymentError> {
    ensure_positive(amount)?;
    ensure_open(instruction)?;
    if payment.state() != PaymentState::New {
        return Err(PaymentError::IllegalStateTransition);
    }
    if amount > payment.requested_amount() || amount > instruction.remaining_approval_capacity() {
        return Err(PaymentError::InvalidAmount);
    }

    payment.transition(PaymentState::Approving)?;
    let mut entry = FinancialTransaction::new(entry_id, TransactionKind::Approve, amount);

    match processor.approve(payment, amount)? {
        ProcessorOutcome::Success {
            processed_amount,
            response_code,
        } => {
            let processed = settled_amount(amount, processed_amount)?;
            entry.succeed(processed, response_code);
            payment.record_approval(processed);
            instruction.record_approval(processed);
            payment.transition(PaymentState::Approved)?;
        }
        ProcessorOutcome::Declined { reason_code } => {
            entry.decline(reason_code);
            payment.transition(PaymentState::ApproveFailed)?;
        }
    }

    payment.push_transaction(entry.clone());
    Ok(entry)
}

/// One-step sale: authorizes and captures `amount` in a single processor
/// call, recording a single `Deposit`-kind ledger entry. A decline yields
/// `ApproveFailed`, since no authorization was obtained.
pub fn approve_and_deposit(
    payment: &mut Payment,
    instruction: &mut PaymentInstruction,
    processor: &dyn Processor,
    amount: Decimal,
    entry_id: TransactionId,
) -> Result<FinancialTransaction, PaymentError> {
    ensure_positive(amount)?;
    ensure_open(instruction)?;
    if payment.state() != PaymentState::New {
        return Err(PaymentError::IllegalStateTransition);
    }
    if amount > payment.requested_amount() || amount > instruction.remaining_approval_capacity() {
        return Err(PaymentError::InvalidAmount);
    }

    payment.transition(PaymentState::Approving)?;
    let mut entry = FinancialTransaction::new(entry_id, TransactionKind::Deposit, amount);

    match processor.approve_and_deposit(payment, amount)? {
        ProcessorOutcome::Success {
            processed_amount,
            response_code,
        } => {
            let processed = settled_amount(amount, processed_amount)?;
            entry.succeed(processed, response_code);
            payment.record_approval(processed);
            payment.record_deposit(processed);
            instruction.record_approval(processed);
            instruction.record_deposit(processed);
            payment.transition(PaymentState::Deposited)?;
        }
        ProcessorOutcome::Declined { reason_code } => {
            entry.decline(reason_code);
            payment.transition(PaymentState::ApproveFailed)?;
        }
    }

    payment.push_transaction(entry.clone());
    Ok(entry)
}

/// Captures `amount` of a previously approved payment. The payment moves
/// to `Deposited` once the full approved amount has been captured; a
/// partial capture leaves it `Approved` for further deposits.
pub fn deposit(
    payment: &mut Payment,
    instruction: &mut PaymentInstruction,
    processor: &dyn Processor,
    amount: Decimal,
    entry_id: TransactionId,
) -> Result<FinancialTransaction, PaymentError> {
    ensure_positive(amount)?;
    ensure_open(instruction)?;
    if payment.state() != PaymentState::Approved {
        return Err(PaymentError::IllegalStateTransition);
    }
    if amount > payment.approved_amount() - payment.deposited_amount() {
        return Err(PaymentError::InvalidAmount);
    }

    payment.transition(PaymentState::Depositing)?;
    let mut entry = FinancialTransaction::new(entry_id, TransactionKind::Deposit, amount);

    match processor.deposit(payment, amount)? {
        ProcessorOutcome::Success {
            processed_amount,
            response_code,
        } => {
            let processed = settled_amount(amount, processed_amount)?;
            entry.succeed(processed, response_code);
            payment.record_deposit(processed);
            instruction.record_deposit(processed);
            let next = if payment.deposited_amount() == payment.approved_amount() {
                PaymentState::Deposited
            } else {
                PaymentState::Approved
            };
            payment.transition(next)?;
        }
        ProcessorOutcome::Declined { reason_code } => {
            entry.decline(reason_code);
            payment.transition(PaymentState::DepositFailed)?;
        }
    }

    payment.push_transaction(entry.clone());
    Ok(entry)
}

/// Voids `amount` of the payment's authorization. The payment returns to
/// `New` once the approved amount reaches zero. Permitted on closed
/// instructions: a reversal only reduces exposure.
pub fn reverse_approval(
    payment: &mut Payment,
    instruction: &mut PaymentInstruction,
    processor: &dyn Processor,
    amount: Decimal,
    entry_id: TransactionId,
) -> Result<FinancialTransaction, PaymentError> {
    ensure_positive(amount)?;
    if payment.state() != PaymentState::Approved {
        return Err(PaymentError::IllegalStateTransition);
    }
    // Approval backing captured funds cannot be voided.
    if amount > payment.approved_amount() - payment.deposited_amount() {
        return Err(PaymentError::InvalidAmount);
    }

    let mut entry = FinancialTransaction::new(entry_id, TransactionKind::ReverseApproval, amount);

    match processor.reverse_approval(payment, amount)? {
        ProcessorOutcome::Success {
            processed_amount,
            response_code,
        } => {
            let processed = settled_amount(amount, processed_amount)?;
            entry.succeed(processed, response_code);
            payment.reverse_approval(processed);
            instruction.release_approval(processed);
            if payment.approved_amount() == Decimal::ZERO {
                payment.transition(PaymentState::New)?;
            }
        }
        ProcessorOutcome::Declined { reason_code } => {
            entry.decline(reason_code);
        }
    }

    payment.push_transaction(entry.clone());
    Ok(entry)
}

/// Undoes `amount` of the payment's captures. Partial captures keep
/// the payment in `Approved`, so reversal is accepted from either
/// `Deposited` or `Approved` with a non-zero deposited amount. A fully
/// deposited payment returns to `Approved` once the deposited amount
/// reaches zero.
pub fn reverse_deposit(
    payment: &mut Payment,
    instruction: &mut PaymentInstruction,
    processor: &dyn Processor,
    amount: Decimal,
    entry_id: TransactionId,
) -> Result<FinancialTransaction, PaymentError> {
    ensure_positive(amount)?;
    let partially_captured =
        payment.state() == PaymentState::Approved && payment.deposited_amount() > Decimal::ZERO;
    if payment.state() != PaymentState::Deposited && !partially_captured {
        return Err(PaymentError::IllegalStateTransition);
    }
    // Deposits that have already been credited out cannot be undone.
    if amount > payment.deposited_amount() - payment.credited_amount() {
        return Err(PaymentError::InvalidAmount);
    }

    let mut entry = FinancialTransaction::new(entry_id, TransactionKind::ReverseDeposit, amount);

    match processor.reverse_deposit(payment, amount)? {
        ProcessorOutcome::Success {
            processed_amount,
            response_code,
        } => {
            let processed = settled_amount(amount, processed_amount)?;
            entry.succeed(processed, response_code);
            payment.reverse_deposit(processed);
            instruction.release_deposit(processed);
            if payment.state() == PaymentState::Deposited
                && payment.deposited_amount() == Decimal::ZERO
            {
                payment.transition(PaymentState::Approved)?;
            }
        }
        ProcessorOutcome::Declined { reason_code } => {
            entry.decline(reason_code);
        }
    }

    payment.push_transaction(entry.clone());
    Ok(entry)
}

/// Builds a credit dependent on a payment, bounded by the payment's
/// deposited-minus-already-credited amount.
pub fn create_dependent_credit(
    id: CreditId,
    payment: &Payment,
    instruction: &PaymentInstruction,
    amount: Decimal,
) -> Result<Credit, PaymentError> {
    ensure_positive(amount)?;
    ensure_open(instruction)?;
    if amount > payment.creditable_amount() {
        return Err(PaymentError::InvalidAmount);
    }
    Ok(Credit::new(id, instruction.id(), Some(payment.id()), amount))
}

/// Builds a credit against the instruction directly, independent of any
/// payment.
pub fn create_independent_credit(
    id: CreditId,
    instruction: &PaymentInstruction,
    amount: Decimal,
) -> Result<Credit, PaymentError> {
    ensure_positive(amount)?;
    ensure_open(instruction)?;
    Ok(Credit::new(id, instruction.id(), None, amount))
}

/// Pays out `amount` of the credit. For dependent credits `payment` must
/// be the owning payment; its credited total moves with the credit's.
pub fn credit(
    credit: &mut Credit,
    mut payment: Option<&mut Payment>,
    instruction: &mut PaymentInstruction,
    processor: &dyn Processor,
    amount: Decimal,
    entry_id: TransactionId,
) -> Result<FinancialTransaction, PaymentError> {
    debug_assert_eq!(credit.payment_id(), payment.as_deref().map(Payment::id));

    ensure_positive(amount)?;
    ensure_open(instruction)?;
    if credit.state() != CreditState::New {
        return Err(PaymentError::IllegalStateTransition);
    }
    if amount > credit.remaining_amount() {
        return Err(PaymentError::InvalidAmount);
    }
    if let Some(payment) = payment.as_deref()
        && amount > payment.creditable_amount()
    {
        return Err(PaymentError::InvalidAmount);
    }

    credit.transition(CreditState::Crediting)?;
    let mut entry = FinancialTransaction::new(entry_id, TransactionKind::Credit, amount);

    match processor.credit(credit, amount)? {
        ProcessorOutcome::Success {
            processed_amount,
            response_code,
        } => {
            let processed = settled_amount(amount, processed_amount)?;
            entry.succeed(processed, response_code);
            credit.record_credit(processed);
            if let Some(payment) = payment.as_deref_mut() {
                payment.record_credit(processed);
            }
            instruction.record_credit(processed);
            let next = if credit.remaining_amount() == Decimal::ZERO {
                CreditState::Credited
            } else {
                CreditState::New
            };
            credit.transition(next)?;
        }
        ProcessorOutcome::Declined { reason_code } => {
            entry.decline(reason_code);
            credit.transition(CreditState::CreditFailed)?;
        }
    }

    credit.push_transaction(entry.clone());
    Ok(entry)
}

/// Undoes `amount` of the credit's payout. The credit returns to `New`
/// once its credited amount reaches zero.
pub fn reverse_credit(
    credit: &mut Credit,
    mut payment: Option<&mut Payment>,
    instruction: &mut PaymentInstruction,
    processor: &dyn Processor,
    amount: Decimal,
    entry_id: TransactionId,
) -> Result<FinancialTransaction, PaymentError> {
    debug_assert_eq!(credit.payment_id(), payment.as_deref().map(Payment::id));

    ensure_positive(amount)?;
    if credit.state() != CreditState::Credited {
        return Err(PaymentError::IllegalStateTransition);
    }
    if amount > credit.credited_amount() {
        return Err(PaymentError::InvalidAmount);
    }

    let mut entry = FinancialTransaction::new(entry_id, TransactionKind::ReverseCredit, amount);

    match processor.reverse_credit(credit, amount)? {
        ProcessorOutcome::Success {
            processed_amount,
            response_code,
        } => {
            let processed = settled_amount(amount, processed_amount)?;
            entry.succeed(processed, response_code);
            credit.reverse_credit(processed);
            if let Some(payment) = payment.as_deref_mut() {
                payment.release_credit(processed);
            }
            instruction.release_credit(processed);
            if credit.credited_amount() == Decimal::ZERO {
                credit.transition(CreditState::New)?;
            }
        }
        ProcessorOutcome::Declined { reason_code } => {
            entry.decline(reason_code);
        }
    }

    credit.push_transaction(entry.clone());
    Ok(entry)
}
