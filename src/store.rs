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

//! Persistence store contract and in-memory reference implementation.
//!
//! The controller talks to the store exclusively through [`PaymentStore`]
//! and [`UnitOfWork`]: begin, locked fetch-by-id, persist, commit or
//! rollback, discard-session. A fetch takes the row's exclusive lock and
//! holds it until the unit of work ends, which serializes all operations
//! on the same aggregate; this is the sole blocking point in the crate.
//!
//! [`InMemoryStore`] is the bundled reference implementation: [`DashMap`]
//! tables of `Arc<Mutex<row>>`, owned row guards held by the unit of work,
//! staged copies written back under the held guards on commit and simply
//! dropped on rollback. Writes therefore become visible all at once or not
//! at all.
//!
//! Lock discipline: rows must be acquired in a fixed order — credit, then
//! payment, then instruction — which makes lock cycles impossible. The
//! controller follows this order; a unit of work never needs more than one
//! row of each kind.

use crate::base::{CreditId, InstructionId, PaymentId, TransactionId};
use crate::credit::Credit;
use crate::error::PaymentError;
use crate::instruction::PaymentInstruction;
use crate::journal::TransactionJournal;
use crate::payment::Payment;
use crate::transaction::FinancialTransaction;
use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::lock_api::ArcMutexGuard;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Factory for units of work, plus the post-rollback session hook.
pub trait PaymentStore: Send + Sync {
    type Uow: UnitOfWork;

    /// Begins a new atomic unit of work.
    fn begin(&self) -> Self::Uow;

    /// Discards any in-memory session cache after a rollback, forcing
    /// subsequent fetches to re-read from the store. ORM-backed stores
    /// drop their identity map here; [`InMemoryStore`] keeps no cache
    /// between units of work, so its implementation is a no-op.
    fn discard_session(&self);
}

/// One atomic begin/commit/rollback boundary.
///
/// Fetches return a private working copy of the row and hold its
/// exclusive lock until the unit of work ends. `persist_*` stages the
/// copy for write-back; nothing is visible outside the unit of work
/// until [`commit`](UnitOfWork::commit) succeeds.
pub trait UnitOfWork {
    /// Locked fetch. Fails with `InstructionNotFound` if absent.
    fn fetch_instruction(&mut self, id: InstructionId) -> Result<PaymentInstruction, PaymentError>;

    /// Locked fetch. Fails with `PaymentNotFound` if absent.
    fn fetch_payment(&mut self, id: PaymentId) -> Result<Payment, PaymentError>;

    /// Locked fetch. Fails with `CreditNotFound` if absent.
    fn fetch_credit(&mut self, id: CreditId) -> Result<Credit, PaymentError>;

    /// Stages a newly created instruction for insertion on commit.
    fn insert_instruction(&mut self, instruction: PaymentInstruction);

    /// Stages a newly created payment for insertion on commit.
    fn insert_payment(&mut self, payment: Payment);

    /// Stages a newly created credit for insertion on commit.
    fn insert_credit(&mut self, credit: Credit);

    /// Stages an updated instruction for write-back on commit.
    fn persist_instruction(&mut self, instruction: &PaymentInstruction);

    /// Stages an updated payment for write-back on commit.
    fn persist_payment(&mut self, payment: &Payment);

    /// Stages an updated credit for write-back on commit.
    fn persist_credit(&mut self, credit: &Credit);

    /// Stages a ledger entry for the store's append-only audit index.
    fn persist_transaction(&mut self, transaction: &FinancialTransaction);

    fn allocate_instruction_id(&mut self) -> InstructionId;
    fn allocate_payment_id(&mut self) -> PaymentId;
    fn allocate_credit_id(&mut self) -> CreditId;
    fn allocate_transaction_id(&mut self) -> TransactionId;

    /// Atomically publishes every staged write, then releases all row
    /// locks. On error nothing has been published.
    fn commit(self) -> Result<(), PaymentError>
    where
        Self: Sized;

    /// Drops every staged write and releases all row locks.
    fn rollback(self)
    where
        Self: Sized;
}

/// Owned exclusive guard over one store row.
type RowGuard<T> = ArcMutexGuard<parking_lot::RawMutex, T>;

/// A locked row plus the unit of work's staged copy of it.
struct LockedRow<T> {
    guard: RowGuard<T>,
    staged: Option<T>,
}

#[derive(Default)]
struct Tables {
    instructions: DashMap<InstructionId, Arc<Mutex<PaymentInstruction>>>,
    payments: DashMap<PaymentId, Arc<Mutex<Payment>>>,
    credits: DashMap<CreditId, Arc<Mutex<Credit>>>,
    next_instruction_id: AtomicU64,
    next_payment_id: AtomicU64,
    next_credit_id: AtomicU64,
    next_transaction_id: AtomicU64,
    journal: TransactionJournal,
}

/// In-memory reference store used by the tests and benchmarks.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Arc<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store's append-only index of committed ledger entries.
    pub fn journal(&self) -> &TransactionJournal {
        &self.tables.journal
    }
}

impl PaymentStore for InMemoryStore {
    type Uow = InMemoryUnitOfWork;

    fn begin(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork {
            tables: Arc::clone(&self.tables),
            instructions: HashMap::new(),
            payments: HashMap::new(),
            credits: HashMap::new(),
            new_instructions: Vec::new(),
            new_payments: Vec::new(),
            new_credits: Vec::new(),
            staged_transactions: Vec::new(),
        }
    }

    fn discard_session(&self) {
        // No identity map between units of work; nothing to invalidate.
    }
}

/// Unit of work over [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    tables: Arc<Tables>,
    instructions: HashMap<InstructionId, LockedRow<PaymentInstruction>>,
    payments: HashMap<PaymentId, LockedRow<Payment>>,
    credits: HashMap<CreditId, LockedRow<Credit>>,
    new_instructions: Vec<PaymentInstruction>,
    new_payments: Vec<Payment>,
    new_credits: Vec<Credit>,
    staged_transactions: Vec<FinancialTransaction>,
}

impl InMemoryUnitOfWork {
    /// Current working copy of an already-locked row, or a fresh locked
    /// fetch. The `Arc` is cloned out of the table before blocking on the
    /// row mutex so no table shard stays held while waiting.
    fn fetch_row<K, T>(
        rows: &mut HashMap<K, LockedRow<T>>,
        table: &DashMap<K, Arc<Mutex<T>>>,
        id: K,
    ) -> Option<T>
    where
        K: Copy + Eq + std::hash::Hash,
        T: Clone,
    {
        if let Some(row) = rows.get(&id) {
            return Some(row.staged.clone().unwrap_or_else(|| row.guard.clone()));
        }

        let arc = table.get(&id).map(|entry| Arc::clone(entry.value()))?;
        let guard = arc.lock_arc();
        let value = guard.clone();
        rows.insert(id, LockedRow { guard, staged: None });
        Some(value)
    }

    fn stage<K, T>(rows: &mut HashMap<K, LockedRow<T>>, id: K, value: T)
    where
        K: Copy + Eq + std::hash::Hash,
    {
        if let Some(row) = rows.get_mut(&id) {
            row.staged = Some(value);
        }
        // A persist without a prior locked fetch only happens for rows
        // staged via insert_*; those are written on commit anyway.
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn fetch_instruction(&mut self, id: InstructionId) -> Result<PaymentInstruction, PaymentError> {
        Self::fetch_row(&mut self.instructions, &self.tables.instructions, id)
            .ok_or(PaymentError::InstructionNotFound(id))
    }

    fn fetch_payment(&mut self, id: PaymentId) -> Result<Payment, PaymentError> {
        Self::fetch_row(&mut self.payments, &self.tables.payments, id)
            .ok_or(PaymentError::PaymentNotFound(id))
    }

    fn fetch_credit(&mut self, id: CreditId) -> Result<Credit, PaymentError> {
        Self::fetch_row(&mut self.credits, &self.tables.credits, id)
            .ok_or(PaymentError::CreditNotFound(id))
    }

    fn insert_instruction(&mut self, instruction: PaymentInstruction) {
        self.new_instructions.push(instruction);
    }

    fn insert_payment(&mut self, payment: Payment) {
        self.new_payments.push(payment);
    }

    fn insert_credit(&mut self, credit: Credit) {
        self.new_credits.push(credit);
    }

    fn persist_instruction(&mut self, instruction: &PaymentInstruction) {
        Self::stage(&mut self.instructions, instruction.id(), instruction.clone());
    }

    fn persist_payment(&mut self, payment: &Payment) {
        Self::stage(&mut self.payments, payment.id(), payment.clone());
    }

    fn persist_credit(&mut self, credit: &Credit) {
        Self::stage(&mut self.credits, credit.id(), credit.clone());
    }

    fn persist_transaction(&mut self, transaction: &FinancialTransaction) {
        self.staged_transactions.push(transaction.clone());
    }

    fn allocate_instruction_id(&mut self) -> InstructionId {
        InstructionId(self.tables.next_instruction_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn allocate_payment_id(&mut self) -> PaymentId {
        PaymentId(self.tables.next_payment_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn allocate_credit_id(&mut self) -> CreditId {
        CreditId(self.tables.next_credit_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn allocate_transaction_id(&mut self) -> TransactionId {
        TransactionId(self.tables.next_transaction_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn commit(mut self) -> Result<(), PaymentError> {
        // Validate the journal before touching any row, so a rejected
        // entry leaves the store untouched. IDs are store-allocated, so a
        // collision can only mean the same entry is being committed twice.
        for transaction in &self.staged_transactions {
            if self.tables.journal.contains(transaction.id()) {
                return Err(PaymentError::OperationFailed(format!(
                    "duplicate ledger entry {}",
                    transaction.id()
                )));
            }
        }
        for transaction in self.staged_transactions.drain(..) {
            self.tables.journal.append(Arc::new(transaction))?;
        }

        // Write staged copies back under the row locks still held.
        for row in self.credits.values_mut() {
            if let Some(staged) = row.staged.take() {
                *row.guard = staged;
            }
        }
        for row in self.payments.values_mut() {
            if let Some(staged) = row.staged.take() {
                *row.guard = staged;
            }
        }
        for row in self.instructions.values_mut() {
            if let Some(staged) = row.staged.take() {
                *row.guard = staged;
            }
        }

        // Publish newly created rows last; nobody can hold their locks yet.
        for instruction in self.new_instructions.drain(..) {
            self.tables
                .instructions
                .insert(instruction.id(), Arc::new(Mutex::new(instruction)));
        }
        for payment in self.new_payments.drain(..) {
            self.tables
                .payments
                .insert(payment.id(), Arc::new(Mutex::new(payment)));
        }
        for credit in self.new_credits.drain(..) {
            self.tables
                .credits
                .insert(credit.id(), Arc::new(Mutex::new(credit)));
        }

        Ok(())
        // Row guards drop here, releasing the aggregate for the next
        // unit of work.
    }

    fn rollback(self) {
        // Staged copies and row guards drop together; the rows keep their
        // pre-operation values.
    }
}
