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

//! Append-only index of committed ledger entries.
//!
//! Every financial transaction committed through a unit of work is also
//! appended here, in commit order, with duplicate detection. The journal
//! is the store-level audit index; the authoritative copies live inside
//! the payments and credits that own them.

use crate::base::TransactionId;
use crate::error::PaymentError;
use crate::transaction::FinancialTransaction;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// A thread-safe, deduplicating journal of committed ledger entries.
///
/// Combines a [`DashMap`] for O(1) duplicate checking with a [`SegQueue`]
/// to preserve commit order. All operations are lock-free and safe for
/// concurrent access.
#[derive(Debug, Default)]
pub struct TransactionJournal {
    /// Entries indexed by transaction ID for O(1) duplicate detection.
    entries: DashMap<TransactionId, Arc<FinancialTransaction>>,

    /// Queue of transaction IDs maintaining commit order.
    order: SegQueue<TransactionId>,
}

impl TransactionJournal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed ledger entry.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::OperationFailed`] if an entry with the same
    /// ID was already journaled; ledger entries are never written twice.
    pub fn append(&self, transaction: Arc<FinancialTransaction>) -> Result<(), PaymentError> {
        let transaction_id = transaction.id();

        // Entry API gives atomic check-and-insert under concurrent commits.
        match self.entries.entry(transaction_id) {
            Entry::Occupied(_) => Err(PaymentError::OperationFailed(format!(
                "duplicate ledger entry {transaction_id}"
            ))),
            Entry::Vacant(entry) => {
                entry.insert(transaction);
                self.order.push(transaction_id);
                Ok(())
            }
        }
    }

    /// Looks up a journaled entry by ID.
    pub fn get(&self, id: TransactionId) -> Option<Arc<FinancialTransaction>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Drains the commit-order queue, yielding every entry journaled
    /// since the last drain, oldest first. The keyed index keeps all
    /// entries; only the ordering is consumed, so downstream audit
    /// exports see each entry exactly once.
    pub fn drain_in_order(&self) -> Vec<Arc<FinancialTransaction>> {
        let mut drained = Vec::new();
        while let Some(id) = self.order.pop() {
            if let Some(entry) = self.get(id) {
                drained.push(entry);
            }
        }
        drained
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
