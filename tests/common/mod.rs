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

//! Shared test fixtures: a configurable gateway stub and controller
//! builders. The stub implements every monetary capability but is not
//! queryable, matching the common production case.

#![allow(dead_code)]

use payflow_rs::{
    Credit, Payment, PaymentController, PaymentInstruction, Processor, ProcessorError,
    ProcessorOutcome, ProcessorRegistry,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const PAYMENT_SYSTEM: &str = "test_psp";

/// How the stub responds to every monetary capability.
#[derive(Clone, Copy)]
pub enum Behavior {
    /// Settle the full requested amount.
    Settle,
    /// Decline with the given reason code.
    Decline(&'static str),
    /// Fail outright, as a gateway outage would.
    Fail(&'static str),
}

/// Gateway stub implementing every monetary capability (but not the
/// query capability). Counts calls and can sleep inside the call to
/// widen race windows while the aggregate lock is held.
pub struct TestProcessor {
    behavior: Behavior,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl TestProcessor {
    pub fn settling() -> Self {
        Self::with_behavior(Behavior::Settle)
    }

    pub fn declining(reason: &'static str) -> Self {
        Self::with_behavior(Behavior::Decline(reason))
    }

    pub fn failing(message: &'static str) -> Self {
        Self::with_behavior(Behavior::Fail(message))
    }

    pub fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn respond(&self, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match self.behavior {
            Behavior::Settle => Ok(ProcessorOutcome::settled(amount)),
            Behavior::Decline(reason) => Ok(ProcessorOutcome::Declined {
                reason_code: reason.into(),
            }),
            Behavior::Fail(message) => Err(ProcessorError::Failed(message.into())),
        }
    }
}

impl Processor for TestProcessor {
    fn approve(&self, _: &Payment, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        self.respond(amount)
    }

    fn approve_and_deposit(
        &self,
        _: &Payment,
        amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        self.respond(amount)
    }

    fn deposit(&self, _: &Payment, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        self.respond(amount)
    }

    fn credit(&self, _: &Credit, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        self.respond(amount)
    }

    fn reverse_approval(&self, _: &Payment, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        self.respond(amount)
    }

    fn reverse_deposit(&self, _: &Payment, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        self.respond(amount)
    }

    fn reverse_credit(&self, _: &Credit, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        self.respond(amount)
    }
}

/// Controller with a single processor registered under [`PAYMENT_SYSTEM`].
/// Operation logs show up under `RUST_LOG=payflow_rs=debug`.
pub fn controller_with(processor: Arc<dyn Processor>) -> PaymentController {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let mut registry = ProcessorRegistry::new();
    registry.register(PAYMENT_SYSTEM, processor);
    PaymentController::new(registry)
}

/// Controller plus a 100.00 EUR instruction and a payment for the full
/// instruction amount.
pub fn seeded_controller(
    processor: Arc<dyn Processor>,
) -> (PaymentController, PaymentInstruction, Payment) {
    let controller = controller_with(processor);
    let instruction = controller
        .create_payment_instruction(dec!(100.00), "EUR", PAYMENT_SYSTEM)
        .unwrap();
    let payment = controller.create_payment(instruction.id(), dec!(100.00)).unwrap();
    (controller, instruction, payment)
}
