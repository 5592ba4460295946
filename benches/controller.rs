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

//! Benchmarks for the payment controller.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded operation processing
//! - Full payment and credit lifecycles
//! - Multi-threaded concurrent operations
//! - Lock contention as payments share an instruction

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use payflow_rs::{
    Credit, Payment, PaymentController, Processor, ProcessorError, ProcessorOutcome,
    ProcessorRegistry,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const PAYMENT_SYSTEM: &str = "bench_psp";

/// Gateway that settles everything instantly, so the benchmarks measure
/// orchestration overhead rather than gateway latency.
struct SettlingGateway;

impl Processor for SettlingGateway {
    fn approve(&self, _: &Payment, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        Ok(ProcessorOutcome::settled(amount))
    }
    fn approve_and_deposit(
        &self,
        _: &Payment,
        amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        Ok(ProcessorOutcome::settled(amount))
    }
    fn deposit(&self, _: &Payment, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        Ok(ProcessorOutcome::settled(amount))
    }
    fn credit(&self, _: &Credit, amount: Decimal) -> Result<ProcessorOutcome, ProcessorError> {
        Ok(ProcessorOutcome::settled(amount))
    }
    fn reverse_approval(
        &self,
        _: &Payment,
        amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        Ok(ProcessorOutcome::settled(amount))
    }
    fn reverse_deposit(
        &self,
        _: &Payment,
        amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        Ok(ProcessorOutcome::settled(amount))
    }
    fn reverse_credit(
        &self,
        _: &Credit,
        amount: Decimal,
    ) -> Result<ProcessorOutcome, ProcessorError> {
        Ok(ProcessorOutcome::settled(amount))
    }
}

fn controller() -> PaymentController {
    let mut registry = ProcessorRegistry::new();
    registry.register(PAYMENT_SYSTEM, Arc::new(SettlingGateway));
    PaymentController::new(registry)
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_approve(c: &mut Criterion) {
    c.bench_function("single_approve", |b| {
        b.iter(|| {
            let controller = controller();
            let instruction = controller
                .create_payment_instruction(dec!(100.00), "EUR", PAYMENT_SYSTEM)
                .unwrap();
            let payment = controller
                .create_payment(instruction.id(), dec!(100.00))
                .unwrap();
            controller
                .approve(black_box(payment.id()), dec!(100.00))
                .unwrap();
        })
    });
}

fn bench_payment_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("payment_lifecycle");

    // Authorization and capture as separate operations
    group.bench_function("approve_deposit", |b| {
        b.iter(|| {
            let controller = controller();
            let instruction = controller
                .create_payment_instruction(dec!(100.00), "EUR", PAYMENT_SYSTEM)
                .unwrap();
            let payment = controller
                .create_payment(instruction.id(), dec!(100.00))
                .unwrap();
            controller.approve(payment.id(), dec!(100.00)).unwrap();
            controller
                .deposit(black_box(payment.id()), dec!(100.00))
                .unwrap();
        })
    });

    // One-step sale
    group.bench_function("approve_and_deposit", |b| {
        b.iter(|| {
            let controller = controller();
            let instruction = controller
                .create_payment_instruction(dec!(100.00), "EUR", PAYMENT_SYSTEM)
                .unwrap();
            let payment = controller
                .create_payment(instruction.id(), dec!(100.00))
                .unwrap();
            controller
                .approve_and_deposit(black_box(payment.id()), dec!(100.00))
                .unwrap();
        })
    });

    // Sale followed by a full refund
    group.bench_function("sale_then_refund", |b| {
        b.iter(|| {
            let controller = controller();
            let instruction = controller
                .create_payment_instruction(dec!(100.00), "EUR", PAYMENT_SYSTEM)
                .unwrap();
            let payment = controller
                .create_payment(instruction.id(), dec!(100.00))
                .unwrap();
            controller
                .approve_and_deposit(payment.id(), dec!(100.00))
                .unwrap();
            let refund = controller
                .create_dependent_credit(payment.id(), dec!(100.00))
                .unwrap();
            controller
                .credit(black_box(refund.id()), dec!(100.00))
                .unwrap();
        })
    });

    group.finish();
}

fn bench_operation_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let controller = controller();
                let instruction = controller
                    .create_payment_instruction(
                        Decimal::from(count) * dec!(10.00),
                        "EUR",
                        PAYMENT_SYSTEM,
                    )
                    .unwrap();

                for _ in 0..count {
                    let payment = controller
                        .create_payment(instruction.id(), dec!(10.00))
                        .unwrap();
                    controller
                        .approve_and_deposit(payment.id(), dec!(10.00))
                        .unwrap();
                }
                black_box(&controller);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_sales_separate_instructions(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_sales_separate_instructions");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let controller = Arc::new(controller());

                (0..count).into_par_iter().for_each(|_| {
                    let instruction = controller
                        .create_payment_instruction(dec!(10.00), "EUR", PAYMENT_SYSTEM)
                        .unwrap();
                    let payment = controller
                        .create_payment(instruction.id(), dec!(10.00))
                        .unwrap();
                    controller
                        .approve_and_deposit(payment.id(), dec!(10.00))
                        .unwrap();
                });

                black_box(&controller);
            })
        });
    }
    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let total_ops = 10_000u32;

    // Fewer instructions means more threads competing for the same row
    // locks.
    for num_instructions in [1, 10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::new("instructions", num_instructions),
            num_instructions,
            |b, &num_instructions| {
                b.iter_batched(
                    || {
                        let controller = Arc::new(controller());
                        let instructions: Vec<_> = (0..num_instructions)
                            .map(|_| {
                                controller
                                    .create_payment_instruction(
                                        Decimal::from(total_ops) * dec!(10.00),
                                        "EUR",
                                        PAYMENT_SYSTEM,
                                    )
                                    .unwrap()
                                    .id()
                            })
                            .collect();
                        (controller, instructions)
                    },
                    |(controller, instructions)| {
                        (0..total_ops).into_par_iter().for_each(|i| {
                            let instruction_id = instructions[i as usize % instructions.len()];
                            let payment = controller
                                .create_payment(instruction_id, dec!(10.00))
                                .unwrap();
                            controller
                                .approve_and_deposit(payment.id(), dec!(10.00))
                                .unwrap();
                        });
                        black_box(&controller);
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    let total_ops = 10_000u32;

    for num_threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .unwrap();

                b.iter(|| {
                    let controller = Arc::new(controller());

                    pool.install(|| {
                        (0..total_ops).into_par_iter().for_each(|_| {
                            let instruction = controller
                                .create_payment_instruction(dec!(10.00), "EUR", PAYMENT_SYSTEM)
                                .unwrap();
                            let payment = controller
                                .create_payment(instruction.id(), dec!(10.00))
                                .unwrap();
                            controller
                                .approve_and_deposit(payment.id(), dec!(10.00))
                                .unwrap();
                        });
                    });

                    black_box(&controller);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(
    single_threaded,
    bench_single_approve,
    bench_payment_lifecycle,
    bench_operation_throughput,
);

criterion_group!(
    multi_threaded,
    bench_parallel_sales_separate_instructions,
    bench_contention,
    bench_thread_scaling,
);

criterion_main!(single_threaded, multi_threaded);
