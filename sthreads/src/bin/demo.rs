//! Runs the classic green thread workloads in named scenarios.
//!
//! ```text
//! sthreads-demo <scenario>
//! ```
//!
//! Every scenario ends through the runtime's last-thread rule, so the exit
//! status is the runtime's verdict: 0 when every thread finished, 1 when
//! threads were left blocked or the last one faulted. Usage errors exit
//! with 2.

use sthreads::{Error, RuntimeBuilder, ThreadId, done, join, spawn, terminate, yield_now};

use std::process;
use std::time::Duration;

/// Console output that a preemption tick cannot cut in half.
macro_rules! say {
    ($($arg:tt)*) => {
        sthreads::without_preemption(|| println!($($arg)*))
    };
}

const SCENARIOS: &[(&str, fn())] = &[
    ("join", join_letters),
    ("yield", yield_interleave),
    ("preempt", preempt_fibonacci),
    ("last-thread", last_thread),
    ("deadlock", deadlock),
    ("returned", returned_body),
    ("returned-last", returned_last),
];

fn main() {
    let Some(name) = std::env::args().nth(1) else {
        usage();
    };

    let Some((_, scenario)) = SCENARIOS.iter().find(|(n, _)| *n == name) else {
        eprintln!("unknown scenario: {name}");
        usage();
    };

    scenario();
}

fn usage() -> ! {
    let names: Vec<&str> = SCENARIOS.iter().map(|(n, _)| *n).collect();
    eprintln!("usage: sthreads-demo <{}>", names.join("|"));
    process::exit(2);
}

fn cooperative() -> sthreads::Runtime {
    match sthreads::init() {
        Ok(runtime) => runtime,
        Err(err) => fatal(err),
    }
}

fn preemptive(interval: Duration) -> sthreads::Runtime {
    match RuntimeBuilder::new().preemption(interval).init() {
        Ok(runtime) => runtime,
        Err(err) => fatal(err),
    }
}

fn start(body: fn()) -> ThreadId {
    match spawn(body) {
        Ok(id) => id,
        Err(err) => fatal(err),
    }
}

fn wait(id: ThreadId) -> ThreadId {
    match join(id) {
        Ok(id) => id,
        Err(err) => fatal(err),
    }
}

fn fatal(err: Error) -> ! {
    eprintln!("sthreads-demo: {err}");
    process::exit(1);
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

fn join_letters() {
    let _runtime = cooperative();
    say!("==== join ====");

    let letters = start(letters);
    wait(letters);
    say!("is c = f?");

    done();
}

fn yield_interleave() {
    let _runtime = cooperative();
    say!("==== yield on two threads ====");

    let magic = start(magic_numbers);
    let letters = start(letters);

    wait(magic);
    wait(letters);

    done();
}

fn preempt_fibonacci() {
    let _runtime = preemptive(Duration::from_millis(10));
    say!("==== timer on three threads ====");

    let a = start(fibonacci_slow_a);
    let b = start(fibonacci_slow_b);
    let fast = start(fibonacci_fast);

    let a = wait(a);
    say!("thread A done with tid {a}");
    let b = wait(b);
    say!("thread B done with tid {b}");
    let fast = wait(fast);
    say!("fast fibonacci done with tid {fast}");

    done();
}

/// The bootstrap leaves first; the worker is the last thread out.
fn last_thread() {
    let _runtime = cooperative();

    start(|| {
        numbers(3);
        say!("worker is the last thread");
        done();
    });

    say!("bootstrap leaving first");
    done();
}

/// A terminated thread strands its joiner.
fn deadlock() {
    let _runtime = cooperative();

    let worker = start(|| {
        let _ = yield_now();
        say!("worker terminating without waking its joiner");
        terminate();
    });

    wait(worker);
    say!("unreachable: joiner woken");
    done();
}

/// Joiners of a body that returns are released with an error.
fn returned_body() {
    let _runtime = cooperative();

    let worker = start(|| numbers(2));

    match join(worker) {
        Err(Error::ThreadBodyReturnedWithoutTermination(id)) if id == worker => {
            say!("joiner released: {}", Error::ThreadBodyReturnedWithoutTermination(id));
        }
        other => {
            say!("unexpected join result: {other:?}");
            process::exit(1);
        }
    }

    done();
}

/// A body that returns as the last thread fails the process.
fn returned_last() {
    let _runtime = cooperative();

    start(|| numbers(2));

    done();
}

// ----------------------------------------------------------------------------
// Workloads
// ----------------------------------------------------------------------------

/// Prints 0, 1, 2, ... yielding after each number.
fn numbers(count: u32) {
    for n in 0..count {
        say!(" n = {n}");
        let _ = yield_now();
    }
}

/// Prints a, b, c, ... yielding after each letter, done at `f`.
fn letters() {
    for c in 'a'..='z' {
        say!(" c = {c}");
        if c == 'f' {
            done();
        }
        let _ = yield_now();
    }

    done();
}

/// Prints the magic constants n(n²+1)/2, yielding after each, done at 8.
fn magic_numbers() {
    for n in 3u64.. {
        say!(" magic({n}) = {}", n * (n * n + 1) / 2);
        if n == 8 {
            done();
        }
        let _ = yield_now();
    }
}

fn fib(n: u64) -> u64 {
    match n {
        0 => 0,
        1 => 1,
        n => fib(n - 1) + fib(n - 2),
    }
}

/// Recomputes each number from scratch and never yields: only the timer
/// interleaves it with its siblings.
fn fibonacci_slow(label: char, range: std::ops::Range<u64>) {
    for n in range {
        let f = fib(n);
        say!(" {label}: slow_fib({n:02}) = {f}");
    }

    done();
}

fn fibonacci_slow_a() {
    fibonacci_slow('A', 20..30);
}

fn fibonacci_slow_b() {
    fibonacci_slow('B', 22..31);
}

/// Iterative sequence, also without yielding.
fn fibonacci_fast() {
    let (mut a, mut b) = (0u64, 1u64);

    for n in 0..=90 {
        say!(" fast_fib({n:02}) = {a}");
        (a, b) = (b, a + b);
    }

    done();
}
