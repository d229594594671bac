use sthreads::{RuntimeBuilder, ThreadState};

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const INTERVAL: Duration = Duration::from_millis(5);

/// Upper bound for anything the timer must make happen.
const PATIENCE: Duration = Duration::from_secs(5);

fn spinner(stop: Rc<AtomicBool>, spins: Rc<AtomicU64>) -> impl FnOnce() + 'static {
    move || {
        while !stop.load(Ordering::Relaxed) {
            spins.fetch_add(1, Ordering::Relaxed);
        }
        sthreads::done();
    }
}

#[test]
fn busy_loop_is_switched_away() {
    let runtime = RuntimeBuilder::new().preemption(INTERVAL).init().unwrap();
    assert!(runtime.is_preemptive());

    let stop = Rc::new(AtomicBool::new(false));
    let spins = Rc::new(AtomicU64::new(0));

    let started = Instant::now();
    let worker = sthreads::spawn(spinner(stop.clone(), spins.clone())).unwrap();

    // Only a tick can bring the bootstrap back here.
    assert!(started.elapsed() < PATIENCE);
    assert!(spins.load(Ordering::Relaxed) > 0);
    assert_eq!(sthreads::state(worker).unwrap(), Some(ThreadState::Ready));

    stop.store(true, Ordering::Relaxed);
    assert_eq!(sthreads::join(worker).unwrap(), worker);
}

#[test]
fn timer_shares_the_processor_between_spinners() {
    let _runtime = RuntimeBuilder::new().preemption(INTERVAL).init().unwrap();

    let stop = Rc::new(AtomicBool::new(false));
    let first = Rc::new(AtomicU64::new(0));
    let second = Rc::new(AtomicU64::new(0));

    let a = sthreads::spawn(spinner(stop.clone(), first.clone())).unwrap();
    let b = sthreads::spawn(spinner(stop.clone(), second.clone())).unwrap();

    let deadline = Instant::now() + PATIENCE;
    let mut rounds = 0;
    while rounds < 3 && Instant::now() < deadline {
        let before_a = first.load(Ordering::Relaxed);
        let before_b = second.load(Ordering::Relaxed);
        let _ = sthreads::yield_now();

        if first.load(Ordering::Relaxed) > before_a && second.load(Ordering::Relaxed) > before_b {
            rounds += 1;
        }
    }

    stop.store(true, Ordering::Relaxed);
    sthreads::join(a).unwrap();
    sthreads::join(b).unwrap();

    assert_eq!(rounds, 3);
}

#[test]
fn critical_section_holds_ticks_back() {
    let _runtime = RuntimeBuilder::new().preemption(INTERVAL).init().unwrap();

    let stop = Rc::new(AtomicBool::new(false));
    let spins = Rc::new(AtomicU64::new(0));
    let worker = sthreads::spawn(spinner(stop.clone(), spins.clone())).unwrap();

    let observed = sthreads::without_preemption(|| {
        let before = spins.load(Ordering::Relaxed);
        let until = Instant::now() + INTERVAL * 4;
        while Instant::now() < until {
            std::hint::spin_loop();
        }
        spins.load(Ordering::Relaxed) - before
    });

    assert_eq!(observed, 0);

    stop.store(true, Ordering::Relaxed);
    sthreads::join(worker).unwrap();
}

#[sthreads::test(preempt_ms = 5)]
fn attribute_enables_preemption() {
    let stop = Rc::new(AtomicBool::new(false));
    let spins = Rc::new(AtomicU64::new(0));

    let worker = sthreads::spawn(spinner(stop.clone(), spins.clone())).unwrap();
    assert!(spins.load(Ordering::Relaxed) > 0);

    stop.store(true, Ordering::Relaxed);
    sthreads::join(worker).unwrap();
}
