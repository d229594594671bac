//! The last thread out ends the process, so each case re-runs this test
//! binary filtered to itself and inspects the child's exit status.

use std::env;
use std::process::{Command, Output};

const CHILD: &str = "STHREADS_EXIT_CHILD";

/// Whether this process is the child running `name`.
fn is_child(name: &str) -> bool {
    env::var(CHILD).as_deref() == Ok(name)
}

fn run_child(name: &str) -> Output {
    Command::new(env::current_exe().expect("test binary path"))
        .args([name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD, name)
        .output()
        .expect("failed to re-run test binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn spawned_thread_leaving_last_exits_with_success() {
    let name = "spawned_thread_leaving_last_exits_with_success";

    if is_child(name) {
        let _runtime = sthreads::init().unwrap();

        sthreads::spawn(|| {
            let _ = sthreads::yield_now();
            println!("worker out last");
            sthreads::done();
        })
        .unwrap();

        sthreads::done();
    }

    let output = run_child(name);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert!(stdout(&output).contains("worker out last"));
}

#[test]
fn spawned_thread_stranding_a_joiner_exits_with_failure() {
    let name = "spawned_thread_stranding_a_joiner_exits_with_failure";

    if is_child(name) {
        let _runtime = sthreads::init().unwrap();

        let target = sthreads::spawn(|| {
            let _ = sthreads::yield_now();
            println!("target terminating");
            sthreads::terminate();
        })
        .unwrap();

        sthreads::spawn(move || {
            let _ = sthreads::join(target);
            sthreads::done();
        })
        .unwrap();

        sthreads::done();
    }

    let output = run_child(name);

    assert_eq!(output.status.code(), Some(1), "{output:?}");
    assert!(stdout(&output).contains("target terminating"));
}

#[test]
fn panicking_last_thread_exits_with_failure() {
    let name = "panicking_last_thread_exits_with_failure";

    if is_child(name) {
        let _runtime = sthreads::init().unwrap();

        sthreads::spawn(|| {
            let _ = sthreads::yield_now();
            panic!("last thread failed");
        })
        .unwrap();

        sthreads::done();
    }

    let output = run_child(name);

    assert_eq!(output.status.code(), Some(1), "{output:?}");
}

#[test]
fn preempted_spinner_leaving_last_exits_with_success() {
    let name = "preempted_spinner_leaving_last_exits_with_success";

    if is_child(name) {
        let _runtime = sthreads::RuntimeBuilder::new()
            .preemption(std::time::Duration::from_millis(2))
            .init()
            .unwrap();

        sthreads::spawn(|| {
            let mut spins = 0u64;
            while std::hint::black_box(spins) < 1_000_000 {
                spins += 1;
            }
            sthreads::done();
        })
        .unwrap();

        sthreads::done();
    }

    let output = run_child(name);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
}
