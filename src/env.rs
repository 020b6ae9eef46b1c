use std::{cell::RefCell, ffi::OsStr};

/// Step limit used when `BYTESIM_MAX_STEPS` is unset or not a number.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

#[derive(Clone, Copy)]
struct Env {
    trace_enabled: bool,
    max_steps: usize,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        trace_enabled: var_is("BYTESIM_TRACE", "1"),
        max_steps: std::env::var("BYTESIM_MAX_STEPS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_STEPS),
    };
    set_env(value);
}

/// Print the register file after every executed instruction.
pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

pub fn max_steps() -> usize {
    with_env(|env| env.max_steps)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}
