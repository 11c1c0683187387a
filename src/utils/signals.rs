// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Signal handling: the main thread is the only one allowed to observe
//! `SIGINT`/`SIGTERM`/`SIGSEGV`/`SIGABRT`; every other thread (frontend,
//! Coordinator, input) must have them blocked on entry.

use std::backtrace::Backtrace;
use std::process;

use nix::sys::signal;
use nix::sys::signal::SaFlags;
use nix::sys::signal::SigAction;
use nix::sys::signal::SigHandler;
use nix::sys::signal::SigSet;
use nix::sys::signal::Signal;

use crate::prelude::*;

/// Blocks `SIGINT`/`SIGTERM` on the calling thread. Call this first thing on
/// every thread other than the main thread.
pub fn block_termination_signals() -> Result<()> {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set.add(Signal::SIGTERM);
    signal::pthread_sigmask(signal::SigmaskHow::SIG_BLOCK, Some(&set), None).location(loc!())?;
    Ok(())
}

/// Linux (and thus `std::thread::Builder::name`, which calls
/// `pthread_setname_np` under the hood) caps thread names, including the
/// trailing NUL, at 16 bytes. Truncate explicitly so the intent stays
/// visible rather than silently clipping inside libc.
pub fn truncate_thread_name(name: &str) -> String {
    name.chars().take(15).collect()
}

extern "C" fn fatal_signal_handler(signum: libc_sig) {
    let backtrace = Backtrace::force_capture();
    eprintln!("fatal signal {signum}, exiting\n{backtrace}");
    process::exit(1);
}

// `nix::sys::signal::SigHandler::Handler` wants a `extern "C" fn(i32)`; we
// avoid pulling in the `libc` crate just for the `c_int` alias.
type libc_sig = std::os::raw::c_int;

/// Installs synchronous handlers for `SIGSEGV`/`SIGABRT` on the main thread
/// that log a backtrace and `exit(1)`. Must be called before any other
/// thread is spawned: handlers are process-wide, but only the main thread
/// should be able to observe the signal, every other thread blocks it.
pub fn install_fatal_signal_handlers() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(fatal_signal_handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only calls async-signal-safe-ish operations
    // (eprintln!/exit); we accept the non-strict-async-signal-safety of
    // Backtrace::force_capture for diagnostic purposes since we're about to
    // exit(1) regardless.
    unsafe {
        signal::sigaction(Signal::SIGSEGV, &action).location(loc!())?;
        signal::sigaction(Signal::SIGABRT, &action).location(loc!())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_termination_signals_succeeds() {
        block_termination_signals().unwrap();
    }

    #[test]
    fn truncate_thread_name_caps_at_15_chars() {
        let truncated = truncate_thread_name("this-name-is-way-too-long-for-pthread");
        assert_eq!(truncated.len(), 15);
    }
}
