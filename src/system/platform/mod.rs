//! Signal delivery that can distinguish a missing process from a refused one.

use super::host::{SignalError, SignalKind};

pub trait PlatformSignals {
    fn send_signal(pid: u32, kind: SignalKind) -> Result<(), SignalError>;
}

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod other;

#[cfg(not(unix))]
use other as platform_impl;
#[cfg(unix)]
use unix as platform_impl;

pub fn send_signal(pid: u32, kind: SignalKind) -> Result<(), SignalError> {
    platform_impl::Platform::send_signal(pid, kind)
}
