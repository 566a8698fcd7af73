//! Deterministic virtual time used by emulated devices.
//!
//! # Design
//!
//! This module provides a [`Clock`] (monotonic virtual time) and a [`TimerQueue`]
//! (one-shot timers driven by that virtual time).
//!
//! The queue uses **event delivery** rather than storing callbacks: a device
//! schedules a value of its own timer enum and dispatches it from its own
//! timer handler when the event comes due. This keeps scheduled work fully
//! inspectable and avoids tying device state to captured closures.
//!
//! Delivery order is strict: earlier deadlines first, and events sharing a
//! deadline fire in the order they were scheduled.

mod clock;
mod timers;

pub use clock::Clock;
pub use timers::{TimerId, TimerQueue};
