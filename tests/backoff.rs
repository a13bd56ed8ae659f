//! Reconnect policy tests: close classification, backoff schedule, state
//! transitions.

use std::time::Duration;

use live_ws::types::ConnectionState;
use live_ws::ws::supervisor::{Backoff, CloseClass, ReconnectAction, Supervisor, classify_close};

const INITIAL: Duration = Duration::from_millis(1_000);
const MAX: Duration = Duration::from_millis(30_000);
const RATE_LIMITED: Duration = Duration::from_millis(10_000);

#[test]
fn test_classify_close_codes() {
    assert_eq!(classify_close(Some(4001)), CloseClass::Auth);
    assert_eq!(classify_close(Some(4002)), CloseClass::Auth);
    assert_eq!(classify_close(Some(4003)), CloseClass::Fatal);
    assert_eq!(classify_close(Some(4004)), CloseClass::Fatal);
    assert_eq!(classify_close(Some(4005)), CloseClass::RateLimited);
    assert_eq!(classify_close(Some(4006)), CloseClass::Transient);
    assert_eq!(classify_close(Some(1006)), CloseClass::Transient);
    assert_eq!(classify_close(None), CloseClass::Transient);
}

#[test]
fn test_expected_delay_doubles_until_cap() {
    let backoff = Backoff::new(INITIAL, MAX, RATE_LIMITED, 0.2);
    let delays: Vec<u64> = (0..7)
        .map(|n| backoff.expected_delay(n, false).as_millis() as u64)
        .collect();
    assert_eq!(delays, [1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    assert_eq!(backoff.expected_delay(u32::MAX, false), MAX);
}

#[test]
fn test_jittered_delay_stays_in_band() {
    let mut backoff = Backoff::new(INITIAL, MAX, RATE_LIMITED, 0.2);
    for attempt in 0..12 {
        let expected = backoff.expected_delay(attempt, false).as_secs_f64();
        let delay = backoff.next_delay(false).as_secs_f64();
        assert!(
            delay >= expected * 0.8 - 1e-9 && delay <= expected * 1.2 + 1e-9,
            "attempt {attempt}: {delay} outside band around {expected}"
        );
        assert!(delay <= MAX.as_secs_f64() * 1.2 + 1e-9);
    }
    assert_eq!(backoff.attempt(), 12);
    backoff.reset();
    assert_eq!(backoff.attempt(), 0);
}

#[test]
fn test_unjittered_schedule_is_monotonic() {
    let mut backoff = Backoff::new(INITIAL, MAX, RATE_LIMITED, 0.0);
    let mut previous = Duration::ZERO;
    for _ in 0..10 {
        let delay = backoff.next_delay(false);
        assert!(delay >= previous);
        previous = delay;
    }
    assert_eq!(previous, MAX);
}

#[test]
fn test_rate_limited_schedule_is_longer() {
    let backoff = Backoff::new(INITIAL, MAX, RATE_LIMITED, 0.0);
    for attempt in 0..6 {
        assert!(backoff.expected_delay(attempt, true) >= backoff.expected_delay(attempt, false));
    }
    assert_eq!(backoff.expected_delay(0, true), RATE_LIMITED);
    assert_eq!(backoff.expected_delay(1, true), Duration::from_millis(20_000));
    assert_eq!(backoff.expected_delay(2, true), MAX);
}

#[test]
fn test_jitter_is_clamped() {
    assert_eq!(Backoff::new(INITIAL, MAX, RATE_LIMITED, 5.0).jitter(), 0.9);
    assert_eq!(Backoff::new(INITIAL, MAX, RATE_LIMITED, -1.0).jitter(), 0.0);
}

// ===================================================================
// Supervisor
// ===================================================================

#[test]
fn test_supervisor_transitions() {
    let mut supervisor = Supervisor::new(Backoff::new(INITIAL, MAX, RATE_LIMITED, 0.0));
    let watch = supervisor.watch();
    assert_eq!(*watch.borrow(), ConnectionState::Disconnected);

    supervisor.on_connecting();
    assert_eq!(supervisor.state(), ConnectionState::Connecting);

    assert_eq!(supervisor.on_connect_failed(), INITIAL);
    assert_eq!(supervisor.state(), ConnectionState::Reconnecting);

    supervisor.on_connecting();
    supervisor.on_connected();
    assert_eq!(*watch.borrow(), ConnectionState::Connected);

    // Backoff was reset by the successful connect.
    assert_eq!(
        supervisor.on_closed(CloseClass::Auth),
        ReconnectAction::Retry {
            delay: INITIAL,
            refresh_credential: true
        }
    );
    assert_eq!(supervisor.state(), ConnectionState::Reconnecting);

    supervisor.on_connecting();
    supervisor.on_connected();
    assert_eq!(supervisor.on_closed(CloseClass::Fatal), ReconnectAction::Halt);
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);
}

#[test]
fn test_supervisor_rate_limited_retry() {
    let mut supervisor = Supervisor::new(Backoff::new(INITIAL, MAX, RATE_LIMITED, 0.0));
    supervisor.on_connecting();
    supervisor.on_connected();
    assert_eq!(
        supervisor.on_closed(CloseClass::RateLimited),
        ReconnectAction::Retry {
            delay: RATE_LIMITED,
            refresh_credential: false
        }
    );
    supervisor.on_stopped();
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);
}

#[test]
fn test_failed_reconnect_after_rate_limit_keeps_long_schedule() {
    let mut supervisor = Supervisor::new(Backoff::new(INITIAL, MAX, RATE_LIMITED, 0.0));
    supervisor.on_connecting();
    supervisor.on_connected();

    assert_eq!(
        supervisor.on_closed(CloseClass::RateLimited),
        ReconnectAction::Retry {
            delay: RATE_LIMITED,
            refresh_credential: false
        }
    );
    assert!(supervisor.is_rate_limited());

    // The server keeps refusing handshakes.
    supervisor.on_connecting();
    assert_eq!(supervisor.on_connect_failed(), Duration::from_millis(20_000));
    supervisor.on_connecting();
    assert_eq!(supervisor.on_connect_failed(), MAX);

    // A successful connect returns to the standard schedule.
    supervisor.on_connecting();
    supervisor.on_connected();
    assert!(!supervisor.is_rate_limited());
    assert_eq!(
        supervisor.on_closed(CloseClass::Transient),
        ReconnectAction::Retry {
            delay: INITIAL,
            refresh_credential: false
        }
    );
    supervisor.on_connecting();
    assert_eq!(supervisor.on_connect_failed(), Duration::from_millis(2_000));
}
