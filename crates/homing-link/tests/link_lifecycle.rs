//! Integration test: guidance session lifecycle over the in-memory transport.
//!
//! Drives a [`GuidanceLink`] through establish, send, consume and
//! terminate against [`MockTransport`] and checks what the mock server
//! observed, how teardown waits resolve, and what shutdown reports.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use homing_core::{
    ConnectionId, Consumed, MissileId, MissileState, SequenceId, TickId, TransportError,
};
use homing_link::{ConfigError, GuidanceLink, LinkConfig, RegistryError, SessionState};
use homing_test_utils::fixtures::{armed_hardware, link_config, missile, state};
use homing_test_utils::MockTransport;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `cond` until it holds or `timeout` passes.
fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn link(ids: &[u32]) -> (GuidanceLink, MockTransport) {
    init_logging();
    let transport = MockTransport::new();
    let link = GuidanceLink::new(link_config(ids), Arc::new(transport.clone())).unwrap();
    (link, transport)
}

// ── session round trip ───────────────────────────────────────────

#[test]
fn establish_send_consume_terminate() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    let channel = transport.channel(&endpoint).unwrap();

    assert!(link.establish(&missile(1, 0), state(1, 0)));
    assert_eq!(link.session_state(MissileId(1)), SessionState::Streaming);
    let stream = channel.stream(MissileId(1)).unwrap();
    assert_eq!(stream.sent().len(), 1, "initial state goes out on establish");

    assert_eq!(link.consume_latest(MissileId(1)), Consumed::Empty);

    link.send(state(1, 1));
    assert_eq!(stream.sent().len(), 2);

    let seq = stream.command(0.5, -0.25);
    assert_eq!(seq, SequenceId(1));
    match link.consume_latest(MissileId(1)) {
        Consumed::Fresh(input) => {
            assert_eq!(input.sequence, seq);
            assert_eq!(input.pitch_turn, 0.5);
            assert_eq!(input.yaw_turn, -0.25);
        }
        other => panic!("expected a fresh command, got {other:?}"),
    }
    // Nothing new arrived: same command again, flagged stale.
    assert!(link.consume_latest(MissileId(1)).is_stale());
    assert_eq!(link.stats().stale_reads, 1);

    assert!(link.terminate(MissileState::destroyed(MissileId(1), TickId(2))));
    assert!(!link.terminate(MissileState::destroyed(MissileId(1), TickId(2))));
    assert_eq!(link.session_state(MissileId(1)), SessionState::Terminating);

    let sent = stream.sent();
    assert_eq!(sent.len(), 3, "second terminate sends nothing");
    assert!(sent.last().unwrap().destroyed);
    assert!(stream.is_completed());

    stream.finish();
    assert!(wait_until(Duration::from_secs(2), || {
        link.session_state(MissileId(1)) == SessionState::Closed
    }));
    let stats = link.stats();
    assert_eq!(stats.teardowns_completed, 1);
    assert_eq!(stats.streams_finished, 1);
    assert_eq!(link.pending_teardowns(), 0);
    assert_eq!(link.consume_latest(MissileId(1)), Consumed::Empty);
}

#[test]
fn terminate_marks_final_state_destroyed() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    assert!(link.establish(&missile(4, 0), state(4, 0)));

    // Not flagged destroyed by the caller.
    assert!(link.terminate(state(4, 9)));
    let stream = transport.channel(&endpoint).unwrap().stream(MissileId(4)).unwrap();
    assert!(stream.sent().last().unwrap().destroyed);
}

#[test]
fn missing_endpoint_rejects_session() {
    let (link, _transport) = link(&[0]);
    assert!(!link.establish(&missile(2, 5), state(2, 0)));
    assert_eq!(link.consume_latest(MissileId(2)), Consumed::Empty);
    assert_eq!(link.session_state(MissileId(2)), SessionState::Unconnected);
    assert_eq!(link.stats().sessions_rejected, 1);

    // Send and terminate without a session are no-ops.
    link.send(state(2, 1));
    assert!(!link.terminate(MissileState::destroyed(MissileId(2), TickId(1))));
}

#[test]
fn duplicate_establish_is_rejected() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    assert!(link.establish(&missile(3, 0), state(3, 0)));
    assert!(!link.establish(&missile(3, 0), state(3, 0)));
    assert_eq!(transport.channel(&endpoint).unwrap().stream_count(), 1);
    assert_eq!(link.active_sessions(), 1);
}

// ── link loss ────────────────────────────────────────────────────

#[test]
fn stream_failure_reports_link_lost() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    assert!(link.establish(&missile(1, 0), state(1, 0)));
    let stream = transport.channel(&endpoint).unwrap().stream(MissileId(1)).unwrap();

    stream.command(0.1, 0.1);
    stream.fail(TransportError::StreamClosed);
    // Link loss wins over a pending command.
    assert_eq!(link.consume_latest(MissileId(1)), Consumed::LinkLost);
    assert_eq!(link.stats().stream_failures, 1);
}

#[test]
fn refused_stream_leaves_link_lost_slot() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    transport.channel(&endpoint).unwrap().refuse_streams(true);

    assert!(!link.establish(&missile(1, 0), state(1, 0)));
    assert_eq!(link.consume_latest(MissileId(1)), Consumed::LinkLost);

    // Terminating releases the leftover slot.
    assert!(!link.terminate(MissileState::destroyed(MissileId(1), TickId(1))));
    assert_eq!(link.consume_latest(MissileId(1)), Consumed::Empty);
}

#[test]
fn send_failure_is_a_stream_failure() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    assert!(link.establish(&missile(1, 0), state(1, 0)));
    let stream = transport.channel(&endpoint).unwrap().stream(MissileId(1)).unwrap();

    stream.fail_sends(true);
    link.send(state(1, 1));
    let stats = link.stats();
    assert_eq!(stats.send_failures, 1);
    assert_eq!(stats.stream_failures, 1);
    assert_eq!(link.consume_latest(MissileId(1)), Consumed::LinkLost);
}

// ── teardown ─────────────────────────────────────────────────────

#[test]
fn silent_server_times_out_teardown() {
    let (link, _transport) = link(&[0]);
    assert!(link.establish(&missile(1, 0), state(1, 0)));
    assert!(link.terminate(MissileState::destroyed(MissileId(1), TickId(1))));
    assert_eq!(link.pending_teardowns(), 1);

    assert!(wait_until(Duration::from_secs(3), || {
        link.session_state(MissileId(1)) == SessionState::Closed
    }));
    let stats = link.stats();
    assert_eq!(stats.teardowns_timed_out, 1);
    assert_eq!(stats.teardowns_completed, 0);
}

#[test]
fn failed_stream_completes_teardown() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    assert!(link.establish(&missile(1, 0), state(1, 0)));
    let stream = transport.channel(&endpoint).unwrap().stream(MissileId(1)).unwrap();

    assert!(link.terminate(MissileState::destroyed(MissileId(1), TickId(1))));
    stream.fail(TransportError::Io {
        reason: "connection reset".into(),
    });
    assert!(wait_until(Duration::from_secs(2), || {
        link.session_state(MissileId(1)) == SessionState::Closed
    }));
    assert_eq!(link.stats().teardowns_completed, 1);
}

#[test]
fn late_commands_after_teardown_are_dropped() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    assert!(link.establish(&missile(1, 0), state(1, 0)));
    let stream = transport.channel(&endpoint).unwrap().stream(MissileId(1)).unwrap();

    assert!(link.terminate(MissileState::destroyed(MissileId(1), TickId(1))));
    stream.finish();
    assert!(wait_until(Duration::from_secs(2), || {
        link.session_state(MissileId(1)) == SessionState::Closed
    }));

    stream.command(1.0, 1.0);
    assert_eq!(link.stats().commands_dropped, 1);
    assert_eq!(link.consume_latest(MissileId(1)), Consumed::Empty);
}

// ── shutdown ─────────────────────────────────────────────────────

#[test]
fn shutdown_closes_open_sessions() {
    let (mut link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    assert!(link.establish(&missile(1, 0), state(1, 0)));
    assert!(link.establish(&missile(2, 0), state(2, 0)));

    let report = link.shutdown();
    assert_eq!(report.sessions_closed, 2);
    assert!(report.worker_joined);
    assert_eq!(link.active_sessions(), 0);

    let channel = transport.channel(&endpoint).unwrap();
    assert!(channel.stream(MissileId(1)).unwrap().is_completed());
    assert!(channel.stream(MissileId(2)).unwrap().is_completed());
    assert_eq!(link.session_state(MissileId(1)), SessionState::Closed);

    // Idempotent.
    let again = link.shutdown();
    assert_eq!(again.sessions_closed, 0);
    assert!(again.worker_joined);
}

#[test]
fn shutdown_abandons_pending_teardowns() {
    let (mut link, _transport) = link(&[0]);
    assert!(link.establish(&missile(1, 0), state(1, 0)));
    assert!(link.terminate(MissileState::destroyed(MissileId(1), TickId(1))));

    let report = link.shutdown();
    assert_eq!(report.sessions_closed, 0);
    assert_eq!(report.teardowns_abandoned, 1);
    assert_eq!(link.pending_teardowns(), 0);
    assert_eq!(link.session_state(MissileId(1)), SessionState::Closed);
}

// ── endpoints and probes ─────────────────────────────────────────

#[test]
fn startup_probes_every_endpoint() {
    let (link, transport) = link(&[0, 1]);
    assert_eq!(
        transport.endpoints(),
        vec![
            "guidance-control0:42069".to_string(),
            "guidance-control1:42069".to_string()
        ]
    );
    assert!(wait_until(Duration::from_secs(2), || {
        link.stats().probes_succeeded >= 2
    }));
    for endpoint in transport.endpoints() {
        assert!(transport.channel(&endpoint).unwrap().health_checks() >= 1);
    }
    assert_eq!(link.stats().endpoints_registered, 2);
}

#[test]
fn endpoints_are_health_checked_on_schedule() {
    init_logging();
    let transport = MockTransport::new();
    let config = LinkConfig {
        probe_interval: Duration::from_millis(50),
        ..link_config(&[0])
    };
    let link = GuidanceLink::new(config, Arc::new(transport.clone())).unwrap();
    let channel = transport
        .channel(&link.config().server_address(ConnectionId(0)))
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || channel.health_checks() >= 1));
    let first = channel.health_checks();
    assert!(wait_until(Duration::from_secs(2), || {
        channel.health_checks() >= first + 2
    }));
    assert!(wait_until(Duration::from_secs(2), || {
        link.stats().probes_succeeded >= 3
    }));
}

#[test]
fn late_registered_endpoint_is_probed() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(7));
    // Create the channel first so it can be made unhealthy.
    {
        use homing_link::Transport;
        transport.connect(&endpoint).unwrap();
    }
    transport.channel(&endpoint).unwrap().set_healthy(false);

    link.register_endpoint(ConnectionId(7)).unwrap();
    assert!(link.has_endpoint(ConnectionId(7)));
    assert!(wait_until(Duration::from_secs(2), || {
        link.stats().probes_failed >= 1
    }));
    // Probe failures are informational; the endpoint stays.
    assert!(link.has_endpoint(ConnectionId(7)));
    assert!(link.establish(&missile(1, 7), state(1, 0)));
}

#[test]
fn duplicate_endpoint_registration_fails() {
    let (link, _transport) = link(&[0]);
    assert_eq!(
        link.register_endpoint(ConnectionId(0)),
        Err(RegistryError::AlreadyRegistered { id: ConnectionId(0) })
    );
}

#[test]
fn register_missile_returns_server_hardware() {
    let (link, transport) = link(&[0]);
    let endpoint = link.config().server_address(ConnectionId(0));
    let channel = transport.channel(&endpoint).unwrap();
    channel.answer_registration(Ok(armed_hardware()));

    assert_eq!(link.register_missile(&missile(1, 0)), Ok(armed_hardware()));
    assert_eq!(channel.registrations().len(), 1);
    assert_eq!(channel.registrations()[0].id, MissileId(1));

    channel.answer_registration(Err(TransportError::DeadlineExceeded {
        deadline: Duration::from_millis(100),
    }));
    assert!(link.register_missile(&missile(2, 0)).is_err());
    assert_eq!(link.stats().registrations_failed, 1);
}

#[test]
fn register_missile_without_endpoint_is_unavailable() {
    let (link, _transport) = link(&[0]);
    match link.register_missile(&missile(1, 3)) {
        Err(TransportError::Unavailable { endpoint, .. }) => {
            assert_eq!(endpoint, "guidance-control3:42069");
        }
        other => panic!("expected Unavailable, got {other:?}"),
    }
    assert_eq!(link.stats().registrations_failed, 1);
}

// ── startup failures ─────────────────────────────────────────────

#[test]
fn refused_transport_fails_startup() {
    init_logging();
    let transport = MockTransport::new();
    transport.refuse_connections(true);
    let result = GuidanceLink::new(link_config(&[0]), Arc::new(transport));
    assert!(matches!(
        result,
        Err(ConfigError::Endpoint(RegistryError::Transport { id: ConnectionId(0), .. }))
    ));
}

#[test]
fn empty_connection_ids_fail_validation() {
    init_logging();
    let result = GuidanceLink::new(link_config(&[]), Arc::new(MockTransport::new()));
    assert!(matches!(result, Err(ConfigError::NoConnectionIds)));
}
