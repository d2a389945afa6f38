use embassy_time::Duration;
use simtrack_common::at::engine::{AtEngine, DEFAULT_POLL_INTERVAL};
use simtrack_common::at::fake_modem::{FakeClock, FakeTransport};
use simtrack_common::at::response::OutcomeKind;

const COMMANDS: [(&str, &str, &str); 5] = [
    ("AT", "AT\r\r\nOK\r\n", "OK"),
    ("AT+CPIN?", "+CPIN: READY\r\n\r\nOK\r\n", "READY"),
    ("AT+CGREG?", "+CGREG: 0,1\r\n\r\nOK\r\n", "0,1"),
    ("AT+CMGS=\"+263784488466\"", "\r\n> ", ">"),
    ("AT+CIFSR", "\r\n10.21.33.4\r\n", "."),
];

fn engine(transport: FakeTransport, clock: &FakeClock) -> AtEngine<FakeTransport, FakeClock> {
    AtEngine::new(transport, clock.clone(), Duration::from_secs(2))
}

#[test]
fn test_outcome_classification() {
    for (command, reply, expect) in COMMANDS {
        let line = format!("{command}\r\n");

        let clock = FakeClock::new();
        let mut at = engine(FakeTransport::new(&clock, &[(&line, reply)]), &clock);
        let outcome = at.send(command, expect, Duration::from_secs(1));
        assert_eq!(outcome.kind(), OutcomeKind::Matched, "{command}");

        let clock = FakeClock::new();
        let transport = FakeTransport::new(&clock, &[(&line, "+CME ERROR: 10\r\n")]);
        let mut at = engine(transport, &clock);
        let outcome = at.send(command, expect, Duration::from_secs(1));
        assert_eq!(outcome.kind(), OutcomeKind::Mismatched, "{command}");
        assert_eq!(clock.elapsed(), Duration::from_secs(1));

        let clock = FakeClock::new();
        let mut at = engine(FakeTransport::new(&clock, &[]), &clock);
        let outcome = at.send(command, expect, Duration::from_secs(1));
        assert_eq!(outcome.kind(), OutcomeKind::NoResponse, "{command}");
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }
}

#[test]
fn test_wait_is_bounded_by_last_byte() {
    for delay_ms in [0, 7, 10, 333, 1999] {
        let clock = FakeClock::new();
        let mut transport = FakeTransport::new(&clock, &[]);
        transport.reply_after("AT+CGATT?\r\n", "+CGATT: 1\r\n", Duration::from_millis(delay_ms));
        transport.reply_after("", "\r\nOK\r\n", Duration::from_millis(delay_ms + 1));
        let mut at = engine(transport, &clock);

        let outcome = at.send("AT+CGATT?", "OK", Duration::from_secs(2));
        assert!(outcome.is_matched());
        let last_byte = Duration::from_millis(delay_ms + 1);
        assert!(clock.elapsed() >= last_byte);
        assert!(clock.elapsed() <= last_byte + DEFAULT_POLL_INTERVAL);
    }
}

#[test]
fn test_reply_after_timeout_is_ignored() {
    let clock = FakeClock::new();
    let mut transport = FakeTransport::new(&clock, &[]);
    transport.reply_after("AT+CIICR\r\n", "OK\r\n", Duration::from_secs(3));
    let mut at = engine(transport, &clock);

    let outcome = at.send("AT+CIICR", "OK", Duration::from_secs(2));
    assert_eq!(outcome.kind(), OutcomeKind::NoResponse);
    assert_eq!(clock.elapsed(), Duration::from_secs(2));

    // The late reply is picked up by the next exchange.
    assert!(at.wait_for("OK", Duration::from_secs(2)).is_matched());
}

#[test]
fn test_custom_poll_interval() {
    let clock = FakeClock::new();
    let mut transport = FakeTransport::new(&clock, &[]);
    transport.reply_after("AT\r\n", "OK\r\n", Duration::from_millis(120));
    let mut at = engine(transport, &clock).with_poll_interval(Duration::from_millis(50));

    assert!(at.send("AT", "OK", Duration::from_secs(2)).is_matched());
    assert_eq!(clock.elapsed(), Duration::from_millis(150));
    assert!(clock.delays().iter().all(|d| *d == Duration::from_millis(50)));
}
