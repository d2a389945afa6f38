#[cfg(feature = "defmt")]
use defmt::{debug, error, warn};
use embassy_time::{Duration, Instant};
use heapless::format;
#[cfg(not(feature = "defmt"))]
use log::{debug, error, warn};

use super::response::{AT_COMMAND_SIZE, CommandOutcome, ResponseBuffer};
use super::transport::{Clock, Transport};
use crate::error::Error;

/// Appended to every command line.
pub const LINE_TERMINATOR: &str = "\r\n";
/// Sleep between two polls of an idle transport.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long a matched `+CMD: ...` line may wait for its trailing `OK`.
pub const FINAL_RESULT_GRACE: Duration = Duration::from_millis(100);
const READ_CHUNK_SIZE: usize = 64;

/// AT command engine.
///
/// Owns the transport and the clock for the whole run. Every read is bounded by a deadline
/// computed from the injected [`Clock`], the transport itself never blocks.
pub struct AtEngine<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    default_timeout: Duration,
    poll_interval: Duration,
}

impl<T: Transport, C: Clock> AtEngine<T, C> {
    pub fn new(transport: T, clock: C, default_timeout: Duration) -> Self {
        Self {
            transport,
            clock,
            default_timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_parts(self) -> (T, C) {
        (self.transport, self.clock)
    }

    /// Sends `command` and waits until `expect` shows up in the response or `timeout` elapses.
    ///
    /// Returns as soon as the response matches. A failed write is logged and the exchange still
    /// waits out its window, so it ends up as `NoResponse` or `Mismatched`. Input left over
    /// from earlier exchanges is discarded before writing.
    pub fn send(&mut self, command: &str, expect: &str, timeout: Duration) -> CommandOutcome {
        let start = self.clock.now();
        self.discard_input();
        if let Err(err) = self.write_line(command) {
            error!("Cannot send {}: {}", command, err);
        }
        let outcome = self.wait_for(expect, timeout);
        debug!(
            "{}: {}, took {}ms",
            command,
            outcome,
            (self.clock.now() - start).as_millis()
        );
        outcome
    }

    /// Waits for `expect` without sending anything first.
    ///
    /// When the match is an information response still missing its final result code, keeps
    /// reading for up to [`FINAL_RESULT_GRACE`] so the `OK` does not leak into the next exchange.
    pub fn wait_for(&mut self, expect: &str, timeout: Duration) -> CommandOutcome {
        let deadline = self.clock.now() + timeout;
        let mut response = ResponseBuffer::new();
        loop {
            let received = self.poll(&mut response);
            if response.matches(expect) {
                self.await_final_result(&mut response, deadline);
                return CommandOutcome::Matched(response);
            }
            let now = self.clock.now();
            if now >= deadline {
                break;
            }
            if received == 0 {
                self.clock.delay(self.poll_interval.min(deadline - now));
            }
        }
        Self::warn_dropped(&response);
        CommandOutcome::classify(response, expect)
    }

    /// Accumulates everything the modem sends during `window`, without looking for a token.
    pub fn collect_for(&mut self, window: Duration) -> ResponseBuffer {
        let deadline = self.clock.now() + window;
        let mut response = ResponseBuffer::new();
        loop {
            let received = self.poll(&mut response);
            let now = self.clock.now();
            if now >= deadline {
                break;
            }
            if received == 0 {
                self.clock.delay(self.poll_interval.min(deadline - now));
            }
        }
        Self::warn_dropped(&response);
        response
    }

    /// Sends `command` and returns whatever arrives during `window`.
    pub fn query(&mut self, command: &str, window: Duration) -> ResponseBuffer {
        self.discard_input();
        if let Err(err) = self.write_line(command) {
            error!("Cannot send {}: {}", command, err);
        }
        let response = self.collect_for(window);
        debug!("{}: {}", command, response);
        response
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> crate::Result<()> {
        self.transport.write(bytes).map_err(|_| Error::UartWriteError)
    }

    pub fn delay(&mut self, duration: Duration) {
        self.clock.delay(duration);
    }

    fn write_line(&mut self, command: &str) -> crate::Result<()> {
        let line = format!(AT_COMMAND_SIZE; "{command}{LINE_TERMINATOR}")?;
        self.write_raw(line.as_bytes())
    }

    fn await_final_result(&mut self, response: &mut ResponseBuffer, deadline: Instant) {
        if !response.has_information_response() {
            return;
        }
        let grace_end = (self.clock.now() + FINAL_RESULT_GRACE).min(deadline);
        while !response.has_final_result_code() {
            let now = self.clock.now();
            if now >= grace_end {
                break;
            }
            self.clock.delay(self.poll_interval.min(grace_end - now));
            self.poll(response);
        }
    }

    fn discard_input(&mut self) {
        let mut stale = ResponseBuffer::new();
        if self.poll(&mut stale) > 0 {
            debug!("Discarding stale input: {}", stale);
        }
    }

    fn warn_dropped(response: &ResponseBuffer) {
        if response.dropped() > 0 {
            warn!("Response buffer full, dropped {} bytes", response.dropped());
        }
    }

    /// Moves all currently available bytes into `response`. Returns how many bytes were read.
    fn poll(&mut self, response: &mut ResponseBuffer) -> usize {
        let mut chunk = [0; READ_CHUNK_SIZE];
        let mut total = 0;
        loop {
            match self.transport.read_available(&mut chunk) {
                Ok(0) => break,
                Ok(len) => {
                    let len = len.min(chunk.len());
                    response.extend(&chunk[..len]);
                    total += len;
                }
                Err(err) => {
                    warn!("Read from modem failed: {}", err);
                    break;
                }
            }
        }
        total
    }
}

#[cfg(feature = "std")]
#[cfg(test)]
mod test {
    use super::*;
    use crate::at::fake_modem::{FakeClock, FakeTransport};
    use crate::at::response::OutcomeKind;

    extern crate std;
    use std::vec;

    fn engine(transport: FakeTransport, clock: &FakeClock) -> AtEngine<FakeTransport, FakeClock> {
        AtEngine::new(transport, clock.clone(), Duration::from_secs(2))
    }

    #[test]
    fn test_send_matched() {
        let clock = FakeClock::new();
        let transport = FakeTransport::new(&clock, &[("AT\r\n", "AT\r\r\nOK\r\n")]);
        let mut at = engine(transport, &clock);

        let outcome = at.send("AT", "OK", Duration::from_secs(2));
        assert_eq!(outcome.kind(), OutcomeKind::Matched);
        assert_eq!(
            outcome.response().unwrap().as_text(),
            Some("AT\r\r\nOK\r\n")
        );
        assert_eq!(at.transport().writes(), vec![b"AT\r\n".to_vec()]);
        assert!(clock.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_send_mismatched_waits_full_timeout() {
        let clock = FakeClock::new();
        let transport = FakeTransport::new(&clock, &[("AT+CPIN?\r\n", "+CPIN: SIM PIN\r\n")]);
        let mut at = engine(transport, &clock);

        let outcome = at.send("AT+CPIN?", "READY", Duration::from_millis(500));
        assert_eq!(outcome.kind(), OutcomeKind::Mismatched);
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn test_send_no_response() {
        let clock = FakeClock::new();
        let mut at = engine(FakeTransport::new(&clock, &[]), &clock);

        let outcome = at.send("AT", "OK", Duration::from_millis(300));
        assert_eq!(outcome, CommandOutcome::NoResponse);
        assert_eq!(clock.elapsed(), Duration::from_millis(300));
    }

    #[test]
    fn test_garbled_response_is_mismatch() {
        let clock = FakeClock::new();
        let mut transport = FakeTransport::new(&clock, &[]);
        transport.reply_bytes_after("AT\r\n", b"\xfe\xffOK\r\n", Duration::from_millis(0));
        let mut at = engine(transport, &clock);

        let outcome = at.send("AT", "OK", Duration::from_millis(100));
        assert_eq!(outcome.kind(), OutcomeKind::Mismatched);
    }

    #[test]
    fn test_stale_input_is_discarded_before_write() {
        let clock = FakeClock::new();
        let mut transport = FakeTransport::new(&clock, &[("AT+CSQ\r\n", "+CSQ: 21,0\r\n\r\nOK\r\n")]);
        transport.push_bytes(b"\r\nOK\r\n\r\nRING\r\n");
        let mut at = engine(transport, &clock);

        let outcome = at.send("AT+CSQ", "OK", Duration::from_secs(1));
        assert!(outcome.is_matched());
        assert_eq!(
            outcome.response().unwrap().as_text(),
            Some("+CSQ: 21,0\r\n\r\nOK\r\n")
        );
    }

    #[test]
    fn test_split_final_result_stays_with_its_command() {
        let clock = FakeClock::new();
        let mut transport = FakeTransport::new(&clock, &[]);
        transport.reply_after("AT+CPIN?\r\n", "+CPIN: READY\r\n", Duration::from_millis(20));
        transport.reply_after("", "\r\nOK\r\n", Duration::from_millis(35));
        transport.reply_after("AT+CSQ\r\n", "+CSQ: 21,0\r\n\r\nOK\r\n", Duration::from_millis(500));
        let mut at = engine(transport, &clock);

        let outcome = at.send("AT+CPIN?", "READY", Duration::from_secs(1));
        assert!(outcome.is_matched());
        assert!(outcome.response().unwrap().has_final_result_code());

        let start = clock.elapsed();
        let outcome = at.send("AT+CSQ", "OK", Duration::from_secs(1));
        assert!(outcome.is_matched());
        assert!(clock.elapsed() - start >= Duration::from_millis(500));
        assert!(outcome.response().unwrap().matches("+CSQ: 21,0"));
        assert!(at.transport().all_done());
    }

    #[test]
    fn test_missing_final_result_waits_only_grace() {
        let clock = FakeClock::new();
        let transport = FakeTransport::new(&clock, &[("AT+CPIN?\r\n", "+CPIN: READY\r\n")]);
        let mut at = engine(transport, &clock);

        assert!(at.send("AT+CPIN?", "READY", Duration::from_secs(2)).is_matched());
        assert!(clock.elapsed() <= FINAL_RESULT_GRACE + DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_match_is_found_across_chunks() {
        let clock = FakeClock::new();
        let transport =
            FakeTransport::new(&clock, &[("AT+CGREG?\r\n", "AT+CGREG?\r\r\n+CGREG: 0,1\r\n\r\nOK\r\n")])
                .with_chunk_size(3);
        let mut at = engine(transport, &clock);

        assert!(at.send("AT+CGREG?", "0,1", Duration::from_secs(1)).is_matched());
    }

    #[test]
    fn test_late_reply_returns_within_one_poll() {
        let clock = FakeClock::new();
        let mut transport = FakeTransport::new(&clock, &[]);
        transport.reply_after("AT+CIICR\r\n", "OK\r\n", Duration::from_millis(1234));
        let mut at = engine(transport, &clock);

        let outcome = at.send("AT+CIICR", "OK", Duration::from_secs(5));
        assert!(outcome.is_matched());
        assert!(clock.elapsed() >= Duration::from_millis(1234));
        assert!(clock.elapsed() <= Duration::from_millis(1234) + DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_collect_for_reads_whole_window() {
        let clock = FakeClock::new();
        let mut transport = FakeTransport::new(&clock, &[]);
        transport.reply_after("AT+CGNSINF\r\n", "+CGNSINF: 1,1,", Duration::from_millis(100));
        transport.reply_after("", "123,4,5\r\nOK\r\n", Duration::from_millis(900));
        let mut at = engine(transport, &clock);

        let response = at.query("AT+CGNSINF", Duration::from_secs(2));
        assert_eq!(response.as_text(), Some("+CGNSINF: 1,1,123,4,5\r\nOK\r\n"));
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn test_write_error_still_waits() {
        let clock = FakeClock::new();
        let mut transport = FakeTransport::new(&clock, &[]);
        transport.fail_writes();
        let mut at = engine(transport, &clock);

        assert_eq!(
            at.send("AT", "OK", Duration::from_millis(200)),
            CommandOutcome::NoResponse
        );
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
        assert_eq!(at.write_raw(b"x"), Err(Error::UartWriteError));
    }
}
