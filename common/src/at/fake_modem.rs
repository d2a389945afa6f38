extern crate std;

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

use embassy_time::{Duration, Instant};

use crate::{
    at::{
        response::{CommandOutcome, ResponseBuffer},
        transport::{Clock, Transport},
    },
    error::Error,
    sim868::hw::{ModemHw, ModemPin},
};

/// Fake clock, time moves only when somebody calls `delay`.
///
/// Clones share the same time, so a `FakeTransport` can see the engine's clock.
#[derive(Clone, Default)]
pub struct FakeClock {
    micros: Rc<Cell<u64>>,
    delays: Rc<RefCell<Vec<Duration>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.micros.get())
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.micros.get())
    }

    fn delay(&mut self, duration: Duration) {
        self.micros.set(self.micros.get() + duration.as_micros());
        self.delays.borrow_mut().push(duration);
    }
}

struct ScriptedReply {
    trigger: String,
    reply: Vec<u8>,
    after: Duration,
}

/// Fake serial link.
///
/// Replies are scripted in order. A reply is released once the matching line is written, after
/// its delay. Replies with an empty trigger are released together with the preceding one.
pub struct FakeTransport {
    clock: FakeClock,
    script: VecDeque<ScriptedReply>,
    scheduled: Vec<(Instant, Vec<u8>)>,
    pending: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    chunk_size: usize,
    fail_writes: bool,
}

impl FakeTransport {
    pub fn new(clock: &FakeClock, interactions: &[(&str, &str)]) -> Self {
        let mut transport = Self {
            clock: clock.clone(),
            script: VecDeque::new(),
            scheduled: Vec::new(),
            pending: VecDeque::new(),
            writes: Vec::new(),
            chunk_size: 16,
            fail_writes: false,
        };
        for (trigger, reply) in interactions {
            transport.reply_after(trigger, reply, Duration::from_millis(0));
        }
        transport
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn reply_after(&mut self, trigger: &str, reply: &str, after: Duration) {
        self.reply_bytes_after(trigger, reply.as_bytes(), after);
    }

    pub fn reply_bytes_after(&mut self, trigger: &str, reply: &[u8], after: Duration) {
        self.script.push_back(ScriptedReply {
            trigger: trigger.to_string(),
            reply: reply.to_vec(),
            after,
        });
    }

    /// Makes `bytes` readable right away, as if the modem sent them unprompted.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }

    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.clone()
    }

    pub fn all_done(&self) -> bool {
        self.script.is_empty() && self.scheduled.is_empty() && self.pending.is_empty()
    }

    fn release_due(&mut self) {
        let now = self.clock.now();
        let (due, later): (Vec<_>, Vec<_>) =
            self.scheduled.drain(..).partition(|(at, _)| *at <= now);
        self.scheduled = later;
        for (_, bytes) in due {
            self.pending.extend(bytes);
        }
    }
}

impl Transport for FakeTransport {
    fn write(&mut self, bytes: &[u8]) -> crate::Result<()> {
        if self.fail_writes {
            return Err(Error::UartWriteError);
        }
        self.writes.push(bytes.to_vec());
        let matches_next = self
            .script
            .front()
            .is_some_and(|next| next.trigger.as_bytes() == bytes);
        if matches_next {
            let now = self.clock.now();
            if let Some(first) = self.script.pop_front() {
                self.scheduled.push((now + first.after, first.reply));
            }
            while self.script.front().is_some_and(|next| next.trigger.is_empty()) {
                if let Some(next) = self.script.pop_front() {
                    self.scheduled.push((now + next.after, next.reply));
                }
            }
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> crate::Result<usize> {
        self.release_due();
        let len = self.pending.len().min(buf.len()).min(self.chunk_size);
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

/// Scripted modem talking at the level of whole AT exchanges.
///
/// Every `send`/`query` must match the next scripted command. The scripted reply is classified
/// exactly like the real engine does it. An empty scripted command stands for `wait_for`.
pub struct FakeModem {
    interactions: VecDeque<(String, String)>,
    commands: Vec<String>,
    raw_writes: Vec<Vec<u8>>,
    delays: Vec<Duration>,
}

impl FakeModem {
    pub fn new(at_interactions: &[(&str, &str)]) -> Self {
        Self {
            interactions: at_interactions
                .iter()
                .map(|(command, response)| (command.to_string(), response.to_string()))
                .collect(),
            commands: Vec::new(),
            raw_writes: Vec::new(),
            delays: Vec::new(),
        }
    }

    pub fn add_interactions(&mut self, at_interactions: &[(&str, &str)]) {
        for (command, response) in at_interactions {
            self.interactions
                .push_back((command.to_string(), response.to_string()));
        }
    }

    pub fn all_done(&self) -> bool {
        self.interactions.is_empty()
    }

    /// All commands sent so far, in order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands.iter().filter(|sent| *sent == command).count()
    }

    pub fn raw_writes(&self) -> &[Vec<u8>] {
        &self.raw_writes
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    fn next_response(&mut self, command: &str) -> ResponseBuffer {
        self.commands.push(command.to_string());
        let (expected, response) = self
            .interactions
            .pop_front()
            .unwrap_or_else(|| panic!("Unexpected call {command}"));
        assert_eq!(expected, command, "Expected {expected}, got {command}");
        ResponseBuffer::from_bytes(response.as_bytes())
    }
}

impl ModemHw for FakeModem {
    fn default_timeout(&self) -> Duration {
        Duration::from_millis(10)
    }

    fn send(&mut self, command: &str, expect: &str, _timeout: Duration) -> CommandOutcome {
        let response = self.next_response(command);
        CommandOutcome::classify(response, expect)
    }

    fn wait_for(&mut self, expect: &str, _timeout: Duration) -> CommandOutcome {
        match self.interactions.front() {
            Some((command, _)) if command.is_empty() => {
                let response = self.next_response("");
                CommandOutcome::classify(response, expect)
            }
            _ => CommandOutcome::NoResponse,
        }
    }

    fn query(&mut self, command: &str, _window: Duration) -> ResponseBuffer {
        self.next_response(command)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> crate::Result<()> {
        self.raw_writes.push(bytes.to_vec());
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        self.delays.push(duration);
    }
}

/// Power pin that remembers every level it was driven to.
#[derive(Default)]
pub struct FakePin {
    levels: Vec<bool>,
}

impl FakePin {
    pub fn levels(&self) -> &[bool] {
        &self.levels
    }

    /// Number of completed high-then-low pulses.
    pub fn pulses(&self) -> usize {
        self.levels.windows(2).filter(|w| w[0] && !w[1]).count()
    }
}

impl ModemPin for FakePin {
    fn set_high(&mut self) {
        self.levels.push(true);
    }

    fn set_low(&mut self) {
        self.levels.push(false);
    }
}
