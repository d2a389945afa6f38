use core::{fmt::Display, str::FromStr};
use heapless::{String, Vec};

use crate::error::Error;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Substring {
    start: usize,
    end: usize,
}

impl Substring {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

pub const AT_COMMAND_SIZE: usize = 90;
/// Capacity of a single [`ResponseBuffer`]. A `+CGNSINF` report with echo fits comfortably.
pub const RESPONSE_BUFFER_SIZE: usize = 512;
const AT_VALUE_COUNT: usize = 8;

/// Bytes received from the modem during one timeout window.
///
/// Append-only. Bytes that do not fit are dropped and counted in [`ResponseBuffer::dropped`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseBuffer {
    bytes: Vec<u8, RESPONSE_BUFFER_SIZE>,
    dropped: usize,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.extend(bytes);
        buffer
    }

    /// Appends `bytes`, returns how many of them were stored.
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes.len().min(self.bytes.capacity() - self.bytes.len());
        // Cannot fail, `accepted` fits into the remaining capacity.
        let _ = self.bytes.extend_from_slice(&bytes[..accepted]);
        self.dropped += bytes.len() - accepted;
        accepted
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bytes.is_full()
    }

    /// Number of bytes that arrived after the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// The buffer decoded as UTF-8, `None` if the modem sent garbage.
    pub fn as_text(&self) -> Option<&str> {
        core::str::from_utf8(&self.bytes).ok()
    }

    /// True if at least one byte was received and `expect` is a substring of the decoded text.
    pub fn matches(&self, expect: &str) -> bool {
        !self.is_empty() && self.as_text().is_some_and(|text| text.contains(expect))
    }

    /// True if a final result code (`OK`, `ERROR`, `+CME ERROR: ..`, `+CMS ERROR: ..`) arrived.
    pub fn has_final_result_code(&self) -> bool {
        self.as_text().is_some_and(|text| {
            text.lines().map(str::trim).any(|line| {
                line == "OK"
                    || line == "ERROR"
                    || line.starts_with("+CME ERROR")
                    || line.starts_with("+CMS ERROR")
            })
        })
    }

    /// True if the buffer holds an information response line such as `+CPIN: READY`.
    pub fn has_information_response(&self) -> bool {
        self.as_text().is_some_and(|text| {
            text.lines()
                .map(str::trim)
                .any(|line| line.starts_with('+') && line.contains(": "))
        })
    }

    /// Finds the first `+<command>: ...` line in the buffer.
    pub fn command_response(&self, command: &str) -> Option<CommandResponse> {
        self.as_text()?
            .lines()
            .map(str::trim)
            .filter_map(|line| CommandResponse::new(line).ok())
            .find(|response| response.command() == command)
    }
}

impl Display for ResponseBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.as_text() {
            Some(text) => write!(f, "{:?}", text.trim()),
            None => write!(f, "<{} bytes, not UTF-8>", self.len()),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ResponseBuffer {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=[u8]:a}", self.bytes.as_slice())
    }
}

/// Outcome kind without the payload, for reports and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutcomeKind {
    Matched,
    Mismatched,
    NoResponse,
}

/// Result of one AT exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The expected token was found in the response.
    Matched(ResponseBuffer),
    /// The modem replied, but the expected token never showed up.
    Mismatched(ResponseBuffer),
    /// Nothing was received before the timeout.
    NoResponse,
}

impl CommandOutcome {
    /// Classifies a finished response window.
    ///
    /// Matching is plain substring containment on the decoded text. Undecodable bytes never
    /// match.
    pub fn classify(response: ResponseBuffer, expect: &str) -> Self {
        if response.is_empty() {
            CommandOutcome::NoResponse
        } else if response.matches(expect) {
            CommandOutcome::Matched(response)
        } else {
            CommandOutcome::Mismatched(response)
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            CommandOutcome::Matched(_) => OutcomeKind::Matched,
            CommandOutcome::Mismatched(_) => OutcomeKind::Mismatched,
            CommandOutcome::NoResponse => OutcomeKind::NoResponse,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, CommandOutcome::Matched(_))
    }

    pub fn response(&self) -> Option<&ResponseBuffer> {
        match self {
            CommandOutcome::Matched(response) | CommandOutcome::Mismatched(response) => {
                Some(response)
            }
            CommandOutcome::NoResponse => None,
        }
    }
}

impl Display for CommandOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CommandOutcome::Matched(response) => write!(f, "matched {response}"),
            CommandOutcome::Mismatched(response) => write!(f, "mismatched {response}"),
            CommandOutcome::NoResponse => write!(f, "no response"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommandOutcome {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            CommandOutcome::Matched(response) => defmt::write!(fmt, "matched {}", response),
            CommandOutcome::Mismatched(response) => defmt::write!(fmt, "mismatched {}", response),
            CommandOutcome::NoResponse => defmt::write!(fmt, "no response"),
        }
    }
}

/// A `+CMD: v1,v2,...` line of a modem response.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandResponse {
    line: String<AT_COMMAND_SIZE>,
    prefix: Substring,
}

impl CommandResponse {
    pub fn new(line: &str) -> crate::Result<Self> {
        let (prefix, rest) = Self::split_at_response(line).ok_or(Error::ParseError)?;
        Self::split_values(rest)?;
        Ok(Self {
            line: String::from_str(line).map_err(|_| Error::BufferTooSmallError)?,
            prefix: Substring::new(1, 1 + prefix.len()),
        })
    }

    pub fn command(&self) -> &str {
        &self.line[self.prefix.start()..self.prefix.end()]
    }

    pub fn values(&self) -> Vec<&str, AT_VALUE_COUNT> {
        // Validated in `new`.
        Self::split_values(&self.line[self.prefix.end() + 2..]).unwrap_or_default()
    }

    fn split_at_response(line: &str) -> Option<(&str, &str)> {
        if line.starts_with('+')
            && let Some(prefix_len) = line.find(": ")
        {
            let prefix = &line[1..prefix_len];
            let rest = &line[prefix_len + 2..];
            return Some((prefix, rest));
        }
        None
    }

    /// Parse out values out of a AT command response.
    ///
    /// Double quotes for strings are ignored. Numbers are returned as strings. For example,
    /// 1,"google.com",15 is parsed into ["1", "google.com", "15"].
    fn split_values(mut values: &str) -> Result<Vec<&str, AT_VALUE_COUNT>, Error> {
        let mut split = Vec::new();
        while !values.is_empty() {
            let pos = match values.chars().next() {
                Some('"') => {
                    let pos = values.find("\",").unwrap_or(values.len() - 1);
                    if pos == 0 || (pos == values.len() - 1 && !values.ends_with('"')) {
                        // A lone quote, or one opening quote with no closing one.
                        return Err(Error::ParseError);
                    }
                    split.push(&values[1..pos]).map_err(|_| Error::BufferTooSmallError)?;
                    pos + 1
                }
                _ => {
                    let pos = values.find(',').unwrap_or(values.len());
                    split.push(&values[..pos]).map_err(|_| Error::BufferTooSmallError)?;
                    pos
                }
            };
            if pos >= values.len() {
                break;
            }
            values = &values[pos + 1..];
        }
        Ok(split)
    }

    fn parse<T: FromStr>(s: &str) -> Result<T, Error> {
        str::parse(s).map_err(|_| Error::ParseError)
    }

    pub fn parse1<T: FromStr>(&self, indices: [usize; 1]) -> Result<T, Error> {
        let values = self.values();
        let value = values.get(indices[0]).ok_or(Error::ModemError)?;
        Self::parse::<T>(value)
    }

    pub fn parse2<T: FromStr, U: FromStr>(&self, indices: [usize; 2]) -> Result<(T, U), Error> {
        let values = self.values();
        let first = values.get(indices[0]).ok_or(Error::ModemError)?;
        let second = values.get(indices[1]).ok_or(Error::ModemError)?;
        Ok((Self::parse::<T>(first)?, Self::parse::<U>(second)?))
    }
}

impl Display for CommandResponse {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.line.trim())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommandResponse {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.line.as_str())
    }
}
