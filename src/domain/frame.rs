//! Flex sensor frame assembly
//!
//! The glove firmware emits one short text record per reading, but the link
//! layer delivers it in arbitrary fragments: a BLE notification may carry half
//! a record, two records, or a record plus the head of the next one, and the
//! BLE path has no terminator and no length prefix. [`FrameAssembler`]
//! accumulates fragments and extracts complete [`SensorFrame`] records.
//!
//! ## Wire formats
//!
//! ```text
//! CSV (serial)  : "512,300,700,900,100\n"
//! Tagged (BLE)  : "Flex: T:512 I:300 M:700 R:900 P:100 Th:14500"
//! Tagged, terse : "T:512I:300M:700R:900P:100"
//! ```
//!
//! Newline-terminated lines are framed by the terminator. Tagged messages
//! without a terminator are considered complete once all five finger markers
//! (`T:`, `I:`, `M:`, `R:`, `P:`) have arrived in order; the temperature
//! marker `Th:` is optional and only honored after `P:`.

use tracing::{debug, trace, warn};

/// Pending-buffer ceiling. A buffer this long means the stream is
/// desynchronized and will never complete a record.
pub const DEFAULT_BUFFER_CEILING: usize = 200;

/// One complete parsed glove reading.
///
/// Values are raw ADC counts and pass through unclamped; range handling is a
/// consumer concern. `temperature` is only present when the message carried a
/// usable `Th:` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFrame {
    pub thumb: i32,
    pub index: i32,
    pub middle: i32,
    pub ring: i32,
    pub pinky: i32,
    pub temperature: Option<i32>,
}

/// Diagnostic counters. The assembler never surfaces errors to the caller;
/// these are the only visible trace of discarded input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames successfully parsed.
    pub frames: u64,
    /// Newline-terminated lines that parsed as neither CSV nor tagged.
    pub discarded_lines: u64,
    /// Complete tagged messages dropped because a field failed to parse.
    pub discarded_messages: u64,
    /// Forced buffer resets after exceeding the ceiling.
    pub overflow_resets: u64,
}

/// Incremental parser for the glove's byte stream.
///
/// Feed it chunks as they arrive; it returns whatever complete frames the
/// buffered bytes allow. Bad input never stalls the stream: malformed lines
/// are skipped, corrupt messages are dropped, and an over-long buffer is
/// reset wholesale.
pub struct FrameAssembler {
    pending: String,
    ceiling: usize,
    stats: FrameStats,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_ceiling(DEFAULT_BUFFER_CEILING)
    }

    /// Use a non-default pending-buffer ceiling.
    pub fn with_ceiling(ceiling: usize) -> Self {
        Self {
            pending: String::new(),
            ceiling,
            stats: FrameStats::default(),
        }
    }

    /// Ingest one received chunk and extract any frames it completes.
    ///
    /// An empty chunk is a no-op. Chunks may split or join records at any
    /// byte position.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SensorFrame> {
        if chunk.is_empty() {
            return Vec::new();
        }

        // The firmware speaks 7-bit ASCII; anything else is line noise.
        self.pending
            .extend(chunk.iter().map(|&b| if b.is_ascii() { b as char } else { '?' }));
        trace!(len = chunk.len(), pending = self.pending.len(), "chunk buffered");

        let mut frames = Vec::new();

        // Newline-terminated lines first. A line is consumed whether or not
        // it parses, so one bad line cannot wedge the ones behind it.
        while let Some(pos) = self.pending.find('\n') {
            let raw: String = self.pending.drain(..=pos).collect();
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            match parse_record(line) {
                Some(frame) => {
                    self.stats.frames += 1;
                    frames.push(frame);
                }
                None => {
                    self.stats.discarded_lines += 1;
                    debug!(line, "discarding unparsable line");
                }
            }
        }

        // Without a terminator the message is complete once every finger
        // marker has arrived, in order. Fewer markers, or markers out of
        // order, mean a fragment is still in flight: leave the buffer alone.
        if frames.is_empty() && !self.pending.is_empty() && markers_complete(&self.pending) {
            match parse_tagged(self.pending.trim()) {
                Some(frame) => {
                    self.stats.frames += 1;
                    frames.push(frame);
                }
                None => {
                    self.stats.discarded_messages += 1;
                    debug!(message = %self.pending.trim(), "discarding corrupt message");
                }
            }
            self.pending.clear();
        }

        if self.pending.len() > self.ceiling {
            self.stats.overflow_resets += 1;
            warn!(len = self.pending.len(), "pending buffer overflow, resetting");
            self.pending.clear();
        }

        frames
    }

    /// Bytes buffered but not yet consumed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

/// Parse one framed line: CSV first, tagged as the fallback.
fn parse_record(line: &str) -> Option<SensorFrame> {
    parse_csv(line).or_else(|| parse_tagged(line))
}

/// `thumb,index,middle,ring,pinky` with exactly five integer fields.
fn parse_csv(line: &str) -> Option<SensorFrame> {
    let mut values = [0i32; 5];
    let mut count = 0;
    for part in line.split(',') {
        if count == values.len() {
            return None;
        }
        values[count] = part.trim().parse().ok()?;
        count += 1;
    }
    if count != values.len() {
        return None;
    }
    Some(SensorFrame {
        thumb: values[0],
        index: values[1],
        middle: values[2],
        ring: values[3],
        pinky: values[4],
        temperature: None,
    })
}

/// Free text carrying the ordered markers `T:` `I:` `M:` `R:` `P:` and an
/// optional trailing `Th:`.
fn parse_tagged(line: &str) -> Option<SensorFrame> {
    let t = line.find("T:")?;
    let i = find_marker(line, " I:", "I:")?;
    let m = find_marker(line, " M:", "M:")?;
    let r = find_marker(line, " R:", "R:")?;
    let p = find_marker(line, " P:", "P:")?;
    if !(i > t && m > i && r > m && p > r) {
        return None;
    }

    // A temperature marker ahead of P: cannot be the trailing field; some
    // firmware revisions emit it there and it is simply ignored.
    let th = find_marker(line, " Th:", "Th:").filter(|&th| th > p);

    let thumb = field(line, t + 2, Some(i))?;
    let index = field(line, value_start(line, i, 2), Some(m))?;
    let middle = field(line, value_start(line, m, 2), Some(r))?;
    let ring = field(line, value_start(line, r, 2), Some(p))?;
    let pinky = field(line, value_start(line, p, 2), th)?;

    // A bad temperature value costs only the temperature, not the frame.
    let temperature = th.and_then(|th| field(line, value_start(line, th, 3), None));

    Some(SensorFrame {
        thumb,
        index,
        middle,
        ring,
        pinky,
        temperature,
    })
}

/// All five finger markers present at strictly increasing positions.
fn markers_complete(text: &str) -> bool {
    match (
        text.find("T:"),
        find_marker(text, " I:", "I:"),
        find_marker(text, " M:", "M:"),
        find_marker(text, " R:", "R:"),
        find_marker(text, " P:", "P:"),
    ) {
        (Some(t), Some(i), Some(m), Some(r), Some(p)) => i > t && m > i && r > m && p > r,
        _ => false,
    }
}

/// Locate a marker, preferring the space-prefixed form so a letter inside an
/// adjacent token (the `R:` in a miswired `TR:`, say) is not matched first.
fn find_marker(text: &str, spaced: &str, bare: &str) -> Option<usize> {
    text.find(spaced).or_else(|| text.find(bare))
}

/// First value byte after a marker found at `pos`, stepping over the leading
/// space when the space-prefixed form matched.
fn value_start(line: &str, pos: usize, tag_len: usize) -> usize {
    if line.as_bytes()[pos] == b' ' {
        pos + 1 + tag_len
    } else {
        pos + tag_len
    }
}

/// Integer between `start` and `end` (or end of line): trimmed, then cut
/// after its last ASCII digit so trailing junk or an abutting marker letter
/// does not poison the parse.
fn field(line: &str, start: usize, end: Option<usize>) -> Option<i32> {
    let end = end.unwrap_or(line.len());
    if start >= end || end > line.len() {
        return None;
    }
    let segment = line[start..end].trim();
    let last_digit = segment.rfind(|c: char| c.is_ascii_digit())?;
    segment[..=last_digit].parse().ok()
}
