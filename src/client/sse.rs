//! Server-Sent Events framing for chat completion streams.

/// One event relevant to a completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a `data:` line
    Data(String),
    /// `data: [DONE]`
    Done,
}

/// Splits a byte stream into `data:` events.
///
/// Bytes are kept until a full line arrives so multi-byte characters split
/// across network chunks survive intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete event, skipping blank lines, comments and other fields.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            if let Some(event) = parse_line(&line) {
                return Some(event);
            }
        }
        None
    }

    /// Treat whatever is left as a final line. Used once the transport closes.
    pub fn flush(&mut self) -> Option<SseEvent> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\n', '\r']);
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim() == "[DONE]" {
        Some(SseEvent::Done)
    } else if payload.trim().is_empty() {
        None
    } else {
        Some(SseEvent::Data(payload.to_string()))
    }
}
