//! Incremental Server-Sent Events parser for the stream transport.

/// One event from the stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SseEvent {
    /// Value of the `event:` field. `None` means the default `message` type.
    pub event_type: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn kind(&self) -> &str {
        self.event_type.as_deref().unwrap_or("message")
    }
}

/// Turns raw body chunks into events.
///
/// Chunks may split anywhere, including inside a UTF-8 sequence, so bytes
/// are buffered until a blank line closes the event.
#[derive(Default)]
pub(crate) struct SseParser {
    pending: Vec<u8>,
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return any complete events.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);

        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Invalid sequence in the middle: decode lossily and move on.
            Err(_) => self.pending.len(),
        };
        let rest = self.pending.split_off(valid_up_to);
        self.buffer.push_str(&String::from_utf8_lossy(&self.pending));
        self.pending = rest;
        // A CRLF pair can straddle two chunks, so normalize the whole buffer.
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&block[..pos]) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event_type = Some(value.to_string()),
            "data" => data_lines.push(value.to_string()),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event_type,
        data: data_lines.join("\n"),
    })
}
