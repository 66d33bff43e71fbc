/// One complete server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    Done,
}

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a frame is complete, so a UTF-8 character split
/// across network chunks is decoded whole.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes and drain the frames completed so far.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.contains(&b'\r') {
            self.buffer = normalize_newlines(&self.buffer);
        }
        let mut frames = Vec::new();

        while let Some(split) = find_frame_end(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..split + 2).collect();
            let frame = String::from_utf8_lossy(&raw[..split]);

            match extract_data_payload(&frame) {
                Some(payload) if payload == "[DONE]" => frames.push(SseFrame::Done),
                Some(payload) => frames.push(SseFrame::Data(payload)),
                None => {}
            }
        }

        frames
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Collapse `\r\n` pairs. A trailing lone `\r` is kept until its `\n` arrives.
fn normalize_newlines(buffer: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.len());
    let mut iter = buffer.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}
