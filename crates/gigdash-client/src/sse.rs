//! Incremental Server-Sent Events decoder.
//!
//! Network chunks split frames (and even UTF-8 sequences) at arbitrary
//! byte offsets, so the decoder buffers bytes and only interprets complete
//! lines. A frame is dispatched on the blank line that ends it.

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, `"message"` when absent.
    pub event: String,
    pub id: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
    /// Reconnection hint in milliseconds.
    pub retry: Option<u64>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    id: Option<String>,
    data: Option<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            let mut line = &self.buf[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment line (`: keepalive`).
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                let data = self.data.get_or_insert_with(String::new);
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value);
            }
            "id" => self.id = Some(value.to_string()),
            "retry" => self.retry = value.parse().ok(),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        let retry = self.retry.take();
        let data = self.data.take()?;
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            id,
            data,
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: job:captured\nid: abc\ndata: {\"a\":1}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "job:captured".to_string(),
                id: Some("abc".to_string()),
                data: "{\"a\":1}".to_string(),
                retry: None,
            }]
        );
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: system:hea").is_empty());
        assert!(decoder.push(b"rtbeat\ndata: {}").is_empty());
        assert!(decoder.push(b"\n").is_empty());
        let frames = decoder.push(b"\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "system:heartbeat");
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn test_utf8_sequence_split() {
        let mut decoder = SseDecoder::new();
        let text = "data: café\n\n".as_bytes();
        let split = text.len() - 3; // inside the two-byte "é"
        assert!(decoder.push(&text[..split]).is_empty());
        let frames = decoder.push(&text[split..]);
        assert_eq!(frames[0].data, "café");
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: one\n\ndata: two\n\n");
        let data: Vec<_> = frames.into_iter().map(|f| f.data).collect();
        assert_eq!(data, vec!["one", "two"]);
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keepalive\r\n\r\nevent: x\r\ndata: y\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "x");
        assert_eq!(frames[0].data, "y");
    }

    #[test]
    fn test_multiline_data_and_default_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: a\ndata: b\nretry: 1500\n\n");
        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "a\nb");
        assert_eq!(frames[0].retry, Some(1500));
    }

    #[test]
    fn test_frame_without_data_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: lonely\n\n").is_empty());
        // Fields do not leak into the next frame.
        let frames = decoder.push(b"data: z\n\n");
        assert_eq!(frames[0].event, "message");
    }
}
