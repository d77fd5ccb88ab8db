use crate::protocol::{ClientEnvelope, ServerMessage};

pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Used when a server message cannot be encoded. Never expected in practice.
const ENCODE_FAILURE: &str = r#"{"type":"error","msg":"internal encoding error"}"#;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("message is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("malformed message: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("message longer than {limit} bytes")]
    LineTooLong { limit: usize },
}

/// Splits a byte stream into `\n`-terminated lines.
pub struct LineBuffer {
    buf: Vec<u8>,
    max_line_len: usize,
    overflowed: bool,
}

impl LineBuffer {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line_len,
            overflowed: false,
        }
    }

    /// Feed raw data into the buffer. Returns any complete lines; a line
    /// that exceeded the limit comes back as `LineTooLong`.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<Vec<u8>, FrameError>> {
        let mut lines = Vec::new();

        for &byte in data {
            match byte {
                b'\n' => {
                    let line = std::mem::take(&mut self.buf);
                    if std::mem::take(&mut self.overflowed) {
                        lines.push(Err(FrameError::LineTooLong {
                            limit: self.max_line_len,
                        }));
                    } else {
                        lines.push(Ok(line));
                    }
                }
                b'\r' => {}
                _ => {
                    // Bytes past the limit are not kept.
                    if self.buf.len() < self.max_line_len {
                        self.buf.push(byte);
                    } else {
                        self.overflowed = true;
                    }
                }
            }
        }

        lines
    }

    /// Bytes received since the last complete line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN)
    }
}

/// Decode one line into a client envelope.
pub fn decode_line(line: &[u8]) -> Result<ClientEnvelope, FrameError> {
    let text = std::str::from_utf8(line)?;
    Ok(serde_json::from_str(text)?)
}

/// Whether a line carries nothing but whitespace.
pub fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Encode a server message as one line, without the trailing newline.
pub fn encode(message: &ServerMessage) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode server message");
        ENCODE_FAILURE.to_string()
    })
}
