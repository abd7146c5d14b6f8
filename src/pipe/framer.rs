/// Turns the raw reply stream into whole replies.
///
/// A reply is every line up to a line that holds nothing but its end-of-line
/// marker. Lines are buffered as bytes so a UTF-8 sequence split across two
/// reads is decoded intact.
#[derive(Debug, Default)]
pub struct ReplyFramer {
    line: Vec<u8>,
    message: String,
}

impl ReplyFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk read from the pipe; returns every reply it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut finished = Vec::new();
        for &byte in bytes {
            self.line.push(byte);
            if byte == b'\n' {
                if let Some(reply) = self.finish_line() {
                    finished.push(reply);
                }
            }
        }
        finished
    }

    /// Flush whatever was buffered when the stream ended.
    pub fn finish(&mut self) -> String {
        if !self.line.is_empty() {
            let tail = String::from_utf8_lossy(&self.line).into_owned();
            self.line.clear();
            let tail = strip_eol(&tail);
            if !tail.is_empty() {
                self.message.push_str(tail);
                self.message.push('\n');
            }
        }
        std::mem::take(&mut self.message)
    }

    /// True when nothing is buffered.
    pub fn is_idle(&self) -> bool {
        self.line.is_empty() && self.message.is_empty()
    }

    fn finish_line(&mut self) -> Option<String> {
        let raw = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        let content = strip_eol(&raw);
        if content.is_empty() {
            return Some(std::mem::take(&mut self.message));
        }
        self.message.push_str(content);
        self.message.push('\n');
        None
    }
}

/// End-of-line markers differ per platform (`\n`, `\r\n`, `\r\n\0`).
fn strip_eol(line: &str) -> &str {
    line.trim_matches(|ch| matches!(ch, '\n' | '\r' | '\0'))
}
