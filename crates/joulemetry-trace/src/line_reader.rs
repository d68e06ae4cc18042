//! ---
//! jm_section: "03-trace-pipeline"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Trace wire format, streaming reader, and series statistics."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::io::{self, BufRead, BufReader, Read};

/// Reader that yields only entire newline-terminated lines.
///
/// Tailing an actively written CSV must never hand a partial row to the
/// parser. When the source runs out before a terminator shows up, the
/// partial content is stashed and completed by a later call once the writer
/// has appended the rest of the line.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    partial: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            inner: BufReader::new(source),
            partial: Vec::new(),
        }
    }

    /// The next complete line, terminator included, or `None` when the
    /// source is exhausted mid-line.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut chunk = Vec::new();
        self.inner.read_until(b'\n', &mut chunk)?;
        if chunk.last() != Some(&b'\n') {
            self.partial.extend_from_slice(&chunk);
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.partial);
        line.extend_from_slice(&chunk);
        // Traces are ASCII; a stray byte should not kill a live tail.
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Test source whose contents can grow after reads hit EOF.
    #[derive(Clone, Default)]
    struct GrowingSource {
        bytes: Arc<Mutex<VecDeque<u8>>>,
    }

    impl GrowingSource {
        fn push(&self, text: &str) {
            self.bytes.lock().unwrap().extend(text.bytes());
        }
    }

    impl Read for GrowingSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut bytes = self.bytes.lock().unwrap();
            let take = buf.len().min(bytes.len());
            for slot in buf.iter_mut().take(take) {
                *slot = bytes.pop_front().unwrap();
            }
            Ok(take)
        }
    }

    #[test]
    fn whole_lines_come_back_verbatim() {
        let source = GrowingSource::default();
        source.push("hello\nthere\n");
        let mut lines = LineReader::new(source);
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("hello\n"));
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("there\n"));
        assert_eq!(lines.next_line().unwrap(), None);
    }

    #[test]
    fn partial_lines_complete_across_calls() {
        let source = GrowingSource::default();
        source.push("hello\nthere\n");
        let mut lines = LineReader::new(source.clone());
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("hello\n"));
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("there\n"));

        source.push("unterminated");
        assert_eq!(lines.next_line().unwrap(), None);
        source.push("line\n");
        assert_eq!(
            lines.next_line().unwrap().as_deref(),
            Some("unterminatedline\n")
        );

        source.push("foo");
        assert_eq!(lines.next_line().unwrap(), None);
        source.push("bar");
        assert_eq!(lines.next_line().unwrap(), None);
        source.push("bin\nbaz");
        assert_eq!(lines.next_line().unwrap().as_deref(), Some("foobarbin\n"));
        assert_eq!(lines.next_line().unwrap(), None);
    }
}
