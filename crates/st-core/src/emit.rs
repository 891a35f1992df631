//! Append-only, line-oriented output buffer shared by the assembly backends.
//!
//! Besides plain appends the buffer supports two operations the backends
//! rely on: insertion at a previously recorded position (data-section
//! declarations are produced while the text section is being emitted) and
//! token-exact find/replace over a range of already-emitted lines (used by
//! the peephole label unifier).

use itertools::Itertools;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct CodeBuffer {
    lines: Vec<String>,
    comment_token: String,
    insertion_point: usize,
}

impl CodeBuffer {
    pub fn new(comment_token: impl Into<String>) -> Self {
        Self {
            lines: Vec::new(),
            comment_token: comment_token.into(),
            insertion_point: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, index: usize) -> &str {
        &self.lines[index]
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.iter().join("\n")
    }

    /// Append `text`, one buffer line per text line. Disabled statements are
    /// kept visible but commented out.
    pub fn add(&mut self, text: &str, indent: &str, disabled: bool) {
        for line in text.split('\n') {
            if disabled {
                self.lines
                    .push(format!("{}{} {}", indent, self.comment_token, line));
            } else {
                self.lines.push(format!("{}{}", indent, line));
            }
        }
    }

    pub fn add_comment(&mut self, text: &str, indent: &str) {
        for line in text.split('\n') {
            self.lines
                .push(format!("{}{} {}", indent, self.comment_token, line));
        }
    }

    /// Record the current end of the buffer as the insertion point for
    /// retroactive lines (e.g. data declarations emitted mid-routine).
    pub fn mark_insertion(&mut self) {
        self.insertion_point = self.lines.len();
    }

    /// Insert a line at the recorded insertion point, keeping insertion order
    /// among retroactively added lines.
    pub fn insert_top(&mut self, line: impl Into<String>) {
        self.lines.insert(self.insertion_point, line.into());
        self.insertion_point += 1;
    }

    pub fn remove(&mut self, index: usize) -> String {
        self.lines.remove(index)
    }

    /// Replace every token-exact occurrence of `from` with `to` within the
    /// given line range; returns the number of replaced occurrences. A match
    /// counts only when it is not embedded in a longer identifier, so label
    /// `end_1` never rewrites part of `end_12`.
    pub fn replace_token_in_range(&mut self, range: Range<usize>, from: &str, to: &str) -> usize {
        let mut replaced = 0;
        for index in range {
            if index >= self.lines.len() {
                break;
            }
            let (line, count) = replace_token(&self.lines[index], from, to);
            if count > 0 {
                self.lines[index] = line;
                replaced += count;
            }
        }
        replaced
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn replace_token(line: &str, from: &str, to: &str) -> (String, usize) {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    let mut count = 0;
    while let Some(pos) = rest.find(from) {
        let prev = if pos > 0 {
            rest[..pos].chars().next_back()
        } else {
            out.chars().next_back()
        };
        let before_ok = !prev.map(is_ident_char).unwrap_or(false);
        let after = &rest[pos + from.len()..];
        let after_ok = !after.chars().next().map(is_ident_char).unwrap_or(false);
        out.push_str(&rest[..pos]);
        if before_ok && after_ok {
            out.push_str(to);
            count += 1;
        } else {
            out.push_str(from);
        }
        rest = after;
    }
    out.push_str(rest);
    (out, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn disabled_lines_are_commented() {
        let mut buf = CodeBuffer::new("//");
        buf.add("MOV R0, #1", "\t\t", false);
        buf.add("MOV R1, #2", "\t\t", true);
        assert_eq!(buf.line(0), "\t\tMOV R0, #1");
        assert_eq!(buf.line(1), "\t\t// MOV R1, #2");
    }

    #[test]
    fn insert_top_keeps_relative_order() {
        let mut buf = CodeBuffer::new("//");
        buf.add(".data", "", false);
        buf.mark_insertion();
        buf.add(".text", "", false);
        buf.insert_top("first: .word 1");
        buf.insert_top("second: .word 2");
        assert_eq!(
            buf.text(),
            ".data\nfirst: .word 1\nsecond: .word 2\n.text"
        );
    }

    #[test]
    fn token_replace_respects_identifier_boundaries() {
        let mut buf = CodeBuffer::new("//");
        buf.add("B end_1", "\t\t", false);
        buf.add("B end_12", "\t\t", false);
        buf.add("end_1:", "", false);
        let replaced = buf.replace_token_in_range(0..buf.len(), "end_1", "end_2");
        assert_eq!(replaced, 2);
        assert_eq!(buf.line(0), "\t\tB end_2");
        assert_eq!(buf.line(1), "\t\tB end_12");
        assert_eq!(buf.line(2), "end_2:");
    }
}
