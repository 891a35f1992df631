//! Best-effort collapsing of redundant adjacent end labels.
//!
//! Nested constructs that close at the same point produce chains like
//! `end_3:` directly followed by `end_4:`, or an end label followed by an
//! unconditional branch to the next end label. The pass removes the
//! redundant definition and rewrites its references. It is a line-adjacency
//! rewrite, deliberately scoped to the lines the just-emitted subtree
//! produced: references are rewritten token-exactly and only within that
//! range, so an unrelated label sharing a numeric suffix is never touched.

use once_cell::sync::Lazy;
use regex::Regex;
use st_core::emit::CodeBuffer;

static END_LABEL_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(end_[0-9]+):?$").unwrap());
static END_BRANCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^B\s+(end_[0-9]+)$").unwrap());

fn end_label_def(line: &str) -> Option<&str> {
    END_LABEL_DEF
        .captures(line.trim())
        .map(|caps| caps.get(1).unwrap().as_str())
}

fn end_branch_target(line: &str) -> Option<&str> {
    END_BRANCH
        .captures(line.trim())
        .map(|caps| caps.get(1).unwrap().as_str())
}

/// Collapse adjacent equivalent end labels in `buf` starting at line
/// `start` (the first line of the subtree just emitted). Returns the number
/// of removed label definitions.
pub fn unify_labels(buf: &mut CodeBuffer, start: usize) -> usize {
    let mut removed = 0;
    let mut changed = true;
    while changed {
        changed = false;
        let mut index = start;
        while index + 1 < buf.len() {
            let Some(first) = end_label_def(buf.line(index)).map(str::to_string) else {
                index += 1;
                continue;
            };
            let next = buf.line(index + 1);
            let survivor = end_label_def(next)
                .or_else(|| end_branch_target(next))
                .map(str::to_string);
            match survivor {
                Some(survivor) if survivor != first => {
                    buf.remove(index);
                    buf.replace_token_in_range(start..buf.len(), &first, &survivor);
                    removed += 1;
                    changed = true;
                }
                _ => index += 1,
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffer(lines: &[&str]) -> CodeBuffer {
        let mut buf = CodeBuffer::new("//");
        for line in lines {
            buf.add(line, "", false);
        }
        buf
    }

    #[test]
    fn adjacent_end_labels_collapse_into_the_survivor() {
        let mut buf = buffer(&["\t\tBGE end_1", "\t\tMOV R0, #1", "end_1:", "end_2:"]);
        let removed = unify_labels(&mut buf, 0);
        assert_eq!(removed, 1);
        assert_eq!(
            buf.text(),
            "\t\tBGE end_2\n\t\tMOV R0, #1\nend_2:"
        );
    }

    #[test]
    fn label_followed_by_branch_to_next_label_collapses() {
        let mut buf = buffer(&["\t\tBNE end_3", "end_3:", "\t\tB end_4", "end_4:"]);
        unify_labels(&mut buf, 0);
        assert_eq!(buf.text(), "\t\tBNE end_4\n\t\tB end_4\nend_4:");
    }

    #[test]
    fn numeric_suffix_neighbours_are_left_alone() {
        let mut buf = buffer(&["\t\tBGE end_1", "\t\tB end_11", "end_1:", "end_11:"]);
        unify_labels(&mut buf, 0);
        // end_1 merges into end_11; the pre-existing end_11 reference is
        // untouched rather than double-rewritten.
        assert_eq!(buf.text(), "\t\tBGE end_11\n\t\tB end_11\nend_11:");
    }

    #[test]
    fn lines_before_the_scope_start_are_not_rewritten() {
        let mut buf = buffer(&["\t\tB end_1", "sep:", "\t\tBGE end_1", "end_1:", "end_2:"]);
        unify_labels(&mut buf, 2);
        assert_eq!(buf.line(0), "\t\tB end_1");
        assert_eq!(buf.line(2), "\t\tBGE end_2");
    }

    #[test]
    fn no_dangling_references_remain_after_merging() {
        let mut buf = buffer(&[
            "\t\tBGT end_5",
            "\t\tB end_6",
            "end_5:",
            "end_6:",
            "end_7:",
        ]);
        unify_labels(&mut buf, 0);
        let text = buf.text();
        for line in text.lines() {
            if let Some(target) = end_branch_target(line) {
                assert!(
                    text.lines().any(|l| end_label_def(l) == Some(target)),
                    "dangling reference to {target}"
                );
            }
        }
    }
}
