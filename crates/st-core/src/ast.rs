//! Structured-program tree consumed by the assembly backends.
//!
//! The tree is produced and owned by the surrounding framework; a code
//! generator walks it top-down and never mutates it. Loop, switch and jump
//! nodes carry an [`ElementId`] so the externally built [`crate::jump::JumpTable`]
//! can associate multi-level exits with their enclosing constructs.

/// Stable identity of a tree node, assigned by the tree's producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Return,
    Exit,
    Leave,
    Throw,
    Plain,
}

/// The two flavors of a For element: a counting loop over a numeric range or
/// a traversal over a literal value list.
#[derive(Debug, Clone)]
pub enum ForStyle {
    Counting {
        start: String,
        end: String,
        step: String,
    },
    Traversing {
        value_list: Vec<String>,
    },
}

/// One selector set plus the branch it guards in a Case element.
#[derive(Debug, Clone)]
pub struct CaseBranch {
    pub selectors: Vec<String>,
    pub body: Vec<Element>,
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Sequence(Vec<Element>),
    Instruction {
        lines: Vec<String>,
    },
    Alternative {
        condition: String,
        q_true: Vec<Element>,
        q_false: Vec<Element>,
    },
    Case {
        discriminant: String,
        branches: Vec<CaseBranch>,
        default: Option<Vec<Element>>,
    },
    For {
        counter: String,
        style: ForStyle,
        body: Vec<Element>,
    },
    While {
        condition: String,
        body: Vec<Element>,
    },
    Repeat {
        body: Vec<Element>,
        until: String,
    },
    Forever {
        body: Vec<Element>,
    },
    Call {
        text: String,
    },
    Jump {
        kind: JumpKind,
        argument: Option<String>,
    },
    Parallel {
        branches: Vec<Vec<Element>>,
    },
    Try {
        body: Vec<Element>,
        catch: Vec<Element>,
        finally: Vec<Element>,
    },
}

#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    pub disabled: bool,
    pub kind: ElementKind,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: ElementId(0),
            disabled: false,
            kind,
        }
    }

    pub fn instruction(lines: Vec<impl Into<String>>) -> Self {
        Self::new(ElementKind::Instruction {
            lines: lines.into_iter().map(Into::into).collect(),
        })
    }

    pub fn call(text: impl Into<String>) -> Self {
        Self::new(ElementKind::Call { text: text.into() })
    }

    pub fn jump(kind: JumpKind, argument: Option<String>) -> Self {
        Self::new(ElementKind::Jump { kind, argument })
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = ElementId(id);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// The source text a generator echoes as a comment above the emitted code.
    pub fn header_text(&self) -> Option<String> {
        match &self.kind {
            ElementKind::Alternative { condition, .. } => Some(format!("if {}", condition)),
            ElementKind::Case { discriminant, .. } => Some(format!("case {}", discriminant)),
            ElementKind::While { condition, .. } => Some(format!("while {}", condition)),
            ElementKind::Repeat { until, .. } => Some(format!("repeat until {}", until)),
            ElementKind::Forever { .. } => Some("forever".to_string()),
            ElementKind::For { counter, style, .. } => match style {
                ForStyle::Counting { start, end, step } => {
                    Some(format!("for {} <- {} to {} by {}", counter, start, end, step))
                }
                ForStyle::Traversing { value_list } => {
                    Some(format!("foreach {} in [{}]", counter, value_list.join(", ")))
                }
            },
            ElementKind::Call { text } => Some(text.clone()),
            _ => None,
        }
    }
}

/// A routine to be translated as one unit: the top-level body plus the
/// interface facts a backend needs (name, parameters, result slot).
#[derive(Debug, Clone)]
pub struct Routine {
    pub name: String,
    pub params: Vec<String>,
    pub has_result: bool,
    pub body: Vec<Element>,
}

impl Routine {
    pub fn new(name: impl Into<String>, body: Vec<Element>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            has_result: false,
            body,
        }
    }

    pub fn with_params(mut self, params: Vec<impl Into<String>>) -> Self {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_result(mut self) -> Self {
        self.has_result = true;
        self
    }

    /// All statement and condition text of the routine, in source order. Used
    /// by backends that pre-scan the routine (e.g. to reserve registers the
    /// user names literally).
    pub fn text_lines(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_text(&self.body, &mut out);
        out
    }
}

fn collect_text<'a>(elements: &'a [Element], out: &mut Vec<&'a str>) {
    for element in elements {
        match &element.kind {
            ElementKind::Sequence(inner) => collect_text(inner, out),
            ElementKind::Instruction { lines } => out.extend(lines.iter().map(String::as_str)),
            ElementKind::Alternative {
                condition,
                q_true,
                q_false,
            } => {
                out.push(condition);
                collect_text(q_true, out);
                collect_text(q_false, out);
            }
            ElementKind::Case {
                discriminant,
                branches,
                default,
            } => {
                out.push(discriminant);
                for branch in branches {
                    out.extend(branch.selectors.iter().map(String::as_str));
                    collect_text(&branch.body, out);
                }
                if let Some(default) = default {
                    collect_text(default, out);
                }
            }
            ElementKind::For {
                counter,
                style,
                body,
            } => {
                out.push(counter);
                match style {
                    ForStyle::Counting { start, end, step } => {
                        out.push(start);
                        out.push(end);
                        out.push(step);
                    }
                    ForStyle::Traversing { value_list } => {
                        out.extend(value_list.iter().map(String::as_str));
                    }
                }
                collect_text(body, out);
            }
            ElementKind::While { condition, body } => {
                out.push(condition);
                collect_text(body, out);
            }
            ElementKind::Repeat { body, until } => {
                collect_text(body, out);
                out.push(until);
            }
            ElementKind::Forever { body } => collect_text(body, out),
            ElementKind::Call { text } => out.push(text),
            ElementKind::Jump { argument, .. } => {
                if let Some(argument) = argument {
                    out.push(argument);
                }
            }
            ElementKind::Parallel { branches } => {
                for branch in branches {
                    collect_text(branch, out);
                }
            }
            ElementKind::Try {
                body,
                catch,
                finally,
            } => {
                collect_text(body, out);
                collect_text(catch, out);
                collect_text(finally, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lines_walk_nested_constructs() {
        let routine = Routine::new(
            "demo",
            vec![
                Element::new(ElementKind::While {
                    condition: "(x < 10)".into(),
                    body: vec![Element::instruction(vec!["x <- x + 1"])],
                })
                .with_id(1),
                Element::instruction(vec!["y <- 0"]),
            ],
        );
        let lines = routine.text_lines();
        assert_eq!(lines, vec!["(x < 10)", "x <- x + 1", "y <- 0"]);
    }
}
