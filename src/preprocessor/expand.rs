//! Line-level macro expansion.
//!
//! Expansion walks the text one identifier at a time, substituting builtins
//! and macro bodies recursively. The set of names currently being expanded
//! travels down the recursion so that a macro's own name stays inert, and a
//! depth cap keeps pathological inputs finite.

use std::collections::HashSet;

use crate::preprocessor::macros::{
    is_ident_char, is_ident_start, stringize, substitute_params, MacroTable,
};

/// Expansion beyond this depth returns the text unchanged.
const MAX_EXPANSION_DEPTH: u32 = 32;

/// Per-line expansion context: the macro table plus everything the builtin
/// macros need.
pub(super) struct Expander<'a> {
    pub macros: &'a MacroTable,
    pub file: &'a str,
    pub line: u32,
    pub date: &'a str,
    pub time: &'a str,
}

impl Expander<'_> {
    /// Expand one logical line, keeping a trailing `//` comment verbatim.
    pub fn expand_line(&self, line: &str) -> String {
        let (code, comment) = match line.find("//") {
            Some(pos) => (&line[..pos], &line[pos..]),
            None => (line, ""),
        };

        let mut expanding = HashSet::new();
        let mut expanded = self.expand_text(code, &mut expanding, 0);
        expanded.push_str(comment);
        expanded
    }

    fn expand_text(&self, text: &str, expanding: &mut HashSet<String>, depth: u32) -> String {
        if depth > MAX_EXPANSION_DEPTH {
            return text.to_string();
        }
        let bytes = text.as_bytes();
        let mut out = String::new();
        let mut i = 0usize;

        while i < bytes.len() {
            let c = bytes[i];

            // string and char literals pass through untouched
            if c == b'"' || c == b'\'' {
                let quote = c;
                out.push(c as char);
                i += 1;
                while i < bytes.len() {
                    let cc = bytes[i];
                    out.push(cc as char);
                    i += 1;
                    if cc == b'\\' && i < bytes.len() {
                        out.push(bytes[i] as char);
                        i += 1;
                        continue;
                    }
                    if cc == quote {
                        break;
                    }
                }
                continue;
            }

            if !is_ident_start(c) {
                out.push(c as char);
                i += 1;
                continue;
            }

            let start = i;
            i += 1;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            let name = &text[start..i];

            match name {
                "__LINE__" => {
                    out.push_str(&self.line.to_string());
                    continue;
                }
                "__FILE__" => {
                    out.push_str(&stringize(self.file));
                    continue;
                }
                "__DATE__" => {
                    out.push_str(&stringize(self.date));
                    continue;
                }
                "__TIME__" => {
                    out.push_str(&stringize(self.time));
                    continue;
                }
                _ => {}
            }

            let def = match self.macros.get(name) {
                Some(def) if !expanding.contains(name) => def,
                _ => {
                    out.push_str(name);
                    continue;
                }
            };

            if !def.function_like {
                expanding.insert(name.to_string());
                out.push_str(&self.expand_text(&def.body, expanding, depth + 1));
                expanding.remove(name);
                continue;
            }

            // function-like: only with an immediate '(' lookahead
            if i >= bytes.len() || bytes[i] != b'(' {
                out.push_str(name);
                continue;
            }

            let Some((args, end)) = scan_arguments(text, i + 1) else {
                out.push_str(name);
                continue;
            };

            let fixed_count = def.params.len();
            let count_ok = if def.variadic {
                args.len() >= fixed_count
            } else {
                args.len() == fixed_count
            };
            if !count_ok {
                // wrong arity: the name goes out verbatim and the argument
                // text is rescanned as ordinary input
                out.push_str(name);
                continue;
            }

            let expanded_args: Vec<String> = args
                .iter()
                .map(|a| self.expand_text(a, expanding, depth + 1))
                .collect();

            let (var_raw, var_expanded) = if def.variadic {
                (
                    args[fixed_count..].join(","),
                    expanded_args[fixed_count..].join(","),
                )
            } else {
                (String::new(), String::new())
            };

            let replaced = substitute_params(
                &def.body,
                &def.params,
                &args[..fixed_count],
                &expanded_args[..fixed_count],
                def.variadic,
                &var_raw,
                &var_expanded,
            );

            expanding.insert(name.to_string());
            out.push_str(&self.expand_text(&replaced, expanding, depth + 1));
            expanding.remove(name);
            i = end;
        }

        out
    }
}

/// Scan a macro argument list starting just past the opening parenthesis.
///
/// Honors nested parentheses and string/char quoting. Returns the trimmed
/// arguments and the index just past the closing parenthesis, or `None`
/// when the list never closes.
fn scan_arguments(text: &str, mut pos: usize) -> Option<(Vec<String>, usize)> {
    let bytes = text.as_bytes();
    let mut depth = 1i32;
    let mut args = Vec::new();
    let mut current = String::new();
    let mut saw_separator = false;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c == b'"' || c == b'\'' {
            let quote = c;
            current.push(c as char);
            pos += 1;
            while pos < bytes.len() {
                let qc = bytes[pos];
                current.push(qc as char);
                pos += 1;
                if qc == b'\\' && pos < bytes.len() {
                    current.push(bytes[pos] as char);
                    pos += 1;
                    continue;
                }
                if qc == quote {
                    break;
                }
            }
            continue;
        }

        if c == b'(' {
            depth += 1;
            current.push(c as char);
            pos += 1;
            continue;
        }
        if c == b')' {
            depth -= 1;
            if depth == 0 {
                let trimmed = current.trim();
                if saw_separator || !trimmed.is_empty() {
                    args.push(trimmed.to_string());
                }
                return Some((args, pos + 1));
            }
            current.push(c as char);
            pos += 1;
            continue;
        }
        if c == b',' && depth == 1 {
            args.push(current.trim().to_string());
            current.clear();
            saw_separator = true;
            pos += 1;
            continue;
        }

        current.push(c as char);
        pos += 1;
    }

    None
}
