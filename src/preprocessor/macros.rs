//! Macro definitions and parameter substitution.
//!
//! Substitution walks a macro body text once, left to right, with a small
//! amount of state for the `##` paste operator. String and character
//! literals are copied verbatim, `#param` stringizes the raw argument, and
//! plain parameter names substitute the expanded argument.

use std::collections::HashMap;

/// One `#define`: shape flags, parameter names, and the body text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroDef {
    pub function_like: bool,
    pub variadic: bool,
    pub params: Vec<String>,
    pub body: String,
}

/// Name → definition. Redefinition supersedes; `#undef` removes.
pub type MacroTable = HashMap<String, MacroDef>;

pub(crate) fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

pub(crate) fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

pub(crate) fn ltrim(s: &str) -> &str {
    s.trim_start()
}

pub(crate) fn rtrim(s: &str) -> &str {
    s.trim_end()
}

/// Wrap raw characters as a string literal, escaping `\` and `"`.
pub(crate) fn stringize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Substitute parameters into a function-like macro body.
///
/// `args_raw` feed `#` stringizing; `args_expanded` feed plain parameter
/// references. `var_raw`/`var_expanded` are the comma-joined tail arguments
/// bound to `__VA_ARGS__` when the macro is variadic.
pub(crate) fn substitute_params(
    body: &str,
    params: &[String],
    args_raw: &[String],
    args_expanded: &[String],
    variadic: bool,
    var_raw: &str,
    var_expanded: &str,
) -> String {
    let mut map_expanded: HashMap<&str, &str> = HashMap::new();
    let mut map_raw: HashMap<&str, &str> = HashMap::new();
    for (i, p) in params.iter().enumerate() {
        if i < args_expanded.len() {
            map_expanded.insert(p.as_str(), args_expanded[i].as_str());
            map_raw.insert(p.as_str(), args_raw[i].as_str());
        }
    }
    if variadic {
        map_expanded.insert("__VA_ARGS__", var_expanded);
        map_raw.insert("__VA_ARGS__", var_raw);
    }

    let bytes = body.as_bytes();
    let mut out = String::new();
    let mut i = 0usize;
    let mut pending_paste = false;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'"' || c == b'\'' {
            let quote = c;
            let mut lit = String::new();
            lit.push(c as char);
            i += 1;
            while i < bytes.len() {
                let cc = bytes[i];
                lit.push(cc as char);
                i += 1;
                if cc == b'\\' && i < bytes.len() {
                    lit.push(bytes[i] as char);
                    i += 1;
                    continue;
                }
                if cc == quote {
                    break;
                }
            }
            if pending_paste {
                out.push_str(ltrim(&lit));
                pending_paste = false;
            } else {
                out.push_str(&lit);
            }
            continue;
        }

        if c == b'#' {
            // ## joins the adjacent non-space runs with no separator
            if i + 1 < bytes.len() && bytes[i + 1] == b'#' {
                let trimmed_len = rtrim(&out).len();
                out.truncate(trimmed_len);
                pending_paste = true;
                i += 2;
                continue;
            }
            // #param stringizes the raw argument
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j < bytes.len() && is_ident_start(bytes[j]) {
                let start = j;
                j += 1;
                while j < bytes.len() && is_ident_char(bytes[j]) {
                    j += 1;
                }
                let name = &body[start..j];
                let rep = match map_raw.get(name) {
                    Some(raw) => stringize(raw),
                    None => format!("#{}", name),
                };
                if pending_paste {
                    out.push_str(ltrim(&rep));
                    pending_paste = false;
                } else {
                    out.push_str(&rep);
                }
                i = j;
                continue;
            }
            out.push(c as char);
            i += 1;
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            i += 1;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            let name = &body[start..i];
            let rep = map_expanded.get(name).copied().unwrap_or(name);
            if pending_paste {
                let rep = ltrim(rep);
                if !rep.is_empty() {
                    out.push_str(rep);
                }
                pending_paste = false;
            } else {
                out.push_str(rep);
            }
            continue;
        }

        if pending_paste && c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if pending_paste {
            out.push(c as char);
            pending_paste = false;
            i += 1;
            continue;
        }

        out.push(c as char);
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn stringize_escapes_backslash_and_quote() {
        assert_eq!(stringize(r#"a\b"c"#), r#""a\\b\"c""#);
    }

    #[test]
    fn plain_parameter_uses_expanded_argument() {
        let params = vec!["x".to_string()];
        let out = substitute_params("(x + x)", &params, &one("RAW"), &one("1+2"), false, "", "");
        assert_eq!(out, "(1+2 + 1+2)");
    }

    #[test]
    fn hash_uses_raw_argument() {
        let params = vec!["x".to_string()];
        let out = substitute_params("#x", &params, &one("a + b"), &one("1 + 2"), false, "", "");
        assert_eq!(out, "\"a + b\"");
    }

    #[test]
    fn hash_of_non_parameter_is_kept() {
        let params = vec!["x".to_string()];
        let out = substitute_params("#y", &params, &one("a"), &one("a"), false, "", "");
        assert_eq!(out, "#y");
    }

    #[test]
    fn paste_joins_without_separator() {
        let params = vec!["a".to_string(), "b".to_string()];
        let out = substitute_params(
            "a ## b",
            &params,
            &["v".to_string(), "1".to_string()],
            &["v".to_string(), "1".to_string()],
            false,
            "",
            "",
        );
        assert_eq!(out, "v1");
    }

    #[test]
    fn paste_with_literal_fragments() {
        let params = vec!["x".to_string()];
        let out = substitute_params("id_##x", &params, &one("7"), &one("7"), false, "", "");
        assert_eq!(out, "id_7");
    }

    #[test]
    fn string_literal_in_body_is_verbatim() {
        let params = vec!["x".to_string()];
        let out = substitute_params("\"x\" x", &params, &one("9"), &one("9"), false, "", "");
        assert_eq!(out, "\"x\" 9");
    }

    #[test]
    fn va_args_substitutes_the_tail() {
        let params = vec!["fmt".to_string()];
        let out = substitute_params(
            "printf(fmt, __VA_ARGS__)",
            &params,
            &one("\"%d\""),
            &one("\"%d\""),
            true,
            "1,2",
            "1,2",
        );
        assert_eq!(out, "printf(\"%d\", 1,2)");
    }
}
