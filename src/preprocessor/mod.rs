//! The textual preprocessor.
//!
//! Transforms raw source into a flat, comment-free, macro-expanded token
//! stream (as text). Directives are lines whose first non-whitespace
//! character is `#`; every other line is macro-expanded in place. Includes
//! are processed recursively with a shared macro table, while each file
//! keeps its own conditional-inclusion stack.
//!
//! Preprocessor failures are hard errors: the first one aborts the whole
//! compilation.

pub mod macros;

mod cond;
mod expand;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::{CompileError, ErrorKind};
use crate::source::SourceContext;

pub use cond::IfExprError;
pub use macros::{MacroDef, MacroTable};

use expand::Expander;
use macros::{is_ident_char, is_ident_start};

/// One conditional-inclusion frame. The outermost frame has
/// `parent_active == true`.
#[derive(Debug, Clone, Copy)]
struct IfFrame {
    parent_active: bool,
    condition: bool,
    in_else: bool,
    taken: bool,
}

pub struct Preprocessor {
    macros: MacroTable,
    include_paths: Vec<PathBuf>,
    system_include_paths: Vec<PathBuf>,
    builtin_date: String,
    builtin_time: String,
}

impl Preprocessor {
    pub fn new(include_paths: Vec<PathBuf>, system_include_paths: Vec<PathBuf>) -> Self {
        let (builtin_date, builtin_time) = builtin_date_time();
        Self {
            macros: MacroTable::new(),
            include_paths,
            system_include_paths,
            builtin_date,
            builtin_time,
        }
    }

    pub fn add_include_path(&mut self, path: impl Into<PathBuf>) {
        self.include_paths.push(path.into());
    }

    pub fn add_system_include_path(&mut self, path: impl Into<PathBuf>) {
        self.system_include_paths.push(path.into());
    }

    /// Preprocess one root file to its flat textual form.
    pub fn run(&mut self, path: &str, source: &str) -> Result<String, CompileError> {
        let mut out = String::new();
        self.process_file(path, source, &mut out)?;
        Ok(out)
    }

    fn process_file(
        &mut self,
        path: &str,
        source: &str,
        out: &mut String,
    ) -> Result<(), CompileError> {
        let mut ifs: Vec<IfFrame> = Vec::new();
        let mut line_no = 1u32;

        for line in source.lines() {
            let bytes = line.as_bytes();
            let mut i = 0usize;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }

            if i < bytes.len() && bytes[i] == b'#' {
                self.handle_directive(path, source, line_no, line, i + 1, &mut ifs, out)?;
                line_no += 1;
                continue;
            }

            let active = ifs
                .last()
                .map_or(true, |st| st.parent_active && st.condition);
            if active {
                let expander = Expander {
                    macros: &self.macros,
                    file: path,
                    line: line_no,
                    date: &self.builtin_date,
                    time: &self.builtin_time,
                };
                out.push_str(&expander.expand_line(line));
                out.push('\n');
            }
            line_no += 1;
        }

        if !ifs.is_empty() {
            return Err(self.error(path, source, line_no, 1, ErrorKind::UnterminatedConditional));
        }
        Ok(())
    }

    /// Handle one `#` directive line. `dstart` is the byte index just past
    /// the `#` inside `line`.
    #[allow(clippy::too_many_arguments)]
    fn handle_directive(
        &mut self,
        path: &str,
        source: &str,
        line_no: u32,
        line: &str,
        dstart: usize,
        ifs: &mut Vec<IfFrame>,
        out: &mut String,
    ) -> Result<(), CompileError> {
        let bytes = line.as_bytes();
        let mut i = dstart;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let dname_start = i;
        while i < bytes.len() && is_ident_char(bytes[i]) {
            i += 1;
        }
        let directive = &line[dname_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let active = ifs
            .last()
            .map_or(true, |st| st.parent_active && st.condition);

        let col = |idx: usize| idx as u32 + 1;

        match directive {
            "include" => {
                if !active {
                    return Ok(());
                }
                if i >= bytes.len() {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        col(i),
                        ErrorKind::ExpectedHeaderName,
                    ));
                }
                let delim = bytes[i];
                if delim != b'"' && delim != b'<' {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        col(i),
                        ErrorKind::ExpectedHeaderName,
                    ));
                }
                i += 1;
                let name_start = i;
                let close = if delim == b'"' { b'"' } else { b'>' };
                while i < bytes.len() && bytes[i] != close {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        col(name_start),
                        ErrorKind::UnterminatedIncludePath,
                    ));
                }
                let header = &line[name_start..i];
                let Some((full_path, content)) =
                    self.resolve_include(header, delim == b'<', path)
                else {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        col(name_start),
                        ErrorKind::UnresolvedInclude {
                            header: header.to_string(),
                        },
                    ));
                };
                self.process_file(&full_path, &content, out)
            }

            "define" => {
                if !active {
                    return Ok(());
                }
                if i >= bytes.len() || !is_ident_start(bytes[i]) {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        col(i),
                        ErrorKind::ExpectedMacroName,
                    ));
                }
                let name_start = i;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                let name = line[name_start..i].to_string();

                let mut def = MacroDef::default();
                // function-like only when '(' follows the name directly
                if i < bytes.len() && bytes[i] == b'(' {
                    def.function_like = true;
                    i += 1;
                    loop {
                        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                            i += 1;
                        }
                        if i < bytes.len() && bytes[i] == b')' {
                            i += 1;
                            break;
                        }
                        if i + 2 < bytes.len() && bytes[i..i + 3] == *b"..." {
                            def.variadic = true;
                            i += 3;
                            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                                i += 1;
                            }
                            if i < bytes.len() && bytes[i] == b')' {
                                i += 1;
                                break;
                            }
                            let detail = if i >= bytes.len() {
                                "unterminated macro parameters"
                            } else {
                                "expected ')'"
                            };
                            return Err(self.error(
                                path,
                                source,
                                line_no,
                                col(i),
                                ErrorKind::MalformedParameterList {
                                    detail: detail.to_string(),
                                },
                            ));
                        }
                        if i >= bytes.len() || !is_ident_start(bytes[i]) {
                            return Err(self.error(
                                path,
                                source,
                                line_no,
                                col(i),
                                ErrorKind::MalformedParameterList {
                                    detail: "expected parameter name".to_string(),
                                },
                            ));
                        }
                        let p_start = i;
                        i += 1;
                        while i < bytes.len() && is_ident_char(bytes[i]) {
                            i += 1;
                        }
                        def.params.push(line[p_start..i].to_string());
                        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                            i += 1;
                        }
                        if i < bytes.len() && bytes[i] == b',' {
                            i += 1;
                            continue;
                        }
                        if i < bytes.len() && bytes[i] == b')' {
                            i += 1;
                            break;
                        }
                        let detail = if i >= bytes.len() {
                            "unterminated macro parameters"
                        } else {
                            "expected ',' or ')'"
                        };
                        return Err(self.error(
                            path,
                            source,
                            line_no,
                            col(i),
                            ErrorKind::MalformedParameterList {
                                detail: detail.to_string(),
                            },
                        ));
                    }
                }
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                def.body = line[i..].to_string();
                self.macros.insert(name, def);
                Ok(())
            }

            "undef" => {
                if !active {
                    return Ok(());
                }
                if i >= bytes.len() || !is_ident_start(bytes[i]) {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        col(i),
                        ErrorKind::ExpectedMacroName,
                    ));
                }
                let name_start = i;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                self.macros.remove(&line[name_start..i]);
                Ok(())
            }

            "ifdef" | "ifndef" => {
                if i >= bytes.len() || !is_ident_start(bytes[i]) {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        col(i),
                        ErrorKind::ExpectedMacroName,
                    ));
                }
                let name_start = i;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                let defined = self.macros.contains_key(&line[name_start..i]);
                let cond = if directive == "ifdef" {
                    defined
                } else {
                    !defined
                };
                ifs.push(IfFrame {
                    parent_active: active,
                    condition: cond,
                    in_else: false,
                    taken: cond,
                });
                Ok(())
            }

            "if" => {
                if !active {
                    ifs.push(IfFrame {
                        parent_active: false,
                        condition: false,
                        in_else: false,
                        taken: false,
                    });
                    return Ok(());
                }
                let cond = cond::eval_if_expr(&line[i..], &self.macros).map_err(|e| {
                    self.error(
                        path,
                        source,
                        line_no,
                        col(i),
                        ErrorKind::MalformedIfExpression {
                            detail: e.to_string(),
                        },
                    )
                })?;
                ifs.push(IfFrame {
                    parent_active: active,
                    condition: cond,
                    in_else: false,
                    taken: cond,
                });
                Ok(())
            }

            "elif" => {
                let Some(st) = ifs.last_mut() else {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        1,
                        ErrorKind::UnexpectedConditional {
                            directive: "#elif".to_string(),
                        },
                    ));
                };
                if st.in_else {
                    return Err(self
                        .error(
                            path,
                            source,
                            line_no,
                            1,
                            ErrorKind::UnexpectedConditional {
                                directive: "#elif".to_string(),
                            },
                        )
                        .with_help("#elif cannot follow #else"));
                }
                let parent_active = st.parent_active;
                let taken = st.taken;
                let cond = if parent_active && !taken {
                    cond::eval_if_expr(&line[i..], &self.macros).map_err(|e| {
                        self.error(
                            path,
                            source,
                            line_no,
                            col(i),
                            ErrorKind::MalformedIfExpression {
                                detail: e.to_string(),
                            },
                        )
                    })?
                } else {
                    false
                };
                let st = ifs.last_mut().expect("frame checked above");
                st.condition = cond && parent_active && !taken;
                st.taken = st.taken || st.condition;
                Ok(())
            }

            "else" => {
                let Some(st) = ifs.last_mut() else {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        1,
                        ErrorKind::UnexpectedConditional {
                            directive: "#else".to_string(),
                        },
                    ));
                };
                if st.in_else {
                    return Err(self
                        .error(
                            path,
                            source,
                            line_no,
                            1,
                            ErrorKind::UnexpectedConditional {
                                directive: "#else".to_string(),
                            },
                        )
                        .with_help("this conditional already has a #else"));
                }
                st.in_else = true;
                st.condition = st.parent_active && !st.taken;
                st.taken = true;
                Ok(())
            }

            "endif" => {
                if ifs.pop().is_none() {
                    return Err(self.error(
                        path,
                        source,
                        line_no,
                        1,
                        ErrorKind::UnexpectedConditional {
                            directive: "#endif".to_string(),
                        },
                    ));
                }
                Ok(())
            }

            "" => Ok(()),

            _ => Err(self.error(
                path,
                source,
                line_no,
                col(dname_start),
                ErrorKind::UnknownDirective,
            )),
        }
    }

    /// Quoted form searches the including file's directory first, then the
    /// user paths, then the system paths; the angle form skips the
    /// including directory. Absolute paths bypass the search list.
    fn resolve_include(
        &self,
        header: &str,
        is_system: bool,
        current_path: &str,
    ) -> Option<(String, String)> {
        if Path::new(header).is_absolute() {
            let content = std::fs::read_to_string(header).ok()?;
            return Some((header.to_string(), content));
        }

        let mut search_paths: Vec<PathBuf> = Vec::new();
        if !is_system {
            if let Some(base) = Path::new(current_path).parent() {
                if !base.as_os_str().is_empty() {
                    search_paths.push(base.to_path_buf());
                }
            }
        }
        search_paths.extend(self.include_paths.iter().cloned());
        search_paths.extend(self.system_include_paths.iter().cloned());

        for base in search_paths {
            let full = base.join(header);
            if let Ok(content) = std::fs::read_to_string(&full) {
                return Some((full.to_string_lossy().into_owned(), content));
            }
        }
        None
    }

    fn error(
        &self,
        path: &str,
        source: &str,
        line: u32,
        col: u32,
        kind: ErrorKind,
    ) -> CompileError {
        let ctx = SourceContext::from_file(path, source);
        CompileError::preprocess(kind, &ctx, line, col)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// `__DATE__` ("Mmm dd yyyy") and `__TIME__` ("hh:mm:ss") for this run,
/// derived from the epoch clock.
fn builtin_date_time() -> (String, String) {
    let total_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let mut days_remaining = total_seconds / 86400;
    let mut year = 1970u64;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if days_remaining < days_in_year {
            break;
        }
        days_remaining -= days_in_year;
        year += 1;
    }

    const MONTH_NAMES: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let month_days = [
        31,
        if is_leap_year(year) { 29 } else { 28 },
        31,
        30,
        31,
        30,
        31,
        31,
        30,
        31,
        30,
        31,
    ];
    let mut month = 0usize;
    let mut day = days_remaining + 1;
    for (m, &len) in month_days.iter().enumerate() {
        if day <= len {
            month = m;
            break;
        }
        day -= len;
    }
    let date = format!("{} {:2} {}", MONTH_NAMES[month], day, year);

    let seconds_today = total_seconds % 86400;
    let time = format!(
        "{:02}:{:02}:{:02}",
        seconds_today / 3600,
        (seconds_today % 3600) / 60,
        seconds_today % 60
    );

    (date, time)
}

const fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
