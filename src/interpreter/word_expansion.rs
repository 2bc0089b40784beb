//! Word Expansion
//!
//! Turns a word's parts into final argument text:
//! - quote removal on literals (`'...'`, `\x`, and `"..."` escapes)
//! - tilde expansion at the start of a word
//! - parameter, arithmetic and command substitution, left to right
//! - field splitting of unquoted expansion results on IFS
//! - filename generation for unquoted glob characters
//!
//! Each field carries a second rendering where quoted characters are
//! escaped, so globbing and `case` matching only honour unquoted `*?[`.

use crate::ast::types::{Node, ParamExp};
use crate::interpreter::arithmetic::evaluate_arithmetic;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::execution_engine::Runner;
use crate::interpreter::pattern::{escape, glob_in_dir, has_glob_chars};
use crate::interpreter::stdio::{CaptureBuffer, OutStream};
use crate::parser::is_valid_name;
use crate::parser::word_parser::parse_word;

const DEFAULT_IFS: &str = " \t\n";

/// Single-character parameters other than digits.
const SPECIAL_PARAMS: &str = "?#@*$!-";

#[derive(Debug, Default, Clone)]
struct Field {
    text: String,
    /// `text` with quoted characters escaped
    pattern: String,
    /// Contains an unquoted glob metacharacter
    globbable: bool,
}

/// Accumulates fields while a word's parts are expanded.
struct FieldBuilder {
    fields: Vec<Field>,
    current: Field,
    /// Whether `current` exists even if empty (e.g. after `""`)
    started: bool,
    /// Split unquoted expansions on IFS
    split: bool,
    ifs: String,
}

impl FieldBuilder {
    fn new(split: bool, ifs: String) -> Self {
        Self {
            fields: Vec::new(),
            current: Field::default(),
            started: false,
            split,
            ifs,
        }
    }

    fn push_quoted(&mut self, s: &str) {
        self.current.text.push_str(s);
        self.current.pattern.push_str(&escape(s));
        self.started = true;
    }

    fn push_unquoted(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        self.current.text.push_str(s);
        self.current.pattern.push_str(s);
        self.current.globbable |= has_glob_chars(s);
        self.started = true;
    }

    /// Unquoted expansion result: subject to splitting.
    fn push_expansion(&mut self, s: &str) {
        if !self.split {
            self.push_unquoted(s);
            return;
        }
        let mut run = String::new();
        for c in s.chars() {
            if !self.ifs.contains(c) {
                run.push(c);
                continue;
            }
            self.push_unquoted(&std::mem::take(&mut run));
            if c.is_whitespace() {
                if self.started {
                    self.finish();
                }
            } else {
                self.finish();
            }
        }
        self.push_unquoted(&run);
    }

    fn finish(&mut self) {
        self.fields.push(std::mem::take(&mut self.current));
        self.started = false;
    }

    fn into_fields(mut self) -> Vec<Field> {
        if self.started {
            self.finish();
        }
        self.fields
    }
}

/// The parts of a word node (a bare part counts as a one-part word).
fn word_parts(node: &Node) -> &[Node] {
    match node {
        Node::Word(word) => &word.parts,
        other => std::slice::from_ref(other),
    }
}

/// Remove the backslashes that are special inside double quotes.
fn unescape_dquoted(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$' | '"' | '\\' | '`') => out.extend(chars.next()),
            Some('\n') => {
                chars.next();
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Length of the parameter name at the start of `${...}` text.
fn param_name_len(text: &str) -> usize {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            1 + chars.take_while(|c| c.is_ascii_alphanumeric() || *c == '_').count()
        }
        Some(c) if c.is_ascii_digit() => 1 + chars.take_while(|c| c.is_ascii_digit()).count(),
        Some(c) if SPECIAL_PARAMS.contains(c) => 1,
        _ => 0,
    }
}

fn is_all_params(p: &ParamExp) -> bool {
    p.text == "@"
}

impl Runner {
    fn ifs(&self) -> String {
        self.state.get_var("IFS").unwrap_or(DEFAULT_IFS).to_string()
    }

    /// Expand a word into zero or more fields, with splitting and globbing.
    pub(crate) fn expand_word_fields(&mut self, word: &Node) -> Result<Vec<String>, InterpreterError> {
        let fields = self.expand_to_fields(word, true)?;
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            if field.globbable {
                let matches = glob_in_dir(&field.pattern, &self.state.cwd);
                if !matches.is_empty() {
                    out.extend(matches);
                    continue;
                }
            }
            out.push(field.text);
        }
        Ok(out)
    }

    /// Expand a list of words into one flat argument vector.
    pub(crate) fn expand_words<'a, I>(&mut self, words: I) -> Result<Vec<String>, InterpreterError>
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let mut argv = Vec::new();
        for word in words {
            argv.extend(self.expand_word_fields(word)?);
        }
        Ok(argv)
    }

    /// Expand a word to exactly one string: no splitting, no globbing.
    /// Used for assignments, redirect targets and the `case` subject.
    pub(crate) fn expand_word_single(&mut self, word: &Node) -> Result<String, InterpreterError> {
        let fields = self.expand_to_fields(word, false)?;
        Ok(fields.into_iter().map(|f| f.text).collect::<Vec<_>>().join(" "))
    }

    /// Expand a `case` pattern word; quoted characters match literally.
    pub(crate) fn expand_case_pattern(&mut self, word: &Node) -> Result<String, InterpreterError> {
        let fields = self.expand_to_fields(word, false)?;
        Ok(fields.into_iter().map(|f| f.pattern).collect::<Vec<_>>().join(" "))
    }

    fn expand_to_fields(&mut self, word: &Node, split: bool) -> Result<Vec<Field>, InterpreterError> {
        let mut builder = FieldBuilder::new(split, self.ifs());
        let parts = word_parts(word);

        match parts.split_first() {
            Some((Node::Lit(first), rest)) if first.val.starts_with('~') => {
                let after = &first.val[1..];
                match self.state.get_var("HOME").map(str::to_string) {
                    Some(home) if after.is_empty() || after.starts_with('/') => {
                        builder.push_quoted(&home);
                        self.push_literal(after, &mut builder);
                    }
                    _ => self.push_literal(&first.val, &mut builder),
                }
                self.expand_parts(rest, &mut builder, false)?;
            }
            _ => self.expand_parts(parts, &mut builder, false)?,
        }

        Ok(builder.into_fields())
    }

    fn expand_parts(
        &mut self,
        parts: &[Node],
        builder: &mut FieldBuilder,
        quoted: bool,
    ) -> Result<(), InterpreterError> {
        for part in parts {
            match part {
                Node::Lit(lit) if quoted => builder.push_quoted(&unescape_dquoted(&lit.val)),
                Node::Lit(lit) => self.push_literal(&lit.val, builder),
                Node::DblQuoted(dq) => {
                    builder.push_quoted("");
                    // "$@" alone with no parameters yields no field at all
                    if let [Node::ParamExp(p)] = dq.parts.as_slice() {
                        if is_all_params(p) && self.state.positional.is_empty() {
                            builder.started = !builder.current.text.is_empty();
                        }
                    }
                    self.expand_parts(&dq.parts, builder, true)?;
                }
                Node::ParamExp(p) if quoted && is_all_params(p) => {
                    let params = self.state.positional.clone();
                    for (i, param) in params.iter().enumerate() {
                        if i > 0 {
                            builder.finish();
                        }
                        builder.push_quoted(param);
                    }
                }
                Node::ParamExp(p) => {
                    let value = self.expand_param(p)?;
                    push_value(builder, &value, quoted);
                }
                Node::CmdSubst(subst) => {
                    let value = self.command_substitution(&subst.stmts)?;
                    push_value(builder, &value, quoted);
                }
                Node::ArithmExp(arith) => {
                    let value = self.arithmetic_expansion(&arith.text)?.to_string();
                    push_value(builder, &value, quoted);
                }
                Node::Word(word) => self.expand_parts(&word.parts, builder, quoted)?,
                other => builder.push_quoted(&other.to_string()),
            }
        }
        Ok(())
    }

    /// Quote removal on an unquoted literal run.
    fn push_literal(&self, raw: &str, builder: &mut FieldBuilder) {
        let mut plain = String::new();
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    builder.push_unquoted(&std::mem::take(&mut plain));
                    let quoted: String = chars.by_ref().take_while(|c| *c != '\'').collect();
                    builder.push_quoted(&quoted);
                }
                '\\' => {
                    builder.push_unquoted(&std::mem::take(&mut plain));
                    match chars.next() {
                        Some('\n') => {}
                        Some(next) => builder.push_quoted(next.encode_utf8(&mut [0; 4])),
                        None => builder.push_quoted("\\"),
                    }
                }
                _ => plain.push(c),
            }
        }
        builder.push_unquoted(&plain);
    }

    // ------------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------------

    /// Value of a parameter by name, `None` when unset.
    pub(crate) fn lookup_param(&self, name: &str) -> Option<String> {
        let state = &self.state;
        match name {
            "?" => Some(state.last_exit_code.to_string()),
            "#" => Some(state.positional.len().to_string()),
            "@" | "*" => Some(state.positional.join(" ")),
            "$" => Some(state.shell_pid.to_string()),
            "!" => state.last_background_job.map(|id| id.to_string()),
            "-" => Some(String::new()),
            "0" => Some(state.script_name.clone()),
            _ if name.chars().all(|c| c.is_ascii_digit()) => name
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| state.positional.get(i).cloned()),
            _ => state.vars.get(name).cloned(),
        }
    }

    /// Expand `$NAME` or one of the `${...}` forms.
    pub(crate) fn expand_param(&mut self, p: &ParamExp) -> Result<String, InterpreterError> {
        if p.short {
            return Ok(self.lookup_param(&p.text).unwrap_or_default());
        }

        let text = p.text.as_str();
        let bad_substitution = || InterpreterError::BadSubstitution(format!("${{{}}}", text));

        // ${#} and ${#NAME}
        if let Some(rest) = text.strip_prefix('#') {
            return match rest {
                "" | "@" | "*" => Ok(self.state.positional.len().to_string()),
                _ if param_name_len(rest) == rest.len() => Ok(self
                    .lookup_param(rest)
                    .map_or(0, |v| v.chars().count())
                    .to_string()),
                _ => Err(bad_substitution()),
            };
        }

        let name_len = param_name_len(text);
        if name_len == 0 {
            return Err(bad_substitution());
        }
        let (name, rest) = text.split_at(name_len);
        let value = self.lookup_param(name);
        if rest.is_empty() {
            return Ok(value.unwrap_or_default());
        }

        let (colon, op_text) = match rest.strip_prefix(':') {
            Some(after) => (true, after),
            None => (false, rest),
        };
        let mut op_chars = op_text.chars();
        let op = op_chars.next();
        let operand = op_chars.as_str();
        let missing = match &value {
            None => true,
            Some(v) => colon && v.is_empty(),
        };

        match op {
            Some('-') if missing => self.expand_operand(operand),
            Some('=') if missing => {
                if !is_valid_name(name) {
                    return Err(InterpreterError::Expansion(format!(
                        "${}: cannot assign in this way",
                        name
                    )));
                }
                let assigned = self.expand_operand(operand)?;
                self.state.set_var(name, assigned.clone());
                Ok(assigned)
            }
            Some('?') if missing => {
                let message = if operand.is_empty() {
                    "parameter null or not set".to_string()
                } else {
                    self.expand_operand(operand)?
                };
                Err(InterpreterError::Expansion(format!("{}: {}", name, message)))
            }
            Some('+') if missing => Ok(String::new()),
            Some('+') => self.expand_operand(operand),
            Some('-' | '=' | '?') => Ok(value.unwrap_or_default()),
            _ => Err(bad_substitution()),
        }
    }

    /// Expand the word following a `${NAME:-...}` style operator.
    fn expand_operand(&mut self, operand: &str) -> Result<String, InterpreterError> {
        let word = parse_word(operand, 0, 0, 1)
            .map_err(|e| InterpreterError::BadSubstitution(format!("{}: {}", operand, e.message)))?;
        self.expand_word_single(&Node::Word(word))
    }

    // ------------------------------------------------------------------------
    // Substitutions
    // ------------------------------------------------------------------------

    /// Run statements on a copy of the runner and capture their stdout, with
    /// trailing newlines removed. Records the substitution's status.
    pub(crate) fn command_substitution(&mut self, stmts: &[Node]) -> Result<String, InterpreterError> {
        let buffer = CaptureBuffer::default();
        let mut sub = self.fork();
        sub.stdio.stdout = OutStream::new(buffer.clone());

        let status = match sub.execute_stmts(stmts) {
            Ok(status) => status,
            Err(e) => sub.subshell_status(e)?,
        };
        self.state.last_exit_code = status;
        self.last_subst_status = Some(status);

        let mut output = buffer.contents();
        output.truncate(output.trim_end_matches('\n').len());
        Ok(output)
    }

    /// Expand `$` references in arithmetic text, then evaluate it.
    pub(crate) fn arithmetic_expansion(&mut self, text: &str) -> Result<i64, InterpreterError> {
        let word = parse_word(text, 0, 0, 1)
            .map_err(|e| InterpreterError::Arithmetic(format!("{}: {}", text.trim(), e.message)))?;
        let expanded = self.expand_word_single(&Node::Word(word))?;
        evaluate_arithmetic(&expanded, &mut self.state.vars)
    }
}

fn push_value(builder: &mut FieldBuilder, value: &str, quoted: bool) {
    if quoted {
        builder.push_quoted(value);
    } else {
        builder.push_expansion(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::execution_engine::testing::run_script;
    use crate::parser::parse;

    fn fields(runner: &mut Runner, src: &str) -> Vec<String> {
        let prog = parse(src).unwrap();
        match &prog.stmts[0] {
            Node::Command(cmd) => runner.expand_words(&cmd.args).unwrap(),
            other => panic!("not a command: {}", other),
        }
    }

    #[test]
    fn test_quote_removal() {
        let mut runner = Runner::new();
        assert_eq!(fields(&mut runner, r#"a 'b c' "d e" f\ g ''"#), vec!["a", "b c", "d e", "f g", ""]);
        assert_eq!(fields(&mut runner, r#""a\$b\"c\x""#), vec![r#"a$b"c\x"#]);
    }

    #[test]
    fn test_field_splitting() {
        let mut runner = Runner::new();
        runner.state.set_var("v", "  one two\tthree ");
        assert_eq!(fields(&mut runner, "$v"), vec!["one", "two", "three"]);
        assert_eq!(fields(&mut runner, "\"$v\""), vec!["  one two\tthree "]);
        assert_eq!(fields(&mut runner, "x$v"), vec!["x", "one", "two", "three"]);

        runner.state.set_var("IFS", ":");
        runner.state.set_var("p", "a::b");
        assert_eq!(fields(&mut runner, "$p"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_unset_expands_to_nothing() {
        let mut runner = Runner::new();
        assert!(fields(&mut runner, "$nope").is_empty());
        assert_eq!(fields(&mut runner, "\"$nope\""), vec![""]);
    }

    #[test]
    fn test_positional_params() {
        let mut runner = Runner::new();
        runner.state.positional = vec!["a b".to_string(), "c".to_string()];
        assert_eq!(fields(&mut runner, "\"$@\""), vec!["a b", "c"]);
        assert_eq!(fields(&mut runner, "\"x$@y\""), vec!["xa b", "cy"]);
        assert_eq!(fields(&mut runner, "$@"), vec!["a", "b", "c"]);
        assert_eq!(fields(&mut runner, "$# $1 ${2}"), vec!["2", "a", "b", "c"]);

        runner.state.positional.clear();
        assert!(fields(&mut runner, "\"$@\"").is_empty());
    }

    #[test]
    fn test_param_forms() {
        let mut runner = Runner::new();
        runner.state.set_var("set", "value");
        runner.state.set_var("empty", "");
        assert_eq!(fields(&mut runner, "${#set}"), vec!["5"]);
        assert_eq!(fields(&mut runner, "${empty:-d1} ${empty-d2}"), vec!["d1"]);
        assert_eq!(fields(&mut runner, "\"${unset-two words}\""), vec!["two words"]);
        assert_eq!(fields(&mut runner, "${set:+alt} ${unset:+alt}"), vec!["alt"]);
        assert_eq!(fields(&mut runner, "${new:=$set}"), vec!["value"]);
        assert_eq!(runner.state.get_var("new"), Some("value"));
    }

    #[test]
    fn test_bad_substitution() {
        let (_, stderr, status) = run_script("echo ${x/y}; echo after");
        assert_eq!(stderr, "treesh: ${x/y}: bad substitution\n");
        assert_eq!(status, 0);

        let (_, stderr, status) = run_script("echo ${x:?missing}");
        assert_eq!(stderr, "treesh: x: missing\n");
        assert_eq!(status, 1);
    }

    #[test]
    fn test_tilde() {
        let mut runner = Runner::new();
        runner.state.set_var("HOME", "/home/me");
        assert_eq!(fields(&mut runner, "~ ~/x a~ '~'"), vec!["/home/me", "/home/me/x", "a~", "~"]);
    }

    #[test]
    fn test_command_and_arithmetic_substitution() {
        let (stdout, _, _) = run_script("x=3; echo $(echo a; echo b) $((x * 2 + 1)) \"$(printf_missing 2>/dev/null)\"");
        assert_eq!(stdout, "a b 7 \n");

        let (stdout, _, _) = run_script("echo \"$(echo one; echo; echo)\"end");
        assert_eq!(stdout, "oneend\n");
    }

    #[test]
    fn test_arithmetic_error_is_reported() {
        let (stdout, stderr, status) = run_script("echo $((1 / 0)); echo next");
        assert_eq!(stdout, "next\n");
        assert_eq!(stderr, "treesh: 1 / 0: division by 0\n");
        assert_eq!(status, 0);
    }

    #[test]
    fn test_globbing() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "c.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let mut runner = Runner::new();
        runner.state.cwd = dir.path().to_string_lossy().into_owned();
        assert_eq!(fields(&mut runner, "*.txt"), vec!["a.txt", "b.txt"]);
        assert_eq!(fields(&mut runner, "'*'.txt \"*\""), vec!["*.txt", "*"]);
        assert_eq!(fields(&mut runner, "*.none"), vec!["*.none"]);
    }
}
