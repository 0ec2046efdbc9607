use crate::error::{Error, Result};
use fancy_regex::Regex;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOp {
    Record,
    NoRecord,
    Error,
}

impl RecordOp {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Record" => Some(RecordOp::Record),
            "NoRecord" => Some(RecordOp::NoRecord),
            "Error" => Some(RecordOp::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOp {
    Continue,
    Next,
}

impl LineOp {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Continue" => Some(LineOp::Continue),
            "Next" => Some(LineOp::Next),
            _ => None,
        }
    }
}

/// A single `  ^match -> action` line inside a state.
#[derive(Debug, Clone)]
pub struct Rule {
    pub source_line: String,
    pub line_num: usize,
    pub match_regex: Regex,
    pub record_op: Option<RecordOp>,
    pub line_op: LineOp,
    pub new_state: Option<String>,
    pub error_message: Option<String>,
}

impl Rule {
    pub fn new(raw_line: &str, line_num: usize, value_fragments: &IndexMap<String, String>) -> Result<Self> {
        let line = raw_line.trim();
        if line.is_empty() {
            return Err(Error::Template(format!(
                "empty rule at line {line_num}"
            )));
        }

        let (match_part, action_part) = match rfind_arrow(line) {
            Some(idx) => (line[..idx].trim_end(), Some(line[idx + 4..].trim())),
            None => (line, None),
        };

        let substituted = substitute_values(match_part, value_fragments)
            .map_err(|e| Error::Template(format!("{e}. Line: {line_num}")))?;
        let match_regex = Regex::new(&substituted)
            .map_err(|e| Error::Template(format!("invalid regular expression: '{substituted}'. Error: {e}. Line: {line_num}")))?;

        let mut rule = Rule {
            source_line: line.to_string(),
            line_num,
            match_regex,
            record_op: None,
            line_op: LineOp::Next,
            new_state: None,
            error_message: None,
        };

        if let Some(action) = action_part {
            rule.parse_action(action, line_num)?;
        }

        Ok(rule)
    }

    fn parse_action(&mut self, action: &str, line_num: usize) -> Result<()> {
        let action = action.trim();
        if action.is_empty() {
            return Ok(());
        }
        let (tok0, rest) = split_first_token(action);

        // Case 1: <line-op>[.<record-op>] [new-state]
        if let Some((line_name, record_name)) = tok0.split_once('.') {
            if let Some(line_op) = LineOp::from_name(line_name) {
                let record_op = RecordOp::from_name(record_name).ok_or_else(|| {
                    Error::Template(format!("unknown record operation \"{record_name}\". Line: {line_num}"))
                })?;
                self.line_op = line_op;
                self.record_op = Some(record_op);
                self.set_new_state(rest, line_num)?;
                return Ok(());
            }
        } else if let Some(line_op) = LineOp::from_name(tok0) {
            self.line_op = line_op;
            self.set_new_state(rest, line_num)?;
            return Ok(());
        }

        // Case 2: <record-op> [new-state-or-message]
        if let Some(record_op) = RecordOp::from_name(tok0) {
            self.record_op = Some(record_op);
            self.set_new_state_or_error_message(rest, line_num)?;
            return Ok(());
        }

        // Case 3: [new-state] — the whole action is a bare/quoted state name.
        self.new_state = Some(parse_state_token(action, line_num)?);
        Ok(())
    }

    /// Form 1's trailing token (`<line-op>[.<record-op>] [new-state]`) is
    /// always a new state, even when the record-op is `Error`.
    fn set_new_state(&mut self, rest: &str, line_num: usize) -> Result<()> {
        if rest.is_empty() {
            return Ok(());
        }
        self.new_state = Some(parse_state_token(rest, line_num)?);
        Ok(())
    }

    /// Form 2's trailing token (`<record-op> [new-state-or-message]`) is
    /// the error message when the record-op is `Error`, otherwise a new
    /// state.
    fn set_new_state_or_error_message(&mut self, rest: &str, line_num: usize) -> Result<()> {
        if rest.is_empty() {
            return Ok(());
        }
        let token = parse_state_token(rest, line_num)?;
        if self.record_op == Some(RecordOp::Error) {
            self.error_message = Some(token);
        } else {
            self.new_state = Some(token);
        }
        Ok(())
    }

    pub fn validate(&self, states: &IndexMap<String, crate::template::state::State>) -> Result<()> {
        if let Some(state) = &self.new_state {
            if !states.contains_key(state) {
                return Err(Error::Template(format!(
                    "state '{state}' not found, referenced at line {}",
                    self.line_num
                )));
            }
        }
        Ok(())
    }

    pub fn check_match<'a>(&self, line: &'a str) -> Result<Option<fancy_regex::Captures<'a>>> {
        Ok(self.match_regex.captures(line)?)
    }

    pub fn break_current_state(&self) -> bool {
        self.line_op == LineOp::Next
    }
}

/// Finds the LAST occurrence of ` -> ` in the line (rule match/action
/// split point), mirroring a greedy `(.*) -> (.*)` split.
fn rfind_arrow(line: &str) -> Option<usize> {
    line.rfind(" -> ")
}

fn split_first_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

/// A new-state / error-message token is either a bare `\w+` word or a
/// double-quoted string (which may contain spaces).
fn parse_state_token(s: &str, line_num: usize) -> Result<String> {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return Ok(s[1..s.len() - 1].to_string());
    }
    if !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Ok(s.to_string());
    }
    Err(Error::Template(format!(
        "malformed action tail \"{s}\". Line: {line_num}"
    )))
}

/// Substitutes `$name` and `${name}` references in a rule's match
/// pattern with the referenced value's `(?P<name>...)` fragment. An
/// unrecognised `$name` is a compile-time error.
pub fn substitute_values(text: &str, map: &IndexMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        let c = text[i..].chars().next().unwrap();
        if c == '$' {
            let rest = &text[i + 1..];
            if let Some(stripped) = rest.strip_prefix('{') {
                if let Some(end) = stripped.find('}') {
                    let name = &stripped[..end];
                    if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        let frag = map
                            .get(name)
                            .ok_or_else(|| Error::Template(format!("value ${{{name}}} does not exist in template")))?;
                        out.push_str(frag);
                        i += 1 + 1 + end + 1;
                        continue;
                    }
                }
            } else {
                let name_len = rest
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .count();
                if name_len > 0 {
                    let name = &rest[..name_len];
                    let frag = map
                        .get(name)
                        .ok_or_else(|| Error::Template(format!("value ${name} does not exist in template")))?;
                    out.push_str(frag);
                    i += 1 + name_len;
                    continue;
                }
            }
        }
        out.push(c);
        i += c.len_utf8();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments() -> IndexMap<String, String> {
        let mut m = IndexMap::new();
        m.insert("HOST".to_string(), "(?P<HOST>\\S+)".to_string());
        m
    }

    #[test]
    fn substitutes_bare_and_braced() {
        let m = fragments();
        assert_eq!(substitute_values("^$HOST$", &m).unwrap(), "^(?P<HOST>\\S+)$");
        assert_eq!(substitute_values("^${HOST}$", &m).unwrap(), "^(?P<HOST>\\S+)$");
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let m = fragments();
        assert!(substitute_values("^$NOPE$", &m).is_err());
    }

    #[test]
    fn parses_record_only_action() {
        let m = fragments();
        let rule = Rule::new("  ^$HOST -> Record", 1, &m).unwrap();
        assert_eq!(rule.record_op, Some(RecordOp::Record));
        assert_eq!(rule.line_op, LineOp::Next);
        assert!(rule.new_state.is_none());
    }

    #[test]
    fn parses_line_dot_record_with_state() {
        let m = fragments();
        let rule = Rule::new("  ^$HOST -> Continue.Record nextstate", 1, &m).unwrap();
        assert_eq!(rule.line_op, LineOp::Continue);
        assert_eq!(rule.record_op, Some(RecordOp::Record));
        assert_eq!(rule.new_state.as_deref(), Some("nextstate"));
    }

    #[test]
    fn parses_error_with_message() {
        let m = fragments();
        let rule = Rule::new("  ^$HOST -> Error \"boom\"", 1, &m).unwrap();
        assert_eq!(rule.record_op, Some(RecordOp::Error));
        assert_eq!(rule.error_message.as_deref(), Some("boom"));
        assert!(rule.new_state.is_none());
    }

    #[test]
    fn parses_bare_new_state() {
        let m = fragments();
        let rule = Rule::new("  ^$HOST -> NextState", 1, &m).unwrap();
        assert!(rule.record_op.is_none());
        assert_eq!(rule.new_state.as_deref(), Some("NextState"));
    }

    #[test]
    fn form_one_error_record_op_sets_new_state_not_message() {
        let m = fragments();
        let rule = Rule::new("  ^$HOST -> Next.Error foo", 1, &m).unwrap();
        assert_eq!(rule.record_op, Some(RecordOp::Error));
        assert_eq!(rule.new_state.as_deref(), Some("foo"));
        assert!(rule.error_message.is_none());
    }
}
