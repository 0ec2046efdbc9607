use crate::error::{Error, Result, SaveOutcome};
use crate::record::{Cell, Record};
use crate::template::rule::Rule;
use crate::template::state::State;
use crate::template::value::Value;
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, instrument, trace};

/// A compiled template: its declared values, its state machine, and
/// (between `parse` calls) the records accumulated by the last run.
#[derive(Debug)]
pub struct Template {
    values: IndexMap<String, Value>,
    states: IndexMap<String, State>,
    current_state: String,
    results: Vec<Vec<Cell>>,
}

impl Template {
    /// Compiles template source text into a validated `Template`.
    pub fn compile(source: &str) -> Result<Self> {
        let values = parse_values(source)?;
        let states = parse_states(source, &values)?;

        let template = Template {
            values,
            states,
            current_state: "Start".to_string(),
            results: Vec::new(),
        };
        template.validate()?;
        debug!(
            values = template.values.len(),
            states = template.states.len(),
            "compiled template"
        );
        Ok(template)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Template(format!("template source is not valid UTF-8: {e}")))?;
        Self::compile(text)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::TemplateNotFound(format!("{}: {e}", path.display())))?;
        Self::compile(&text)
    }

    fn validate(&self) -> Result<()> {
        if !self.states.contains_key("Start") {
            return Err(Error::Template("template has no 'Start' state".to_string()));
        }
        for state in self.states.values() {
            state.validate(&self.states)?;
        }
        Ok(())
    }

    /// Column names, in declaration order.
    pub fn header(&self) -> Vec<&str> {
        self.values.keys().map(|s| s.as_str()).collect()
    }

    /// Runs the FSM over `text` and returns the emitted records, each
    /// shaped as an ordered map aligned to `header()`.
    #[instrument(skip(self, text), fields(lines = text.lines().count()))]
    pub fn parse(&mut self, text: &str) -> Result<Vec<Record>> {
        self.reset();

        for line in text.lines() {
            self.process_line(line)?;
        }

        let names: Vec<String> = self.values.keys().cloned().collect();
        Ok(self
            .results
            .drain(..)
            .map(|row| names.iter().cloned().zip(row).collect::<IndexMap<_, _>>())
            .collect())
    }

    fn reset(&mut self) {
        self.current_state = "Start".to_string();
        self.results.clear();
        for value in self.values.values_mut() {
            value.clear_all();
        }
    }

    /// Tries each rule of the current state, in the order snapshotted at
    /// the top of this line's processing, against `line`. A mid-line
    /// `Continue` state transition updates `current_state` for
    /// subsequent lines/back-fills but does not restart iteration from
    /// the new state's rules for this same line — later rules in the
    /// snapshot still run.
    fn process_line(&mut self, line: &str) -> Result<()> {
        let rules: Vec<Rule> = match self.states.get(&self.current_state) {
            Some(state) => state.rules.clone(),
            None => return Ok(()),
        };

        for rule in &rules {
            let captures = match rule.check_match(line)? {
                Some(captures) => captures,
                None => continue,
            };
            trace!(rule = %rule.source_line, "rule matched");

            let mut assigned = Vec::new();
            for name in self.values.keys() {
                if let Some(m) = captures.name(name) {
                    assigned.push((name.clone(), m.as_str().to_string()));
                }
            }
            for (name, captured) in assigned {
                let needs_fillup = match self.values.get_mut(&name) {
                    Some(value) => {
                        value.assign(&captured)?;
                        value.has_option("Fillup")
                    }
                    None => false,
                };
                if needs_fillup {
                    self.fillup(&name);
                }
            }

            self.run_operation(rule)?;

            if rule.break_current_state() {
                break;
            }
        }

        Ok(())
    }

    fn run_operation(&mut self, rule: &Rule) -> Result<()> {
        use crate::template::rule::RecordOp;

        match rule.record_op {
            Some(RecordOp::Record) => self.commit_record(),
            Some(RecordOp::NoRecord) | None => {}
            Some(RecordOp::Error) => {
                return Err(Error::Fsm {
                    location: rule.source_line.clone(),
                    message: rule
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "template-raised error".to_string()),
                });
            }
        }

        if let Some(new_state) = &rule.new_state {
            self.current_state = new_state.clone();
        }

        Ok(())
    }

    /// Commits the current working record per the §4.E algorithm.
    fn commit_record(&mut self) {
        if self.values.is_empty() {
            return;
        }

        let mut skipped = false;
        for value in self.values.values_mut() {
            if value.save() == SaveOutcome::Skip {
                skipped = true;
                break;
            }
        }
        if skipped {
            for value in self.values.values_mut() {
                value.clear();
            }
            return;
        }

        let row: Vec<Cell> = self.values.values().map(|v| v.current.clone()).collect();
        let all_null = row.iter().all(|c| c.is_null());

        if !all_null {
            self.results.push(row);
        }
        for value in self.values.values_mut() {
            value.clear();
        }
    }

    /// Back-fills this `Fillup` value's column in already-emitted
    /// records, scanning from the newest backward and stopping at the
    /// first already-non-null cell.
    fn fillup(&mut self, name: &str) {
        let Some(index) = self.values.get_index_of(name) else {
            return;
        };
        let current = match self.values.get(name) {
            Some(value) => value.current.clone(),
            None => return,
        };
        for row in self.results.iter_mut().rev() {
            if !row[index].is_null() {
                break;
            }
            row[index] = current.clone();
        }
    }
}

/// First pass: scan every line for `Value ` declarations. Comment lines
/// and anything else are ignored during this pass.
fn parse_values(source: &str) -> Result<IndexMap<String, Value>> {
    let mut values = IndexMap::new();
    let mut declared_at: IndexMap<String, usize> = IndexMap::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_num = idx + 1;
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if !trimmed.starts_with("Value ") && trimmed != "Value" {
            continue;
        }

        let value = Value::parse(trimmed)
            .map_err(|e| Error::Parse(format!("{e}. Line: {line_num}")))?;
        if let Some(prior) = declared_at.get(&value.name) {
            return Err(Error::Template(format!(
                "duplicate value '{}' declared at lines {} and {}",
                value.name, prior, line_num
            )));
        }
        declared_at.insert(value.name.clone(), line_num);
        values.insert(value.name.clone(), value);
    }

    Ok(values)
}

/// Second pass: rescan the source to build states. A line matching
/// `^\w+$` opens a new state; blank/comment lines are ignored; lines
/// starting with whitespace then `^` are rules appended to the current
/// state; anything else encountered while inside a state is skipped.
fn parse_states(source: &str, values: &IndexMap<String, Value>) -> Result<IndexMap<String, State>> {
    let fragments: IndexMap<String, String> = values
        .iter()
        .map(|(name, value)| (name.clone(), value.template_fragment.clone()))
        .collect();

    let mut states: IndexMap<String, State> = IndexMap::new();
    let mut current: Option<String> = None;
    let mut declared_at: IndexMap<String, usize> = IndexMap::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_num = idx + 1;
        let line = raw_line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let starts_with_whitespace = line.starts_with(' ') || line.starts_with('\t');
        let looks_like_rule = starts_with_whitespace && trimmed.starts_with('^');

        if !starts_with_whitespace && is_state_header(trimmed) {
            if let Some(prior) = declared_at.get(trimmed) {
                return Err(Error::Template(format!(
                    "duplicate state '{trimmed}' declared at lines {prior} and {line_num}"
                )));
            }
            declared_at.insert(trimmed.to_string(), line_num);
            states.insert(trimmed.to_string(), State::new(trimmed.to_string(), line_num)?);
            current = Some(trimmed.to_string());
            continue;
        }

        if looks_like_rule {
            if let Some(state_name) = &current {
                let rule = Rule::new(line, line_num, &fragments)?;
                if let Some(state) = states.get_mut(state_name) {
                    state.add_rule(rule);
                }
            }
            continue;
        }

        // Any other line (e.g. a `Value ` declaration, encountered again
        // in this pass) is silently skipped while inside/outside a state.
    }

    Ok(states)
}

fn is_state_header(trimmed: &str) -> bool {
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_capture() {
        let mut t = Template::compile("Value NAME (\\S+)\n\nStart\n  ^${NAME} -> Record\n").unwrap();
        let records = t.parse("alice\nbob\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["NAME"], Cell::Scalar("alice".to_string()));
        assert_eq!(records[1]["NAME"], Cell::Scalar("bob".to_string()));
    }

    #[test]
    fn empty_input_yields_no_records() {
        let mut t = Template::compile("Value NAME (\\S+)\n\nStart\n  ^${NAME} -> Record\n").unwrap();
        assert!(t.parse("").unwrap().is_empty());
    }

    #[test]
    fn no_record_action_yields_no_records() {
        let mut t = Template::compile("Value NAME (\\S+)\n\nStart\n  ^${NAME}\n").unwrap();
        assert!(t.parse("alice\nbob\n").unwrap().is_empty());
    }

    #[test]
    fn parse_is_idempotent() {
        let mut t = Template::compile("Value NAME (\\S+)\n\nStart\n  ^${NAME} -> Record\n").unwrap();
        let first = t.parse("alice\nbob\n").unwrap();
        let second = t.parse("alice\nbob\n").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn filldown_persists_across_records() {
        let source = "Value Filldown HOST (\\S+)\nValue IFACE (\\S+)\n\nStart\n  ^$HOST $IFACE -> Record\n  ^$IFACE -> Record\n";
        let mut t = Template::compile(source).unwrap();
        let records = t.parse("h1 eth0\neth1\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["HOST"], Cell::Scalar("h1".to_string()));
        assert_eq!(records[0]["IFACE"], Cell::Scalar("eth0".to_string()));
        assert_eq!(records[1]["HOST"], Cell::Scalar("h1".to_string()));
        assert_eq!(records[1]["IFACE"], Cell::Scalar("eth1".to_string()));
    }

    #[test]
    fn required_skips_record() {
        let source = "Value Required USER (\\S+)\nValue ROLE (\\S+)\n\nStart\n  ^role:$ROLE -> Record\n  ^user:$USER -> Record\n";
        let mut t = Template::compile(source).unwrap();
        let records = t.parse("role:admin\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn fillup_backfills_prior_records() {
        let source = "Value Fillup ROLE (\\S+)\nValue NAME (\\S+)\n\nStart\n  ^user:$NAME -> Record\n  ^role:$ROLE -> Record\n";
        let mut t = Template::compile(source).unwrap();
        let records = t.parse("user:alice\nuser:bob\nrole:admin\n").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["ROLE"], Cell::Scalar("admin".to_string()));
        assert_eq!(records[1]["ROLE"], Cell::Scalar("admin".to_string()));
        assert_eq!(records[2]["ROLE"], Cell::Scalar("admin".to_string()));
    }

    #[test]
    fn error_action_aborts_parse() {
        let source = "Value NAME (\\S+)\n\nStart\n  ^$NAME -> Error \"boom\"\n";
        let mut t = Template::compile(source).unwrap();
        let err = t.parse("alice\n").unwrap_err();
        match err {
            Error::Fsm { message, .. } => assert_eq!(message, "boom"),
            other => panic!("expected Fsm error, got {other:?}"),
        }
    }

    #[test]
    fn missing_start_state_is_a_compile_error() {
        let err = Template::compile("Value NAME (\\S+)\n\nOther\n  ^$NAME -> Record\n").unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn unknown_new_state_is_a_compile_error() {
        let err = Template::compile("Value NAME (\\S+)\n\nStart\n  ^$NAME -> Nope\n").unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }
}
