use crate::error::{Error, Result, SaveOutcome};
use crate::record::Cell;
use crate::template::options::{parse_option_token, ValueOption};
use fancy_regex::Regex;

/// A declared named capture slot: `Value [options] NAME (regex)`.
#[derive(Debug)]
pub struct Value {
    pub name: String,
    pub regex_source: String,
    /// The value's own regex, compiled standalone — used by `List` to
    /// re-destructure a capture that itself has named sub-groups.
    pub compiled_regex: Regex,
    /// `(regex)` with the leading `(` rewritten to `(?P<name>`, used
    /// when substituting `$name` into a rule's match pattern.
    pub template_fragment: String,
    pub options: Vec<ValueOption>,
    pub current: Cell,
    has_filldown: bool,
}

impl Value {
    /// Parse a `Value ...` declaration line (already known to start
    /// with `Value `).
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(Error::Parse(
                "value declaration needs at least 3 tokens".to_string(),
            ));
        }
        if parts[0] != "Value" {
            return Err(Error::Parse("value line must start with `Value`".into()));
        }

        let mut idx = 1;
        let mut options = Vec::new();
        if !parts[idx].starts_with('(') {
            for token in parts[idx].split(',') {
                let option = parse_option_token(token)?;
                if options
                    .iter()
                    .any(|existing: &ValueOption| existing.same_variant(option.name()))
                {
                    return Err(Error::Parse(format!("duplicate option \"{token}\"")));
                }
                options.push(option);
            }
            idx += 1;
        }

        if idx >= parts.len() {
            return Err(Error::Parse("missing value name and regex".into()));
        }
        let name = parts[idx].to_string();
        idx += 1;

        if idx >= parts.len() {
            return Err(Error::Parse(format!("value `{name}` is missing a regex")));
        }
        let regex_source = parts[idx..].join(" ");
        if !regex_source.starts_with('(') {
            return Err(Error::Parse(format!(
                "value `{name}` regex must start with a `(` group"
            )));
        }

        let template_fragment = regex_source.replacen('(', &format!("(?P<{name}>"), 1);
        let compiled_regex = Regex::new(&regex_source)?;

        let has_filldown = options.iter().any(|o| o.name() == "Filldown");
        for option in &mut options {
            option.on_create();
        }

        Ok(Self {
            name,
            regex_source,
            compiled_regex,
            template_fragment,
            options,
            current: Cell::Null,
            has_filldown,
        })
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.options.iter().any(|o| o.name() == name)
    }

    /// Fires every attached option's `assign()` hook.
    pub fn assign(&mut self, captured: &str) -> Result<()> {
        self.current = Cell::Scalar(captured.to_string());
        for option in &mut self.options {
            option.on_assign(captured, &self.compiled_regex)?;
        }
        Ok(())
    }

    /// Fires every attached option's `save()` hook in declaration
    /// order; a `Required` placed after a `List` observes the
    /// list-valued `current` the `List` hook just wrote.
    pub fn save(&mut self) -> SaveOutcome {
        for option in &mut self.options {
            if option.on_save(&mut self.current) == SaveOutcome::Skip {
                self.clear();
                return SaveOutcome::Skip;
            }
        }
        SaveOutcome::Keep
    }

    /// Fires every attached option's `clear()` hook. The last option
    /// (in declaration order) that yields a cell wins; this lets
    /// `Filldown` override the `Null` a co-attached `List` leaves
    /// behind.
    pub fn clear(&mut self) {
        let mut next = Cell::Null;
        for option in &mut self.options {
            if let Some(cell) = option.on_clear(self.has_filldown) {
                next = cell;
            }
        }
        self.current = next;
    }

    /// Full reset: run at the start of every `Template::parse` call.
    pub fn clear_all(&mut self) {
        self.current = Cell::Null;
        for option in &mut self.options {
            option.on_clear_all();
        }
    }
}
