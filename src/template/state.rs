use crate::error::{Error, Result};
use crate::template::rule::Rule;
use indexmap::IndexMap;

/// A named, ordered list of rules. Rules are tried top-to-bottom
/// against each input line while this state is current.
#[derive(Debug)]
pub struct State {
    pub name: String,
    pub line_num: usize,
    pub rules: Vec<Rule>,
}

impl State {
    pub fn new(name: String, line_num: usize) -> Result<Self> {
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(Error::Template(format!(
                "invalid state name '{name}'. Line: {line_num}"
            )));
        }
        Ok(Self {
            name,
            line_num,
            rules: Vec::new(),
        })
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn validate(&self, states: &IndexMap<String, State>) -> Result<()> {
        for rule in &self.rules {
            rule.validate(states)?;
        }
        Ok(())
    }
}
