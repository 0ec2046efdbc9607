use crate::error::{Error, Result};
use fancy_regex::Regex;
use indexmap::IndexMap;

/// One data row of an index file: a compiled, anchored-at-start regex
/// per non-`template` attribute column, plus the template filename.
#[derive(Debug)]
pub struct Row {
    pub template: String,
    patterns: IndexMap<String, Regex>,
}

impl Row {
    pub fn parse(header: &[String], fields: &[String], line_num: usize) -> Result<Self> {
        if fields.len() != header.len() {
            return Err(Error::Table(format!(
                "row at line {line_num} has {} columns, expected {}",
                fields.len(),
                header.len()
            )));
        }

        let mut template = None;
        let mut patterns = IndexMap::new();
        for (name, field) in header.iter().zip(fields.iter()) {
            if name == "template" {
                template = Some(field.clone());
                continue;
            }
            let expanded = expand_optional_groups(field);
            let anchored = format!("^(?:{expanded})");
            let regex = Regex::new(&anchored).map_err(|e| {
                Error::Table(format!(
                    "row at line {line_num}: invalid pattern for column '{name}': {e}"
                ))
            })?;
            patterns.insert(name.clone(), regex);
        }

        let template = template.ok_or_else(|| {
            Error::Table(format!("row at line {line_num} is missing a 'template' column"))
        })?;

        Ok(Self { template, patterns })
    }

    /// Does `command` match this row's `command` pattern, and does every
    /// supplied tag whose name appears in this row's patterns also
    /// match? Matching is anchored at the start, not full-string.
    pub fn matches(&self, command: &str, tags: &IndexMap<String, String>) -> Result<bool> {
        match self.patterns.get("command") {
            Some(pattern) => {
                if !pattern.is_match(command)? {
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }

        for (name, pattern) in &self.patterns {
            if name == "command" {
                continue;
            }
            match tags.get(name) {
                Some(value) => {
                    if !pattern.is_match(value)? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }

        Ok(true)
    }
}

/// Expands `[[word]]` into a nested optional-prefix regex:
/// `[[word]] -> (w(o(r(d)?)?)?)?`, so short command prefixes match
/// full keywords. Text outside `[[...]]` passes through unchanged.
pub fn expand_optional_groups(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c == '[' && pattern[i..].starts_with("[[") {
            if let Some(end) = pattern[i..].find("]]") {
                let word = &pattern[i + 2..i + end];
                out.push_str(&nest_optional(word));
                for _ in 0..(end + 1) {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }

    out
}

fn nest_optional(word: &str) -> String {
    fn build(chars: &[char]) -> String {
        match chars.split_first() {
            None => String::new(),
            Some((head, tail)) => {
                if tail.is_empty() {
                    format!("({head})?")
                } else {
                    format!("({head}{})?", build(tail))
                }
            }
        }
    }
    let chars: Vec<char> = word.chars().collect();
    if chars.is_empty() {
        String::new()
    } else {
        build(&chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_prefix_sugar() {
        assert_eq!(expand_optional_groups("sh[[ow]] ver[[sion]]"), "sh(o(w)?)? ver(s(i(o(n)?)?)?)?");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(expand_optional_groups("show version"), "show version");
    }
}
