use crate::error::{Error, Result, SaveOutcome};
use crate::record::{Cell, ListItem};
use fancy_regex::Regex;
use indexmap::IndexMap;

/// One of the five value-lifecycle behaviors a `Value` can carry.
/// Closed enum rather than an open registry: the template grammar
/// names exactly these five, and the alternation used to recognise
/// them in a `Value` declaration is a compile-time constant (see
/// `Option::names_alternation`).
#[derive(Debug, Clone)]
pub enum ValueOption {
    Key,
    Required,
    List(ListState),
    Fillup,
    Filldown(FilldownState),
}

#[derive(Debug, Clone, Default)]
pub struct ListState {
    items: Vec<ListItem>,
}

#[derive(Debug, Clone, Default)]
pub struct FilldownState {
    held: Option<String>,
}

impl ValueOption {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Key" => Some(ValueOption::Key),
            "Required" => Some(ValueOption::Required),
            "List" => Some(ValueOption::List(ListState::default())),
            "Fillup" => Some(ValueOption::Fillup),
            "Filldown" => Some(ValueOption::Filldown(FilldownState::default())),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueOption::Key => "Key",
            ValueOption::Required => "Required",
            ValueOption::List(_) => "List",
            ValueOption::Fillup => "Fillup",
            ValueOption::Filldown(_) => "Filldown",
        }
    }

    /// Same discriminant (ignoring any accumulator payload)?
    pub fn same_variant(&self, other_name: &str) -> bool {
        self.name() == other_name
    }

    /// `create()`: called once right after the option is attached.
    pub fn on_create(&mut self) {
        match self {
            ValueOption::List(state) => state.items.clear(),
            ValueOption::Filldown(state) => state.held = None,
            _ => {}
        }
    }

    /// `assign()`: fires whenever the value's `current` capture changes.
    /// `own_regex` is the value's own (not template-fragment) compiled
    /// regex, needed by `List` to re-destructure multi-group captures.
    pub fn on_assign(&mut self, captured: &str, own_regex: &Regex) -> Result<()> {
        match self {
            ValueOption::List(state) => {
                let item = if own_regex.captures_len() > 2 {
                    match own_regex.captures(captured)? {
                        Some(caps) => {
                            let mut map = IndexMap::new();
                            for name in own_regex.capture_names().flatten() {
                                if let Some(m) = caps.name(name) {
                                    map.insert(name.to_string(), m.as_str().to_string());
                                }
                            }
                            if map.is_empty() {
                                ListItem::Scalar(captured.to_string())
                            } else {
                                ListItem::Map(map)
                            }
                        }
                        None => ListItem::Scalar(captured.to_string()),
                    }
                } else {
                    ListItem::Scalar(captured.to_string())
                };
                state.items.push(item);
            }
            ValueOption::Filldown(state) => {
                state.held = Some(captured.to_string());
            }
            // Fillup's back-fill needs the parent template's `results`,
            // which a bare option has no handle to; the template drives
            // that step directly once it sees the value carries Fillup
            // (see Template::assign_line).
            ValueOption::Fillup | ValueOption::Key | ValueOption::Required => {}
        }
        Ok(())
    }

    /// `save()`: may rewrite `current` (List does) and/or veto the
    /// record (Required does, via `SaveOutcome::Skip`).
    pub fn on_save(&self, current: &mut Cell) -> SaveOutcome {
        match self {
            ValueOption::Required => {
                if current.is_null() {
                    SaveOutcome::Skip
                } else {
                    SaveOutcome::Keep
                }
            }
            ValueOption::List(state) => {
                *current = Cell::List(state.items.clone());
                SaveOutcome::Keep
            }
            ValueOption::Key | ValueOption::Fillup | ValueOption::Filldown(_) => SaveOutcome::Keep,
        }
    }

    /// `clear()`: called after a record has been (or would have been)
    /// emitted. `has_filldown` tells `List` whether a sibling Filldown
    /// option means its accumulator should survive the clear.
    pub fn on_clear(&mut self, has_filldown: bool) -> Option<Cell> {
        match self {
            ValueOption::List(state) => {
                if !has_filldown {
                    state.items.clear();
                }
                None
            }
            ValueOption::Filldown(state) => Some(match &state.held {
                Some(s) => Cell::Scalar(s.clone()),
                None => Cell::Null,
            }),
            ValueOption::Key | ValueOption::Required | ValueOption::Fillup => None,
        }
    }

    /// `clear_all()`: full reset, run once at the start of every `parse`.
    pub fn on_clear_all(&mut self) {
        match self {
            ValueOption::List(state) => state.items.clear(),
            ValueOption::Filldown(state) => state.held = None,
            ValueOption::Key | ValueOption::Required | ValueOption::Fillup => {}
        }
    }
}

/// Parse `"List[param]"` / `"Required"` / ... into a `ValueOption`,
/// rejecting unknown names. The `[param]` suffix is accepted (matching
/// the template grammar) but none of the five variants currently use a
/// parameter, so it is validated and discarded.
pub fn parse_option_token(token: &str) -> Result<ValueOption> {
    let (name, _param) = match token.find('[') {
        Some(idx) => {
            if !token.ends_with(']') {
                return Err(Error::Parse(format!("malformed option `{token}`")));
            }
            (&token[..idx], Some(&token[idx + 1..token.len() - 1]))
        }
        None => (token, None),
    };
    ValueOption::parse(name).ok_or_else(|| Error::Parse(format!("unknown option \"{name}\"")))
}
