//! Keyword scoring shared by extensions and themes
//!
//! A candidate exposes named fields; a rule table assigns a weight to an
//! exact match and to a substring match on each field. Prefixed rules only
//! apply to keys carrying that prefix (`#app`, `@author`) and only accept
//! exact matches.

/// Value of one searchable field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    fn into_values(self) -> Vec<String> {
        match self {
            Self::Text(text) => vec![text],
            Self::List(list) => list,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Something that can be scored against search keys
pub trait Matchable {
    /// Value of the named field, `None` when the field is absent
    fn match_field(&self, field: &str) -> Option<FieldValue>;
}

/// Weights for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRule {
    pub field: &'static str,
    pub equal: u32,
    pub include: u32,
    pub prefix: Option<&'static str>,
    pub array: bool,
}

impl MatchRule {
    pub const fn new(field: &'static str, equal: u32, include: u32) -> Self {
        Self {
            field,
            equal,
            include,
            prefix: None,
            array: false,
        }
    }

    /// Field holds a list; each element is tested
    pub const fn array(mut self) -> Self {
        self.array = true;
        self
    }

    /// Rule only applies to keys starting with `prefix`
    pub const fn prefixed(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Score of a single key against this rule
    ///
    /// For list fields the best element wins, so a long keyword list does
    /// not inflate the score.
    fn score(&self, key: &str, value: FieldValue) -> u32 {
        let key = match self.prefix {
            Some(prefix) => match key.strip_prefix(prefix) {
                Some(rest) if !rest.is_empty() => rest,
                _ => return 0,
            },
            None => key,
        };

        let values = if self.array {
            value.into_values()
        } else {
            match value {
                FieldValue::Text(text) => vec![text],
                FieldValue::List(list) => vec![list.join(" ")],
            }
        };

        let mut best = 0;
        for value in values {
            let value = value.to_lowercase();
            if value.is_empty() {
                continue;
            }
            let score = if value == key {
                self.equal
            } else if self.prefix.is_none() && value.contains(key) {
                self.include
            } else {
                0
            };
            best = best.max(score);
        }
        best
    }
}

/// Split a raw query into lowercase, space separated keys
pub fn parse_keys(query: &str) -> Vec<String> {
    query
        .trim()
        .to_lowercase()
        .split(' ')
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Total score of a candidate across every key and rule
pub fn match_score<M: Matchable + ?Sized>(rules: &[MatchRule], candidate: &M, keys: &[String]) -> u32 {
    let mut score = 0;
    for key in keys.iter().filter(|key| !key.is_empty()) {
        for rule in rules {
            if let Some(value) = candidate.match_field(rule.field) {
                score += rule.score(key, value);
            }
        }
    }
    score
}

/// Score and rank candidates, dropping those that do not match at all
///
/// Equal scores keep their input order.
pub fn rank<T, F>(candidates: impl IntoIterator<Item = T>, mut score: F) -> Vec<(T, u32)>
where
    F: FnMut(&T) -> u32,
{
    let mut scored: Vec<(T, u32)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let score = score(&candidate);
            (score > 0).then_some((candidate, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
}
