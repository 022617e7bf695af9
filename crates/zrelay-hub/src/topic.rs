// Topic allow-list shared by room creation, request validation and the upstream subscription.
use crate::{HubError, Result};

// Prefixes that mark an entry in a topic list as a comment.
const COMMENT_PREFIXES: [&str; 3] = ["#", "//", "/*"];

/// Ordered, de-duplicated set of configured topic names.
///
/// ```
/// use zrelay_hub::TopicSet;
///
/// let topics = TopicSet::from_entries(["rawtx", " rawblock ", "# hashtx", "", "rawtx"]);
/// assert_eq!(topics.names(), ["rawtx", "rawblock"]);
/// assert!(topics.validate(["rawtx"]).is_ok());
/// assert!(topics.validate(["bogus"]).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicSet {
    names: Vec<String>,
}

impl TopicSet {
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let name = entry.as_ref().trim();
            if name.is_empty() || is_comment(name) {
                continue;
            }
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
        Self { names }
    }

    /// Splits a query-string style list on commas and whitespace.
    pub fn parse_delimited(list: &str) -> Vec<String> {
        list.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|existing| existing == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn joined(&self) -> String {
        self.names.join(", ")
    }

    /// Fails with the exact list of unknown topics when any requested topic is not configured.
    pub fn validate<I, S>(&self, requested: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut invalid: Vec<String> = Vec::new();
        for topic in requested {
            let topic = topic.as_ref();
            if !self.contains(topic) && !invalid.iter().any(|seen| seen == topic) {
                invalid.push(topic.to_string());
            }
        }
        if invalid.is_empty() {
            return Ok(());
        }
        Err(HubError::UnknownTopics {
            invalid,
            valid: self.names.clone(),
        })
    }
}

fn is_comment(entry: &str) -> bool {
    COMMENT_PREFIXES
        .iter()
        .any(|prefix| entry.starts_with(prefix))
}
