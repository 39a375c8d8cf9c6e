//! The configured moderator names.

/// A set of names matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ModeratorList {
    names: Vec<String>,
}

impl ModeratorList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// `true` if `name` is a moderator, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.names.iter().any(|n| *n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
