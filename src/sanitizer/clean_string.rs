use lazy_regex::regex_replace_all;
use std::ops::Deref;

/// Text from Discord which is safe to show in the Minecraft chat: no control
/// characters, no emoji the client can't render, no line breaks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanString(String);

impl From<String> for CleanString {
    fn from(input: String) -> Self {
        Self::new(input).0
    }
}

impl From<&str> for CleanString {
    fn from(input: &str) -> Self {
        Self::from(input.to_string())
    }
}

impl FromIterator<char> for CleanString {
    fn from_iter<T: IntoIterator<Item = char>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<String>())
    }
}

impl CleanString {
    /// Cleans `input`, also returning whether any illegal characters were removed
    pub fn new(input: String) -> (Self, bool) {
        let value = regex_replace_all!(r"\n+", input.trim(), |_| " ⤶ ");
        let clean = regex_replace_all!(
            r"[^\p{Letter}\p{Number}\p{Punctuation}\p{Space_Separator}\p{Math_Symbol}\p{Currency_Symbol}\p{Modifier_Symbol}✀-➿]",
            &value,
            ""
        );
        let cleaned = clean.len() != value.len();

        (Self(clean.trim().to_string()), cleaned)
    }

    /// Truncates to at most `max` characters, returning whether anything was cut
    pub fn truncate_chars(&mut self, max: usize) -> bool {
        match self.0.char_indices().nth(max) {
            Some((index, _)) => {
                self.0.truncate(index);
                true
            }
            None => false,
        }
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for CleanString {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for CleanString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<CleanString> for String {
    fn eq(&self, other: &CleanString) -> bool {
        self == &other.0
    }
}
