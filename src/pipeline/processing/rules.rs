use crate::pipeline::utils::TextUtils;

/// One classification rule: a label and the keyword substrings that select it
#[derive(Debug, Clone)]
pub struct KeywordRule<L> {
    pub label: L,
    pub keywords: &'static [&'static str],
}

impl<L> KeywordRule<L> {
    pub const fn new(label: L, keywords: &'static [&'static str]) -> Self {
        Self { label, keywords }
    }

    pub fn matches(&self, text: &str) -> bool {
        TextUtils::contains_any(text, self.keywords)
    }
}

/// Ordered rule list evaluated first-match-wins over normalized text
#[derive(Debug, Clone)]
pub struct KeywordRules<L: 'static> {
    rules: &'static [KeywordRule<L>],
}

impl<L: Copy> KeywordRules<L> {
    pub const fn new(rules: &'static [KeywordRule<L>]) -> Self {
        Self { rules }
    }

    /// Label of the first rule with any keyword contained in `text`
    pub fn classify(&self, text: &str) -> Option<L> {
        self.rules.iter().find(|r| r.matches(text)).map(|r| r.label)
    }

    pub fn rules(&self) -> &'static [KeywordRule<L>] {
        self.rules
    }
}
