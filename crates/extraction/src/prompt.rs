//! Prompt templates with `{name}` placeholders.

/// A named prompt with `{name}` placeholders filled from a [`PromptContext`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: &'static str,
    text: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, text: &'static str) -> Self {
        Self { name, text }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Substitute every `{key}` the context provides in a single pass; substituted
    /// values are never rescanned. Unknown placeholders and literal braces (the JSON
    /// schema) are left as written.
    pub fn render(&self, context: &PromptContext) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let candidate = &rest[open..];

            let hit = context.values.iter().find_map(|(key, value)| {
                let placeholder_len = key.len() + 2;
                let matches = candidate.len() >= placeholder_len
                    && candidate[1..].starts_with(key)
                    && candidate[1 + key.len()..].starts_with('}');
                matches.then_some((placeholder_len, value))
            });

            match hit {
                Some((len, value)) => {
                    out.push_str(value);
                    rest = &candidate[len..];
                }
                None => {
                    out.push('{');
                    rest = &candidate[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Values substituted into a [`PromptTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    values: Vec<(&'static str, String)>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.push((key, value.into()));
        self
    }
}
