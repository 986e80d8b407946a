/// Case-insensitive substring match of `text` against every term.
pub fn contains_disallowed<S: AsRef<str>>(text: &str, terms: &[S]) -> bool {
    let normalized = text.to_lowercase();
    terms.iter().any(|term| {
        let term = term.as_ref().trim();
        !term.is_empty() && normalized.contains(&term.to_lowercase())
    })
}

/// Opaque list of disallowed terms, lowercased once at load time.
#[derive(Debug, Clone, Default)]
pub struct TermList {
    terms: Vec<String>,
}

impl TermList {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// One term per line; blank lines and `#` comments are skipped.
    pub fn parse(source: &str) -> Self {
        Self::new(
            source
                .lines()
                .map(str::trim)
                .filter(|l| !l.starts_with('#')),
        )
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains_disallowed(&self, text: &str) -> bool {
        contains_disallowed(text, &self.terms)
    }

    /// Gate for the send/edit path. Messages carrying an attachment are not
    /// inspected.
    pub fn check(&self, content: &str, has_attachment: bool) -> Result<(), String> {
        if has_attachment {
            return Ok(());
        }
        if self.contains_disallowed(content) {
            return Err("Message contains a disallowed term".into());
        }
        Ok(())
    }
}
