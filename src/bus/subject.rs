// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dot-separated subject matching: `amityvox.message.create` style
//! concrete subjects, `amityvox.message.*` single-token wildcards and
//! `amityvox.>` trailing wildcards, matching NATS subject semantics.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Star,
    GreaterThan,
}

#[derive(Debug, Clone)]
pub struct SubjectPattern {
    tokens: Vec<Token>,
    raw: String,
}

impl SubjectPattern {
    pub fn parse(pattern: &str) -> Self {
        let tokens = pattern
            .split('.')
            .map(|part| match part {
                "*" => Token::Star,
                ">" => Token::GreaterThan,
                literal => Token::Literal(literal.to_string()),
            })
            .collect();
        Self {
            tokens,
            raw: pattern.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, subject: &str) -> bool {
        let subject_tokens: Vec<&str> = subject.split('.').collect();
        let mut pi = 0;
        let mut si = 0;
        while pi < self.tokens.len() {
            match &self.tokens[pi] {
                Token::GreaterThan => return si < subject_tokens.len(),
                Token::Star => {
                    if si >= subject_tokens.len() {
                        return false;
                    }
                }
                Token::Literal(l) => {
                    if subject_tokens.get(si) != Some(&l.as_str()) {
                        return false;
                    }
                }
            }
            pi += 1;
            si += 1;
        }
        si == subject_tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::SubjectPattern;

    #[test]
    fn trailing_wildcard_matches_any_suffix() {
        let p = SubjectPattern::parse("amityvox.>");
        assert!(p.matches("amityvox.message.create"));
        assert!(p.matches("amityvox.guild.update"));
        assert!(!p.matches("other.message.create"));
    }

    #[test]
    fn single_token_wildcard_matches_exactly_one_level() {
        let p = SubjectPattern::parse("amityvox.*.create");
        assert!(p.matches("amityvox.message.create"));
        assert!(!p.matches("amityvox.message.update"));
        assert!(!p.matches("amityvox.message.sub.create"));
    }

    #[test]
    fn exact_literal_requires_full_match() {
        let p = SubjectPattern::parse("amityvox.message.create");
        assert!(p.matches("amityvox.message.create"));
        assert!(!p.matches("amityvox.message.create.extra"));
    }
}
