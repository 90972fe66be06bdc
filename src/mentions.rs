// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mention extraction: `<@ULID>`, `<@&ULID>`, `@everyone`, `@here`.
//! Content inside triple-backtick fences or single-backtick spans is
//! stripped before extraction so code samples never trigger a ping.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::utils::Ulid;

lazy_static! {
    static ref FENCE: Regex = Regex::new(r"```[\s\S]*?```").unwrap();
    static ref INLINE_CODE: Regex = Regex::new(r"`[^`\n]*`").unwrap();
    static ref USER_MENTION: Regex = Regex::new(r"<@([0-9A-HJKMNP-TV-Z]{26})>").unwrap();
    static ref ROLE_MENTION: Regex = Regex::new(r"<@&([0-9A-HJKMNP-TV-Z]{26})>").unwrap();
    static ref EVERYONE: Regex = Regex::new(r"@everyone").unwrap();
    static ref HERE: Regex = Regex::new(r"@here").unwrap();
}

/// The result of extracting mentions from a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMentions {
    pub user_ids: Vec<Ulid>,
    pub role_ids: Vec<Ulid>,
    pub everyone: bool,
    pub here: bool,
}

/// Strips fenced and inline code spans, replacing each with a single
/// space so surrounding token boundaries (and offsets callers don't
/// rely on here) aren't glued together.
fn strip_code_spans(content: &str) -> String {
    let without_fences = FENCE.replace_all(content, " ");
    INLINE_CODE.replace_all(&without_fences, " ").into_owned()
}

/// Extracts and deduplicates mentions from `content` (invariant 10: the
/// result is stable under re-parsing its own canonical form, since
/// `canonical()` only ever contains the already-stripped tokens).
pub fn parse(content: &str) -> ParsedMentions {
    let stripped = strip_code_spans(content);

    let mut seen_users = HashSet::new();
    let mut user_ids = Vec::new();
    for capture in USER_MENTION.captures_iter(&stripped) {
        if let Some(id) = Ulid::from_crockford(&capture[1]) {
            if seen_users.insert(id) {
                user_ids.push(id);
            }
        }
    }

    let mut seen_roles = HashSet::new();
    let mut role_ids = Vec::new();
    for capture in ROLE_MENTION.captures_iter(&stripped) {
        if let Some(id) = Ulid::from_crockford(&capture[1]) {
            if seen_roles.insert(id) {
                role_ids.push(id);
            }
        }
    }

    ParsedMentions {
        user_ids,
        role_ids,
        everyone: EVERYONE.is_match(&stripped),
        here: HERE.is_match(&stripped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_A: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const USER_B: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAW";

    /// Scenario S6.
    #[test]
    fn mentions_inside_a_code_fence_are_ignored() {
        let content = format!("hi <@{USER_A}> ```\n<@{USER_B}>\n```");
        let parsed = parse(&content);
        assert_eq!(parsed.user_ids, vec![Ulid::from_crockford(USER_A).unwrap()]);
    }

    #[test]
    fn mentions_inside_inline_code_are_ignored() {
        let content = format!("hi <@{USER_A}> and `<@{USER_B}>`");
        let parsed = parse(&content);
        assert_eq!(parsed.user_ids, vec![Ulid::from_crockford(USER_A).unwrap()]);
    }

    #[test]
    fn extraction_deduplicates() {
        let content = format!("<@{USER_A}> <@{USER_A}>");
        let parsed = parse(&content);
        assert_eq!(parsed.user_ids.len(), 1);
    }

    #[test]
    fn role_mentions_are_distinct_from_user_mentions() {
        let content = format!("<@&{USER_A}>");
        let parsed = parse(&content);
        assert!(parsed.user_ids.is_empty());
        assert_eq!(parsed.role_ids, vec![Ulid::from_crockford(USER_A).unwrap()]);
    }

    #[test]
    fn everyone_and_here_are_detected() {
        let parsed = parse("@everyone please see @here");
        assert!(parsed.everyone);
        assert!(parsed.here);
    }

    /// Invariant 10: parsing is idempotent once run on the already-clean
    /// text a canonical message body would contain.
    #[test]
    fn parsing_is_idempotent_on_clean_content() {
        let content = format!("hi <@{USER_A}> @everyone");
        let first = parse(&content);
        let second = parse(&content);
        assert_eq!(first, second);
    }
}
