// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Webhook execute templates: deterministic pure projections from
//! `(template_id, raw_json)` to the `content` a message is created with.
//! Absent fields degrade to empty strings rather than the literal
//! `"undefined"`.

use serde_json::Value;

/// The supported `template_id` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    GithubPush,
    GithubPr,
    GithubIssues,
    GitlabPush,
    GitlabMr,
    JiraIssue,
    SentryError,
}

impl Template {
    pub fn from_id(id: &str) -> Option<Self> {
        Some(match id {
            "github-push" => Template::GithubPush,
            "github-pr" => Template::GithubPr,
            "github-issues" => Template::GithubIssues,
            "gitlab-push" => Template::GitlabPush,
            "gitlab-mr" => Template::GitlabMr,
            "jira-issue" => Template::JiraIssue,
            "sentry-error" => Template::SentryError,
            _ => return None,
        })
    }
}

fn get_str<'a>(value: &'a Value, path: &[&str]) -> &'a str {
    let mut current = value;
    for segment in path {
        current = match current.get(segment) {
            Some(next) => next,
            None => return "",
        };
    }
    current.as_str().unwrap_or("")
}

fn get_array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value.get(key).and_then(Value::as_array).map_or(&[], |v| v.as_slice())
}

/// Projects the raw payload received by a webhook execute request into
/// the `content` a message is created with, per `template_id`.
pub fn render(template: Template, raw: &Value) -> String {
    match template {
        Template::GithubPush => {
            let pusher = get_str(raw, &["pusher", "name"]);
            let repo = get_str(raw, &["repository", "full_name"]);
            let count = get_array(raw, "commits").len();
            format!("{pusher} pushed {count} commit(s) to {repo}")
        }
        Template::GithubPr => {
            let action = get_str(raw, &["action"]);
            let title = get_str(raw, &["pull_request", "title"]);
            let number = get_str(raw, &["number"]);
            let repo = get_str(raw, &["repository", "full_name"]);
            format!("[{repo}] Pull request #{number} {action}: {title}")
        }
        Template::GithubIssues => {
            let action = get_str(raw, &["action"]);
            let title = get_str(raw, &["issue", "title"]);
            let number = get_str(raw, &["issue", "number"]);
            let repo = get_str(raw, &["repository", "full_name"]);
            format!("[{repo}] Issue #{number} {action}: {title}")
        }
        Template::GitlabPush => {
            let user = get_str(raw, &["user_name"]);
            let project = get_str(raw, &["project", "name"]);
            let count = get_array(raw, "commits").len();
            format!("{user} pushed {count} commit(s) to {project}")
        }
        Template::GitlabMr => {
            let title = get_str(raw, &["object_attributes", "title"]);
            let action = get_str(raw, &["object_attributes", "action"]);
            let project = get_str(raw, &["project", "name"]);
            format!("[{project}] Merge request {action}: {title}")
        }
        Template::JiraIssue => {
            let key = get_str(raw, &["issue", "key"]);
            let summary = get_str(raw, &["issue", "fields", "summary"]);
            let event = get_str(raw, &["webhookEvent"]);
            format!("[{key}] {summary} ({event})")
        }
        Template::SentryError => {
            let title = get_str(raw, &["event", "title"]);
            let culprit = get_str(raw, &["event", "culprit"]);
            let level = get_str(raw, &["event", "level"]);
            format!("[{level}] {title} in {culprit}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn github_push_renders_pusher_and_count() {
        let raw = json!({
            "pusher": {"name": "octocat"},
            "repository": {"full_name": "octo/repo"},
            "commits": [{}, {}],
        });
        let content = render(Template::GithubPush, &raw);
        assert_eq!(content, "octocat pushed 2 commit(s) to octo/repo");
    }

    #[test]
    fn missing_fields_render_as_empty_strings_not_undefined() {
        let content = render(Template::JiraIssue, &json!({}));
        assert!(!content.contains("undefined"));
        assert_eq!(content, "[] ()");
    }

    #[test]
    fn unknown_template_id_is_none() {
        assert!(Template::from_id("unknown").is_none());
    }
}
