use crate::error::{MvxError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One configured rewrite rule. `from` is either a literal URL prefix or,
/// when `regex` is set, a pattern whose capture groups may be referenced in
/// `to` as `$1`, `$2`, ….
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteRuleConfig {
    pub from: String,
    pub to: String,
    pub regex: bool,
}

#[derive(Debug)]
enum Rule {
    Prefix { from: String, to: String },
    Pattern { pattern: Regex, to: String },
}

/// Pure rewriter over user-configured rules. Literal-prefix rules take
/// precedence over regex rules; within each class the first configured match
/// wins.
#[derive(Debug)]
pub struct UrlRewriter {
    prefixes: Vec<Rule>,
    patterns: Vec<Rule>,
}

impl UrlRewriter {
    pub fn new(rules: &[RewriteRuleConfig]) -> Result<Self> {
        let mut prefixes = Vec::new();
        let mut patterns = Vec::new();

        for rule in rules {
            if rule.from.is_empty() {
                return Err(MvxError::Config(
                    "url replacement rule with empty `from`".to_string(),
                ));
            }
            if rule.regex {
                let pattern = Regex::new(&rule.from).map_err(|e| {
                    MvxError::Config(format!("invalid url replacement pattern {}: {}", rule.from, e))
                })?;
                patterns.push(Rule::Pattern {
                    pattern,
                    to: rule.to.clone(),
                });
            } else {
                prefixes.push(Rule::Prefix {
                    from: rule.from.clone(),
                    to: rule.to.clone(),
                });
            }
        }

        Ok(Self { prefixes, patterns })
    }

    pub fn empty() -> Self {
        Self {
            prefixes: Vec::new(),
            patterns: Vec::new(),
        }
    }

    pub fn rewrite(&self, url: &str) -> String {
        for rule in &self.prefixes {
            if let Rule::Prefix { from, to } = rule {
                if let Some(rest) = url.strip_prefix(from.as_str()) {
                    return format!("{}{}", to, rest);
                }
            }
        }

        for rule in &self.patterns {
            if let Rule::Pattern { pattern, to } = rule {
                if pattern.is_match(url) {
                    return pattern.replace(url, to.as_str()).into_owned();
                }
            }
        }

        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(from: &str, to: &str, regex: bool) -> RewriteRuleConfig {
        RewriteRuleConfig {
            from: from.to_string(),
            to: to.to_string(),
            regex,
        }
    }

    #[test]
    fn no_rules_is_identity() {
        let rewriter = UrlRewriter::empty();
        assert_eq!(
            rewriter.rewrite("https://example.com/a.tar.gz"),
            "https://example.com/a.tar.gz"
        );
    }

    #[test]
    fn literal_prefix_rewrites() {
        let rewriter = UrlRewriter::new(&[rule(
            "https://archive.apache.org/",
            "https://mirror.internal/apache/",
            false,
        )])
        .unwrap();

        assert_eq!(
            rewriter.rewrite("https://archive.apache.org/dist/maven/x.tar.gz"),
            "https://mirror.internal/apache/dist/maven/x.tar.gz"
        );
    }

    #[test]
    fn literal_wins_over_regex() {
        let rewriter = UrlRewriter::new(&[
            rule("https://(.*)\\.example\\.com/(.*)", "https://proxy/$1/$2", true),
            rule("https://dl.example.com/", "https://literal/", false),
        ])
        .unwrap();

        assert_eq!(
            rewriter.rewrite("https://dl.example.com/file"),
            "https://literal/file"
        );
    }

    #[test]
    fn regex_capture_replacement() {
        let rewriter = UrlRewriter::new(&[rule(
            "https://github.com/([^/]+)/(.*)",
            "https://gh-mirror.internal/$1/$2",
            true,
        )])
        .unwrap();

        assert_eq!(
            rewriter.rewrite("https://github.com/apache/maven-mvnd/releases/x.zip"),
            "https://gh-mirror.internal/apache/maven-mvnd/releases/x.zip"
        );
    }

    #[test]
    fn first_configured_match_wins_within_class() {
        let rewriter = UrlRewriter::new(&[
            rule("https://a/", "https://first/", false),
            rule("https://a/", "https://second/", false),
        ])
        .unwrap();

        assert_eq!(rewriter.rewrite("https://a/x"), "https://first/x");
    }

    #[test]
    fn invalid_regex_is_rejected_at_construction() {
        let err = UrlRewriter::new(&[rule("https://(unclosed", "x", true)]).unwrap_err();
        assert!(matches!(err, MvxError::Config(_)));
    }
}
