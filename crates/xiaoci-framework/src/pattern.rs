//! Registration-time pattern classification.
//!
//! A registration string is classified exactly once, when the handler is
//! registered:
//!
//! ```text
//! no pattern                         → Global
//! list of literals                   → Command(names)
//! string without regex metachars     → Command([string])
//! string with metachars, compiles    → Regex(compiled)
//! string with metachars, invalid     → Command([string])   (verbatim literal)
//! ```

use std::fmt;

use regex::Regex;
use tracing::debug;

/// Characters whose presence makes a registration string a regex candidate.
pub const REGEX_METACHARS: &[char] = &[
    '^', '$', '.', '*', '+', '?', '[', ']', '(', ')', '{', '}', '|', '\\',
];

/// What a handler author passes to `on_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// No pattern: listen to everything.
    Any,
    /// A single string, classified as command or regex.
    Literal(String),
    /// Several command literals.
    Literals(Vec<String>),
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::Literal(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Pattern::Literal(s)
    }
}

impl From<Vec<String>> for Pattern {
    fn from(v: Vec<String>) -> Self {
        Pattern::Literals(v)
    }
}

impl From<Vec<&str>> for Pattern {
    fn from(v: Vec<&str>) -> Self {
        Pattern::Literals(v.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Pattern {
    fn from(v: &[&str]) -> Self {
        Pattern::Literals(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Pattern {
    fn from(v: [&str; N]) -> Self {
        Pattern::Literals(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<T: Into<Pattern>> From<Option<T>> for Pattern {
    fn from(v: Option<T>) -> Self {
        v.map_or(Pattern::Any, Into::into)
    }
}

/// A regex compiled at registration time, matched against the whole text.
#[derive(Clone)]
pub struct CompiledPattern {
    source: String,
    anchored: Regex,
}

impl CompiledPattern {
    /// Compiles `source` for full-string matching.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        // Validate the pattern on its own first: wrapping an unbalanced
        // pattern in a group can make it compile.
        Regex::new(source)?;
        // A trailing `#` comment in verbose mode runs to end of line and
        // would swallow the closing anchor.
        let anchored = Regex::new(&format!("^(?:{source})$"))
            .or_else(|_| Regex::new(&format!("^(?:{source}\n)$")))?;
        Ok(Self {
            source: source.to_string(),
            anchored,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the captures if `text` matches the pattern in full.
    pub fn full_match<'t>(&self, text: &'t str) -> Option<regex::Captures<'t>> {
        self.anchored.captures(text)
    }

    pub(crate) fn anchored(&self) -> &Regex {
        &self.anchored
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledPattern").field(&self.source).finish()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// The classified form of a registration.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    /// Fires when no command or regex matched.
    Global,
    /// Exact, case-sensitive text matches.
    Command(Vec<String>),
    /// Full-string regex match.
    Regex(CompiledPattern),
}

impl Registration {
    /// Short name of the tier, for logs.
    pub fn tier(&self) -> &'static str {
        match self {
            Registration::Global => "global",
            Registration::Command(_) => "command",
            Registration::Regex(_) => "regex",
        }
    }
}

/// Returns true if `s` contains any regex metacharacter.
pub fn has_regex_metachars(s: &str) -> bool {
    s.contains(REGEX_METACHARS)
}

/// Classifies a registration pattern.
///
/// Never fails: an uncompilable regex candidate becomes a verbatim command.
pub fn classify(pattern: impl Into<Pattern>) -> Registration {
    match pattern.into() {
        Pattern::Any => Registration::Global,
        Pattern::Literals(names) => Registration::Command(
            names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect(),
        ),
        Pattern::Literal(raw) => {
            let s = raw.trim();
            if s.is_empty() {
                return Registration::Command(Vec::new());
            }
            if !has_regex_metachars(s) {
                return Registration::Command(vec![s.to_string()]);
            }
            match CompiledPattern::new(s) {
                Ok(compiled) => Registration::Regex(compiled),
                Err(e) => {
                    debug!(pattern = %s, error = %e, "Pattern does not compile, registering as literal command");
                    Registration::Command(vec![s.to_string()])
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_pattern_is_global() {
        assert_eq!(classify(Pattern::Any), Registration::Global);
        assert_eq!(classify(None::<&str>), Registration::Global);
    }

    #[test]
    fn test_plain_literal_is_command() {
        assert_eq!(
            classify("测试"),
            Registration::Command(vec!["测试".to_string()])
        );
        assert_eq!(
            classify("  你好 "),
            Registration::Command(vec!["你好".to_string()])
        );
    }

    #[test]
    fn test_literal_list_is_command() {
        let reg = classify(["帮助", "help", " ", "菜单"]);
        assert_eq!(
            reg,
            Registration::Command(vec!["帮助".into(), "help".into(), "菜单".into()])
        );
    }

    #[test]
    fn test_list_entries_with_metachars_stay_literal() {
        let reg = classify(vec!["a+b", "c"]);
        assert_eq!(reg, Registration::Command(vec!["a+b".into(), "c".into()]));
    }

    #[test]
    fn test_metachar_pattern_is_regex() {
        let reg = classify(r"发送 ([\s\S]+)");
        match reg {
            Registration::Regex(p) => assert_eq!(p.as_str(), r"发送 ([\s\S]+)"),
            other => panic!("expected regex, got {other:?}"),
        }
    }

    #[test]
    fn test_uncompilable_metachar_pattern_falls_back_to_command() {
        assert_eq!(
            classify("[未闭合"),
            Registration::Command(vec!["[未闭合".to_string()])
        );
        // Balanced only once anchored; must still be rejected.
        assert_eq!(
            classify("a)|(b"),
            Registration::Command(vec!["a)|(b".to_string()])
        );
    }

    #[test]
    fn test_full_match_requires_whole_text() {
        let p = CompiledPattern::new(r"发送 ([\s\S]+)").unwrap();
        let caps = p.full_match("发送 hello").unwrap();
        assert_eq!(&caps[1], "hello");
        assert!(p.full_match("请发送 hello").is_none());

        let alt = CompiledPattern::new("ab|cd").unwrap();
        assert!(alt.full_match("ab").is_some());
        assert!(alt.full_match("abcd").is_none());
        assert!(alt.full_match("xcd").is_none());
    }

    #[test]
    fn test_verbose_pattern_with_trailing_comment() {
        let p = match classify("(?x) 发送 \\s (.+)  # echo") {
            Registration::Regex(p) => p,
            other => panic!("expected regex, got {other:?}"),
        };
        let caps = p.full_match("发送 hi").unwrap();
        assert_eq!(&caps[1], "hi");
        assert!(p.full_match("请发送 hi").is_none());
    }

    #[test]
    fn test_metachar_detection() {
        assert!(has_regex_metachars("a.b"));
        assert!(has_regex_metachars(r"\d"));
        assert!(!has_regex_metachars("帮助"));
        assert!(!has_regex_metachars("/help"));
    }

    #[test]
    fn test_empty_literal_registers_nothing() {
        assert_eq!(classify("   "), Registration::Command(Vec::new()));
    }
}
