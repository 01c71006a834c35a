//! Request pattern matching.
//!
//! Intercept rules and chain-level patterns are written in one of two syntaxes: ant-style
//! (`/secure/**`) or raw regex. Both compile down to an anchored [`regex::Regex`] so that
//! matching a request path is a single automaton pass. Matching is case-insensitive
//! unless the chain configuration says otherwise.

use http::Method;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::CompileError;

/// Pattern syntax used by a chain's intercept rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSyntax {
    #[default]
    Ant,
    Regex,
}

/// The universal catch-all pattern for a syntax. Conventionally the last declared rule,
/// and the default chain-level pattern.
pub fn universal_pattern(syntax: PathSyntax) -> &'static str {
    match syntax {
        PathSyntax::Ant => "/**",
        PathSyntax::Regex => ".*",
    }
}

/// A compiled request-path matcher.
///
/// Compiled once at chain-compilation time; malformed patterns are a build-time
/// rejection, never a per-request failure.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: String,
    syntax: PathSyntax,
    regex: Regex,
}

impl PathMatcher {
    pub fn compile(
        pattern: &str,
        syntax: PathSyntax,
        case_sensitive: bool,
    ) -> Result<Self, CompileError> {
        let raw = match syntax {
            PathSyntax::Ant => ant_to_regex(pattern),
            // Full-string match semantics; callers may still anchor explicitly.
            PathSyntax::Regex => format!("^(?:{})$", pattern),
        };
        let regex = RegexBuilder::new(&raw)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| {
                CompileError::validation("pattern", format!("malformed pattern '{}': {}", pattern, e))
            })?;
        Ok(PathMatcher {
            pattern: pattern.to_string(),
            syntax,
            regex,
        })
    }

    /// The universal matcher for a syntax. Universal patterns are statically known to
    /// compile.
    pub fn universal(syntax: PathSyntax, case_sensitive: bool) -> Self {
        Self::compile(universal_pattern(syntax), syntax, case_sensitive)
            .expect("universal pattern failed to compile")
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The source pattern, as declared.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn syntax(&self) -> PathSyntax {
        self.syntax
    }

    /// Whether two matchers were declared with the identical pattern key. Used by the
    /// access rule index to decide full-shadow replacement.
    pub fn same_key(&self, other: &PathMatcher) -> bool {
        self.pattern == other.pattern && self.syntax == other.syntax
    }
}

/// Method filter check: an absent rule method matches any request method.
pub fn method_matches(rule_method: Option<&Method>, request_method: &Method) -> bool {
    rule_method.map_or(true, |m| m == request_method)
}

/// Parse a configured method name. Comparison is case-insensitive.
///
/// Only the standard methods are accepted; arbitrary extension tokens are a
/// configuration typo until proven otherwise.
pub fn parse_method(name: &str) -> Result<Method, CompileError> {
    match name.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        "HEAD" => Ok(Method::HEAD),
        "OPTIONS" => Ok(Method::OPTIONS),
        "PATCH" => Ok(Method::PATCH),
        "TRACE" => Ok(Method::TRACE),
        "CONNECT" => Ok(Method::CONNECT),
        _ => Err(CompileError::validation(
            "method",
            format!("unknown HTTP method '{}'", name),
        )),
    }
}

/// Translate an ant-style pattern into an anchored regex.
///
/// `*` matches within one path segment, `**` crosses segment boundaries, `?` matches a
/// single non-slash character. All other regex metacharacters are escaped.
fn ant_to_regex(pattern: &str) -> String {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    re.push_str(".*");
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                re.push('\\');
                re.push(c);
            }
            c => re.push(c),
        }
    }
    re.push('$');
    re
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ant_single_star_stays_in_segment() {
        let m = PathMatcher::compile("/secure/*", PathSyntax::Ant, false).unwrap();
        assert!(m.matches("/secure/page"));
        assert!(!m.matches("/secure/sub/page"));
    }

    #[test]
    fn ant_double_star_crosses_segments() {
        let m = PathMatcher::compile("/secure/**", PathSyntax::Ant, false).unwrap();
        assert!(m.matches("/secure/page"));
        assert!(m.matches("/secure/sub/page"));
    }

    #[test]
    fn ant_universal_matches_everything() {
        let m = PathMatcher::universal(PathSyntax::Ant, false);
        assert!(m.matches("/"));
        assert!(m.matches("/any/depth/of/path"));
    }

    #[test]
    fn ant_escapes_regex_metacharacters() {
        let m = PathMatcher::compile("/file.txt", PathSyntax::Ant, false).unwrap();
        assert!(m.matches("/file.txt"));
        assert!(!m.matches("/fileatxt"));
    }

    #[test]
    fn case_insensitive_by_default() {
        let m = PathMatcher::compile("/Secure*", PathSyntax::Ant, false).unwrap();
        assert!(m.matches("/secure"));
        assert!(m.matches("/SECURE"));
    }

    #[test]
    fn case_sensitive_when_configured() {
        let m = PathMatcher::compile("/Secure*", PathSyntax::Ant, true).unwrap();
        assert!(m.matches("/Secure"));
        assert!(!m.matches("/secure"));
    }

    #[test]
    fn regex_syntax_is_full_match() {
        let m = PathMatcher::compile(r"/[a-z]+", PathSyntax::Regex, true).unwrap();
        assert!(m.matches("/lowercase"));
        assert!(!m.matches("/lowercase/more"));
    }

    #[test]
    fn malformed_regex_is_rejected_at_compile_time() {
        let err = PathMatcher::compile(r"/([unclosed", PathSyntax::Regex, false).unwrap_err();
        assert!(matches!(err, CompileError::Validation { .. }));
    }

    #[test]
    fn method_filter_absent_matches_any() {
        assert!(method_matches(None, &Method::POST));
        assert!(method_matches(Some(&Method::POST), &Method::POST));
        assert!(!method_matches(Some(&Method::POST), &Method::GET));
    }

    #[test]
    fn method_names_parse_case_insensitively() {
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert_eq!(parse_method("DELETE").unwrap(), Method::DELETE);
        assert!(parse_method("NOTAMETHOD").is_err());
        // A valid token is still rejected when it is not a standard method.
        assert!(parse_method("DELTE").is_err());
    }
}
