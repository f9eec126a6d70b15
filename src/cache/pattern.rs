//! Glob-style key patterns with Redis `SCAN MATCH` semantics.
//!
//! Supports `*`, `?`, `[abc]`, `[^a]` / `[!a]`, ranges, and `\` escapes.

use regex::Regex;

/// Compiled key pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    source: String,
    regex: Regex,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&glob_to_regex(pattern))?,
        })
    }

    pub fn is_match(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 12);
    // Wildcards match any character, newlines included.
    out.push_str("(?s)^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(r"\\"),
            },
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                if matches!(chars.peek(), Some('^') | Some('!')) {
                    chars.next();
                    class.push('^');
                }
                while let Some(inner) = chars.next() {
                    match inner {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                class.push('\\');
                                class.push(escaped);
                            }
                        }
                        '[' | '&' | '~' => {
                            class.push('\\');
                            class.push(inner);
                        }
                        _ => class.push(inner),
                    }
                }
                if closed && !class.is_empty() && class != "^" {
                    out.push('[');
                    out.push_str(&class);
                    out.push(']');
                } else {
                    // Unterminated or empty class matches literally.
                    out.push_str(&regex::escape("["));
                    out.push_str(&regex::escape(class.trim_start_matches('^')));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, key: &str) -> bool {
        KeyPattern::new(pattern).unwrap().is_match(key)
    }

    #[test]
    fn test_star_matches_any_suffix() {
        assert!(matches("posts:list:*", "posts:list:page=1"));
        assert!(matches("posts:list:*", "posts:list:"));
        assert!(!matches("posts:list:*", "posts:user:1"));
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        assert!(matches("user:?", "user:1"));
        assert!(!matches("user:?", "user:12"));
    }

    #[test]
    fn test_character_classes() {
        assert!(matches("k[ab]", "ka"));
        assert!(!matches("k[ab]", "kc"));
        assert!(matches("k[^ab]", "kc"));
        assert!(matches("k[0-9]", "k5"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches("a.b+(c)", "a.b+(c)"));
        assert!(!matches("a.b", "axb"));
    }

    #[test]
    fn test_escaped_wildcard() {
        assert!(matches(r"literal\*", "literal*"));
        assert!(!matches(r"literal\*", "literally"));
    }

    #[test]
    fn test_wildcards_match_newlines() {
        assert!(matches("a*", "a\nb"));
        assert!(matches("a?b", "a\nb"));
        assert!(!matches("a?b", "a\n\nb"));
    }

    #[test]
    fn test_unterminated_class_is_literal() {
        assert!(matches("odd[", "odd["));
    }
}
