//! Glob pattern compiler
//!
//! Compiles a KEYS/SCAN style glob (`*`, `?`, `[a-z]`, `[^x]`, `\` escapes)
//! once, then matches it against many keys byte-wise.

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(u8),
    AnyOne,
    AnyMany,
    Class {
        negated: bool,
        ranges: Vec<(u8, u8)>,
    },
}

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    tokens: Vec<Token>,
}

impl Pattern {
    /// Compile a glob
    ///
    /// Never fails: malformed classes (no closing `]`) match the remaining
    /// characters as a class, as the server does.
    pub fn compile(glob: &[u8]) -> Self {
        let mut tokens = Vec::with_capacity(glob.len());
        let mut i = 0;

        while i < glob.len() {
            match glob[i] {
                b'*' => {
                    // Collapse runs of '*'
                    if tokens.last() != Some(&Token::AnyMany) {
                        tokens.push(Token::AnyMany);
                    }
                    i += 1;
                }
                b'?' => {
                    tokens.push(Token::AnyOne);
                    i += 1;
                }
                b'[' => {
                    i += 1;
                    let negated = i < glob.len() && glob[i] == b'^';
                    if negated {
                        i += 1;
                    }
                    let mut ranges = Vec::new();
                    while i < glob.len() && glob[i] != b']' {
                        let mut lo = glob[i];
                        if lo == b'\\' && i + 1 < glob.len() {
                            i += 1;
                            lo = glob[i];
                        }
                        if i + 2 < glob.len() && glob[i + 1] == b'-' && glob[i + 2] != b']' {
                            let hi = glob[i + 2];
                            ranges.push(if lo <= hi { (lo, hi) } else { (hi, lo) });
                            i += 3;
                        } else {
                            ranges.push((lo, lo));
                            i += 1;
                        }
                    }
                    // skip the closing ']'
                    i += 1;
                    tokens.push(Token::Class { negated, ranges });
                }
                b'\\' if i + 1 < glob.len() => {
                    tokens.push(Token::Literal(glob[i + 1]));
                    i += 2;
                }
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }

        Pattern { tokens }
    }

    /// Whether the pattern is a bare `*`
    pub fn matches_everything(&self) -> bool {
        self.tokens == [Token::AnyMany]
    }

    /// Match a whole key against the pattern
    pub fn matches(&self, text: &[u8]) -> bool {
        let tokens = &self.tokens;
        let mut ti = 0;
        let mut si = 0;

        // backtracking state for the most recent '*'
        let mut star: Option<usize> = None;
        let mut star_si = 0;

        while si < text.len() {
            if ti < tokens.len() {
                match &tokens[ti] {
                    Token::AnyMany => {
                        star = Some(ti);
                        star_si = si;
                        ti += 1;
                        continue;
                    }
                    Token::AnyOne => {
                        ti += 1;
                        si += 1;
                        continue;
                    }
                    Token::Literal(c) if *c == text[si] => {
                        ti += 1;
                        si += 1;
                        continue;
                    }
                    Token::Class { negated, ranges } => {
                        let c = text[si];
                        let inside = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
                        if inside != *negated {
                            ti += 1;
                            si += 1;
                            continue;
                        }
                    }
                    Token::Literal(_) => {}
                }
            }

            // mismatch, retry from the last '*' consuming one more byte
            match star {
                Some(sp) => {
                    ti = sp + 1;
                    star_si += 1;
                    si = star_si;
                }
                None => return false,
            }
        }

        tokens[ti..].iter().all(|t| *t == Token::AnyMany)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(glob: &str, text: &str) -> bool {
        Pattern::compile(glob.as_bytes()).matches(text.as_bytes())
    }

    #[test]
    fn test_star() {
        assert!(m("*", ""));
        assert!(m("*", "anything"));
        assert!(m("user:*", "user:1"));
        assert!(!m("user:*", "session:1"));
        assert!(m("*:cache", "data:cache"));
        assert!(m("*admin*", "user_admin_role"));
        assert!(m("a*b*c", "aXXbYYc"));
        assert!(!m("a*b*c", "aXXbYY"));
        assert!(Pattern::compile(b"**").matches_everything());
    }

    #[test]
    fn test_question_mark() {
        assert!(m("h?llo", "hello"));
        assert!(m("h?llo", "hallo"));
        assert!(!m("h?llo", "hllo"));
    }

    #[test]
    fn test_classes() {
        assert!(m("h[ae]llo", "hello"));
        assert!(!m("h[ae]llo", "hillo"));
        assert!(m("h[^e]llo", "hallo"));
        assert!(!m("h[^e]llo", "hello"));
        assert!(m("h[a-b]llo", "hbllo"));
        assert!(!m("h[a-b]llo", "hcllo"));
        assert!(m("x[z-a]", "xm"));
    }

    #[test]
    fn test_escapes() {
        assert!(m("h\\*llo", "h*llo"));
        assert!(!m("h\\*llo", "hello"));
        assert!(m("[\\]]", "]"));
    }

    #[test]
    fn test_exact_and_binary() {
        assert!(m("exact_key", "exact_key"));
        assert!(!m("exact_key", "other_key"));
        assert!(Pattern::compile(b"\xff*").matches(b"\xff\x00"));
    }
}
