//! Shell-style glob patterns compiled to anchored regexes.
//!
//! Semantics follow `fnmatch`: `*` crosses `/`, `?` is one character,
//! `[seq]`/`[!seq]` are classes, and an unterminated `[` is a literal.

use regex::Regex;

pub fn compile_glob(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&translate(pattern))
}

pub fn glob_matches(pattern: &str, candidate: &str) -> Result<bool, regex::Error> {
    compile_glob(pattern).map(|re| re.is_match(candidate))
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                // Runs of stars are equivalent to one.
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i..end]));
                    i = end + 1;
                }
                None => out.push_str(r"\["),
            },
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }

    out.push('$');
    out
}

/// Index of the `]` closing a class that opened just before `start`.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if j < chars.len() && chars[j] == '!' {
        j += 1;
    }
    // A `]` right after `[` or `[!` is a member, not the terminator.
    if j < chars.len() && chars[j] == ']' {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    (j < chars.len()).then_some(j)
}

fn translate_class(members: &[char]) -> String {
    let (negated, members) = match members.split_first() {
        Some((&'!', rest)) => (true, rest),
        _ => (false, members),
    };

    let mut class = String::from("[");
    if negated {
        class.push('^');
    }
    let last = members.len().saturating_sub(1);
    for (index, member) in members.iter().enumerate() {
        if *member == '-' && index != 0 && index != last {
            class.push('-');
        } else {
            class.push_str(&regex::escape(member.encode_utf8(&mut [0u8; 4])));
        }
    }
    class.push(']');
    class
}
