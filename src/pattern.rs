//! Glob matching for the `like` operator.
//!
//! A pattern is a sequence of literal chunks, each optionally preceded by a
//! wildcard. `*` matches any run of characters (including none) and `\*` is a
//! literal star. The usual string escapes (`\n`, `\r`, `\t`, `\0`, `\\`,
//! `\'`, `\"` and `\u{..}`) are decoded while parsing.

use std::str::Chars;

/// One literal chunk, optionally preceded by a wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Component {
    wildcard: bool,
    chunk: String,
}

/// A precompiled `like` pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    components: Vec<Component>,
}

impl Pattern {
    /// Compile pattern source text as written between the quotes.
    ///
    /// Never fails: an unrecognised escape or a trailing lone backslash is kept literally.
    pub fn parse(source: &str) -> Self {
        let mut components = Vec::new();
        let mut current = Component {
            wildcard: false,
            chunk: String::new(),
        };
        let mut chars = source.chars();

        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    if current.wildcard && current.chunk.is_empty() {
                        continue;
                    }
                    if current.wildcard || !current.chunk.is_empty() {
                        components.push(current);
                    }
                    current = Component {
                        wildcard: true,
                        chunk: String::new(),
                    };
                }
                '\\' => unescape(&mut chars, &mut current.chunk),
                other => current.chunk.push(other),
            }
        }

        if current.wildcard || !current.chunk.is_empty() {
            components.push(current);
        }
        Pattern { components }
    }

    /// True when the whole of `text` matches the pattern.
    pub fn matches(&self, text: &str) -> bool {
        match_components(&self.components, text)
    }
}

/// Decode one escape sequence, the backslash already consumed.
fn unescape(chars: &mut Chars<'_>, out: &mut String) {
    let decoded = match chars.clone().next() {
        Some('*') => Some('*'),
        Some('\\') => Some('\\'),
        Some('n') => Some('\n'),
        Some('r') => Some('\r'),
        Some('t') => Some('\t'),
        Some('0') => Some('\0'),
        Some('\'') => Some('\''),
        Some('"') => Some('"'),
        Some('u') => return unescape_unicode(chars, out),
        _ => None,
    };
    match decoded {
        Some(c) => {
            chars.next();
            out.push(c);
        }
        None => out.push('\\'),
    }
}

/// `\u{1F600}`: one to six hex digits naming a scalar value.
fn unescape_unicode(chars: &mut Chars<'_>, out: &mut String) {
    let rest = chars.as_str();
    let decoded = rest
        .strip_prefix("u{")
        .and_then(|body| body.split_once('}'))
        .filter(|(hex, _)| (1..=6).contains(&hex.len()))
        .and_then(|(hex, tail)| {
            let c = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)?;
            Some((c, tail))
        });

    match decoded {
        Some((c, tail)) => {
            out.push(c);
            *chars = tail.chars();
        }
        None => out.push('\\'),
    }
}

fn match_components(components: &[Component], text: &str) -> bool {
    let Some((first, rest)) = components.split_first() else {
        return text.is_empty();
    };

    if !first.wildcard {
        return text
            .strip_prefix(first.chunk.as_str())
            .is_some_and(|remaining| match_components(rest, remaining));
    }

    // The last chunk only has to line up with the end of the text.
    if rest.is_empty() {
        return text.ends_with(first.chunk.as_str());
    }

    text.char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .any(|offset| {
            text[offset..]
                .strip_prefix(first.chunk.as_str())
                .is_some_and(|remaining| match_components(rest, remaining))
        })
}
