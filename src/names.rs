//! Splitting licensee names into first/last for the export schema.
//!
//! Portals print names either as "Last, First Middle" or "First Middle Last",
//! with honorifics, generational suffixes, quoted nicknames and HTML entities
//! mixed in.

/// Known name suffixes, compared case-insensitively without a trailing period.
const SUFFIXES: &[&str] = &["iv", "iii", "ii", "jr", "sr", "v"];

/// Honorifics dropped from the front of a name.
const TITLES: &[&str] = &["mr", "mrs", "ms", "miss", "dr", "rev"];

/// Particles that belong to the last name ("van der Berg"), in any case.
const PARTICLES: &[&str] = &[
    "da", "de", "del", "della", "der", "di", "du", "la", "le", "van", "von",
];

/// Parsed, cleaned name components.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameParts {
    pub title: Option<String>,
    pub first: String,
    pub middle: Option<String>,
    pub last: String,
    pub suffix: Option<String>,
    /// Nicknames from parentheses or quotes: `William "Bill" Smith` → ["Bill"]
    pub nicknames: Vec<String>,
}

/// Decode HTML entities (`&amp;`, `&#39;`) left in scraped text.
pub(crate) fn decode_html_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    htmlize::unescape(s).to_string()
}

/// Extract parenthesized or quoted nicknames from a name string.
///
/// `"William (Ken) Burchenal"` -> `("William Burchenal", vec!["Ken"])`
fn extract_nicknames(s: &str) -> (String, Vec<String>) {
    let mut nicknames = Vec::new();
    let mut cleaned = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        let close = match ch {
            '(' => Some(')'),
            '"' | '\u{201C}' => Some(if ch == '"' { '"' } else { '\u{201D}' }),
            _ => None,
        };
        match close {
            Some(close) => {
                let mut nick = String::new();
                for inner in chars.by_ref() {
                    if inner == close {
                        break;
                    }
                    nick.push(inner);
                }
                let nick = nick.trim().to_string();
                if !nick.is_empty() {
                    nicknames.push(nick);
                }
                cleaned.push(' ');
            }
            None => cleaned.push(ch),
        }
    }

    (collapse_whitespace(&cleaned), nicknames)
}

fn normalized_token(token: &str) -> String {
    token.trim_end_matches('.').to_lowercase()
}

fn is_suffix(token: &str) -> bool {
    SUFFIXES.contains(&normalized_token(token).as_str())
}

fn is_title(token: &str) -> bool {
    TITLES.contains(&normalized_token(token).as_str())
}

fn is_particle(token: &str) -> bool {
    PARTICLES.contains(&normalized_token(token).as_str())
}

/// Split a trailing suffix off a token list.
fn take_suffix(tokens: &mut Vec<&str>) -> Option<String> {
    // A lone "V" is more likely an initial than "the fifth"
    if tokens.len() < 2 {
        return None;
    }
    let last = *tokens.last()?;
    if is_suffix(last) {
        tokens.pop();
        return Some(last.trim_end_matches(',').to_string());
    }
    None
}

/// Collapse runs of whitespace into single spaces and trim.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assign given-name tokens ("First Middle...") to first and middle.
fn split_given(tokens: &[&str]) -> (String, Option<String>) {
    match tokens {
        [] => (String::new(), None),
        [first] => (first.to_string(), None),
        [first, rest @ ..] => (first.to_string(), Some(rest.join(" "))),
    }
}

/// Parse a full name as printed by a licensing portal.
///
/// Returns `None` when nothing name-like is left after cleaning.
///
/// # Examples
///
/// ```
/// use licscrape::names::parse_full_name;
///
/// let parts = parse_full_name("O&#39;BRIEN, JOHN A JR").unwrap();
/// assert_eq!(parts.first, "JOHN");
/// assert_eq!(parts.last, "O'BRIEN");
/// assert_eq!(parts.suffix.as_deref(), Some("JR"));
///
/// let parts = parse_full_name("Mary Ellen van der Berg").unwrap();
/// assert_eq!(parts.first, "Mary");
/// assert_eq!(parts.last, "van der Berg");
/// ```
pub fn parse_full_name(raw: &str) -> Option<NameParts> {
    let decoded = decode_html_entities(raw);
    let (cleaned, nicknames) = extract_nicknames(&decoded);
    if cleaned.is_empty() {
        return None;
    }

    let mut parts = NameParts {
        nicknames,
        ..NameParts::default()
    };

    // "Last, First" unless the text after the first comma is only a suffix
    // ("John Smith, Jr.").
    let comma_split = cleaned.split_once(',').and_then(|(before, after)| {
        let after = after.trim();
        let after_tokens: Vec<&str> = after.split([',', ' ']).filter(|t| !t.is_empty()).collect();
        if after_tokens.is_empty() || after_tokens.iter().all(|t| is_suffix(t)) {
            None
        } else {
            Some((before.trim().to_string(), after.to_string()))
        }
    });

    match comma_split {
        Some((last, given)) => {
            let mut given_tokens: Vec<&str> = given
                .split([',', ' '])
                .filter(|t| !t.is_empty())
                .collect();
            if given_tokens.first().is_some_and(|t| is_title(t)) {
                parts.title = Some(given_tokens.remove(0).to_string());
            }
            parts.suffix = take_suffix(&mut given_tokens);

            let mut last_tokens: Vec<&str> = last.split_whitespace().collect();
            if parts.suffix.is_none() {
                parts.suffix = take_suffix(&mut last_tokens);
            }

            let (first, middle) = split_given(&given_tokens);
            parts.first = first;
            parts.middle = middle;
            parts.last = last_tokens.join(" ");
        }
        None => {
            let mut tokens: Vec<&str> = cleaned
                .split([',', ' '])
                .filter(|t| !t.is_empty())
                .collect();
            if tokens.len() > 1 && is_title(tokens[0]) {
                parts.title = Some(tokens.remove(0).to_string());
            }
            parts.suffix = take_suffix(&mut tokens);

            match tokens.len() {
                0 => return None,
                1 => parts.first = tokens[0].to_string(),
                _ => {
                    // Last name starts at the earliest particle after the
                    // first token, or is the final token.
                    let start = (1..tokens.len() - 1)
                        .find(|&i| is_particle(tokens[i]))
                        .unwrap_or(tokens.len() - 1);
                    let (first, middle) = split_given(&tokens[..start]);
                    parts.first = first;
                    parts.middle = middle;
                    parts.last = tokens[start..].join(" ");
                }
            }
        }
    }

    if parts.first.is_empty() && parts.last.is_empty() {
        return None;
    }
    Some(parts)
}

/// First and last name of `raw`, empty strings when it cannot be parsed.
pub fn first_last(raw: &str) -> (String, String) {
    parse_full_name(raw)
        .map(|p| (p.first, p.last))
        .unwrap_or_default()
}
