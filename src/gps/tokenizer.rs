// src/gps/tokenizer.rs
//! Splitting raw receiver lines into comma separated fields

const TRAILING_WHITESPACE: &[char] = &[' ', '\t', '\x0c', '\x0b', '\n', '\r'];

/// Strip trailing whitespace and line terminators
pub fn trim_trailing(line: &str) -> &str {
    line.trim_end_matches(TRAILING_WHITESPACE)
}

/// Split a sentence into its fields.
///
/// Every comma delimited span becomes a token. The last field may carry a
/// `*XX` checksum: when `*` opens the field the token is empty, otherwise
/// the token stops one character before the `*`, so `1.5*5A` yields `1.`.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut start = 0;

    for (i, c) in line.char_indices() {
        if c == ',' {
            tokens.push(line[start..i].to_string());
            start = i + 1;
        }
    }

    let last = &line[start..];
    let last = match last.find('*') {
        Some(0) => "",
        Some(star) => {
            // step back one whole character, not one byte
            let end = last[..star]
                .char_indices()
                .next_back()
                .map_or(0, |(idx, _)| idx);
            &last[..end]
        }
        None => last,
    };
    tokens.push(last.to_string());

    tokens
}
