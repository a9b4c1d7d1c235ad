use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// English-language Soundex code. Not a reserved field type in `schema`; it's
/// opted into per `text` field the way stemming is, via a `phonetic: true`
/// flag, and appended as an extra token carrying the phonetic code rather
/// than replacing the original term.
pub struct SoundexFilter;

fn soundex_digit(c: char) -> Option<u8> {
    match c.to_ascii_uppercase() {
        'B' | 'F' | 'P' | 'V' => Some(1),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some(2),
        'D' | 'T' => Some(3),
        'L' => Some(4),
        'M' | 'N' => Some(5),
        'R' => Some(6),
        _ => None,
    }
}

/// Four-character Soundex code: first letter, then up to three digits for
/// subsequent consonant groups, zero-padded.
pub fn soundex(word: &str) -> String {
    let chars: Vec<char> = word.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if chars.is_empty() {
        return String::new();
    }

    let mut code = String::new();
    code.push(chars[0].to_ascii_uppercase());

    let mut last = soundex_digit(chars[0]);
    for &c in &chars[1..] {
        let digit = soundex_digit(c);
        if let Some(d) = digit {
            if last != Some(d) {
                code.push((b'0' + d) as char);
            }
        }
        if !matches!(c.to_ascii_uppercase(), 'H' | 'W') {
            last = digit;
        }
        if code.len() == 4 {
            break;
        }
    }

    while code.len() < 4 {
        code.push('0');
    }
    code
}

impl TokenFilter for SoundexFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len() * 2);
        for token in tokens {
            let code = soundex(&token.text);
            let position = token.position;
            let offset = token.offset;
            let token_type = token.token_type;
            out.push(token);
            if !code.is_empty() {
                let length = code.len();
                out.push(Token {
                    text: code,
                    position,
                    offset,
                    length,
                    token_type,
                });
            }
        }
        out
    }

    fn name(&self) -> &str {
        "soundex"
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(SoundexFilter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_examples() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Ashcraft"), "A261");
        assert_eq!(soundex("Tymczak"), "T522");
    }

    #[test]
    fn empty_input_yields_empty_code() {
        assert_eq!(soundex(""), "");
        assert_eq!(soundex("123"), "");
    }
}
