//! Low-level token parsers for PDF syntax.

use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

/// Returns true for the six PDF whitespace characters.
pub fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

/// Returns true for PDF delimiter characters.
pub fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Returns true for regular characters (anything else).
pub fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

fn err(input: &[u8], kind: ErrorKind) -> Err<Error<&[u8]>> {
    Err::Error(Error::new(input, kind))
}

/// Skips whitespace and comments. Always succeeds.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut rest = input;
    loop {
        while let Some(&b) = rest.first() {
            if is_whitespace(b) {
                rest = &rest[1..];
            } else {
                break;
            }
        }
        if rest.first() == Some(&b'%') {
            // comment runs to end of line
            while let Some(&b) = rest.first() {
                if b == b'\n' || b == b'\r' {
                    break;
                }
                rest = &rest[1..];
            }
        } else {
            break;
        }
    }
    Ok((rest, ()))
}

/// Matches a keyword that must not be followed by a regular character.
pub fn keyword<'a>(word: &'static str) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], ()> {
    move |input: &'a [u8]| {
        let w = word.as_bytes();
        if input.len() < w.len() || &input[..w.len()] != w {
            return Err(err(input, ErrorKind::Tag));
        }
        let rest = &input[w.len()..];
        if rest.first().is_some_and(|&b| is_regular(b)) {
            return Err(err(input, ErrorKind::Tag));
        }
        Ok((rest, ()))
    }
}

/// Recognizes a numeric token: `[+-]? digits [. digits]` or `[+-]? . digits`.
pub fn number_token(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let mut i = 0;
    if matches!(input.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < input.len() && input[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;
    let mut frac_digits = 0;
    if input.get(i) == Some(&b'.') {
        i += 1;
        while i < input.len() && input[i].is_ascii_digit() {
            i += 1;
            frac_digits += 1;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return Err(err(input, ErrorKind::Digit));
    }
    Ok((&input[i..], &input[..i]))
}

/// Parses an unsigned decimal integer.
pub fn parse_uint(input: &[u8]) -> IResult<&[u8], u64> {
    let mut i = 0;
    while i < input.len() && input[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 {
        return Err(err(input, ErrorKind::Digit));
    }
    let text = std::str::from_utf8(&input[..i]).expect("digits are ASCII");
    match text.parse::<u64>() {
        Ok(n) => Ok((&input[i..], n)),
        Err(_) => Err(err(input, ErrorKind::TooLarge)),
    }
}

/// Parses a name token starting with `/`, decoding `#xx` escapes.
pub fn parse_name(input: &[u8]) -> IResult<&[u8], String> {
    if input.first() != Some(&b'/') {
        return Err(err(input, ErrorKind::Char));
    }
    let mut rest = &input[1..];
    let mut name = String::new();
    while let Some(&b) = rest.first() {
        if !is_regular(b) {
            break;
        }
        if b == b'#' && rest.len() >= 3 {
            let hi = (rest[1] as char).to_digit(16);
            let lo = (rest[2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                name.push(((hi * 16 + lo) as u8) as char);
                rest = &rest[3..];
                continue;
            }
        }
        name.push(b as char);
        rest = &rest[1..];
    }
    Ok((rest, name))
}

/// Parses a literal string `( ... )` with escapes and balanced parentheses.
pub fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    if input.first() != Some(&b'(') {
        return Err(err(input, ErrorKind::Char));
    }
    let mut rest = &input[1..];
    let mut depth = 1usize;
    let mut out = Vec::new();
    while let Some(&b) = rest.first() {
        rest = &rest[1..];
        match b {
            b'\\' => {
                let Some(&esc) = rest.first() else {
                    return Err(err(input, ErrorKind::Eof));
                };
                rest = &rest[1..];
                match esc {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'(' => out.push(b'('),
                    b')' => out.push(b')'),
                    b'\\' => out.push(b'\\'),
                    b'\r' => {
                        // line continuation, swallow an optional \n
                        if rest.first() == Some(&b'\n') {
                            rest = &rest[1..];
                        }
                    }
                    b'\n' => {}
                    b'0'..=b'7' => {
                        let mut value = (esc - b'0') as u32;
                        for _ in 0..2 {
                            match rest.first() {
                                Some(&d @ b'0'..=b'7') => {
                                    value = value * 8 + (d - b'0') as u32;
                                    rest = &rest[1..];
                                }
                                _ => break,
                            }
                        }
                        out.push(value as u8);
                    }
                    other => out.push(other),
                }
            }
            b'(' => {
                depth += 1;
                out.push(b'(');
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((rest, out));
                }
                out.push(b')');
            }
            other => out.push(other),
        }
    }
    Err(err(input, ErrorKind::Eof))
}

/// Parses a hexadecimal string `< ... >`, ignoring interior whitespace.
/// An odd number of digits is completed with a trailing zero.
pub fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    if input.first() != Some(&b'<') || input.get(1) == Some(&b'<') {
        return Err(err(input, ErrorKind::Char));
    }
    let mut rest = &input[1..];
    let mut digits = Vec::new();
    loop {
        match rest.first() {
            Some(&b'>') => {
                rest = &rest[1..];
                break;
            }
            Some(&b) if is_whitespace(b) => rest = &rest[1..],
            Some(&b) if b.is_ascii_hexdigit() => {
                digits.push(b);
                rest = &rest[1..];
            }
            Some(_) => return Err(err(rest, ErrorKind::HexDigit)),
            None => return Err(err(input, ErrorKind::Eof)),
        }
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    let out = digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16).expect("checked hex digit");
            let lo = (pair[1] as char).to_digit(16).expect("checked hex digit");
            (hi * 16 + lo) as u8
        })
        .collect();
    Ok((rest, out))
}
