//! Parsing of PDF object syntax into [`Object`] values.

use super::lexer::{
    keyword, number_token, parse_hex_string, parse_literal_string, parse_name, parse_uint, skip_ws,
};
use crate::object::{Object, PdfArray, PdfDictionary, PdfName, PdfString};
use crate::types::ObjectId;
use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

/// Parses any direct PDF object (everything except streams, which need
/// cross-reference context for their Length).
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, _) = skip_ws(input)?;
    match input.first() {
        Some(b'/') => {
            let (rest, name) = parse_name(input)?;
            Ok((rest, Object::Name(PdfName::new_unchecked(name))))
        }
        Some(b'(') => {
            let (rest, bytes) = parse_literal_string(input)?;
            Ok((rest, Object::String(PdfString::Literal(bytes))))
        }
        Some(b'<') => {
            if input.get(1) == Some(&b'<') {
                let (rest, dict) = parse_dictionary(input)?;
                Ok((rest, Object::Dictionary(dict)))
            } else {
                let (rest, bytes) = parse_hex_string(input)?;
                Ok((rest, Object::String(PdfString::Hex(bytes))))
            }
        }
        Some(b'[') => {
            let (rest, array) = parse_array(input)?;
            Ok((rest, Object::Array(array)))
        }
        Some(b't') => keyword("true")(input).map(|(rest, _)| (rest, Object::Boolean(true))),
        Some(b'f') => keyword("false")(input).map(|(rest, _)| (rest, Object::Boolean(false))),
        Some(b'n') => keyword("null")(input).map(|(rest, _)| (rest, Object::Null)),
        Some(_) => parse_reference_or_number(input),
        None => Err(Err::Error(Error::new(input, ErrorKind::Eof))),
    }
}

/// Parses `<< ... >>` into a dictionary.
pub fn parse_dictionary(input: &[u8]) -> IResult<&[u8], PdfDictionary> {
    if !input.starts_with(b"<<") {
        return Err(Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    let mut rest = &input[2..];
    let mut dict = PdfDictionary::new();
    loop {
        let (r, _) = skip_ws(rest)?;
        rest = r;
        if rest.starts_with(b">>") {
            return Ok((&rest[2..], dict));
        }
        let (r, key) = parse_name(rest)?;
        let (r, value) = parse_object(r)?;
        dict.set(key, value);
        rest = r;
    }
}

/// Parses `[ ... ]` into an array.
pub fn parse_array(input: &[u8]) -> IResult<&[u8], PdfArray> {
    if input.first() != Some(&b'[') {
        return Err(Err::Error(Error::new(input, ErrorKind::Char)));
    }
    let mut rest = &input[1..];
    let mut array = PdfArray::new();
    loop {
        let (r, _) = skip_ws(rest)?;
        rest = r;
        if rest.first() == Some(&b']') {
            return Ok((&rest[1..], array));
        }
        let (r, value) = parse_object(rest)?;
        array.push(value);
        rest = r;
    }
}

/// Parses either an indirect reference `num gen R` or a plain number.
fn parse_reference_or_number(input: &[u8]) -> IResult<&[u8], Object> {
    if let Ok((rest, id)) = parse_reference(input) {
        return Ok((rest, Object::Reference(id)));
    }
    let (rest, token) = number_token(input)?;
    let text = std::str::from_utf8(token).expect("number tokens are ASCII");
    let object = if text.contains('.') {
        match text.parse::<f64>() {
            Ok(r) => Object::Real(r),
            Err(_) => return Err(Err::Error(Error::new(input, ErrorKind::Float))),
        }
    } else {
        match text.parse::<i64>() {
            Ok(i) => Object::Integer(i),
            Err(_) => return Err(Err::Error(Error::new(input, ErrorKind::Digit))),
        }
    };
    Ok((rest, object))
}

/// Parses an indirect reference `num gen R`.
pub fn parse_reference(input: &[u8]) -> IResult<&[u8], ObjectId> {
    let (rest, number) = parse_uint(input)?;
    let (rest, _) = skip_ws(rest)?;
    let (rest, generation) = parse_uint(rest)?;
    let (rest, _) = skip_ws(rest)?;
    let (rest, _) = keyword("R")(rest)?;
    if number > u32::MAX as u64 || generation > u16::MAX as u64 {
        return Err(Err::Error(Error::new(input, ErrorKind::TooLarge)));
    }
    Ok((
        rest,
        ObjectId::with_generation(number as u32, generation as u16),
    ))
}

/// Parses the `num gen obj` header of an indirect object definition and
/// returns the id together with the body that follows.
pub fn parse_indirect_header(input: &[u8]) -> IResult<&[u8], ObjectId> {
    let (rest, _) = skip_ws(input)?;
    let (rest, number) = parse_uint(rest)?;
    let (rest, _) = skip_ws(rest)?;
    let (rest, generation) = parse_uint(rest)?;
    let (rest, _) = skip_ws(rest)?;
    let (rest, _) = keyword("obj")(rest)?;
    if number > u32::MAX as u64 || generation > u16::MAX as u64 {
        return Err(Err::Error(Error::new(input, ErrorKind::TooLarge)));
    }
    Ok((
        rest,
        ObjectId::with_generation(number as u32, generation as u16),
    ))
}
