use super::error::BencodeError;
use super::value::{Dict, Value};
use bytes::Bytes;
use num_bigint::BigInt;

/// Decodes exactly one bencode value from `data`.
///
/// Lists and dictionaries are assembled on an explicit stack, so nesting depth is
/// limited only by the length of the input.
///
/// # Errors
///
/// Fails when a byte string is shorter than its length prefix, an integer holds a
/// non-digit, a list or dictionary is left open, or bytes remain after the value.
///
/// # Examples
///
/// ```
/// use bitpaito::bencode::{decode, Value};
///
/// let value = decode(b"li1ei2ei3ee").unwrap();
/// assert_eq!(value.as_list().map(|l| l.len()), Some(3));
///
/// assert!(decode(b"i42eextra").is_err());
/// ```
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut tokens = Tokenizer::new(data);
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let token = tokens.next_token()?.ok_or(BencodeError::UnexpectedEof)?;

        let value = match token {
            Token::ListStart => {
                stack.push(Frame::List(Vec::new()));
                continue;
            }
            Token::DictStart => {
                stack.push(Frame::Dict {
                    dict: Dict::new(),
                    key: None,
                });
                continue;
            }
            Token::End => match stack.pop() {
                Some(Frame::List(items)) => Value::List(items),
                Some(Frame::Dict { dict, key: None }) => Value::Dict(dict),
                Some(Frame::Dict { key: Some(_), .. }) => {
                    return Err(BencodeError::MissingDictValue)
                }
                None => return Err(BencodeError::UnexpectedChar('e', tokens.pos - 1)),
            },
            Token::Atom(value) => value,
        };

        match stack.last_mut() {
            None => {
                if tokens.pos != data.len() {
                    return Err(BencodeError::TrailingData);
                }
                return Ok(value);
            }
            Some(Frame::List(items)) => items.push(value),
            Some(Frame::Dict { dict, key }) => match key.take() {
                None => *key = Some(value),
                Some(k) => {
                    dict.insert(k, value);
                }
            },
        }
    }
}

enum Frame {
    List(Vec<Value>),
    Dict { dict: Dict, key: Option<Value> },
}

enum Token {
    Atom(Value),
    ListStart,
    DictStart,
    End,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Start,
    AccumulatingLength { len: usize },
    ReadingStringBody { len: usize },
    AccumulatingInteger { negative: bool, digits_from: usize },
}

struct Tokenizer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns `None` only when the input is exhausted between tokens.
    fn next_token(&mut self) -> Result<Option<Token>, BencodeError> {
        let mut state = State::Start;

        loop {
            state = match state {
                State::Start => {
                    let Some(&c) = self.data.get(self.pos) else {
                        return Ok(None);
                    };

                    match c {
                        b'0'..=b'9' => State::AccumulatingLength { len: 0 },
                        b'i' => {
                            self.pos += 1;
                            State::AccumulatingInteger {
                                negative: false,
                                digits_from: self.pos,
                            }
                        }
                        b'l' => {
                            self.pos += 1;
                            return Ok(Some(Token::ListStart));
                        }
                        b'd' => {
                            self.pos += 1;
                            return Ok(Some(Token::DictStart));
                        }
                        b'e' => {
                            self.pos += 1;
                            return Ok(Some(Token::End));
                        }
                        c => return Err(BencodeError::UnexpectedChar(c as char, self.pos)),
                    }
                }
                State::AccumulatingLength { len } => {
                    let c = self.bump()?;
                    match c {
                        b'0'..=b'9' => {
                            let len = len
                                .checked_mul(10)
                                .and_then(|l| l.checked_add((c - b'0') as usize))
                                .ok_or(BencodeError::InvalidStringLength)?;
                            State::AccumulatingLength { len }
                        }
                        b':' => State::ReadingStringBody { len },
                        c => return Err(BencodeError::UnexpectedChar(c as char, self.pos - 1)),
                    }
                }
                State::ReadingStringBody { len } => {
                    let available = self.data.len() - self.pos;
                    if available < len {
                        return Err(BencodeError::TruncatedString {
                            declared: len,
                            available,
                        });
                    }

                    let bytes = Bytes::copy_from_slice(&self.data[self.pos..self.pos + len]);
                    self.pos += len;
                    return Ok(Some(Token::Atom(Value::Bytes(bytes))));
                }
                State::AccumulatingInteger {
                    negative,
                    digits_from,
                } => {
                    let c = self.bump()?;
                    match c {
                        b'-' if !negative && self.pos - 1 == digits_from => {
                            State::AccumulatingInteger {
                                negative: true,
                                digits_from: self.pos,
                            }
                        }
                        b'0'..=b'9' => State::AccumulatingInteger {
                            negative,
                            digits_from,
                        },
                        b'e' => {
                            let digits = &self.data[digits_from..self.pos - 1];
                            return parse_integer(digits, negative)
                                .map(|i| Some(Token::Atom(Value::Integer(i))));
                        }
                        c => {
                            return Err(BencodeError::InvalidInteger(format!(
                                "unexpected {:?}",
                                c as char
                            )))
                        }
                    }
                }
            };
        }
    }

    fn bump(&mut self) -> Result<u8, BencodeError> {
        let c = *self.data.get(self.pos).ok_or(BencodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(c)
    }
}

fn parse_integer(digits: &[u8], negative: bool) -> Result<BigInt, BencodeError> {
    if digits.is_empty() {
        return Err(BencodeError::InvalidInteger("empty".into()));
    }

    if digits[0] == b'0' && (digits.len() > 1 || negative) {
        return Err(BencodeError::InvalidInteger("leading zeros".into()));
    }

    let magnitude = BigInt::parse_bytes(digits, 10)
        .ok_or_else(|| BencodeError::InvalidInteger(String::from_utf8_lossy(digits).into()))?;

    Ok(if negative { -magnitude } else { magnitude })
}
