use super::value::Value;
use bytes::BufMut;

/// Encodes a bencode value to a byte vector.
///
/// - Integers: `i<number>e`
/// - Byte strings: `<length>:<data>`
/// - Lists: `l<items>e`
/// - Dictionaries: `d<key><value>...e` in the dictionary's insertion order
///
/// Encoding cannot fail for any [`Value`].
///
/// # Examples
///
/// ```
/// use bitpaito::bencode::{encode, Dict, Value};
///
/// assert_eq!(encode(&Value::from(42i64)), b"i42e");
/// assert_eq!(encode(&Value::string("hello")), b"5:hello");
///
/// let list = Value::List(vec![Value::from(1i64), Value::string("two")]);
/// assert_eq!(encode(&list), b"li1e3:twoe");
///
/// let mut dict = Dict::new();
/// dict.insert("b", 2i64);
/// dict.insert("a", 1i64);
/// assert_eq!(encode(&Value::Dict(dict)), b"d1:bi2e1:ai1ee");
/// ```
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf);
    buf
}

enum Step<'a> {
    Value(&'a Value),
    End,
}

fn encode_into<B: BufMut>(value: &Value, buf: &mut B) {
    let mut stack = vec![Step::Value(value)];

    while let Some(step) = stack.pop() {
        let value = match step {
            Step::Value(value) => value,
            Step::End => {
                buf.put_u8(b'e');
                continue;
            }
        };

        match value {
            Value::Integer(i) => {
                buf.put_u8(b'i');
                buf.put_slice(i.to_string().as_bytes());
                buf.put_u8(b'e');
            }
            Value::Bytes(b) => {
                buf.put_slice(b.len().to_string().as_bytes());
                buf.put_u8(b':');
                buf.put_slice(b);
            }
            Value::List(l) => {
                buf.put_u8(b'l');
                stack.push(Step::End);
                stack.extend(l.iter().rev().map(Step::Value));
            }
            Value::Dict(d) => {
                buf.put_u8(b'd');
                stack.push(Step::End);
                for (key, val) in d.iter().rev() {
                    stack.push(Step::Value(val));
                    stack.push(Step::Value(key));
                }
            }
        }
    }
}
