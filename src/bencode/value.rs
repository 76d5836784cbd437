use std::hash::{Hash, Hasher};

use bytes::Bytes;
use indexmap::{Equivalent, IndexMap};
use num_bigint::BigInt;

/// A bencode value.
///
/// Bencode has four data types: integers, byte strings, lists, and dictionaries.
/// Integers carry arbitrary precision and dictionaries keep their insertion order.
///
/// # Examples
///
/// ```
/// use bitpaito::bencode::Value;
///
/// let int: Value = 42i64.into();
/// let string: Value = "hello".into();
/// let list = Value::List(vec![int.clone(), string.clone()]);
///
/// assert_eq!(int.as_integer(), Some(42));
/// assert_eq!(string.as_str(), Some("hello"));
/// assert_eq!(list.as_list().map(|l| l.len()), Some(2));
/// ```
///
/// Dropping, comparing, hashing and encoding walk the tree with an explicit
/// stack, so nesting depth is bounded by memory rather than by the call stack.
/// `Clone` and `Debug` are still recursive.
#[derive(Debug, Clone)]
pub enum Value {
    /// A signed integer of any magnitude.
    Integer(BigInt),
    /// A byte string (may or may not be valid UTF-8).
    Bytes(Bytes),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A dictionary in insertion order.
    Dict(Dict),
}

impl Value {
    /// Creates a byte string value from a UTF-8 string.
    pub fn string(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Returns the value as an `i64`, if it is an integer that fits.
    ///
    /// # Examples
    ///
    /// ```
    /// use bitpaito::bencode::Value;
    ///
    /// assert_eq!(Value::from(-7i64).as_integer(), Some(-7));
    /// assert_eq!(Value::string("7").as_integer(), None);
    /// ```
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => i64::try_from(i).ok(),
            _ => None,
        }
    }

    /// Returns the integer without narrowing it.
    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Returns the value as a byte string, if it is one.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as a UTF-8 string, if it is a valid UTF-8 byte string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Consumes the value and returns the dictionary, if it is one.
    pub fn into_dict(mut self) -> Option<Dict> {
        match &mut self {
            Value::Dict(d) => Some(std::mem::take(d)),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Integer(_) => 0,
            Value::Bytes(_) => 1,
            Value::List(_) => 2,
            Value::Dict(_) => 3,
        }
    }

    /// Looks up a byte-string key in this value if it is a dictionary.
    ///
    /// # Examples
    ///
    /// ```
    /// use bitpaito::bencode::decode;
    ///
    /// let value = decode(b"d3:foo3:bare").unwrap();
    /// assert_eq!(value.get(b"foo").and_then(|v| v.as_str()), Some("bar"));
    /// assert_eq!(value.get(b"missing"), None);
    /// ```
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict()?.get(key)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some(pair) = stack.pop() {
            match pair {
                (Value::Integer(a), Value::Integer(b)) if a == b => {}
                (Value::Bytes(a), Value::Bytes(b)) if a == b => {}
                (Value::List(a), Value::List(b)) if a.len() == b.len() => {
                    stack.extend(a.iter().zip(b));
                }
                (Value::Dict(a), Value::Dict(b)) if a.len() == b.len() => {
                    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                        stack.push((ka, kb));
                        stack.push((va, vb));
                    }
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut stack = vec![self];
        while let Some(value) = stack.pop() {
            value.tag().hash(state);
            match value {
                Value::Integer(i) => i.hash(state),
                Value::Bytes(b) => b.hash(state),
                Value::List(l) => {
                    l.len().hash(state);
                    stack.extend(l.iter().rev());
                }
                Value::Dict(d) => {
                    d.len().hash(state);
                    for (k, v) in d.iter().rev() {
                        stack.push(v);
                        stack.push(k);
                    }
                }
            }
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        detach_children(self, &mut stack);
        while let Some(mut value) = stack.pop() {
            detach_children(&mut value, &mut stack);
        }
    }
}

/// Moves a container's children onto `stack`, leaving the container empty.
fn detach_children(value: &mut Value, stack: &mut Vec<Value>) {
    match value {
        Value::List(items) => stack.append(items),
        Value::Dict(dict) => {
            for (k, v) in dict.entries.drain(..) {
                stack.push(k);
                stack.push(v);
            }
        }
        Value::Integer(_) | Value::Bytes(_) => {}
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(BigInt::from(i))
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}

/// An insertion-ordered bencode dictionary.
///
/// Keys are hashed for lookup. Encoding walks the entries in the order they
/// were first inserted; no lexicographic sorting is applied on either side of
/// the codec. Two dicts are equal only if their entries match in order.
///
/// # Examples
///
/// ```
/// use bitpaito::bencode::{encode, Dict, Value};
///
/// let mut dict = Dict::new();
/// dict.insert("z", 1i64);
/// dict.insert("a", 2i64);
/// assert_eq!(encode(&Value::Dict(dict)), b"d1:zi1e1:ai2ee");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: IndexMap<Value, Value>,
}

/// A borrowed byte-string key that hashes like `Value::Bytes`.
struct BytesKey<'a>(&'a [u8]);

impl Hash for BytesKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must match `Value::tag` for `Value::Bytes`; `Bytes` hashes as its slice.
        1u8.hash(state);
        self.0.hash(state);
    }
}

impl Equivalent<Value> for BytesKey<'_> {
    fn equivalent(&self, key: &Value) -> bool {
        matches!(key, Value::Bytes(b) if b.as_ref() == self.0)
    }
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pair, returning the previous value for an equal key.
    ///
    /// Replacing a key keeps its original position.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Looks up the value stored under a byte-string key.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.entries.get(&BytesKey(key))
    }

    /// Looks up the value stored under an arbitrary key.
    pub fn get_value(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.entries.contains_key(&BytesKey(key))
    }

    /// Removes a byte-string key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &[u8]) -> Option<Value> {
        self.entries.shift_remove(&BytesKey(key))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Value, &Value)> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for Dict {}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Dict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Dict::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

impl IntoIterator for Dict {
    type Item = (Value, Value);
    type IntoIter = indexmap::map::IntoIter<Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
