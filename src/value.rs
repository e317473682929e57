//! Value model: primitives, reference handles, and array-like sources.
//!
//! Primitives compare by value. Reference variants are cheap `Rc` handles
//! compared by pointer identity, so two objects with the same properties are
//! still different values.

use crate::value_set::ValueSet;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Any admissible input to a `ValueSet`.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Symbol),
    Object(ObjectRef),
    Function(FunctionRef),
    Array(ArrayRef),
    Set(ValueSet),
}

impl Value {
    /// Conventional runtime type name; null, arrays and sets report `"object"`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) | Value::Array(_) | Value::Set(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Value::Object(_) | Value::Function(_) | Value::Array(_) | Value::Set(_)
        )
    }

    pub fn as_set(&self) -> Option<&ValueSet> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Address and type-erased weak handle of the allocation behind a
    /// reference value; `None` for primitives and symbols.
    pub(crate) fn downgrade(&self) -> Option<RefTarget> {
        match self {
            Value::Object(o) => Some(erase(&o.0)),
            Value::Function(f) => Some(erase(&f.0)),
            Value::Array(a) => Some(erase(&a.0)),
            Value::Set(s) => Some(s.downgrade_erased()),
            _ => None,
        }
    }
}

/// Identity of one reference allocation, as seen by the key codec.
pub(crate) struct RefTarget {
    pub(crate) addr: usize,
    pub(crate) weak: Weak<dyn Any>,
}

pub(crate) fn erase<T: Any>(rc: &Rc<T>) -> RefTarget {
    let weak: Weak<T> = Rc::downgrade(rc);
    RefTarget {
        addr: Rc::as_ptr(rc) as usize,
        weak,
    }
}

/// Largest `length` an array-like source may report, matching the host's
/// array index range.
const MAX_ARRAY_LENGTH: f64 = u32::MAX as f64;

/// String form of a number as the host prints it: shortest round-trip
/// digits, plain notation for decimal exponents in `-7..21`, otherwise
/// `d.ddde+N`. `-0` prints as `0`.
pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n == f64::INFINITY {
        return "Infinity".to_string();
    }
    if n == f64::NEG_INFINITY {
        return "-Infinity".to_string();
    }

    let sign = if n < 0.0 { "-" } else { "" };
    // `{:e}` yields the shortest digits, e.g. "1.2345e3".
    let sci = format!("{:e}", n.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // Position of the decimal point relative to the first digit.
    let point = exp.parse::<i32>().unwrap_or(0) + 1;

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat(point.unsigned_abs() as usize), digits)
    } else {
        let e = point - 1;
        let e_sign = if e < 0 { '-' } else { '+' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, e_sign, e.unsigned_abs())
        } else {
            format!("{}.{}e{}{}", first, rest, e_sign, e.unsigned_abs())
        }
    };
    format!("{}{}", sign, body)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => s.fmt(f),
            Value::Object(o) => o.fmt(f),
            Value::Function(func) => func.fmt(f),
            Value::Array(a) => a.fmt(f),
            Value::Set(s) => write!(f, "Set(size={})", s.size()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<FunctionRef> for Value {
    fn from(f: FunctionRef) -> Self {
        Value::Function(f)
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Value::Array(a)
    }
}

impl From<ValueSet> for Value {
    fn from(s: ValueSet) -> Self {
        Value::Set(s)
    }
}

/// Host-specific symbolic value. The key codec cannot key it.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(description: &str) -> Self {
        Symbol(description.into())
    }

    pub fn description(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

#[derive(Default)]
struct ObjectData {
    props: RefCell<BTreeMap<String, Value>>,
}

/// Plain object with a mutable property bag.
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<ObjectData>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property assignment.
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.props.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let previous = self.0.props.borrow_mut().insert(name.to_string(), value.into());
        drop(previous);
    }

    /// `Some(n)` when the object carries a non-negative integral `length`
    /// no larger than `u32::MAX`.
    pub fn array_length(&self) -> Option<usize> {
        match self.get("length")? {
            Value::Number(n) if (0.0..=MAX_ARRAY_LENGTH).contains(&n) && n.fract() == 0.0 => {
                Some(n as usize)
            }
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.0.props.borrow().keys().cloned().collect();
        f.debug_struct("Object").field("keys", &keys).finish()
    }
}

type NativeFn = dyn Fn(&Value, &[Value]) -> Value;

struct NativeFunction {
    name: Rc<str>,
    arity: usize,
    body: Box<NativeFn>,
}

/// Callable reference value. `arity` is the declared argument count.
#[derive(Clone)]
pub struct FunctionRef(Rc<NativeFunction>);

impl FunctionRef {
    pub fn new<F>(name: &str, arity: usize, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Value + 'static,
    {
        FunctionRef(Rc::new(NativeFunction {
            name: name.into(),
            arity,
            body: Box::new(body),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn arity(&self) -> usize {
        self.0.arity
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Value {
        (self.0.body)(this, args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({}/{})", self.0.name, self.0.arity)
    }
}

/// Growable list of values with reference identity.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        ArrayRef(Rc::new(RefCell::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array(len={})", self.len())
    }
}

impl FromIterator<Value> for ArrayRef {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ArrayRef::new(iter.into_iter().collect())
    }
}

/// Positional source for bulk construction: a non-negative length plus
/// index access. Out-of-range or missing positions read as `Undefined`.
pub trait ArrayLike {
    fn length(&self) -> usize;
    fn item(&self, index: usize) -> Value;
}

impl ArrayLike for [Value] {
    fn length(&self) -> usize {
        self.len()
    }
    fn item(&self, index: usize) -> Value {
        self.get(index).cloned().unwrap_or_default()
    }
}

impl<const N: usize> ArrayLike for [Value; N] {
    fn length(&self) -> usize {
        N
    }
    fn item(&self, index: usize) -> Value {
        self.as_slice().item(index)
    }
}

impl ArrayLike for Vec<Value> {
    fn length(&self) -> usize {
        self.len()
    }
    fn item(&self, index: usize) -> Value {
        self.as_slice().item(index)
    }
}

impl ArrayLike for ArrayRef {
    fn length(&self) -> usize {
        self.len()
    }
    fn item(&self, index: usize) -> Value {
        self.get(index).unwrap_or_default()
    }
}

/// Host list-like objects: `length` plus properties named `"0"`, `"1"`, ...
impl ArrayLike for ObjectRef {
    fn length(&self) -> usize {
        self.array_length().unwrap_or(0)
    }
    fn item(&self, index: usize) -> Value {
        self.get(&index.to_string()).unwrap_or_default()
    }
}
