//! Conformance harness for `ValueSet`.
//!
//! `run` drives a set through the reference contract (construction, add,
//! delete, has, size, clear, mixed-type membership, forEach, iteration) and
//! records one `Outcome` per check. Membership is verified by brute-force
//! comparison against plain slices so the checks never rely on set behavior
//! themselves.

use crate::error::CodecError;
use crate::value::{ArrayRef, FunctionRef, ObjectRef, Value};
use crate::value_set::{SetMethod, ValueSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub title: String,
    pub failures: Vec<String>,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(Outcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            if outcome.passed() {
                writeln!(f, "Passed: {}", outcome.title)?;
            } else {
                writeln!(f, "Failed: {}", outcome.title)?;
                for msg in &outcome.failures {
                    writeln!(f, "    {}", msg)?;
                }
            }
        }
        Ok(())
    }
}

fn position(items: &[Value], item: &Value) -> Option<usize> {
    items.iter().position(|x| x == item)
}

/// Compare two member lists as multisets-without-order. Returns the
/// discrepancies; empty means the lists agree.
pub fn verify_sequence(actual: &[Value], expected: &[Value]) -> Vec<String> {
    let extra: Vec<&Value> = actual
        .iter()
        .filter(|v| position(expected, v).is_none())
        .collect();
    let missing: Vec<&Value> = expected
        .iter()
        .filter(|v| position(actual, v).is_none())
        .collect();

    let mut errors = Vec::new();
    if actual.len() != expected.len() {
        errors.push(format!(
            "set length is not what was expected: {} !== {}",
            actual.len(),
            expected.len()
        ));
    }
    if !extra.is_empty() {
        errors.push(format!("set contains extra members: {:?}", extra));
    }
    if !missing.is_empty() {
        errors.push(format!("set is missing members: {:?}", missing));
    }
    errors
}

/// Check that `set` holds exactly `expected`, in any order.
pub fn verify_members(set: &ValueSet, expected: &[Value]) -> Vec<String> {
    let actual: Vec<Value> = set.values().collect();
    verify_sequence(&actual, expected)
}

pub fn verify_eq<T>(actual: T, expected: T) -> Vec<String>
where
    T: PartialEq + fmt::Debug,
{
    if actual == expected {
        Vec::new()
    } else {
        vec![format!(
            "operation did not return expected result: {:?} !== {:?}",
            actual, expected
        )]
    }
}

/// Accumulates outcomes and logs each one as it is recorded.
#[derive(Debug, Default)]
pub struct Harness {
    report: Report,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, title: &str, failures: Vec<String>) {
        if failures.is_empty() {
            tracing::info!("Passed: {}", title);
        } else {
            tracing::warn!(failures = ?failures, "Failed: {}", title);
        }
        self.report.outcomes.push(Outcome {
            title: title.to_string(),
            failures,
        });
    }

    pub fn check_members(&mut self, title: &str, set: &ValueSet, expected: &[Value]) {
        self.record(title, verify_members(set, expected));
    }

    pub fn check_sequence(&mut self, title: &str, actual: &[Value], expected: &[Value]) {
        self.record(title, verify_sequence(actual, expected));
    }

    pub fn check_eq<T>(&mut self, title: &str, actual: T, expected: T)
    where
        T: PartialEq + fmt::Debug,
    {
        self.record(title, verify_eq(actual, expected));
    }

    pub fn finish(self) -> Report {
        self.report
    }
}

fn nums(items: &[i32]) -> Vec<Value> {
    items.iter().map(|&i| Value::from(i)).collect()
}

/// Run the reference suite. An `Err` means a check could not even be set
/// up because a value was rejected by the codec.
pub fn run() -> Result<Report, CodecError> {
    let mut h = Harness::new();

    // add and construction
    let x = ValueSet::try_from_iter(nums(&[1, 2]))?;
    x.add(Value::from(3))?;
    h.check_members(".add()", &x, &nums(&[1, 2, 3]));
    let y = ValueSet::from_value(&Value::from(x.clone()))?;
    y.add(Value::from(4))?;
    h.check_members("constructor takes a set", &y, &nums(&[1, 2, 3, 4]));
    h.check_members("source set is independent of the copy", &x, &nums(&[1, 2, 3]));

    // names that collide with common property names
    x.add(Value::from("hasOwnProperty"))?;
    x.add(Value::from("constructor"))?;
    h.check_eq(".has('hasOwnProperty')", x.has(&Value::from("hasOwnProperty")), true);
    h.check_eq(".has('constructor')", x.has(&Value::from("constructor")), true);
    x.remove(&Value::from("hasOwnProperty"));
    x.remove(&Value::from("constructor"));
    h.check_members(".delete() of string members", &x, &nums(&[1, 2, 3]));

    // delete
    x.remove(&Value::from(2));
    h.check_eq(".delete(3) === true", x.remove(&Value::from(3)), true);
    h.check_eq(".delete(4) === false", x.remove(&Value::from(4)), false);
    h.check_members(".delete()", &x, &nums(&[1]));

    // has
    h.check_eq(".has(2)", x.has(&Value::from(2)), false);
    h.check_eq(".has(1)", x.has(&Value::from(1)), true);
    h.check_eq(".has({})", x.has(&Value::from(ObjectRef::new())), false);
    h.check_eq(".delete(9)", x.remove(&Value::from(9)), false);

    // size is a read-only method with no setter, so "can't be set" reduces
    // to the count tracking the stored members through every handle.
    h.check_eq(".size #1", x.size(), 1);
    let y = ValueSet::try_from_iter(nums(&[1]))?;
    let alias = y.clone();
    h.check_eq(".size can't be set", (alias.size(), alias.values().count()), (1, 1));
    y.remove(&Value::from(1));
    h.check_eq(".size #2", alias.size(), 0);

    // clear
    y.try_extend(nums(&[1, 2, 3]))?;
    y.clear();
    h.check_eq(".clear()", y.size(), 0);
    h.check_eq(".has() after .clear()", y.has(&Value::from(1)), false);

    // mixed types that stringify alike
    let obj1 = ObjectRef::new().with("name", "hello");
    let obj2 = ObjectRef::new().with("name", "goodbye");
    let fn1 = FunctionRef::new("alert", 0, |_, _| Value::Undefined);
    let fn2 = FunctionRef::new("alert", 0, |_, _| Value::Undefined);
    let data = vec![
        Value::from(1),
        Value::from(2),
        Value::from(3),
        Value::from(3.414),
        Value::from("1"),
        Value::from("2"),
        Value::from("3"),
        Value::from(true),
        Value::from(false),
        Value::Null,
        Value::Undefined,
        Value::from(obj1),
        Value::from(obj2),
        Value::from(fn1),
        Value::from(fn2),
    ];
    let x = ValueSet::new();
    x.try_extend(data.iter().cloned())?;
    h.check_members("multiple conflicting types", &x, &data);
    let lookalike = ObjectRef::new().with("name", "hello");
    h.check_eq(".has(lookalike object)", x.has(&Value::from(lookalike)), false);

    // forEach
    h.check_eq(".forEach.length", SetMethod::ForEach.arity(), 1);
    let mut results = Vec::new();
    x.for_each(|item, _, _| results.push(item.clone()));
    h.check_members(".forEach()", &x, &results);

    let collected = ArrayRef::default();
    let sink = collected.clone();
    let visitor = FunctionRef::new("visit", 1, move |this, args| {
        if this.as_set().is_some() {
            sink.push(args[0].clone());
        }
        Value::Undefined
    });
    x.for_each_value(&Value::from(visitor), &Value::from(x.clone()));
    h.check_members(".forEach() with bound context", &x, &collected.to_vec());
    x.for_each_value(&Value::from("not callable"), &Value::Undefined);
    h.check_eq(".forEach(non-function) is a no-op", x.size(), data.len());

    // host list-like collection
    let nodes: Vec<Value> = (0..3i32)
        .map(|i| Value::from(ObjectRef::new().with("nodeType", 1).with("id", i)))
        .collect();
    let list = ObjectRef::new().with("length", nodes.len() as u32);
    for (i, node) in nodes.iter().enumerate() {
        list.set(&i.to_string(), node.clone());
    }
    let x = ValueSet::from_value(&Value::from(list))?;
    h.check_members(
        &format!("list-like collection in set({})", nodes.len()),
        &x,
        &nodes,
    );

    // keys, values, entries
    let keys: Vec<Value> = x.keys().collect();
    h.check_sequence(".keys()", &keys, &nodes);
    let values: Vec<Value> = x.values().collect();
    h.check_sequence(".values()", &values, &nodes);
    let entries: Vec<(Value, Value)> = x.entries().collect();
    h.check_eq(
        ".entries() pairs a value with itself",
        entries.iter().all(|(a, b)| a == b),
        true,
    );
    let firsts: Vec<Value> = entries.into_iter().map(|(a, _)| a).collect();
    h.check_sequence(".entries()", &firsts, &nodes);

    // mutation during iteration
    let s = ValueSet::try_from_iter(nums(&[1]))?;
    let mut it = s.values();
    s.add(Value::from(2))?;
    let seen: Vec<Value> = it.by_ref().collect();
    h.check_sequence("iteration ignores additions", &seen, &nums(&[1]));
    h.check_eq("exhausted iterator stays done", it.next(), None);

    let mut it = s.values();
    s.remove(&Value::from(1));
    let seen: Vec<Value> = it.collect();
    h.check_sequence("iteration skips removals", &seen, &nums(&[2]));

    let mut visited = 0;
    s.for_each(|item, _, set| {
        visited += 1;
        set.remove(item);
        let _ = set.add(Value::from(99));
    });
    h.check_eq("forEach survives self-mutation", visited, 1);
    h.check_members("members after self-mutating forEach", &s, &nums(&[99]));

    Ok(h.finish())
}
