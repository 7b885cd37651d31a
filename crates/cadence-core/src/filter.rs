//! Event filters
//!
//! A filter is a predicate over events in one of three shapes:
//! - boolean leaf: compares an event's boolean value
//! - numeric leaf: compares an event's `timestamp` or `value`
//! - composite: conjunction of one or more filters
//!
//! Every filter has a canonical text form that parses back losslessly,
//! including nested composites.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{CadenceError, CadenceResult, Event};

const BOOL_PREFIX: &str = "Boolean Filter: ";
const DOUBLE_PREFIX: &str = "Double Filter: ";
const COMPOSITE_PREFIX: &str = "Composite Filter: ";

/// Operators for boolean leaves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoolOperator {
    Equals,
    NotEquals,
}

impl BoolOperator {
    #[inline]
    pub fn evaluate(self, lhs: bool, rhs: bool) -> bool {
        match self {
            BoolOperator::Equals => lhs == rhs,
            BoolOperator::NotEquals => lhs != rhs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoolOperator::Equals => "EQUALS",
            BoolOperator::NotEquals => "NOT_EQUALS",
        }
    }
}

impl FromStr for BoolOperator {
    type Err = CadenceError;

    fn from_str(s: &str) -> CadenceResult<Self> {
        match s {
            "EQUALS" => Ok(BoolOperator::Equals),
            "NOT_EQUALS" => Ok(BoolOperator::NotEquals),
            other => Err(CadenceError::MalformedFilter(format!(
                "unknown boolean operator {other}"
            ))),
        }
    }
}

/// Operators for numeric leaves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DoubleOperator {
    Equals,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
}

impl DoubleOperator {
    #[inline]
    pub fn evaluate(self, lhs: f64, rhs: f64) -> bool {
        match self {
            DoubleOperator::Equals => lhs == rhs,
            DoubleOperator::GreaterThan => lhs > rhs,
            DoubleOperator::LessThan => lhs < rhs,
            DoubleOperator::GreaterThanOrEquals => lhs >= rhs,
            DoubleOperator::LessThanOrEquals => lhs <= rhs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DoubleOperator::Equals => "EQUALS",
            DoubleOperator::GreaterThan => "GREATER_THAN",
            DoubleOperator::LessThan => "LESS_THAN",
            DoubleOperator::GreaterThanOrEquals => "GREATER_THAN_OR_EQUALS",
            DoubleOperator::LessThanOrEquals => "LESS_THAN_OR_EQUALS",
        }
    }
}

impl FromStr for DoubleOperator {
    type Err = CadenceError;

    fn from_str(s: &str) -> CadenceResult<Self> {
        match s {
            "EQUALS" => Ok(DoubleOperator::Equals),
            "GREATER_THAN" => Ok(DoubleOperator::GreaterThan),
            "LESS_THAN" => Ok(DoubleOperator::LessThan),
            "GREATER_THAN_OR_EQUALS" => Ok(DoubleOperator::GreaterThanOrEquals),
            "LESS_THAN_OR_EQUALS" => Ok(DoubleOperator::LessThanOrEquals),
            other => Err(CadenceError::MalformedFilter(format!(
                "unknown numeric operator {other}"
            ))),
        }
    }
}

/// Event field a numeric leaf reads
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericField {
    Timestamp,
    Value,
}

impl NumericField {
    /// Read the field. `Value` on an actuator event yields the numeric sentinel.
    #[inline]
    pub fn read(self, event: &Event) -> f64 {
        match self {
            NumericField::Timestamp => event.timestamp(),
            NumericField::Value => event.value_double(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NumericField::Timestamp => "timestamp",
            NumericField::Value => "value",
        }
    }
}

impl FromStr for NumericField {
    type Err = CadenceError;

    /// Field names are case-insensitive
    fn from_str(s: &str) -> CadenceResult<Self> {
        if s.eq_ignore_ascii_case("timestamp") {
            Ok(NumericField::Timestamp)
        } else if s.eq_ignore_ascii_case("value") {
            Ok(NumericField::Value)
        } else {
            Err(CadenceError::UnknownFilterField(s.to_string()))
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Shape {
    Bool {
        op: BoolOperator,
        value: bool,
    },
    Double {
        field: NumericField,
        op: DoubleOperator,
        value: f64,
    },
    /// INVARIANT: never empty
    Composite(Vec<Filter>),
}

/// A predicate over events
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    shape: Shape,
}

impl Filter {
    /// Boolean leaf: `event.value_bool() <op> value`
    pub fn boolean(op: BoolOperator, value: bool) -> Self {
        Filter {
            shape: Shape::Bool { op, value },
        }
    }

    /// Numeric leaf over a known field
    pub fn numeric(field: NumericField, op: DoubleOperator, value: f64) -> Self {
        Filter {
            shape: Shape::Double { field, op, value },
        }
    }

    /// Numeric leaf over a named field (`"timestamp"` or `"value"`)
    pub fn double(field: &str, op: DoubleOperator, value: f64) -> CadenceResult<Self> {
        Ok(Self::numeric(field.parse()?, op, value))
    }

    /// Conjunction of `filters`. Rejects an empty list.
    pub fn all(filters: Vec<Filter>) -> CadenceResult<Self> {
        if filters.is_empty() {
            return Err(CadenceError::EmptyCompositeFilter);
        }
        Ok(Filter {
            shape: Shape::Composite(filters),
        })
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.shape, Shape::Composite(_))
    }

    /// Members of the conjunction. A leaf is a singleton containing itself.
    pub fn members(&self) -> &[Filter] {
        match &self.shape {
            Shape::Composite(filters) => filters,
            _ => std::slice::from_ref(self),
        }
    }

    /// True iff every member is satisfied by `event`
    pub fn satisfies(&self, event: &Event) -> bool {
        self.members().iter().all(|member| member.leaf_satisfies(event))
    }

    fn leaf_satisfies(&self, event: &Event) -> bool {
        match &self.shape {
            Shape::Bool { op, value } => op.evaluate(event.value_bool(), *value),
            Shape::Double { field, op, value } => op.evaluate(field.read(event), *value),
            Shape::Composite(_) => self.satisfies(event),
        }
    }

    /// True iff every event in `events` satisfies this filter
    pub fn satisfies_all<'a>(&self, events: impl IntoIterator<Item = &'a Event>) -> bool {
        events.into_iter().all(|event| self.satisfies(event))
    }

    /// The event itself if it satisfies, otherwise nothing
    pub fn sift<'a>(&self, event: &'a Event) -> Option<&'a Event> {
        self.satisfies(event).then_some(event)
    }

    /// Satisfying events, in input order
    pub fn sift_all(&self, events: &[Event]) -> Vec<Event> {
        events
            .iter()
            .filter(|event| self.satisfies(event))
            .cloned()
            .collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Shape::Bool { op, value } => {
                write!(f, "{BOOL_PREFIX}Operator={}, Value={}", op.as_str(), value)
            }
            Shape::Double { field, op, value } => write!(
                f,
                "{DOUBLE_PREFIX}Field={}, Operator={}, Value={}",
                field.as_str(),
                op.as_str(),
                value
            ),
            Shape::Composite(filters) => {
                write!(f, "{COMPOSITE_PREFIX}[")?;
                for (i, filter) in filters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{filter}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl FromStr for Filter {
    type Err = CadenceError;

    fn from_str(s: &str) -> CadenceResult<Self> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix(BOOL_PREFIX) {
            let (op, value) = split_pair(rest, "Operator=", "Value=")?;
            let value = value
                .parse::<bool>()
                .map_err(|_| CadenceError::MalformedFilter(format!("bad boolean {value}")))?;
            return Ok(Filter::boolean(op.parse()?, value));
        }

        if let Some(rest) = s.strip_prefix(DOUBLE_PREFIX) {
            let rest = rest
                .strip_prefix("Field=")
                .ok_or_else(|| CadenceError::MalformedFilter(s.to_string()))?;
            let (field, rest) = rest
                .split_once(", ")
                .ok_or_else(|| CadenceError::MalformedFilter(s.to_string()))?;
            let (op, value) = split_pair(rest, "Operator=", "Value=")?;
            let value = value
                .parse::<f64>()
                .map_err(|_| CadenceError::MalformedFilter(format!("bad number {value}")))?;
            return Filter::double(field, op.parse()?, value);
        }

        if let Some(rest) = s.strip_prefix(COMPOSITE_PREFIX) {
            let inner = rest
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .ok_or_else(|| CadenceError::MalformedFilter(s.to_string()))?;
            let members = split_members(inner)?
                .into_iter()
                .map(str::parse)
                .collect::<CadenceResult<Vec<Filter>>>()?;
            return Filter::all(members);
        }

        Err(CadenceError::MalformedFilter(s.to_string()))
    }
}

/// Split `"<a_key><a>, <b_key><b>"` into `(a, b)`
fn split_pair<'a>(s: &'a str, a_key: &str, b_key: &str) -> CadenceResult<(&'a str, &'a str)> {
    let malformed = || CadenceError::MalformedFilter(s.to_string());
    let (a, b) = s.split_once(", ").ok_or_else(malformed)?;
    let a = a.strip_prefix(a_key).ok_or_else(malformed)?;
    let b = b.strip_prefix(b_key).ok_or_else(malformed)?;
    Ok((a, b))
}

/// Split the body of a composite into member texts.
///
/// Leaves contain `", "` themselves, so a separator only counts at bracket
/// depth zero and when a new filter starts right after it.
fn split_members(inner: &str) -> CadenceResult<Vec<&str>> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in inner.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| CadenceError::MalformedFilter(inner.to_string()))?;
            }
            ',' if depth == 0 => {
                let next = &inner[i + 1..];
                let starts_filter = next.strip_prefix(' ').is_some_and(|n| {
                    n.starts_with(BOOL_PREFIX)
                        || n.starts_with(DOUBLE_PREFIX)
                        || n.starts_with(COMPOSITE_PREFIX)
                });
                if starts_filter {
                    members.push(&inner[start..i]);
                    start = i + 2;
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(CadenceError::MalformedFilter(inner.to_string()));
    }
    members.push(&inner[start..]);
    Ok(members)
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientId, EntityId};
    use proptest::prelude::*;

    fn sensor(ts: f64, value: f64) -> Event {
        Event::sensor(ts, ClientId::new(0), EntityId::new(1), "TempSensor", value)
    }

    fn switch(ts: f64, value: bool) -> Event {
        Event::actuator(ts, ClientId::new(0), EntityId::new(97), "Switch", value)
    }

    fn sample_events() -> Vec<Event> {
        vec![
            sensor(0.0, -5.0),
            sensor(0.5, 23.0),
            sensor(1.0, 100.25),
            sensor(7.5, 0.0),
            switch(0.25, true),
            switch(3.0, false),
        ]
    }

    #[test]
    fn test_numeric_leaf() {
        let filter = Filter::double("value", DoubleOperator::GreaterThanOrEquals, 23.0).unwrap();
        assert!(filter.satisfies(&sensor(0.0, 23.0)));
        assert!(!filter.satisfies(&sensor(0.0, 22.9)));

        let by_time = Filter::double("Timestamp", DoubleOperator::LessThan, 6.0).unwrap();
        assert!(by_time.satisfies(&sensor(5.0, 0.0)));
        assert!(!by_time.satisfies(&sensor(6.0, 0.0)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            Filter::double("temperature", DoubleOperator::Equals, 1.0),
            Err(CadenceError::UnknownFilterField(_))
        ));
    }

    #[test]
    fn test_numeric_leaf_on_actuator_uses_sentinel() {
        let below_zero = Filter::double("value", DoubleOperator::LessThan, 0.0).unwrap();
        assert!(below_zero.satisfies(&switch(1.0, true)));

        let equals_sentinel = Filter::double("value", DoubleOperator::Equals, -1.0).unwrap();
        assert!(equals_sentinel.satisfies(&switch(1.0, false)));
    }

    #[test]
    fn test_boolean_leaf() {
        let on = Filter::boolean(BoolOperator::Equals, true);
        assert!(on.satisfies(&switch(0.0, true)));
        assert!(!on.satisfies(&switch(0.0, false)));

        let not_on = Filter::boolean(BoolOperator::NotEquals, true);
        assert!(not_on.satisfies(&switch(0.0, false)));
        // sensors read as false
        assert!(not_on.satisfies(&sensor(0.0, 1.0)));
    }

    #[test]
    fn test_composite_is_conjunction() {
        let window = Filter::all(vec![
            Filter::double("timestamp", DoubleOperator::GreaterThan, 0.2).unwrap(),
            Filter::double("timestamp", DoubleOperator::LessThanOrEquals, 1.0).unwrap(),
        ])
        .unwrap();

        assert!(window.satisfies(&sensor(0.5, 0.0)));
        assert!(window.satisfies(&sensor(1.0, 0.0)));
        assert!(!window.satisfies(&sensor(0.2, 0.0)));
        assert!(!window.satisfies(&sensor(1.5, 0.0)));
    }

    #[test]
    fn test_empty_composite_rejected() {
        assert!(matches!(
            Filter::all(vec![]),
            Err(CadenceError::EmptyCompositeFilter)
        ));
    }

    #[test]
    fn test_leaf_is_singleton() {
        let leaf = Filter::boolean(BoolOperator::Equals, true);
        assert_eq!(leaf.members().len(), 1);
        assert_eq!(leaf.members()[0], leaf);
    }

    #[test]
    fn test_sift() {
        let filter = Filter::double("value", DoubleOperator::GreaterThan, 10.0).unwrap();
        let events = sample_events();

        assert!(filter.sift(&events[0]).is_none());
        assert_eq!(filter.sift(&events[1]), Some(&events[1]));

        let kept = filter.sift_all(&events);
        assert_eq!(kept, vec![events[1].clone(), events[2].clone()]);
        assert!(!filter.satisfies_all(&events));
        assert!(filter.satisfies_all(&kept));

        let none = Filter::double("value", DoubleOperator::GreaterThan, 1e9).unwrap();
        assert!(none.sift_all(&events).is_empty());
    }

    #[test]
    fn test_text_forms() {
        let leaf = Filter::boolean(BoolOperator::NotEquals, false);
        assert_eq!(leaf.to_string(), "Boolean Filter: Operator=NOT_EQUALS, Value=false");

        let num = Filter::double("value", DoubleOperator::GreaterThan, 23.5).unwrap();
        assert_eq!(
            num.to_string(),
            "Double Filter: Field=value, Operator=GREATER_THAN, Value=23.5"
        );

        let both = Filter::all(vec![leaf, num]).unwrap();
        assert_eq!(
            both.to_string(),
            "Composite Filter: [Boolean Filter: Operator=NOT_EQUALS, Value=false, \
             Double Filter: Field=value, Operator=GREATER_THAN, Value=23.5]"
        );
    }

    #[test]
    fn test_nested_composite_roundtrip() {
        let inner = Filter::all(vec![
            Filter::double("timestamp", DoubleOperator::GreaterThanOrEquals, 0.25).unwrap(),
            Filter::boolean(BoolOperator::Equals, true),
        ])
        .unwrap();
        let outer = Filter::all(vec![
            inner,
            Filter::double("value", DoubleOperator::LessThanOrEquals, 1.0).unwrap(),
            Filter::all(vec![Filter::boolean(BoolOperator::NotEquals, false)]).unwrap(),
        ])
        .unwrap();

        let parsed: Filter = outer.to_string().parse().unwrap();
        assert_eq!(parsed, outer);
    }

    #[test]
    fn test_malformed_text_rejected() {
        for text in [
            "",
            "Boolean Filter: Operator=MAYBE, Value=true",
            "Double Filter: Field=value, Operator=EQUALS, Value=abc",
            "Double Filter: Field=pressure, Operator=EQUALS, Value=1",
            "Composite Filter: []",
            "Composite Filter: [Boolean Filter: Operator=EQUALS, Value=true",
        ] {
            assert!(text.parse::<Filter>().is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_serde_uses_text_form() {
        let filter = Filter::boolean(BoolOperator::Equals, true);
        let json = serde_json::to_string(&filter).unwrap();
        assert_eq!(json, r#""Boolean Filter: Operator=EQUALS, Value=true""#);
        let back: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }

    fn arb_leaf() -> impl Strategy<Value = Filter> {
        let bool_op = prop_oneof![Just(BoolOperator::Equals), Just(BoolOperator::NotEquals)];
        let double_op = prop_oneof![
            Just(DoubleOperator::Equals),
            Just(DoubleOperator::GreaterThan),
            Just(DoubleOperator::LessThan),
            Just(DoubleOperator::GreaterThanOrEquals),
            Just(DoubleOperator::LessThanOrEquals),
        ];
        let field = prop_oneof![Just(NumericField::Timestamp), Just(NumericField::Value)];
        prop_oneof![
            (bool_op, any::<bool>()).prop_map(|(op, v)| Filter::boolean(op, v)),
            (field, double_op, -100.0f64..100.0).prop_map(|(f, op, v)| Filter::numeric(f, op, v)),
        ]
    }

    fn arb_filter() -> impl Strategy<Value = Filter> {
        arb_leaf().prop_recursive(3, 16, 4, |inner| {
            prop::collection::vec(inner, 1..4).prop_map(|members| {
                Filter::all(members).expect("non-empty by construction")
            })
        })
    }

    proptest! {
        #[test]
        fn prop_text_roundtrip_preserves_behaviour(filter in arb_filter()) {
            let parsed: Filter = filter.to_string().parse().unwrap();
            for event in sample_events() {
                prop_assert_eq!(parsed.satisfies(&event), filter.satisfies(&event));
            }
            prop_assert_eq!(parsed, filter);
        }
    }
}
