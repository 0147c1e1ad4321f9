//! Query construction from sparse wire records and sort directives.
//!
//! [`build_filter`] turns every non-zero field of a wire record into an
//! equality clause keyed by its storage name. [`build_sort`] maps sort
//! directives one-to-one into a [`SortSpec`].

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::messages::{Order, SortField};
use crate::model::StorageModel;
use crate::types::{Document, FieldValue, IdError, ObjectId};

/// Errors from building a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid id {value:?}: {source}")]
    InvalidId {
        value: String,
        #[source]
        source: IdError,
    },
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A single clause of a [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Field equals the value.
    Eq(FieldValue),
    /// Field equals any of the values.
    In(Vec<FieldValue>),
}

impl Condition {
    /// Tests a document field against this clause. A missing field never matches.
    #[must_use]
    pub fn matches(&self, value: Option<&FieldValue>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Self::Eq(expected) => expected == value,
            Self::In(candidates) => candidates.contains(value),
        }
    }
}

/// Query predicate: storage key to required condition, all clauses ANDed.
///
/// Clause order carries no meaning. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: BTreeMap<String, Condition>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching a single record by identity.
    #[must_use]
    pub fn by_id(id: ObjectId) -> Self {
        Self::new().and_eq("_id", id)
    }

    /// Filter matching any record whose identity is in `ids`.
    #[must_use]
    pub fn by_ids(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        let mut filter = Self::new();
        filter.insert(
            "_id",
            Condition::In(ids.into_iter().map(FieldValue::ObjectId).collect()),
        );
        filter
    }

    /// Adds an equality clause, builder style.
    #[must_use]
    pub fn and_eq(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, Condition::Eq(value.into()));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, condition: Condition) {
        self.clauses.insert(key.into(), condition);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Condition> {
        self.clauses.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.clauses.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.clauses.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns `true` if the document satisfies every clause.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(key, condition)| condition.matches(doc.get(key)))
    }
}

/// Builds a filter from the non-zero fields of `request`.
///
/// Fields are first projected onto a fresh `M` (fields the model lacks are
/// dropped), then every non-zero model field becomes an equality clause under
/// its storage key. The identity is converted to an [`ObjectId`]; a malformed
/// identity is an error, never a dropped clause. `None` yields an empty filter.
///
/// # Errors
///
/// Returns [`QueryError::InvalidId`] if the identity field is set but malformed.
pub fn build_filter<M: StorageModel>(request: Option<&M::Wire>) -> Result<Filter, QueryError> {
    let mut filter = Filter::new();
    let Some(request) = request else {
        return Ok(filter);
    };

    // Copying a zero value onto a default model is a no-op, so a full
    // projection equals copying only the set fields.
    let model = M::from_wire(request);

    for (key, value) in model.fields() {
        if value.is_zero() {
            continue;
        }
        if key == M::ID_KEY {
            let raw = value.as_str().unwrap_or_default();
            let id = ObjectId::parse_str(raw).map_err(|source| QueryError::InvalidId {
                value: raw.to_string(),
                source,
            })?;
            filter.insert(key, Condition::Eq(id.into()));
        } else {
            filter.insert(key, Condition::Eq(value));
        }
    }

    Ok(filter)
}

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Numeric form used by document stores: `1` ascending, `-1` descending.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordered sort keys. Earlier keys take precedence; later keys break ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, direction: SortDirection) {
        self.keys.push(SortKey {
            field: field.into(),
            direction,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &SortKey> {
        self.keys.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Orders two documents by this spec. A missing field sorts before any value.
    #[must_use]
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.keys {
            let ord = a.get(&key.field).cmp(&b.get(&key.field));
            let ord = match key.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Maps sort directives one-to-one into a [`SortSpec`], preserving order.
///
/// Only an explicit [`Order::Desc`] produces a descending key.
#[must_use]
pub fn build_sort(sort_fields: &[SortField]) -> SortSpec {
    let mut spec = SortSpec::new();
    for sort_field in sort_fields {
        let direction = match sort_field.order {
            Order::Desc => SortDirection::Descending,
            Order::Asc => SortDirection::Ascending,
        };
        spec.push(sort_field.field.clone(), direction);
    }
    spec
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::messages::{Exec, Teacher};
    use crate::model::{ExecModel, TeacherModel};

    #[test]
    fn none_request_yields_empty_filter() {
        let filter = build_filter::<TeacherModel>(None).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn only_set_fields_become_clauses() {
        let teacher = Teacher {
            first_name: "Ada".to_string(),
            class: "9A".to_string(),
            ..Teacher::default()
        };
        let filter = build_filter::<TeacherModel>(Some(&teacher)).unwrap();
        assert_eq!(filter.len(), 2);
        assert_eq!(
            filter.get("first_name"),
            Some(&Condition::Eq(FieldValue::from("Ada")))
        );
        assert_eq!(filter.get("class"), Some(&Condition::Eq(FieldValue::from("9A"))));
        assert!(!filter.contains_key("subject"));
    }

    #[test]
    fn identity_is_converted() {
        let teacher = Teacher {
            id: "5f1d7a3b9c2e4a0012345678".to_string(),
            ..Teacher::default()
        };
        let filter = build_filter::<TeacherModel>(Some(&teacher)).unwrap();
        let expected = ObjectId::parse_str("5f1d7a3b9c2e4a0012345678").unwrap();
        assert_eq!(filter.get("_id"), Some(&Condition::Eq(expected.into())));
    }

    #[test]
    fn malformed_identity_is_an_error() {
        let teacher = Teacher {
            id: "42".to_string(),
            first_name: "Ada".to_string(),
            ..Teacher::default()
        };
        let err = build_filter::<TeacherModel>(Some(&teacher)).unwrap_err();
        assert!(matches!(err, QueryError::InvalidId { ref value, .. } if value == "42"));
    }

    #[test]
    fn boolean_field_only_filters_when_true() {
        let exec = Exec {
            inactive_status: true,
            ..Exec::default()
        };
        let filter = build_filter::<ExecModel>(Some(&exec)).unwrap();
        assert_eq!(
            filter.get("inactive_status"),
            Some(&Condition::Eq(FieldValue::Bool(true)))
        );

        let filter = build_filter::<ExecModel>(Some(&Exec::default())).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn filter_matches_documents() {
        let mut doc = Document::new();
        doc.insert("class".to_string(), "9A".into());
        doc.insert("first_name".to_string(), "Ada".into());

        assert!(Filter::new().matches(&doc));
        assert!(Filter::new().and_eq("class", "9A").matches(&doc));
        assert!(!Filter::new().and_eq("class", "9A").and_eq("email", "x").matches(&doc));

        let mut filter = Filter::new();
        filter.insert(
            "class",
            Condition::In(vec!["9B".into(), "9A".into()]),
        );
        assert!(filter.matches(&doc));
    }

    #[test]
    fn empty_sort_input_yields_empty_spec() {
        assert!(build_sort(&[]).is_empty());
    }

    #[test]
    fn unrecognized_direction_sorts_ascending() {
        let decode = |json: &str| serde_json::from_str::<SortField>(json).unwrap();

        let sideways = decode(r#"{"field":"x","order":"SIDEWAYS"}"#);
        let dsc = decode(r#"{"field":"x","order":"DSC"}"#);
        let desc = decode(r#"{"field":"x","order":"desc"}"#);
        let missing = decode(r#"{"field":"x"}"#);
        assert_eq!(sideways.order, Order::Asc);
        assert_eq!(dsc.order, Order::Desc);
        assert_eq!(desc.order, Order::Desc);
        assert_eq!(missing.order, Order::Asc);

        let spec = build_sort(&[sideways, dsc]);
        let directions: Vec<_> = spec.iter().map(|key| key.direction).collect();
        assert_eq!(directions, [SortDirection::Ascending, SortDirection::Descending]);
    }

    #[test]
    fn sort_compare_uses_keys_in_order() {
        let doc = |class: &str, name: &str| {
            let mut d = Document::new();
            d.insert("class".to_string(), class.into());
            d.insert("first_name".to_string(), name.into());
            d
        };
        let spec = build_sort(&[SortField::asc("class"), SortField::desc("first_name")]);
        assert_eq!(spec.compare(&doc("9A", "Bo"), &doc("9B", "Al")), Ordering::Less);
        assert_eq!(spec.compare(&doc("9A", "Bo"), &doc("9A", "Al")), Ordering::Less);
        assert_eq!(spec.compare(&doc("9A", "Al"), &doc("9A", "Al")), Ordering::Equal);
    }

    fn field_value() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), "[a-z]{1,8}"]
    }

    proptest! {
        #[test]
        fn filter_keys_are_exactly_the_set_fields(
            first_name in field_value(),
            last_name in field_value(),
            email in field_value(),
            class in field_value(),
            subject in field_value(),
        ) {
            let teacher = Teacher {
                id: String::new(),
                first_name,
                last_name,
                email,
                class,
                subject,
            };
            let filter = build_filter::<TeacherModel>(Some(&teacher)).unwrap();
            let expected = [
                ("first_name", &teacher.first_name),
                ("last_name", &teacher.last_name),
                ("email", &teacher.email),
                ("class", &teacher.class),
                ("subject", &teacher.subject),
            ];
            for (key, value) in expected {
                if value.is_empty() {
                    prop_assert!(!filter.contains_key(key));
                } else {
                    prop_assert_eq!(
                        filter.get(key),
                        Some(&Condition::Eq(FieldValue::String(value.clone())))
                    );
                }
            }
            prop_assert!(!filter.contains_key("_id"));
        }

        #[test]
        fn sort_preserves_order_and_direction(
            directives in proptest::collection::vec(("[a-z]{1,6}", any::<bool>()), 0..8)
        ) {
            let fields: Vec<SortField> = directives
                .iter()
                .map(|(name, desc)| if *desc { SortField::desc(name.clone()) } else { SortField::asc(name.clone()) })
                .collect();
            let spec = build_sort(&fields);
            prop_assert_eq!(spec.len(), fields.len());
            for (key, (name, desc)) in spec.iter().zip(&directives) {
                prop_assert_eq!(&key.field, name);
                let expected = if *desc { SortDirection::Descending } else { SortDirection::Ascending };
                prop_assert_eq!(key.direction, expected);
            }
        }
    }
}
