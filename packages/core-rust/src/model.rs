//! Storage-shaped records and the per-entity wire/storage mapping.
//!
//! Each storage model is declared once with [`storage_model!`], which emits the
//! struct, both `From` conversions and the [`StorageModel`] impl. Conversions
//! copy every field whose name appears on both sides; a field that only one
//! side has is left at its default. Like-named fields must share a type, so a
//! mismatch fails to compile instead of failing at runtime.

use crate::messages::{Exec, Student, Teacher};
use crate::types::{Document, FieldValue, IdError, ObjectId};

/// A scalar field type that can live in a storage model.
pub trait ModelField: Clone + Default {
    fn to_value(&self) -> FieldValue;
    fn from_value(value: &FieldValue) -> Self;
    fn is_zero(&self) -> bool;
}

impl ModelField for String {
    fn to_value(&self) -> FieldValue {
        FieldValue::String(self.clone())
    }

    fn from_value(value: &FieldValue) -> Self {
        match value {
            FieldValue::String(s) => s.clone(),
            FieldValue::ObjectId(id) => id.to_hex(),
            FieldValue::Bool(_) | FieldValue::Int(_) => String::new(),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl ModelField for bool {
    fn to_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_value(value: &FieldValue) -> Self {
        value.as_bool().unwrap_or_default()
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

/// Persistence-side shape of an entity, paired with its wire record.
pub trait StorageModel: Default + Clone + Send + Sync + 'static {
    /// The wire record this model maps to and from.
    type Wire: Default + Clone + Send + Sync + 'static;

    /// Collection the records live in.
    const COLLECTION: &'static str;

    /// Storage key of the identity field.
    const ID_KEY: &'static str = "_id";

    fn from_wire(wire: &Self::Wire) -> Self;

    fn to_wire(&self) -> Self::Wire;

    /// Identity as hex; empty when not yet persisted.
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Every field as `(storage key, value)`, in declaration order, zero values included.
    fn fields(&self) -> Vec<(&'static str, FieldValue)>;

    fn from_document(doc: &Document) -> Self;

    /// Name of the first required field left blank, if any.
    fn missing_required(&self) -> Option<&'static str>;

    /// Converts into a storage document, omitting zero-valued fields.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] if a non-empty identity is not a valid store id.
    fn to_document(&self) -> Result<Document, IdError> {
        let mut doc = Document::new();
        for (key, value) in self.fields() {
            if value.is_zero() {
                continue;
            }
            if key == Self::ID_KEY {
                let raw = value.as_str().unwrap_or_default();
                doc.insert(key.to_string(), ObjectId::parse_str(raw)?.into());
            } else {
                doc.insert(key.to_string(), value);
            }
        }
        Ok(doc)
    }
}

/// Declares a storage model aligned with a wire record.
///
/// ```ignore
/// storage_model! {
///     pub struct TeacherModel <=> Teacher in "teachers" {
///         first_name: String => "first_name",
///     }
///     required [first_name]
/// }
/// ```
#[macro_export]
macro_rules! storage_model {
    (
        $(#[$meta:meta])*
        pub struct $model:ident <=> $wire:ident in $collection:literal {
            $( $field:ident : $ty:ty => $key:literal ),* $(,)?
        }
        required [ $( $req:ident ),* $(,)? ]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $model {
            pub id: String,
            $( pub $field: $ty, )*
        }

        impl From<&$wire> for $model {
            fn from(wire: &$wire) -> Self {
                Self {
                    id: wire.id.clone(),
                    $( $field: wire.$field.clone(), )*
                }
            }
        }

        impl From<&$model> for $wire {
            #[allow(clippy::needless_update)]
            fn from(model: &$model) -> Self {
                Self {
                    id: model.id.clone(),
                    $( $field: model.$field.clone(), )*
                    ..Default::default()
                }
            }
        }

        impl $crate::model::StorageModel for $model {
            type Wire = $wire;

            const COLLECTION: &'static str = $collection;

            fn from_wire(wire: &Self::Wire) -> Self {
                Self::from(wire)
            }

            fn to_wire(&self) -> Self::Wire {
                <$wire>::from(self)
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn fields(&self) -> Vec<(&'static str, $crate::types::FieldValue)> {
                use $crate::model::ModelField as _;
                vec![
                    (Self::ID_KEY, self.id.to_value()),
                    $( ($key, self.$field.to_value()), )*
                ]
            }

            fn from_document(doc: &$crate::types::Document) -> Self {
                use $crate::model::ModelField;
                Self {
                    id: doc.get(Self::ID_KEY).map(String::from_value).unwrap_or_default(),
                    $( $field: doc.get($key).map(<$ty>::from_value).unwrap_or_default(), )*
                }
            }

            fn missing_required(&self) -> Option<&'static str> {
                use $crate::model::ModelField as _;
                $(
                    if self.$req.is_zero() {
                        return Some(stringify!($req));
                    }
                )*
                None
            }
        }
    };
}

storage_model! {
    /// Stored teacher.
    pub struct TeacherModel <=> Teacher in "teachers" {
        first_name: String => "first_name",
        last_name: String => "last_name",
        email: String => "email",
        class: String => "class",
        subject: String => "subject",
    }
    required [first_name, last_name, email, class, subject]
}

storage_model! {
    /// Stored student.
    pub struct StudentModel <=> Student in "students" {
        first_name: String => "first_name",
        last_name: String => "last_name",
        email: String => "email",
        class: String => "class",
    }
    required [first_name, last_name, email, class]
}

storage_model! {
    /// Stored exec. `password` holds a password hash once persisted.
    pub struct ExecModel <=> Exec in "execs" {
        first_name: String => "first_name",
        last_name: String => "last_name",
        email: String => "email",
        username: String => "username",
        password: String => "password",
        role: String => "role",
        password_changed_at: String => "password_changed_at",
        user_created_at: String => "user_created_at",
        password_reset_token: String => "password_reset_token",
        password_token_expires: String => "password_token_expires",
        inactive_status: bool => "inactive_status",
    }
    required [first_name, last_name, email, username, password]
}
