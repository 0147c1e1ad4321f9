//! Wire records exchanged at the RPC boundary.
//!
//! All fields are plain values; the zero value (empty string, `false`) means
//! "unset". An empty `id` marks a record that has not been persisted yet.

use std::fmt;

use serde::{Deserialize, Serialize};

const REDACTED: &str = "<redacted>";

/// Teacher record as seen by RPC callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Teacher {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub class: String,
    pub subject: String,
}

/// Student record as seen by RPC callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub class: String,
}

/// Administrator ("exec") record as seen by RPC callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Exec {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub password_changed_at: String,
    pub user_created_at: String,
    pub password_reset_token: String,
    pub password_token_expires: String,
    pub inactive_status: bool,
}

/// Sort direction. Anything not explicitly descending sorts ascending.
///
/// Decodes `DESC` and `DSC` (any case) as [`Order::Desc`]; every other
/// string, including unknown ones, decodes as [`Order::Asc`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl From<String> for Order {
    fn from(direction: String) -> Self {
        if direction.eq_ignore_ascii_case("DESC") || direction.eq_ignore_ascii_case("DSC") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// A single sort directive from a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SortField {
    pub field: String,
    pub order: Order,
}

impl SortField {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Desc,
        }
    }
}

/// Filtered, sorted listing of teachers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetTeachersRequest {
    pub teacher: Option<Teacher>,
    pub sort_by: Vec<SortField>,
}

/// Filtered, sorted listing of students.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetStudentsRequest {
    pub student: Option<Student>,
    pub sort_by: Vec<SortField>,
}

/// Filtered, sorted listing of execs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetExecsRequest {
    pub exec: Option<Exec>,
    pub sort_by: Vec<SortField>,
}

/// Result of a bulk delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConfirmation {
    pub status: String,
    pub deleted_ids: Vec<String>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecLoginRequest {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ExecLoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecLoginRequest")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecLoginResponse {
    pub status: bool,
    pub token: String,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePasswordRequest {
    pub id: String,
    pub current_password: String,
    pub new_password: String,
}

impl fmt::Debug for UpdatePasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdatePasswordRequest")
            .field("id", &self.id)
            .field("current_password", &REDACTED)
            .field("new_password", &REDACTED)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordResponse {
    pub password_updated: bool,
    pub token: String,
}
