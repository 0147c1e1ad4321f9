//! Request envelope, per-call context, responses and the error taxonomy.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::{Duration, SystemTime};

use campus_core::{
    DeleteConfirmation, Exec, ExecLoginRequest, ExecLoginResponse, GetExecsRequest,
    GetStudentsRequest, GetTeachersRequest, IdError, QueryError, Student, Teacher,
    UpdatePasswordRequest, UpdatePasswordResponse,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Well-known service names used for routing.
pub mod service_names {
    pub const TEACHERS: &str = "teachers";
    pub const STUDENTS: &str = "students";
    pub const EXECS: &str = "execs";
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Request or response metadata. Keys are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// Authenticated caller, attached to the context by the authentication stage.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub role: String,
    /// The bearer token the caller presented.
    pub token: String,
    pub expires_at: SystemTime,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Context carried with every call through the pipeline.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub call_id: u64,
    /// Network address of the caller, as reported by the transport.
    pub peer_addr: Option<SocketAddr>,
    pub metadata: Metadata,
    /// Point after which persistence calls are abandoned.
    pub deadline: Option<Instant>,
    /// Cancelled by the transport when the caller goes away.
    pub cancellation: CancellationToken,
    pub principal: Option<Principal>,
}

impl CallContext {
    #[must_use]
    pub fn new(call_id: u64) -> Self {
        Self {
            call_id,
            peer_addr: None,
            metadata: Metadata::new(),
            deadline: None,
            cancellation: CancellationToken::new(),
            principal: None,
        }
    }

    #[must_use]
    pub fn with_peer(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_metadata("authorization", format!("Bearer {token}"))
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// One variant per RPC method.
#[derive(Debug, Clone)]
pub enum Request {
    AddTeachers(Vec<Teacher>),
    GetTeachers(GetTeachersRequest),
    UpdateTeachers(Vec<Teacher>),
    DeleteTeachers(Vec<String>),
    GetStudentsByTeacherId(String),
    GetStudentCountByTeacherId(String),
    AddStudents(Vec<Student>),
    GetStudents(GetStudentsRequest),
    UpdateStudents(Vec<Student>),
    DeleteStudents(Vec<String>),
    AddExecs(Vec<Exec>),
    GetExecs(GetExecsRequest),
    UpdateExecs(Vec<Exec>),
    DeleteExecs(Vec<String>),
    Login(ExecLoginRequest),
    UpdatePassword(UpdatePasswordRequest),
    DeactivateUser(Vec<String>),
    Logout,
}

impl Request {
    /// Name of the service that owns this method.
    #[must_use]
    pub fn service_name(&self) -> &'static str {
        match self {
            Self::AddTeachers(_)
            | Self::GetTeachers(_)
            | Self::UpdateTeachers(_)
            | Self::DeleteTeachers(_)
            | Self::GetStudentsByTeacherId(_)
            | Self::GetStudentCountByTeacherId(_) => service_names::TEACHERS,
            Self::AddStudents(_)
            | Self::GetStudents(_)
            | Self::UpdateStudents(_)
            | Self::DeleteStudents(_) => service_names::STUDENTS,
            Self::AddExecs(_)
            | Self::GetExecs(_)
            | Self::UpdateExecs(_)
            | Self::DeleteExecs(_)
            | Self::Login(_)
            | Self::UpdatePassword(_)
            | Self::DeactivateUser(_)
            | Self::Logout => service_names::EXECS,
        }
    }

    /// Fully-qualified method name, as a transport would report it.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::AddTeachers(_) => "/campus.TeachersService/AddTeachers",
            Self::GetTeachers(_) => "/campus.TeachersService/GetTeachers",
            Self::UpdateTeachers(_) => "/campus.TeachersService/UpdateTeachers",
            Self::DeleteTeachers(_) => "/campus.TeachersService/DeleteTeachers",
            Self::GetStudentsByTeacherId(_) => "/campus.TeachersService/GetStudentsByTeacherId",
            Self::GetStudentCountByTeacherId(_) => {
                "/campus.TeachersService/GetStudentCountByTeacherId"
            }
            Self::AddStudents(_) => "/campus.StudentsService/AddStudents",
            Self::GetStudents(_) => "/campus.StudentsService/GetStudents",
            Self::UpdateStudents(_) => "/campus.StudentsService/UpdateStudents",
            Self::DeleteStudents(_) => "/campus.StudentsService/DeleteStudents",
            Self::AddExecs(_) => "/campus.ExecsService/AddExecs",
            Self::GetExecs(_) => "/campus.ExecsService/GetExecs",
            Self::UpdateExecs(_) => "/campus.ExecsService/UpdateExecs",
            Self::DeleteExecs(_) => "/campus.ExecsService/DeleteExecs",
            Self::Login(_) => "/campus.ExecsService/Login",
            Self::UpdatePassword(_) => "/campus.ExecsService/UpdatePassword",
            Self::DeactivateUser(_) => "/campus.ExecsService/DeactivateUser",
            Self::Logout => "/campus.ExecsService/Logout",
        }
    }
}

/// A request as it travels through the pipeline.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub ctx: CallContext,
    pub payload: Request,
}

impl RpcRequest {
    #[must_use]
    pub fn new(ctx: CallContext, payload: Request) -> Self {
        Self { ctx, payload }
    }

    #[must_use]
    pub fn ctx(&self) -> &CallContext {
        &self.ctx
    }

    #[must_use]
    pub fn method(&self) -> &'static str {
        self.payload.method()
    }
}

/// Successful response payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Teachers(Vec<Teacher>),
    Students(Vec<Student>),
    Execs(Vec<Exec>),
    Deleted(DeleteConfirmation),
    StudentCount(u64),
    Login(ExecLoginResponse),
    PasswordUpdated(UpdatePasswordResponse),
    Confirmation(bool),
    LoggedOut,
}

/// Response payload plus headers annotated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    pub payload: Response,
    pub headers: Metadata,
}

impl RpcResponse {
    #[must_use]
    pub fn new(payload: Response) -> Self {
        Self {
            payload,
            headers: Metadata::new(),
        }
    }
}

/// Boxed future returned by every stage of the pipeline.
pub type RpcFuture = Pin<Box<dyn Future<Output = Result<RpcResponse, RpcError>> + Send>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error kind rendered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Ok,
    InvalidArgument,
    Unauthenticated,
    ResourceExhausted,
    Internal,
}

impl Code {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::InvalidArgument => "invalid_argument",
            Self::Unauthenticated => "unauthenticated",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified error returned by every stage and handler.
///
/// Messages never carry passwords or tokens.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl RpcError {
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    #[must_use]
    pub fn internal(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Internal(anyhow::anyhow!(message))
    }

    #[must_use]
    pub fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::Unauthenticated(_) => Code::Unauthenticated,
            Self::ResourceExhausted(_) => Code::ResourceExhausted,
            Self::Internal(_) => Code::Internal,
        }
    }
}

impl From<QueryError> for RpcError {
    fn from(err: QueryError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<IdError> for RpcError {
    fn from(err: IdError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
