//! Campus core: wire records, storage models, entity mapping and query building.

pub mod messages;
pub mod model;
pub mod query;
pub mod types;

pub use messages::{
    DeleteConfirmation, Exec, ExecLoginRequest, ExecLoginResponse, GetExecsRequest,
    GetStudentsRequest, GetTeachersRequest, Order, SortField, Student, Teacher,
    UpdatePasswordRequest, UpdatePasswordResponse,
};
pub use model::{ExecModel, ModelField, StorageModel, StudentModel, TeacherModel};
pub use query::{build_filter, build_sort, Condition, Filter, QueryError, SortDirection, SortSpec};
pub use types::{Document, FieldValue, IdError, ObjectId};

