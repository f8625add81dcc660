pub mod api;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod logger;
pub mod query;
pub mod repository;
pub mod service;
pub mod store;

pub use api::{AppState, router};
pub use config::AppConfig;
pub use context::CallContext;
pub use domain::{Page, Todo, TodoDto};
pub use errors::{StoreError, TodoError};
pub use repository::{StoreTodoRepository, TodoRepository};
pub use service::TodoService;
pub use store::{Store, StoreOptions};
