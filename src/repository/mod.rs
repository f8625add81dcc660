//! Persistence boundary for todos.

mod store;

use std::future::Future;

use crate::context::CallContext;
use crate::domain::{Page, Todo, TodoDto};
use crate::errors::TodoError;
use crate::query::QuerySpec;

pub use store::StoreTodoRepository;

/// CRUD over the todo collection. Every call carries the caller's deadline and cancellation.
pub trait TodoRepository: Send + Sync + 'static {
    fn create(&self, ctx: &CallContext, dto: TodoDto) -> impl Future<Output = Result<Todo, TodoError>> + Send;

    fn get_by_id(&self, ctx: &CallContext, id: &str) -> impl Future<Output = Result<Todo, TodoError>> + Send;

    /// Page selected by `query.skip`/`query.limit`, with `total` counted over the filter alone.
    fn get(&self, ctx: &CallContext, query: QuerySpec) -> impl Future<Output = Result<Page<Todo>, TodoError>> + Send;

    fn update(
        &self,
        ctx: &CallContext,
        id: &str,
        dto: TodoDto,
    ) -> impl Future<Output = Result<Todo, TodoError>> + Send;

    fn update_status(
        &self,
        ctx: &CallContext,
        id: &str,
        is_completed: bool,
    ) -> impl Future<Output = Result<Todo, TodoError>> + Send;

    fn delete(&self, ctx: &CallContext, id: &str) -> impl Future<Output = Result<(), TodoError>> + Send;
}
