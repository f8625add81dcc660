//! Validation in front of the repository.

use std::sync::Arc;

use crate::context::CallContext;
use crate::domain::{Page, Todo, TodoDto};
use crate::errors::TodoError;
use crate::query::QuerySpec;
use crate::repository::TodoRepository;

pub struct TodoService<R: TodoRepository> {
    repo: Arc<R>,
}

impl<R: TodoRepository> Clone for TodoService<R> {
    fn clone(&self) -> Self {
        Self { repo: Arc::clone(&self.repo) }
    }
}

fn validate_dto(dto: &TodoDto) -> Result<(), TodoError> {
    if dto.title.trim().is_empty() {
        return Err(TodoError::Validation("title is required".into()));
    }
    if dto.description.trim().is_empty() {
        return Err(TodoError::Validation("description is required".into()));
    }
    Ok(())
}

fn validate_id(id: &str) -> Result<(), TodoError> {
    if id.trim().is_empty() {
        return Err(TodoError::Validation("id is required".into()));
    }
    Ok(())
}

impl<R: TodoRepository> TodoService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// # Errors
    /// `Validation` for a blank title or description, otherwise whatever the repository reports.
    pub async fn create(&self, ctx: &CallContext, dto: TodoDto) -> Result<Todo, TodoError> {
        validate_dto(&dto)?;
        self.repo.create(ctx, dto).await
    }

    /// # Errors
    /// `Validation` for an empty id, `NotFound`, or `StoreRead`.
    pub async fn get_by_id(&self, ctx: &CallContext, id: &str) -> Result<Todo, TodoError> {
        validate_id(id)?;
        self.repo.get_by_id(ctx, id).await
    }

    /// # Errors
    /// `StoreRead` when counting or fetching fails.
    pub async fn get(&self, ctx: &CallContext, query: QuerySpec) -> Result<Page<Todo>, TodoError> {
        self.repo.get(ctx, query).await
    }

    /// # Errors
    /// `Validation`, `NotFound`, or `StoreWrite`.
    pub async fn update(&self, ctx: &CallContext, id: &str, dto: TodoDto) -> Result<Todo, TodoError> {
        validate_id(id)?;
        validate_dto(&dto)?;
        self.repo.update(ctx, id, dto).await
    }

    /// # Errors
    /// `Validation`, `NotFound`, or `StoreWrite`.
    pub async fn update_status(&self, ctx: &CallContext, id: &str, is_completed: bool) -> Result<Todo, TodoError> {
        validate_id(id)?;
        self.repo.update_status(ctx, id, is_completed).await
    }

    /// # Errors
    /// `Validation`, `NotFound`, or `StoreWrite`.
    pub async fn delete(&self, ctx: &CallContext, id: &str) -> Result<(), TodoError> {
        validate_id(id)?;
        self.repo.delete(ctx, id).await
    }
}
