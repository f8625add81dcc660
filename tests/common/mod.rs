#![allow(dead_code)]

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use resik_todo::domain::{Audit, Page, Todo, TodoDto};
use resik_todo::query::QuerySpec;
use resik_todo::{CallContext, Store, StoreTodoRepository, TodoError, TodoRepository};

/// Repository double: a plain vector, call counting, and an injectable failure.
#[derive(Default)]
pub struct MemoryRepo {
    pub todos: Mutex<Vec<Todo>>,
    pub fail: Mutex<Option<TodoError>>,
    pub last_query: Mutex<Option<QuerySpec>>,
    pub calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl MemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(err: TodoError) -> Arc<Self> {
        let repo = Self::default();
        *repo.fail.lock() = Some(err);
        Arc::new(repo)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), TodoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fail.lock().clone().map_or(Ok(()), Err)
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut Todo)) -> Result<Todo, TodoError> {
        let mut todos = self.todos.lock();
        let todo = todos.iter_mut().find(|t| t.id == id).ok_or_else(|| TodoError::not_found(id))?;
        f(todo);
        todo.audit.updated_at = Utc::now();
        Ok(todo.clone())
    }
}

impl TodoRepository for MemoryRepo {
    async fn create(&self, _ctx: &CallContext, dto: TodoDto) -> Result<Todo, TodoError> {
        self.enter()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let todo = Todo {
            id: format!("{n:024x}"),
            title: dto.title,
            description: dto.description,
            is_completed: false,
            audit: Audit::at(Utc::now()),
        };
        self.todos.lock().push(todo.clone());
        Ok(todo)
    }

    async fn get_by_id(&self, _ctx: &CallContext, id: &str) -> Result<Todo, TodoError> {
        self.enter()?;
        self.todos.lock().iter().find(|t| t.id == id).cloned().ok_or_else(|| TodoError::not_found(id))
    }

    async fn get(&self, _ctx: &CallContext, query: QuerySpec) -> Result<Page<Todo>, TodoError> {
        self.enter()?;
        let todos = self.todos.lock();
        let skip = usize::try_from(query.skip.unwrap_or(0)).unwrap_or(0);
        let limit = query.limit.and_then(|l| usize::try_from(l).ok()).unwrap_or(usize::MAX);
        let items = todos.iter().skip(skip).take(limit).cloned().collect();
        let total = i64::try_from(todos.len()).unwrap();
        *self.last_query.lock() = Some(query);
        Ok(Page { items, total })
    }

    async fn update(&self, _ctx: &CallContext, id: &str, dto: TodoDto) -> Result<Todo, TodoError> {
        self.enter()?;
        self.modify(id, |t| {
            t.title = dto.title;
            t.description = dto.description;
        })
    }

    async fn update_status(&self, _ctx: &CallContext, id: &str, is_completed: bool) -> Result<Todo, TodoError> {
        self.enter()?;
        self.modify(id, |t| t.is_completed = is_completed)
    }

    async fn delete(&self, _ctx: &CallContext, id: &str) -> Result<(), TodoError> {
        self.enter()?;
        let mut todos = self.todos.lock();
        let before = todos.len();
        todos.retain(|t| t.id != id);
        if todos.len() == before { Err(TodoError::not_found(id)) } else { Ok(()) }
    }
}

pub fn store_repo() -> StoreTodoRepository {
    StoreTodoRepository::new(Arc::new(Store::in_memory()))
}

pub fn ctx() -> CallContext {
    CallContext::background()
}

/// Collects every formatted log record of the test binary.
struct Capture(Mutex<Vec<String>>);

impl log::Log for Capture {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        self.0.lock().push(format!("{}", record.args()));
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

pub fn capture_logs() {
    let _ = log::set_logger(&CAPTURE);
    log::set_max_level(log::LevelFilter::Info);
}

pub fn logged() -> Vec<String> {
    CAPTURE.0.lock().clone()
}
