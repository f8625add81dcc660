use bson::doc;
use bson::oid::ObjectId;
use chrono::Utc;
use std::sync::Arc;

use super::TodoRepository;
use crate::context::CallContext;
use crate::domain::{Audit, Page, Todo, TodoDto};
use crate::errors::{StoreError, TodoError};
use crate::query::{QuerySpec, UpdateDoc};
use crate::store::Store;

/// `TodoRepository` over the embedded document store. Store calls run on the blocking pool.
#[derive(Debug, Clone)]
pub struct StoreTodoRepository {
    store: Arc<Store>,
    collection: Arc<str>,
}

impl StoreTodoRepository {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_collection(store, Todo::COLLECTION)
    }

    #[must_use]
    pub fn with_collection(store: Arc<Store>, collection: &str) -> Self {
        Self { store, collection: Arc::from(collection) }
    }

    async fn run<T, F>(&self, ctx: &CallContext, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Store, &CallContext, &str) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let collection = Arc::clone(&self.collection);
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || f(&store, &ctx, &collection))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    async fn patch(&self, ctx: &CallContext, id: &str, update: UpdateDoc) -> Result<Todo, TodoError> {
        let filter = doc! { "_id": id };
        let update = update.current_date("audit.updatedAt").to_document();
        let updated = self
            .run(ctx, move |s, c, col| s.find_one_and_update(c, col, &filter, &update))
            .await
            .map_err(|e| {
                log::error!("update todo {id} failed: {e}");
                TodoError::write(&e)
            })?
            .ok_or_else(|| TodoError::not_found(id))?;
        decode(&updated)
    }
}

fn decode(doc: &bson::Document) -> Result<Todo, TodoError> {
    Todo::from_document(doc).map_err(|e| {
        log::error!("decode todo failed: {e}");
        TodoError::read(&e)
    })
}

impl TodoRepository for StoreTodoRepository {
    async fn create(&self, ctx: &CallContext, dto: TodoDto) -> Result<Todo, TodoError> {
        let todo = Todo {
            id: ObjectId::new().to_hex(),
            title: dto.title,
            description: dto.description,
            is_completed: false,
            audit: Audit::at(Utc::now()),
        };
        let doc = todo.to_document().map_err(|e| {
            log::error!("encode todo failed: {e}");
            TodoError::write(&e)
        })?;
        self.run(ctx, move |s, c, col| s.insert_one(c, col, doc)).await.map_err(|e| {
            log::error!("create todo failed: {e}");
            TodoError::write(&e)
        })?;
        Ok(todo)
    }

    async fn get_by_id(&self, ctx: &CallContext, id: &str) -> Result<Todo, TodoError> {
        let filter = doc! { "_id": id };
        let found = self
            .run(ctx, move |s, c, col| s.find_one(c, col, &filter))
            .await
            .map_err(|e| {
                log::error!("get todo {id} failed: {e}");
                TodoError::read(&e)
            })?
            .ok_or_else(|| TodoError::not_found(id))?;
        decode(&found)
    }

    async fn get(&self, ctx: &CallContext, query: QuerySpec) -> Result<Page<Todo>, TodoError> {
        let filter = query.filter.to_document();
        let total = self.run(ctx, move |s, c, col| s.count_documents(c, col, &filter)).await.map_err(|e| {
            log::error!("count todos failed: {e}");
            TodoError::read(&e)
        })?;

        let pipeline = query.build_pipeline();
        let docs = self.run(ctx, move |s, c, col| s.aggregate(c, col, &pipeline)).await.map_err(|e| {
            log::error!("list todos failed: {e}");
            TodoError::read(&e)
        })?;
        let items = docs.iter().map(decode).collect::<Result<Vec<_>, _>>()?;
        Ok(Page { items, total })
    }

    async fn update(&self, ctx: &CallContext, id: &str, dto: TodoDto) -> Result<Todo, TodoError> {
        self.patch(ctx, id, UpdateDoc::new().set("title", dto.title).set("description", dto.description)).await
    }

    async fn update_status(&self, ctx: &CallContext, id: &str, is_completed: bool) -> Result<Todo, TodoError> {
        self.patch(ctx, id, UpdateDoc::new().set("isCompleted", is_completed)).await
    }

    async fn delete(&self, ctx: &CallContext, id: &str) -> Result<(), TodoError> {
        let filter = doc! { "_id": id };
        self.run(ctx, move |s, c, col| s.find_one_and_delete(c, col, &filter))
            .await
            .map_err(|e| {
                log::error!("delete todo {id} failed: {e}");
                TodoError::write(&e)
            })?
            .map(|_| ())
            .ok_or_else(|| TodoError::not_found(id))
    }
}
