mod todo;

pub use todo::{Audit, Page, StatusDto, Todo, TodoDto};
