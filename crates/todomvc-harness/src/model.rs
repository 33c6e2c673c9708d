//! To-do records and the connection that loads and saves them through the
//! fixture service.

use std::ops::{Deref, DerefMut};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};

use crate::fixture::{Fixture, Method};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Todo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub complete: bool,
}

/// Strings stay strings, numbers are printed, anything else is rejected.
fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Todo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            complete: false,
        }
    }

    /// Build from loosely typed JSON: `{"id": 1, "name": 2}` becomes
    /// `id: "1", name: "2", complete: false`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .with_context(|| format!("todo must be an object, got {}", value))?;
        let id = object.get("id").and_then(coerce_string);
        let name = object
            .get("name")
            .and_then(coerce_string)
            .unwrap_or_default();
        let complete = match object.get("complete") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => anyhow::bail!("'complete' must be a boolean, got {}", other),
        };
        Ok(Self { id, name, complete })
    }

    pub fn toggle_complete(&mut self) {
        self.complete = !self.complete;
    }
}

/// Ordered list of todos with the derived views the UI needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoList(Vec<Todo>);

impl TodoList {
    pub fn new(todos: Vec<Todo>) -> Self {
        Self(todos)
    }

    pub fn from_values(values: &[Value]) -> Result<Self> {
        values
            .iter()
            .map(Todo::from_value)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn active(&self) -> Vec<&Todo> {
        self.0.iter().filter(|todo| !todo.complete).collect()
    }

    pub fn complete(&self) -> Vec<&Todo> {
        self.0.iter().filter(|todo| todo.complete).collect()
    }

    /// True when every todo is complete (vacuously true for an empty list).
    pub fn all_complete(&self) -> bool {
        self.0.iter().all(|todo| todo.complete)
    }

    pub fn into_inner(self) -> Vec<Todo> {
        self.0
    }
}

impl Deref for TodoList {
    type Target = Vec<Todo>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for TodoList {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Talks to `/api/todos` on a [`Fixture`].
#[derive(Clone)]
pub struct TodoConnection {
    fixture: Fixture,
    base: String,
}

impl TodoConnection {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            base: "/api/todos".to_string(),
        }
    }

    /// Property names that identify a todo.
    pub fn identity() -> &'static [&'static str] {
        &["id"]
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub async fn get_list(&self) -> Result<TodoList> {
        let response = self
            .fixture
            .request(Method::Get, &self.base, Value::Null)
            .await?;
        let items = response
            .get("data")
            .and_then(Value::as_array)
            .context("GET /api/todos must answer {\"data\": [...]}")?;
        TodoList::from_values(items)
    }

    /// Create (no id yet) or update the todo; returns the stored version.
    pub async fn save(&self, todo: &Todo) -> Result<Todo> {
        let body = json!({ "name": todo.name, "complete": todo.complete });
        let response = match &todo.id {
            None => self.fixture.request(Method::Post, &self.base, body).await?,
            Some(id) => {
                let url = format!("{}/{}", self.base, id);
                self.fixture.request(Method::Put, &url, body).await?
            }
        };
        let saved = Todo::from_value(&response)?;
        if saved.id.is_none() {
            anyhow::bail!("save response carries no id: {}", response);
        }
        Ok(saved)
    }

    pub async fn destroy(&self, todo: &Todo) -> Result<()> {
        let id = todo
            .id
            .as_ref()
            .context("cannot destroy a todo that was never saved")?;
        let url = format!("{}/{}", self.base, id);
        self.fixture.request(Method::Delete, &url, Value::Null).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::install_todos_store;
    use std::time::Duration;

    #[test]
    fn coerces_ids_and_names() {
        let todo = Todo::from_value(&json!({"id": 1, "name": 2})).unwrap();
        assert_eq!(todo.id.as_deref(), Some("1"));
        assert_eq!(todo.name, "2");
        assert!(!todo.complete);
    }

    #[test]
    fn rejects_non_objects_and_bad_flags() {
        assert!(Todo::from_value(&json!([1, 2])).is_err());
        assert!(Todo::from_value(&json!({"complete": "yes"})).is_err());
    }

    #[test]
    fn toggle_flips_complete() {
        let mut todo = Todo::new("walk dog");
        todo.toggle_complete();
        assert!(todo.complete);
        todo.toggle_complete();
        assert!(!todo.complete);
    }

    #[test]
    fn list_views() {
        let mut todos = TodoList::from_values(&[
            json!({"complete": true}),
            json!({}),
            json!({"complete": true}),
        ])
        .unwrap();
        assert_eq!(todos.active().len(), 1);
        assert_eq!(todos.complete().len(), 2);
        assert!(!todos.all_complete());

        todos[1].complete = true;
        assert!(todos.all_complete());
        assert!(TodoList::default().all_complete());
    }

    #[test]
    fn unsaved_todo_serializes_without_id() {
        assert_eq!(
            serde_json::to_value(Todo::new("x")).unwrap(),
            json!({"name": "x", "complete": false})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connection_round_trip() {
        let fixture = Fixture::new(Duration::from_millis(10));
        install_todos_store(&fixture, vec![json!({"id": "1", "name": "dishes", "complete": false})]);
        let connection = TodoConnection::new(fixture);

        let list = connection.get_list().await.unwrap();
        assert_eq!(list.len(), 1);

        let mut todo = connection
            .save(&Todo {
                complete: true,
                ..Todo::new("make a fixture")
            })
            .await
            .unwrap();
        assert_eq!(todo.id.as_deref(), Some("2"));

        todo.complete = false;
        let saved = connection.save(&todo).await.unwrap();
        assert_eq!(saved, todo);

        connection.destroy(&saved).await.unwrap();
        assert_eq!(connection.get_list().await.unwrap().len(), 1);
        assert!(connection.destroy(&Todo::new("never saved")).await.is_err());
    }
}
