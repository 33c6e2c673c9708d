//! The TodoMVC acceptance suite, run against the demo [`App`].
//!
//! Every case gets the same [`SuiteContext`]. Cases run in order and build on
//! each other's effects (a deleted todo stays deleted), so filtering out
//! early cases can change what later ones see.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::app::App;
use crate::config::HarnessConfig;
use crate::dom::{Document, Element, EventKind};
use crate::fixture::{Fixture, FixtureRequest, Method, Route, install_todos_store};
use crate::model::{Todo, TodoConnection, TodoList};
use crate::poll::{PollTask, wait_for_with};
use crate::suite::{Assert, Suite};

/// State shared by the setup hook and every case.
pub struct SuiteContext {
    pub document: Document,
    pub fixture: Fixture,
    pub app: App,
    pub connection: TodoConnection,
    pub config: HarnessConfig,
    /// How long the first setup waited for rows to show up.
    pub time_to_show_todos: Option<Duration>,
}

pub fn seed_todos() -> Vec<Value> {
    vec![
        json!({"id": "1", "name": "mow lawn", "complete": false}),
        json!({"id": "2", "name": "dishes", "complete": true}),
        json!({"id": "3", "name": "laundry", "complete": false}),
    ]
}

impl SuiteContext {
    /// Start the fixture service and mount the app. Must be called inside a
    /// `LocalSet`; the app starts loading right away.
    pub fn launch(config: HarnessConfig) -> Self {
        let fixture = Fixture::new(config.timing.initial_fixture_delay());
        install_todos_store(&fixture, seed_todos());
        let connection = TodoConnection::new(fixture.clone());
        let document = Document::new();
        let app = App::mount(&document, connection.clone());
        log::info!(
            "launched TodoMVC (fixture delay {:?})",
            fixture.delay()
        );
        Self {
            document,
            fixture,
            app,
            connection,
            config,
            time_to_show_todos: None,
        }
    }

    /// Poll `predicate` with the configured interval and timeout.
    pub fn wait_for<F>(&self, predicate: F) -> PollTask<impl FnMut() -> Result<bool> + use<F>>
    where
        F: FnMut() -> bool,
    {
        wait_for_with(predicate, self.config.timing.wait_options())
    }

    /// One poll interval, for steps that wait a beat instead of a condition.
    async fn tick(&self) {
        tokio::time::sleep(self.config.timing.poll_interval()).await;
    }

    fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.document.count(selector)?)
    }

    fn require(&self, selector: &str) -> Result<Element> {
        self.document
            .query_selector(selector)?
            .with_context(|| format!("no element matches {}", selector))
    }

    fn rows(&self) -> Result<Vec<Element>> {
        Ok(self.document.query_selector_all(".todo")?)
    }

    /// Wait until `selector` matches exactly `n` elements.
    async fn wait_for_count(&self, selector: &str, n: usize) -> Result<()> {
        let document = self.document.clone();
        let waiting = format!("waiting for {} x {}", n, selector);
        let selector = selector.to_string();
        self.wait_for(move || document.count(&selector).unwrap_or(0) == n)
            .await
            .context(waiting)?;
        Ok(())
    }

    async fn wait_for_idle(&self) -> Result<()> {
        let app = self.app.clone();
        self.wait_for(move || app.is_idle())
            .await
            .context("waiting for pending requests")?;
        Ok(())
    }

    /// Swap every fixture route for `trap` and hand back the originals.
    fn trap_routes(
        &self,
        method: Method,
        template: &str,
        trap: impl Fn(&FixtureRequest) -> Result<Value> + 'static,
    ) -> Vec<Route> {
        let originals = self.fixture.take_routes();
        self.fixture.on(method, template, trap);
        originals
    }

    fn restore_routes(&self, originals: Vec<Route>) {
        self.fixture.restore_routes(originals);
    }
}

/// Answers a trapped `PUT /api/todos/{id}` with what was sent and records it.
fn echo_put(requests: Rc<RefCell<Vec<Value>>>) -> impl Fn(&FixtureRequest) -> Result<Value> {
    move |request| {
        requests.borrow_mut().push(request.data.clone());
        Ok(json!({
            "id": request.data.get("id").cloned().unwrap_or(Value::Null),
            "name": request.data.get("name").cloned().unwrap_or(Value::Null),
            "complete": request.data.get("complete").cloned().unwrap_or(Value::Null),
        }))
    }
}

// Waits for the app to show its list. The first run records how long that
// took, then speeds the fixture up for everything after it.
fn setup(ctx: &mut SuiteContext) -> LocalBoxFuture<'_, Result<()>> {
    async move {
        let start = Instant::now();
        let document = ctx.document.clone();
        ctx.wait_for(move || document.count(".todo").unwrap_or(0) > 0)
            .await
            .context("waiting for .todo")?;
        if ctx.time_to_show_todos.is_none() {
            let elapsed = start.elapsed();
            log::info!("todos shown after {:?}", elapsed);
            ctx.time_to_show_todos = Some(elapsed);
            ctx.fixture.set_delay(ctx.config.timing.fixture_delay());
        }
        ctx.wait_for_idle().await
    }
    .boxed_local()
}

fn setup_works<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let titled = ctx
            .document
            .query_selector_all("h1")?
            .iter()
            .any(|h1| h1.text_content() == "TodoMVC");
        assert.ok(titled, "There is an H1 titled TodoMVC");
        Ok(())
    }
    .boxed_local()
}

fn defined_todo<'a>(_: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let mut todo = Todo::from_value(&json!({"id": 1, "name": 2}))?;
        assert.equal(todo.id.as_deref(), Some("1"), "id is a string");
        assert.equal(todo.name.as_str(), "2", "name is a string");
        assert.equal(todo.complete, false, "complete defaults to false");
        todo.toggle_complete();
        assert.equal(todo.complete, true, "toggle_complete works");
        Ok(())
    }
    .boxed_local()
}

fn defined_todo_list<'a>(_: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let mut todos =
            TodoList::from_values(&[json!({"complete": true}), json!({}), json!({"complete": true})])?;
        assert.equal(todos.len(), 3, "each item in a TodoList is a Todo");
        assert.equal(todos.active().len(), 1, "one active");
        assert.equal(todos.complete().len(), 2, "two complete");
        assert.equal(todos.all_complete(), false, "not all_complete");
        todos[1].complete = true;
        assert.equal(todos.all_complete(), true, "all_complete");
        Ok(())
    }
    .boxed_local()
}

fn rendered_list<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        assert.ok(
            ctx.document.query_selector(".todo.editing")?.is_none(),
            "there's nothing being edited",
        );
        let todos = ctx.app.todos();
        assert.ok(!todos.is_empty(), "there's a todo list");

        let items_left = ctx.require("#todo-count strong")?;
        assert.equal(
            items_left.text_content(),
            todos.active().len().to_string(),
            "<strong>X</strong> items left",
        );
        let clear_completed = ctx.require("#clear-completed")?;
        assert.equal(
            clear_completed.child_node_count(),
            3,
            "Clear completed (X) needs live-binding",
        );

        let rows = ctx.rows()?;
        let checkboxes = ctx.document.query_selector_all(".todo .toggle")?;
        assert.equal(rows.len(), todos.len(), "one row per todo");
        for ((todo, row), checkbox) in todos.iter().zip(&rows).zip(&checkboxes) {
            assert.equal(
                row.has_class("completed"),
                todo.complete,
                "has completed correctly in class list",
            );
            assert.equal(
                checkbox.checked(),
                todo.complete,
                "<input type=checkbox/> is checked correctly",
            );
        }
        Ok(())
    }
    .boxed_local()
}

fn toggling_with_event_binding<'a>(
    ctx: &'a mut SuiteContext,
    assert: &'a mut Assert,
) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let checkbox = ctx.require(".todo .toggle")?;
        if checkbox.has_attribute("checked:bind") {
            assert.ok(true, "skipping because the checkbox uses two-way bindings");
            return Ok(());
        }
        let items_left = ctx.require("#todo-count strong")?;
        let before = items_left.text_content();
        checkbox.dispatch(EventKind::Click);
        assert.ok(before != items_left.text_content(), "X items left changes");
        checkbox.dispatch(EventKind::Click);
        assert.ok(before == items_left.text_content(), "X items left changes back");
        Ok(())
    }
    .boxed_local()
}

fn toggling_with_data_bindings<'a>(
    ctx: &'a mut SuiteContext,
    assert: &'a mut Assert,
) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let checkbox = ctx.require(".todo .toggle")?;
        if !checkbox.has_attribute("checked:bind") {
            assert.ok(false, "not trying two-way DOM data bindings yet");
            return Ok(());
        }
        let items_left = ctx.require("#todo-count strong")?;
        let before = items_left.text_content();

        checkbox.set_checked(!checkbox.checked());
        checkbox.dispatch(EventKind::Change);
        assert.ok(before != items_left.text_content(), "X items left changes");

        checkbox.set_checked(!checkbox.checked());
        checkbox.dispatch(EventKind::Change);
        assert.ok(before == items_left.text_content(), "X items left changes back");
        Ok(())
    }
    .boxed_local()
}

fn todo_identity<'a>(_: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        assert.deep_equal(&TodoConnection::identity(), &json!(["id"]), "identity is set");
        Ok(())
    }
    .boxed_local()
}

fn simulate_service<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let fixture = &ctx.fixture;
        fixture.set_delay(ctx.config.timing.fixture_delay());

        let response = fixture.request(Method::Get, "/api/todos", Value::Null).await?;
        let data = response.get("data").and_then(Value::as_array);
        assert.ok(data.is_some(), "data is array");
        let data = data.cloned().unwrap_or_default();
        assert.ok(!data.is_empty(), "data has at least one item");
        if let Some(first) = data.first() {
            assert.ok(
                first.get("id").is_some() && first.get("name").is_some() && first.get("complete").is_some(),
                "has id, name, and complete",
            );
        }

        let created = fixture
            .request(Method::Post, "/api/todos", json!({"name": "make a fixture", "complete": true}))
            .await?;
        let id = created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        assert.ok(id.is_some(), "POST has an id value sent back");
        let id = id.context("POST /api/todos answered without an id")?;

        let url = format!("/api/todos/{}", id);
        let updated = fixture
            .request(Method::Put, &url, json!({"name": "make a fixture", "complete": false}))
            .await?;
        assert.deep_equal(
            &updated,
            &json!({"name": "make a fixture", "complete": false, "id": id}),
            "updated data",
        );

        fixture.request(Method::Delete, &url, Value::Null).await?;
        assert.ok(true, "delete is successful");
        Ok(())
    }
    .boxed_local()
}

fn connecting_to_service<'a>(
    ctx: &'a mut SuiteContext,
    assert: &'a mut Assert,
) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let todos = ctx.connection.get_list().await?;
        assert.ok(!todos.is_empty(), "data has at least one item");
        if let Some(first) = todos.first() {
            assert.ok(first.id.is_some() && !first.name.is_empty(), "has id, name, and complete");
        }

        let mut todo = ctx
            .connection
            .save(&Todo {
                complete: true,
                ..Todo::new("make a fixture")
            })
            .await?;
        assert.ok(todo.id.is_some(), "save has an id value sent back");
        let id = todo.id.clone();

        todo.complete = false;
        let todo = ctx.connection.save(&todo).await?;
        assert.deep_equal(
            &todo,
            &json!({"name": "make a fixture", "complete": false, "id": id}),
            "updated data",
        );
        ctx.connection.destroy(&todo).await?;
        assert.ok(true, "delete is successful");
        Ok(())
    }
    .boxed_local()
}

fn list_todos_in_page<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let shown = ctx.time_to_show_todos.unwrap_or_default();
        assert.ok(
            shown > Duration::from_millis(20),
            format!("loaded todos async {:?}", shown),
        );
        Ok(())
    }
    .boxed_local()
}

fn toggling_updates_service<'a>(
    ctx: &'a mut SuiteContext,
    assert: &'a mut Assert,
) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let checkbox = ctx.require(".todo .toggle")?;
        if !checkbox.has_attribute("checked:bind") {
            assert.ok(false, "not trying two-way DOM data bindings yet");
            return Ok(());
        }

        // (value toggled to, disabled right after the change)
        let toggles = Rc::new(RefCell::new(Vec::new()));
        let toggle: Rc<dyn Fn()> = {
            let checkbox = checkbox.clone();
            let toggles = toggles.clone();
            Rc::new(move || {
                let complete = !checkbox.checked();
                checkbox.set_checked(complete);
                checkbox.dispatch(EventKind::Change);
                toggles.borrow_mut().push((complete, checkbox.disabled()));
            })
        };

        // The first PUT toggles again from inside the handler, while its
        // own save is still in flight.
        let requests = Rc::new(RefCell::new(Vec::new()));
        let echo = echo_put(requests.clone());
        let seen = requests.clone();
        let again = toggle.clone();
        let originals = ctx.trap_routes(Method::Put, "/api/todos/{id}", move |request| {
            let response = echo(request);
            if seen.borrow().len() == 1 {
                again();
            }
            response
        });

        toggle();
        let outcome: Result<()> = async {
            let sent = requests.clone();
            ctx.wait_for(move || sent.borrow().len() == 2).await?;
            ctx.wait_for_idle().await
        }
        .await;
        ctx.restore_routes(originals);
        outcome?;

        let toggles = toggles.borrow();
        let requests = requests.borrow();
        for (round, (complete, disabled)) in toggles.iter().enumerate() {
            assert.ok(*disabled, "checkbox is disabled while saving");
            assert.ok(round < requests.len(), "made request");
            let sent = requests.get(round).and_then(|data| data.get("complete")).cloned();
            assert.equal(sent, Some(json!(complete)), "Service layer sent new `complete` state");
        }
        assert.equal(toggles.len(), 2, "toggled once more while the first save was in flight");
        assert.ok(!checkbox.disabled(), "checkbox is not disabled");
        Ok(())
    }
    .boxed_local()
}

fn delete_todos<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let rows = ctx.rows()?;
        let row = rows.first().context("no todo to delete")?;
        let destroy = row.query_selector(".destroy")?.context("row has no .destroy")?;

        destroy.dispatch(EventKind::Click);
        assert.ok(
            row.has_class("destroying"),
            "when a todo is being destroyed, its row has `destroying` in its class list",
        );

        ctx.wait_for_count(".todo", rows.len() - 1).await?;
        assert.ok(true, "deleted a todo");
        Ok(())
    }
    .boxed_local()
}

fn create_todos<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let count = ctx.count(".todo")?;
        let new_todo = ctx.require("#new-todo")?;

        new_todo.set_value("mow lawn");
        new_todo.dispatch(EventKind::Change);
        new_todo.dispatch_key("Enter");

        ctx.wait_for_count(".todo", count + 1).await?;
        assert.ok(true, "created a todo");
        assert.equal(new_todo.value(), String::new(), "The input is cleared after a todo is created");
        Ok(())
    }
    .boxed_local()
}

fn edit_todo_names<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let row = ctx.require(".todo")?;
        let label = row.query_selector("label")?.context("row has no label")?;
        let input = row.query_selector(".edit")?.context("row has no .edit")?;

        let requests = Rc::new(RefCell::new(Vec::new()));
        let originals = ctx.trap_routes(Method::Put, "/api/todos/{id}", echo_put(requests.clone()));

        let outcome: Result<()> = async {
            label.dispatch(EventKind::DblClick);
            assert.ok(row.has_class("editing"), "in edit mode");
            assert.equal(ctx.document.active_element(), Some(input.clone()), "element has focus");

            input.blur();
            input.dispatch(EventKind::Blur);
            ctx.tick().await;
            assert.ok(!row.has_class("editing"), "blur removes editing mode");

            label.dispatch(EventKind::DblClick);
            input.set_value("MOW GRASS");
            input.dispatch(EventKind::Change);
            input.dispatch_key("Enter");

            let seen = requests.clone();
            ctx.wait_for(move || !seen.borrow().is_empty()).await?;
            assert.ok(true, "made request");
            let name = requests.borrow()[0].get("name").cloned();
            assert.equal(name, Some(json!("MOW GRASS")), "got new name");
            ctx.wait_for_idle().await
        }
        .await;

        ctx.restore_routes(originals);
        outcome?;
        assert.ok(!row.has_class("editing"), "enter removes editing mode");
        Ok(())
    }
    .boxed_local()
}

fn toggle_all<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let checkboxes = ctx.document.query_selector_all(".todo .toggle")?;
        let initial: Vec<bool> = checkboxes.iter().map(Element::checked).collect();
        let toggle_all = ctx.require("#toggle-all")?;

        for checkbox in &checkboxes {
            checkbox.set_checked(true);
            checkbox.dispatch(EventKind::Change);
        }
        assert.ok(
            toggle_all.checked(),
            "#toggle-all is checked when everything else is checked",
        );

        let first = checkboxes.first().context("no todos to toggle")?;
        first.set_checked(false);
        first.dispatch(EventKind::Change);
        assert.ok(
            !toggle_all.checked(),
            "#toggle-all is unchecked when a single todo is unchecked",
        );

        toggle_all.set_checked(true);
        toggle_all.dispatch(EventKind::Change);
        assert.ok(toggle_all.disabled(), "disabled on change");

        let waiting = toggle_all.clone();
        ctx.wait_for(move || !waiting.disabled()).await?;
        assert.ok(ctx.app.todos().all_complete(), "every todo is complete");

        for (checkbox, checked) in checkboxes.iter().zip(initial) {
            checkbox.set_checked(checked);
            checkbox.dispatch(EventKind::Change);
        }
        Ok(())
    }
    .boxed_local()
}

fn clear_completed<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        let uncompleted = ctx
            .document
            .query_selector_all(".todo .toggle")?
            .iter()
            .filter(|checkbox| !checkbox.checked())
            .count();

        ctx.require("#clear-completed")?.dispatch(EventKind::Click);

        ctx.wait_for_count(".todo", uncompleted).await?;
        assert.equal(ctx.count(".todo")?, uncompleted, "only uncompleted todos remain");
        Ok(())
    }
    .boxed_local()
}

fn routing<'a>(ctx: &'a mut SuiteContext, assert: &'a mut Assert) -> LocalBoxFuture<'a, Result<()>> {
    async move {
        for link in ctx.document.query_selector_all("#filters a")? {
            let text = link.text_content();
            let text = text.trim();
            let expected = match text {
                "All" => Some("#!"),
                "Active" => Some("#!active"),
                "Completed" => Some("#!complete"),
                _ => None,
            };
            assert.equal(
                link.attribute("href").as_deref(),
                expected,
                format!("{} href is right.", text),
            );
        }

        ctx.app.navigate("#!active");
        ctx.tick().await;
        for input in ctx.document.query_selector_all(".todo .toggle")? {
            assert.ok(!input.checked(), "#!active page should have only unchecked boxes");
        }
        assert.equal(
            ctx.count(".todo")?,
            ctx.app.todos().active().len(),
            "#!active shows every active todo",
        );

        ctx.app.navigate("#!complete");
        ctx.tick().await;
        for input in ctx.document.query_selector_all(".todo .toggle")? {
            assert.ok(input.checked(), "#!complete page should have only checked boxes");
        }

        ctx.app.navigate("#!");
        ctx.tick().await;
        assert.equal(ctx.count(".todo")?, ctx.app.todos().len(), "#! shows every todo");
        Ok(())
    }
    .boxed_local()
}

/// The full TodoMVC suite, in the order the cases depend on.
pub fn suite() -> Suite<SuiteContext> {
    Suite::new("TodoMVC")
        .setup(setup)
        .case("setup works", setup_works)
        .case("Defined Todo", defined_todo)
        .case("Defined TodoList", defined_todo_list)
        .case("Rendered a list of todos", rendered_list)
        .case("Toggling a todo's completed state with event binding", toggling_with_event_binding)
        .case("Toggling a todo's completed state with data bindings", toggling_with_data_bindings)
        .case("Defining Todo identity", todo_identity)
        .case("Simulate the /api/todos service", simulate_service)
        .case("Connecting Todo to the /api/todos service", connecting_to_service)
        .case("List todos in the page", list_todos_in_page)
        .case("Toggling a todo's checkbox updates service layer", toggling_updates_service)
        .case("Delete todos", delete_todos)
        .case("Create todos", create_todos)
        .case("Edit todo names", edit_todo_names)
        .case("Toggle all todos complete state", toggle_all)
        .case("Clear all completed todos", clear_completed)
        .case("Setup routing", routing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::RunOptions;
    use tokio::task::LocalSet;

    #[test]
    fn cases_keep_their_order() {
        let suite = suite();
        let names: Vec<&str> = suite.case_names().collect();
        assert_eq!(names.len(), 17);
        assert_eq!(names[0], "setup works");
        assert_eq!(names[16], "Setup routing");
    }

    #[tokio::test(start_paused = true)]
    async fn setup_records_first_show_and_speeds_up_fixture() {
        LocalSet::new()
            .run_until(async {
                let mut ctx = SuiteContext::launch(HarnessConfig::default());
                assert_eq!(ctx.fixture.delay(), Duration::from_millis(100));
                setup(&mut ctx).await.unwrap();

                let shown = ctx.time_to_show_todos.unwrap();
                assert!(shown >= Duration::from_millis(100), "{:?}", shown);
                assert!(shown <= Duration::from_millis(120), "{:?}", shown);
                assert_eq!(ctx.fixture.delay(), Duration::from_millis(10));

                setup(&mut ctx).await.unwrap();
                assert_eq!(ctx.time_to_show_todos, Some(shown));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn single_case_reports_assertions() {
        LocalSet::new()
            .run_until(async {
                let mut ctx = SuiteContext::launch(HarnessConfig::default());
                let options = RunOptions {
                    filter: Some("Rendered".into()),
                    ..RunOptions::default()
                };
                let report = suite().run(&mut ctx, &options).await;
                assert_eq!(report.cases.len(), 1);
                let case = &report.cases[0];
                assert!(case.passed, "{:?}", case);
                // nothing edited, list, items left, clear-completed, row count, 3 x 2 rows
                assert_eq!(case.assertions.len(), 11);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_toggle_lands_while_first_save_is_in_flight() {
        LocalSet::new()
            .run_until(async {
                let mut ctx = SuiteContext::launch(HarnessConfig::default());
                let options = RunOptions {
                    filter: Some("updates service layer".into()),
                    ..RunOptions::default()
                };
                let report = suite().run(&mut ctx, &options).await;
                let case = &report.cases[0];
                assert!(case.passed, "{:?}", case);
                // 2 toggles x (disabled, request, sent value), toggle count, re-enabled
                assert_eq!(case.assertions.len(), 8);

                // Toggled twice, so the first todo is back where it started.
                let todos = ctx.app.todos();
                assert_eq!(todos[0].name, "mow lawn");
                assert!(!todos[0].complete);
            })
            .await;
    }
}
