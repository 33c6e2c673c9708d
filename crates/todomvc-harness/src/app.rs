//! Minimal TodoMVC application rendered into a [`Document`].
//!
//! This is the system the suite drives. It keeps its own list of entries,
//! talks to the service through [`TodoConnection`] on spawned local tasks and
//! re-renders after every change. Rows are keyed, so an element handle a test
//! holds keeps pointing at the same row across renders.
//!
//! Must be mounted inside a `tokio::task::LocalSet`.

use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};

use crate::dom::{Document, Element, Event, EventKind};
use crate::model::{Todo, TodoConnection, TodoList};

/// Which rows the list shows, driven by the location hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Complete,
}

impl Filter {
    pub fn from_hash(hash: &str) -> Self {
        match hash.trim_start_matches('#').trim_start_matches('!') {
            "active" => Filter::Active,
            "complete" => Filter::Complete,
            _ => Filter::All,
        }
    }

    pub fn hash(self) -> &'static str {
        match self {
            Filter::All => "#!",
            Filter::Active => "#!active",
            Filter::Complete => "#!complete",
        }
    }

    fn shows(self, todo: &Todo) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.complete,
            Filter::Complete => todo.complete,
        }
    }
}

struct Entry {
    key: u64,
    todo: Todo,
    // Bumped on every local edit; a save answer only wins if it is current.
    revision: u64,
    saving: u32,
    destroying: bool,
    row: Option<Element>,
}

#[derive(Default)]
struct AppState {
    entries: Vec<Entry>,
    next_key: u64,
    filter: Filter,
    editing: Option<u64>,
    loaded: bool,
    in_flight: usize,
    toggle_all_pending: usize,
}

impl AppState {
    fn entry_mut(&mut self, key: u64) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| entry.key == key)
    }

    fn push(&mut self, todo: Todo) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        self.entries.push(Entry {
            key,
            todo,
            revision: 0,
            saving: 0,
            destroying: false,
            row: None,
        });
        key
    }
}

/// Elements that live for the whole app lifetime.
struct View {
    new_todo: Element,
    toggle_all: Element,
    list: Element,
    items_left: Element,
    clear_completed: Element,
    completed_count: Element,
    filter_links: Vec<(Filter, Element)>,
}

struct AppInner {
    document: Document,
    connection: TodoConnection,
    view: View,
    state: RefCell<AppState>,
}

#[derive(Clone)]
pub struct App {
    inner: Rc<AppInner>,
}

/// Spawned saves remember whether `#toggle-all` is waiting on them.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SaveOrigin {
    Row,
    ToggleAll,
}

impl App {
    /// Build the page into `document.body()` and start loading the list.
    pub fn mount(document: &Document, connection: TodoConnection) -> App {
        let view = build_view(document);
        let app = App {
            inner: Rc::new(AppInner {
                document: document.clone(),
                connection,
                view,
                state: RefCell::new(AppState::default()),
            }),
        };
        app.attach_listeners();
        app.render();
        app.load();
        app
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    /// Snapshot of every todo, in display order, ignoring the filter.
    pub fn todos(&self) -> TodoList {
        let state = self.inner.state.borrow();
        TodoList::new(state.entries.iter().map(|entry| entry.todo.clone()).collect())
    }

    pub fn filter(&self) -> Filter {
        self.inner.state.borrow().filter
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.borrow().loaded
    }

    /// Loaded and no request in flight.
    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.borrow();
        state.loaded && state.in_flight == 0
    }

    /// Follow a `#!...` route.
    pub fn navigate(&self, hash: &str) {
        let filter = Filter::from_hash(hash);
        log::debug!("route {} -> {:?}", hash, filter);
        self.inner.state.borrow_mut().filter = filter;
        self.render();
    }

    fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        tokio::task::spawn_local(task);
    }

    fn load(&self) {
        self.inner.state.borrow_mut().in_flight += 1;
        let app = self.clone();
        self.spawn(async move {
            let result = app.inner.connection.get_list().await;
            {
                let mut state = app.inner.state.borrow_mut();
                state.in_flight -= 1;
                state.loaded = true;
                match result {
                    Ok(todos) => {
                        log::info!("loaded {} todos", todos.len());
                        for todo in todos.into_inner() {
                            state.push(todo);
                        }
                    }
                    Err(e) => log::error!("failed to load todos: {:#}", e),
                }
            }
            app.render();
        });
    }

    fn attach_listeners(&self) {
        let view = &self.inner.view;

        self.listen(&view.new_todo, EventKind::KeyUp, |app, event| {
            if event.is_enter() {
                app.create_from_input();
            }
        });
        self.listen(&view.toggle_all, EventKind::Change, |app, event| {
            app.toggle_all(event.target.checked());
        });
        self.listen(&view.clear_completed, EventKind::Click, |app, _| {
            app.clear_completed();
        });
        for (filter, link) in &view.filter_links {
            let hash = filter.hash();
            self.listen(link, EventKind::Click, move |app, _| app.navigate(hash));
        }

        // Rows come and go, so their events are handled on the list.
        self.listen(&view.list, EventKind::Change, |app, event| {
            if event.target.has_class("toggle") {
                if let Some(key) = row_key(&event.target) {
                    app.set_complete(key, event.target.checked());
                }
            }
        });
        self.listen(&view.list, EventKind::Click, |app, event| {
            if event.target.has_class("destroy") {
                if let Some(key) = row_key(&event.target) {
                    app.destroy(key);
                }
            }
        });
        self.listen(&view.list, EventKind::DblClick, |app, event| {
            if event.target.tag() == "label" {
                if let Some(key) = row_key(&event.target) {
                    app.start_editing(key);
                }
            }
        });
        self.listen(&view.list, EventKind::Blur, |app, event| {
            if event.target.has_class("edit") {
                if let Some(key) = row_key(&event.target) {
                    app.stop_editing(key);
                }
            }
        });
        self.listen(&view.list, EventKind::KeyUp, |app, event| {
            if !event.target.has_class("edit") {
                return;
            }
            let Some(key) = row_key(&event.target) else {
                return;
            };
            match event.key.as_deref() {
                Some("Enter") => app.commit_edit(key, &event.target.value()),
                Some("Escape") => app.stop_editing(key),
                _ => {}
            }
        });
    }

    /// Listeners hold the app weakly; the document outlives nothing.
    fn listen(
        &self,
        element: &Element,
        kind: EventKind,
        handler: impl Fn(&App, &Event) + 'static,
    ) {
        let weak: Weak<AppInner> = Rc::downgrade(&self.inner);
        element.add_event_listener(kind, move |event| {
            if let Some(inner) = weak.upgrade() {
                handler(&App { inner }, event);
            }
        });
    }

    fn create_from_input(&self) {
        let input = &self.inner.view.new_todo;
        let name = input.value().trim().to_string();
        if name.is_empty() {
            return;
        }
        input.set_value("");

        let key = self.inner.state.borrow_mut().push(Todo::new(name));
        self.render();
        self.save(key, SaveOrigin::Row);
    }

    fn set_complete(&self, key: u64, complete: bool) {
        {
            let mut state = self.inner.state.borrow_mut();
            let Some(entry) = state.entry_mut(key) else {
                return;
            };
            entry.todo.complete = complete;
            entry.revision += 1;
        }
        self.save(key, SaveOrigin::Row);
        self.render();
    }

    fn toggle_all(&self, complete: bool) {
        let keys: Vec<u64> = {
            let mut state = self.inner.state.borrow_mut();
            for entry in &mut state.entries {
                entry.todo.complete = complete;
                entry.revision += 1;
            }
            state.entries.iter().map(|entry| entry.key).collect()
        };
        for key in keys {
            self.save(key, SaveOrigin::ToggleAll);
        }
        self.render();
    }

    fn clear_completed(&self) {
        let keys: Vec<u64> = self
            .inner
            .state
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.todo.complete && !entry.destroying)
            .map(|entry| entry.key)
            .collect();
        for key in keys {
            self.destroy(key);
        }
    }

    fn start_editing(&self, key: u64) {
        let name = {
            let mut state = self.inner.state.borrow_mut();
            let Some(entry) = state.entry_mut(key) else {
                return;
            };
            let name = entry.todo.name.clone();
            state.editing = Some(key);
            name
        };
        self.render();

        let row = self.row(key);
        if let Some(Ok(Some(input))) = row.map(|row| row.query_selector(".edit")) {
            input.set_value(&name);
            if let Err(e) = input.focus() {
                log::warn!("cannot focus edit field: {}", e);
            }
        }
    }

    fn stop_editing(&self, key: u64) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.editing != Some(key) {
                return;
            }
            state.editing = None;
        }
        self.render();
    }

    fn commit_edit(&self, key: u64, value: &str) {
        let name = value.trim();
        if name.is_empty() {
            self.inner.state.borrow_mut().editing = None;
            self.destroy(key);
            return;
        }
        {
            let mut state = self.inner.state.borrow_mut();
            state.editing = None;
            let Some(entry) = state.entry_mut(key) else {
                return;
            };
            entry.todo.name = name.to_string();
            entry.revision += 1;
        }
        if let Some(Ok(Some(input))) = self.row(key).map(|row| row.query_selector(".edit")) {
            input.blur();
        }
        self.save(key, SaveOrigin::Row);
        self.render();
    }

    /// Persist the entry's current todo on a local task.
    fn save(&self, key: u64, origin: SaveOrigin) {
        let (todo, revision) = {
            let mut state = self.inner.state.borrow_mut();
            let Some(entry) = state.entry_mut(key) else {
                return;
            };
            entry.saving += 1;
            let snapshot = (entry.todo.clone(), entry.revision);
            state.in_flight += 1;
            if origin == SaveOrigin::ToggleAll {
                state.toggle_all_pending += 1;
            }
            snapshot
        };

        let app = self.clone();
        self.spawn(async move {
            let result = app.inner.connection.save(&todo).await;
            {
                let mut state = app.inner.state.borrow_mut();
                state.in_flight -= 1;
                if origin == SaveOrigin::ToggleAll {
                    state.toggle_all_pending -= 1;
                }
                if let Some(entry) = state.entry_mut(key) {
                    entry.saving -= 1;
                    match result {
                        Ok(saved) if entry.revision == revision => entry.todo = saved,
                        Ok(saved) => {
                            if entry.todo.id.is_none() {
                                entry.todo.id = saved.id;
                            }
                        }
                        Err(e) => log::warn!("saving {:?} failed: {:#}", todo.name, e),
                    }
                }
            }
            app.render();
        });
    }

    fn destroy(&self, key: u64) {
        let todo = {
            let mut state = self.inner.state.borrow_mut();
            let Some(entry) = state.entry_mut(key) else {
                return;
            };
            if entry.destroying {
                return;
            }
            entry.destroying = true;
            let todo = entry.todo.clone();
            if todo.id.is_none() {
                state.entries.retain(|entry| entry.key != key);
                None
            } else {
                state.in_flight += 1;
                Some(todo)
            }
        };
        self.render();

        let Some(todo) = todo else {
            return;
        };
        let app = self.clone();
        self.spawn(async move {
            let result = app.inner.connection.destroy(&todo).await;
            {
                let mut state = app.inner.state.borrow_mut();
                state.in_flight -= 1;
                match result {
                    Ok(()) => state.entries.retain(|entry| entry.key != key),
                    Err(e) => {
                        log::warn!("destroying {:?} failed: {:#}", todo.name, e);
                        if let Some(entry) = state.entry_mut(key) {
                            entry.destroying = false;
                        }
                    }
                }
            }
            app.render();
        });
    }

    fn row(&self, key: u64) -> Option<Element> {
        let state = self.inner.state.borrow();
        state
            .entries
            .iter()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.row.clone())
    }

    /// Bring every element in line with the state.
    fn render(&self) {
        let document = &self.inner.document;
        let view = &self.inner.view;
        let mut state = self.inner.state.borrow_mut();
        let filter = state.filter;
        let editing = state.editing;

        let mut visible = Vec::new();
        for entry in &mut state.entries {
            let row = entry
                .row
                .get_or_insert_with(|| build_row(document, entry.key))
                .clone();
            update_row(&row, entry, editing == Some(entry.key));
            if filter.shows(&entry.todo) {
                visible.push(row);
            }
        }
        // Re-attaching rows would drop focus from an open edit field.
        if view.list.children() != visible {
            view.list.clear_children();
            for row in &visible {
                view.list.append_child(row);
            }
        }

        let total = state.entries.len();
        let complete = state.entries.iter().filter(|e| e.todo.complete).count();
        view.items_left.set_text(&(total - complete).to_string());
        view.completed_count.set_text(&complete.to_string());
        view.toggle_all.set_checked(total > 0 && complete == total);
        view.toggle_all.set_disabled(state.toggle_all_pending > 0);
        for (link_filter, link) in &view.filter_links {
            link.set_class("selected", *link_filter == filter);
        }
    }
}

fn row_key(element: &Element) -> Option<u64> {
    let row = element.closest("li.todo").ok().flatten()?;
    row.attribute("data-key")?.parse().ok()
}

fn build_row(document: &Document, key: u64) -> Element {
    let row = document.create_element("li");
    row.add_class("todo");
    row.set_attribute("data-key", &key.to_string());

    let view = document.create_element("div");
    view.add_class("view");
    let toggle = document.create_element("input");
    toggle.add_class("toggle");
    toggle.set_attribute("type", "checkbox");
    toggle.set_attribute("checked:bind", "complete");
    let label = document.create_element("label");
    let destroy = document.create_element("button");
    destroy.add_class("destroy");
    view.append_child(&toggle);
    view.append_child(&label);
    view.append_child(&destroy);

    let edit = document.create_element("input");
    edit.add_class("edit");

    row.append_child(&view);
    row.append_child(&edit);
    row
}

fn update_row(row: &Element, entry: &Entry, editing: bool) {
    row.set_class("completed", entry.todo.complete);
    row.set_class("destroying", entry.destroying);
    row.set_class("editing", editing);
    if let Ok(Some(toggle)) = row.query_selector(".toggle") {
        toggle.set_checked(entry.todo.complete);
        toggle.set_disabled(entry.saving > 0);
    }
    if let Ok(Some(label)) = row.query_selector("label") {
        label.set_text(&entry.todo.name);
    }
}

fn build_view(document: &Document) -> View {
    let el = |tag: &str, id: Option<&str>| {
        let element = document.create_element(tag);
        if let Some(id) = id {
            element.set_attribute("id", id);
        }
        element
    };

    let app = el("section", Some("todoapp"));

    let header = el("header", None);
    header.add_class("header");
    let title = el("h1", None);
    title.set_text("TodoMVC");
    let new_todo = el("input", Some("new-todo"));
    new_todo.set_attribute("placeholder", "What needs to be done?");
    header.append_child(&title);
    header.append_child(&new_todo);

    let main = el("section", Some("main"));
    let toggle_all = el("input", Some("toggle-all"));
    toggle_all.set_attribute("type", "checkbox");
    let list = el("ul", Some("todo-list"));
    main.append_child(&toggle_all);
    main.append_child(&list);

    let footer = el("footer", Some("footer"));
    let count = el("span", Some("todo-count"));
    let items_left = el("strong", None);
    count.append_child(&items_left);
    count.append_text(" items left");

    let filters = el("ul", Some("filters"));
    let mut filter_links = Vec::new();
    for (filter, label) in [
        (Filter::All, "All"),
        (Filter::Active, "Active"),
        (Filter::Complete, "Completed"),
    ] {
        let item = el("li", None);
        let link = el("a", None);
        link.set_attribute("href", filter.hash());
        link.set_text(label);
        item.append_child(&link);
        filters.append_child(&item);
        filter_links.push((filter, link));
    }

    // Three child nodes: text, live count, text.
    let clear_completed = el("button", Some("clear-completed"));
    clear_completed.append_text("Clear completed (");
    let completed_count = el("span", None);
    clear_completed.append_child(&completed_count);
    clear_completed.append_text(")");

    footer.append_child(&count);
    footer.append_child(&filters);
    footer.append_child(&clear_completed);

    app.append_child(&header);
    app.append_child(&main);
    app.append_child(&footer);
    document.body().append_child(&app);

    View {
        new_todo,
        toggle_all,
        list,
        items_left,
        clear_completed,
        completed_count,
        filter_links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Fixture, install_todos_store};
    use crate::poll::wait_for;
    use serde_json::json;
    use std::time::Duration;
    use tokio::task::LocalSet;

    fn mount(delay_ms: u64) -> (Document, App) {
        let fixture = Fixture::new(Duration::from_millis(delay_ms));
        install_todos_store(
            &fixture,
            vec![
                json!({"id": "1", "name": "mow lawn", "complete": false}),
                json!({"id": "2", "name": "dishes", "complete": true}),
            ],
        );
        let document = Document::new();
        let app = App::mount(&document, TodoConnection::new(fixture));
        (document, app)
    }

    fn text(document: &Document, selector: &str) -> String {
        document
            .query_selector(selector)
            .unwrap()
            .map(|e| e.text_content())
            .unwrap_or_default()
    }

    #[test]
    fn filters_parse_hashes() {
        assert_eq!(Filter::from_hash("#!active"), Filter::Active);
        assert_eq!(Filter::from_hash("#!complete"), Filter::Complete);
        assert_eq!(Filter::from_hash("#!"), Filter::All);
        assert_eq!(Filter::from_hash(""), Filter::All);
    }

    #[tokio::test(start_paused = true)]
    async fn rows_appear_after_load() {
        LocalSet::new()
            .run_until(async {
                let (document, app) = mount(50);
                assert_eq!(document.count(".todo").unwrap(), 0);
                assert!(!app.is_loaded());

                let rows = document.clone();
                wait_for(move || rows.count(".todo").unwrap_or(0) == 2).await.unwrap();
                assert!(app.is_idle());
                assert_eq!(text(&document, "#todo-count strong"), "1");
                assert_eq!(text(&document, "#clear-completed"), "Clear completed (1)");
                assert_eq!(document.count(".todo.completed").unwrap(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_disables_until_saved() {
        LocalSet::new()
            .run_until(async {
                let (document, app) = mount(10);
                let idle = app.clone();
                wait_for(move || idle.is_idle()).await.unwrap();

                let toggle = document.query_selector(".todo .toggle").unwrap().unwrap();
                toggle.set_checked(true);
                toggle.dispatch(EventKind::Change);
                assert!(toggle.disabled());
                assert_eq!(text(&document, "#todo-count strong"), "0");
                assert!(document.get_element_by_id("toggle-all").unwrap().checked());

                let saved = toggle.clone();
                wait_for(move || !saved.disabled()).await.unwrap();
                assert!(app.todos()[0].complete);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn create_edit_and_destroy() {
        LocalSet::new()
            .run_until(async {
                let (document, app) = mount(10);
                let idle = app.clone();
                wait_for(move || idle.is_idle()).await.unwrap();

                let input = document.get_element_by_id("new-todo").unwrap();
                input.set_value("  walk dog ");
                input.dispatch(EventKind::Change);
                input.dispatch_key("Enter");
                assert_eq!(input.value(), "");
                assert_eq!(document.count(".todo").unwrap(), 3);

                let idle = app.clone();
                wait_for(move || idle.is_idle()).await.unwrap();
                assert_eq!(app.todos()[2].id.as_deref(), Some("3"));

                let row = document.query_selector_all(".todo").unwrap()[2].clone();
                let label = row.query_selector("label").unwrap().unwrap();
                let edit = row.query_selector(".edit").unwrap().unwrap();
                label.dispatch(EventKind::DblClick);
                assert!(row.has_class("editing"));
                assert_eq!(document.active_element(), Some(edit.clone()));
                assert_eq!(edit.value(), "walk dog");

                edit.set_value("walk cat");
                edit.dispatch_key("Enter");
                assert!(!row.has_class("editing"));
                assert_eq!(label.text_content(), "walk cat");

                let destroy = row.query_selector(".destroy").unwrap().unwrap();
                destroy.dispatch(EventKind::Click);
                assert!(row.has_class("destroying"));
                let rows = document.clone();
                wait_for(move || rows.count(".todo").unwrap_or(0) == 2).await.unwrap();
                assert!(!row.is_connected());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn routes_filter_rows() {
        LocalSet::new()
            .run_until(async {
                let (document, app) = mount(10);
                let idle = app.clone();
                wait_for(move || idle.is_idle()).await.unwrap();

                app.navigate("#!active");
                assert_eq!(document.count(".todo").unwrap(), 1);
                assert_eq!(document.count("#filters a.selected").unwrap(), 1);

                let completed_link = document.query_selector("#filters a[href=\"#!complete\"]");
                completed_link.unwrap().unwrap().dispatch(EventKind::Click);
                assert_eq!(app.filter(), Filter::Complete);
                assert_eq!(document.count(".todo.completed").unwrap(), 1);

                app.navigate("#!");
                assert_eq!(document.count(".todo").unwrap(), 2);
            })
            .await;
    }
}
