//! In-memory document: an element tree with class lists, form state, focus,
//! selector queries and bubbling event listeners.
//!
//! [`Document`] and [`Element`] are cheap handles onto one shared tree. They
//! are `!Send`; everything runs on one thread, the way a page does.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    UnsupportedSelector(String),
    Detached { tag: String },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::UnsupportedSelector(selector) => {
                write!(f, "unsupported selector: {selector}")
            }
            DomError::Detached { tag } => write!(f, "<{tag}> is not attached to the document"),
        }
    }
}

impl std::error::Error for DomError {}

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    DblClick,
    Change,
    Blur,
    KeyUp,
}

/// Event delivered to listeners. `target` is where it was dispatched,
/// `current` is the element whose listener is running.
#[derive(Clone)]
pub struct Event {
    pub kind: EventKind,
    pub key: Option<String>,
    pub target: Element,
    pub current: Element,
}

impl Event {
    pub fn is_enter(&self) -> bool {
        self.kind == EventKind::KeyUp && self.key.as_deref() == Some("Enter")
    }
}

pub type Listener = Rc<dyn Fn(&Event)>;

#[derive(Debug)]
enum NodeKind {
    Root,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    checked: bool,
    disabled: bool,
    value: String,
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    focused: Option<NodeId>,
    listeners: HashMap<(NodeId, EventKind), Vec<Listener>>,
}

impl Tree {
    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
        if self.focused.is_some_and(|focused| self.is_inclusive_ancestor(id, focused)) {
            self.focused = None;
        }
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node.0].parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, id)
    }

    fn text_content(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            _ => {
                for child in &self.nodes[id.0].children {
                    self.text_content(*child, out);
                }
            }
        }
    }

    fn descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.nodes[id.0].children {
            if self.element(*child).is_some() {
                out.push(*child);
            }
            self.descendants(*child, out);
        }
    }

    fn matches_step(&self, id: NodeId, step: &SelectorStep) -> bool {
        let Some(data) = self.element(id) else {
            return false;
        };
        if let Some(tag) = &step.tag {
            if !data.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id_value) = &step.id {
            if data.attributes.get("id") != Some(id_value) {
                return false;
            }
        }
        if !step.classes.iter().all(|class| data.classes.contains(class)) {
            return false;
        }
        step.attrs.iter().all(|(name, expected)| match (data.attributes.get(name), expected) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        })
    }

    /// Match a compound selector right to left, as browsers do.
    fn matches_chain(&self, id: NodeId, parts: &[SelectorPart]) -> bool {
        let Some((last, rest)) = parts.split_last() else {
            return false;
        };
        if !self.matches_step(id, &last.step) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }

        let mut cursor = self.nodes[id.0].parent;
        match last.combinator {
            Some(Combinator::Child) => {
                cursor.is_some_and(|parent| self.matches_chain(parent, rest))
            }
            _ => {
                while let Some(ancestor) = cursor {
                    if self.matches_chain(ancestor, rest) {
                        return true;
                    }
                    cursor = self.nodes[ancestor.0].parent;
                }
                false
            }
        }
    }

    fn select(&self, scope: NodeId, groups: &[Vec<SelectorPart>]) -> Vec<NodeId> {
        let mut candidates = Vec::new();
        self.descendants(scope, &mut candidates);
        candidates
            .into_iter()
            .filter(|id| groups.iter().any(|parts| self.matches_chain(*id, parts)))
            .collect()
    }
}

/// Shared handle to the whole tree.
#[derive(Clone)]
pub struct Document {
    tree: Rc<RefCell<Tree>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with a `<body>`.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            focused: None,
            listeners: HashMap::new(),
        };
        let root = tree.push(NodeKind::Root);
        let body = tree.push(NodeKind::Element(ElementData {
            tag: "body".to_string(),
            ..ElementData::default()
        }));
        tree.append(root, body);
        tree.root = root;
        tree.body = body;
        Self {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    fn handle(&self, id: NodeId) -> Element {
        Element {
            document: self.clone(),
            id,
        }
    }

    pub fn body(&self) -> Element {
        let body = self.tree.borrow().body;
        self.handle(body)
    }

    /// New detached element.
    pub fn create_element(&self, tag: &str) -> Element {
        let id = self.tree.borrow_mut().push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }));
        self.handle(id)
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let groups = parse_selector_groups(selector)?;
        let root = self.tree.borrow().root;
        let found = self.tree.borrow().select(root, &groups);
        Ok(found.into_iter().map(|id| self.handle(id)).collect())
    }

    /// Number of elements matching `selector`.
    pub fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.query_selector_all(selector)?.len())
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Element> {
        let tree = self.tree.borrow();
        let mut all = Vec::new();
        tree.descendants(tree.root, &mut all);
        all.into_iter()
            .find(|node| {
                tree.element(*node)
                    .is_some_and(|data| data.attributes.get("id").is_some_and(|v| v == id))
            })
            .map(|node| self.handle(node))
    }

    pub fn active_element(&self) -> Option<Element> {
        let focused = self.tree.borrow().focused;
        focused.map(|id| self.handle(id))
    }

    /// Deliver `kind` to `target` and then to each of its ancestors.
    ///
    /// Listeners run with no borrow held, so they may freely mutate the tree.
    pub fn dispatch(&self, target: &Element, kind: EventKind, key: Option<&str>) {
        let path = {
            let tree = self.tree.borrow();
            let mut path = vec![target.id];
            let mut cursor = tree.nodes[target.id.0].parent;
            while let Some(node) = cursor {
                path.push(node);
                cursor = tree.nodes[node.0].parent;
            }
            path
        };
        log::trace!("dispatch {:?} on <{}>", kind, target.tag());

        for node in path {
            let listeners = self
                .tree
                .borrow()
                .listeners
                .get(&(node, kind))
                .cloned()
                .unwrap_or_default();
            if listeners.is_empty() {
                continue;
            }
            let event = Event {
                kind,
                key: key.map(str::to_string),
                target: target.clone(),
                current: self.handle(node),
            };
            for listener in listeners {
                listener(&event);
            }
        }
    }
}

/// Handle to one element of a [`Document`].
#[derive(Clone)]
pub struct Element {
    document: Document,
    id: NodeId,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.document.tree, &other.document.tree)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.document.tree.borrow();
        match tree.element(self.id) {
            Some(data) => {
                write!(f, "<{}", data.tag)?;
                if let Some(id) = data.attributes.get("id") {
                    write!(f, " id=\"{id}\"")?;
                }
                if !data.classes.is_empty() {
                    write!(f, " class=\"{}\"", data.classes.join(" "))?;
                }
                write!(f, ">")
            }
            None => write!(f, "<#node {}>", self.id.0),
        }
    }
}

impl Element {
    fn read<T>(&self, f: impl FnOnce(&ElementData) -> T) -> T {
        let tree = self.document.tree.borrow();
        match tree.element(self.id) {
            Some(data) => f(data),
            None => f(&ElementData::default()),
        }
    }

    fn write(&self, f: impl FnOnce(&mut ElementData)) {
        let mut tree = self.document.tree.borrow_mut();
        if let Some(data) = tree.element_mut(self.id) {
            f(data);
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tag(&self) -> String {
        self.read(|data| data.tag.clone())
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.read(|data| data.attributes.get(name).cloned())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.read(|data| data.attributes.contains_key(name))
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.write(|data| {
            data.attributes.insert(name.to_string(), value.to_string());
        });
    }

    pub fn remove_attribute(&self, name: &str) {
        self.write(|data| {
            data.attributes.remove(name);
        });
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.read(|data| data.classes.iter().any(|c| c == class))
    }

    pub fn add_class(&self, class: &str) {
        self.set_class(class, true);
    }

    pub fn remove_class(&self, class: &str) {
        self.set_class(class, false);
    }

    /// Add or remove `class` depending on `on`.
    pub fn set_class(&self, class: &str, on: bool) {
        self.write(|data| {
            let present = data.classes.iter().any(|c| c == class);
            if on && !present {
                data.classes.push(class.to_string());
            } else if !on && present {
                data.classes.retain(|c| c != class);
            }
        });
    }

    pub fn checked(&self) -> bool {
        self.read(|data| data.checked)
    }

    pub fn set_checked(&self, checked: bool) {
        self.write(|data| data.checked = checked);
    }

    pub fn disabled(&self) -> bool {
        self.read(|data| data.disabled)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.write(|data| data.disabled = disabled);
    }

    pub fn value(&self) -> String {
        self.read(|data| data.value.clone())
    }

    pub fn set_value(&self, value: &str) {
        self.write(|data| data.value = value.to_string());
    }

    pub fn append_child(&self, child: &Element) {
        self.document.tree.borrow_mut().append(self.id, child.id);
    }

    pub fn append_text(&self, text: &str) {
        let mut tree = self.document.tree.borrow_mut();
        let node = tree.push(NodeKind::Text(text.to_string()));
        tree.append(self.id, node);
    }

    /// Replace every child with a single text node. A lone text child is
    /// overwritten in place, so re-rendering a label does not grow the tree.
    pub fn set_text(&self, text: &str) {
        {
            let mut tree = self.document.tree.borrow_mut();
            if let [only] = tree.nodes[self.id.0].children[..] {
                if let NodeKind::Text(current) = &mut tree.nodes[only.0].kind {
                    current.clear();
                    current.push_str(text);
                    return;
                }
            }
        }
        self.clear_children();
        self.append_text(text);
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.document.tree.borrow().text_content(self.id, &mut out);
        out
    }

    /// Child count including text nodes.
    pub fn child_node_count(&self) -> usize {
        self.document.tree.borrow().nodes[self.id.0].children.len()
    }

    /// Element children only.
    pub fn children(&self) -> Vec<Element> {
        let tree = self.document.tree.borrow();
        tree.nodes[self.id.0]
            .children
            .iter()
            .filter(|child| tree.element(**child).is_some())
            .map(|child| self.document.handle(*child))
            .collect()
    }

    pub fn clear_children(&self) {
        let mut tree = self.document.tree.borrow_mut();
        let children = std::mem::take(&mut tree.nodes[self.id.0].children);
        for child in children {
            tree.nodes[child.0].parent = None;
            if tree.focused.is_some_and(|focused| tree.is_inclusive_ancestor(child, focused)) {
                tree.focused = None;
            }
        }
    }

    pub fn parent(&self) -> Option<Element> {
        let parent = self.document.tree.borrow().nodes[self.id.0].parent;
        parent
            .filter(|parent| self.document.tree.borrow().element(*parent).is_some())
            .map(|parent| self.document.handle(parent))
    }

    /// Detach from the tree. The handle stays usable.
    pub fn remove(&self) {
        self.document.tree.borrow_mut().detach(self.id);
    }

    pub fn is_connected(&self) -> bool {
        self.document.tree.borrow().is_connected(self.id)
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let groups = parse_selector_groups(selector)?;
        let found = self.document.tree.borrow().select(self.id, &groups);
        Ok(found.into_iter().map(|id| self.document.handle(id)).collect())
    }

    pub fn matches(&self, selector: &str) -> Result<bool> {
        let groups = parse_selector_groups(selector)?;
        let tree = self.document.tree.borrow();
        Ok(groups.iter().any(|parts| tree.matches_chain(self.id, parts)))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, selector: &str) -> Result<Option<Element>> {
        let groups = parse_selector_groups(selector)?;
        let tree = self.document.tree.borrow();
        let mut cursor = Some(self.id);
        while let Some(node) = cursor {
            if groups.iter().any(|parts| tree.matches_chain(node, parts)) {
                return Ok(Some(self.document.handle(node)));
            }
            cursor = tree.nodes[node.0].parent;
        }
        Ok(None)
    }

    /// Focus this element. Fails if it is not in the document.
    pub fn focus(&self) -> Result<()> {
        let mut tree = self.document.tree.borrow_mut();
        if !tree.is_connected(self.id) {
            let tag = tree.element(self.id).map(|d| d.tag.clone()).unwrap_or_default();
            return Err(DomError::Detached { tag });
        }
        tree.focused = Some(self.id);
        Ok(())
    }

    /// Drop focus if this element has it. Does not dispatch `blur`.
    pub fn blur(&self) {
        let mut tree = self.document.tree.borrow_mut();
        if tree.focused == Some(self.id) {
            tree.focused = None;
        }
    }

    pub fn add_event_listener(&self, kind: EventKind, listener: impl Fn(&Event) + 'static) {
        self.document
            .tree
            .borrow_mut()
            .listeners
            .entry((self.id, kind))
            .or_default()
            .push(Rc::new(listener));
    }

    pub fn dispatch(&self, kind: EventKind) {
        self.document.dispatch(self, kind, None);
    }

    pub fn dispatch_key(&self, key: &str) {
        self.document.dispatch(self, EventKind::KeyUp, Some(key));
    }
}

// --- selectors ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SelectorStep {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorPart {
    step: SelectorStep,
    // Relation to the part on the left.
    combinator: Option<Combinator>,
}

fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    split_outside_brackets(selector, ',')
        .iter()
        .map(|group| parse_selector_chain(group))
        .collect()
}

fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let unsupported = || DomError::UnsupportedSelector(selector.trim().to_string());
    let mut parts = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize(selector) {
        if token == ">" {
            if pending.is_some() || parts.is_empty() {
                return Err(unsupported());
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let step = parse_step(&token).ok_or_else(unsupported)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(SelectorPart { step, combinator });
    }

    if parts.is_empty() || pending.is_some() {
        return Err(unsupported());
    }
    Ok(parts)
}

/// Split on whitespace and `>`, keeping `[...]` blocks (which may hold
/// spaces inside quotes) intact.
fn tokenize(selector: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        match (ch, quote) {
            (q, Some(open)) if q == open => {
                quote = None;
                current.push(ch);
            }
            (_, Some(_)) => current.push(ch),
            ('"' | '\'', None) if depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            ('[', None) => {
                depth += 1;
                current.push(ch);
            }
            (']', None) => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            (c, None) if depth == 0 && (c.is_whitespace() || c == '>') => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                if c == '>' {
                    tokens.push(">".to_string());
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn split_outside_brackets(selector: &str, separator: char) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in selector.chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                groups.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    groups.push(current);
    groups
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn take_ident(chars: &[char], start: usize) -> Option<(String, usize)> {
    let end = chars[start..]
        .iter()
        .position(|c| !is_ident_char(*c))
        .map_or(chars.len(), |offset| start + offset);
    (end > start).then(|| (chars[start..end].iter().collect(), end))
}

fn parse_step(token: &str) -> Option<SelectorStep> {
    let chars: Vec<char> = token.chars().collect();
    let mut step = SelectorStep::default();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                if step.universal || step.tag.is_some() {
                    return None;
                }
                step.universal = true;
                i += 1;
            }
            '#' => {
                let (id, next) = take_ident(&chars, i + 1)?;
                if step.id.replace(id).is_some() {
                    return None;
                }
                i = next;
            }
            '.' => {
                let (class, next) = take_ident(&chars, i + 1)?;
                step.classes.push(class);
                i = next;
            }
            '[' => {
                let close = chars[i..].iter().position(|c| *c == ']')? + i;
                let inner: String = chars[i + 1..close].iter().collect();
                step.attrs.push(parse_attr(&inner)?);
                i = close + 1;
            }
            _ => {
                if step.tag.is_some()
                    || step.universal
                    || step.id.is_some()
                    || !step.classes.is_empty()
                {
                    return None;
                }
                let (tag, next) = take_ident(&chars, i)?;
                step.tag = Some(tag);
                i = next;
            }
        }
    }

    let empty = step.tag.is_none()
        && !step.universal
        && step.id.is_none()
        && step.classes.is_empty()
        && step.attrs.is_empty();
    (!empty).then_some(step)
}

/// `name` or `name="value"`. Names may contain `:` (`checked:bind`).
fn parse_attr(inner: &str) -> Option<(String, Option<String>)> {
    let (name, value) = match inner.split_once('=') {
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (name.trim(), Some(unquoted.to_string()))
        }
        None => (inner.trim(), None),
    };
    let valid = !name.is_empty() && name.chars().all(|c| is_ident_char(c) || c == ':');
    valid.then(|| (name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// `<ul id="list"><li class="todo completed"><input class="toggle"></li>
    /// <li class="todo"><input class="toggle"></li></ul>`
    fn list_fixture() -> (Document, Element) {
        let doc = Document::new();
        let list = doc.create_element("ul");
        list.set_attribute("id", "list");
        for completed in [true, false] {
            let item = doc.create_element("li");
            item.add_class("todo");
            item.set_class("completed", completed);
            let toggle = doc.create_element("input");
            toggle.add_class("toggle");
            toggle.set_attribute("type", "checkbox");
            toggle.set_checked(completed);
            item.append_child(&toggle);
            list.append_child(&item);
        }
        doc.body().append_child(&list);
        (doc, list)
    }

    #[test]
    fn selects_by_tag_class_and_id() {
        let (doc, _) = list_fixture();
        assert_eq!(doc.count("li").unwrap(), 2);
        assert_eq!(doc.count(".todo").unwrap(), 2);
        assert_eq!(doc.count(".todo.completed").unwrap(), 1);
        assert_eq!(doc.count("#list").unwrap(), 1);
        assert_eq!(doc.count("ul#list > li.todo").unwrap(), 2);
        assert_eq!(doc.count("#list .toggle").unwrap(), 2);
        assert_eq!(doc.count("body > li").unwrap(), 0);
        assert_eq!(doc.count("[type=\"checkbox\"]").unwrap(), 2);
        assert_eq!(doc.count(".completed .toggle, #list").unwrap(), 2);
        assert!(doc.query_selector(".editing").unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_selectors() {
        let doc = Document::new();
        for bad in ["", "  ", "> li", "li >", ".", "#", "li.a b#"] {
            assert!(
                matches!(doc.query_selector(bad), Err(DomError::UnsupportedSelector(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn removal_detaches_subtree() {
        let (doc, list) = list_fixture();
        let first = doc.query_selector(".todo").unwrap().unwrap();
        let toggle = first.query_selector(".toggle").unwrap().unwrap();
        first.remove();

        assert_eq!(doc.count(".todo").unwrap(), 1);
        assert_eq!(list.children().len(), 1);
        assert!(!toggle.is_connected());
        // Detached handles keep their state.
        assert!(toggle.checked());
    }

    #[test]
    fn text_content_and_child_nodes() {
        let doc = Document::new();
        let button = doc.create_element("button");
        button.append_text("Clear completed (");
        let count = doc.create_element("span");
        count.set_text("2");
        button.append_child(&count);
        button.append_text(")");

        assert_eq!(button.child_node_count(), 3);
        assert_eq!(button.children().len(), 1);
        assert_eq!(button.text_content(), "Clear completed (2)");

        count.set_text("3");
        assert_eq!(button.text_content(), "Clear completed (3)");
    }

    #[test]
    fn repeated_set_text_reuses_the_text_node() {
        let doc = Document::new();
        let strong = doc.create_element("strong");
        doc.body().append_child(&strong);
        strong.set_text("0");
        let before = doc.tree.borrow().nodes.len();

        for n in 0..10_000 {
            strong.set_text(&n.to_string());
        }

        assert_eq!(doc.tree.borrow().nodes.len(), before);
        assert_eq!(strong.child_node_count(), 1);
        assert_eq!(strong.text_content(), "9999");
    }

    #[test]
    fn set_text_replaces_mixed_children() {
        let doc = Document::new();
        let label = doc.create_element("label");
        label.append_text("a");
        label.append_child(&doc.create_element("span"));
        label.set_text("b");

        assert_eq!(label.child_node_count(), 1);
        assert!(label.children().is_empty());
        assert_eq!(label.text_content(), "b");
    }

    #[test]
    fn events_bubble_to_ancestors() {
        let (doc, list) = list_fixture();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        list.add_event_listener(EventKind::Change, move |event| {
            let row = event.target.closest(".todo").unwrap().unwrap();
            log.borrow_mut().push((row.has_class("completed"), event.target.checked()));
        });

        let toggle = doc.query_selector(".todo:not-supported");
        assert!(toggle.is_err());

        let toggle = doc.query_selector(".todo .toggle").unwrap().unwrap();
        toggle.set_checked(false);
        toggle.dispatch(EventKind::Change);
        toggle.dispatch(EventKind::Click);

        assert_eq!(*seen.borrow(), vec![(true, false)]);
    }

    #[test]
    fn listeners_may_mutate_the_tree() {
        let (doc, list) = list_fixture();
        list.add_event_listener(EventKind::Click, |event| {
            if let Ok(Some(row)) = event.target.closest("li") {
                row.remove();
            }
        });

        let toggle = doc.query_selector(".toggle").unwrap().unwrap();
        toggle.dispatch(EventKind::Click);
        assert_eq!(doc.count(".todo").unwrap(), 1);
    }

    #[test]
    fn key_events_carry_the_key() {
        let doc = Document::new();
        let input = doc.create_element("input");
        doc.body().append_child(&input);
        let entered = Rc::new(RefCell::new(0));
        let counter = entered.clone();
        input.add_event_listener(EventKind::KeyUp, move |event| {
            if event.is_enter() {
                *counter.borrow_mut() += 1;
            }
        });

        input.dispatch_key("a");
        input.dispatch_key("Enter");
        assert_eq!(*entered.borrow(), 1);
    }

    #[test]
    fn focus_follows_attachment() {
        let doc = Document::new();
        let input = doc.create_element("input");
        assert!(input.focus().is_err());

        doc.body().append_child(&input);
        input.focus().unwrap();
        assert_eq!(doc.active_element(), Some(input.clone()));

        input.blur();
        assert!(doc.active_element().is_none());

        input.focus().unwrap();
        doc.body().clear_children();
        assert!(doc.active_element().is_none());
    }

    #[test]
    fn attributes_with_colons() {
        let doc = Document::new();
        let input = doc.create_element("input");
        input.set_attribute("checked:bind", "complete");
        doc.body().append_child(&input);

        assert!(input.has_attribute("checked:bind"));
        assert_eq!(doc.count("[checked:bind]").unwrap(), 1);
        assert_eq!(doc.get_element_by_id("missing"), None);
    }
}
