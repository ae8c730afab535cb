use super::*;
use std::cell::RefCell;

use crate::dom::MemoryDocument;
use crate::runtime::TestScheduler;
use crate::{h, values, ComponentClass, EventHandler, RenderResult, State, XLINK_NS};

thread_local! {
    static LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static MOUNTED: RefCell<Vec<ComponentHandle>> = RefCell::new(Vec::new());
    static TOGGLE: EventHandler = EventHandler::new(|_, receiver| {
        if let Some(this) = receiver {
            log(format!("toggle {} alive={}", this.id(), this.is_alive()));
            this.set_state(values! { "on" => true });
        }
    });
}

fn log(entry: impl Into<String>) {
    LOG.with(|log| log.borrow_mut().push(entry.into()));
}

fn take_log() -> Vec<String> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

fn remember(this: &ComponentHandle) {
    MOUNTED.with(|mounted| mounted.borrow_mut().push(this.clone()));
}

fn mounted() -> Vec<ComponentHandle> {
    MOUNTED.with(|mounted| mounted.borrow().clone())
}

fn label(props: &Props) -> String {
    props
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string()
}

fn children_of(props: &Props) -> Vec<VNode> {
    props
        .get("children")
        .and_then(Value::as_nodes)
        .map(<[VNode]>::to_vec)
        .unwrap_or_default()
}

macro_rules! unit_class {
    ($($name:ident),+ $(,)?) => {
        $(
            impl ComponentClass for $name {
                fn create(_props: &Props, _context: &Context) -> Self {
                    $name
                }
            }
        )+
    };
}

struct Tracer;

impl Component for Tracer {
    fn hooks(&self) -> Hooks {
        Hooks::WILL_MOUNT
            | Hooks::DID_MOUNT
            | Hooks::WILL_UNMOUNT
            | Hooks::WILL_RECEIVE_PROPS
            | Hooks::WILL_UPDATE
            | Hooks::DID_UPDATE
    }

    fn render(&mut self, props: &Props, _state: &State, _context: &Context) -> RenderResult {
        let label = label(props);
        log(format!("render {label}"));
        Ok(Some(h("section", values! { "class" => label }, children_of(props))))
    }

    fn component_will_mount(&mut self, this: &ComponentHandle) -> anyhow::Result<()> {
        log(format!("will_mount {}", label(&this.props())));
        Ok(())
    }

    fn component_did_mount(&mut self, this: &ComponentHandle) -> anyhow::Result<()> {
        log(format!("did_mount {}", label(&this.props())));
        Ok(())
    }

    fn component_will_unmount(&mut self, this: &ComponentHandle) {
        log(format!("will_unmount {}", label(&this.props())));
    }

    fn component_will_receive_props(
        &mut self,
        _this: &ComponentHandle,
        next_props: &Props,
        _next_context: &Context,
    ) -> anyhow::Result<()> {
        log(format!("will_receive_props {}", label(next_props)));
        Ok(())
    }

    fn component_will_update(
        &mut self,
        _this: &ComponentHandle,
        next_props: &Props,
        _next_state: &State,
        _next_context: &Context,
    ) -> anyhow::Result<()> {
        log(format!("will_update {}", label(next_props)));
        Ok(())
    }

    fn component_did_update(
        &mut self,
        this: &ComponentHandle,
        _prev_props: &Props,
        _prev_state: &State,
        _prev_context: &Context,
    ) -> anyhow::Result<()> {
        log(format!("did_update {}", label(&this.props())));
        Ok(())
    }
}

struct Gate;

impl Component for Gate {
    fn hooks(&self) -> Hooks {
        Hooks::SHOULD_UPDATE | Hooks::WILL_UPDATE | Hooks::DID_UPDATE
    }

    fn initial_state(&self, _props: &Props) -> State {
        values! { "allow" => true, "n" => 0 }
    }

    fn render(&mut self, _props: &Props, state: &State, _context: &Context) -> RenderResult {
        log("gate render");
        let n = state.get("n").and_then(Value::as_number).unwrap_or(-1.0);
        Ok(Some(VNode::text(format!("n={n}"))))
    }

    fn should_component_update(
        &mut self,
        _this: &ComponentHandle,
        _next_props: &Props,
        next_state: &State,
        _next_context: &Context,
    ) -> bool {
        next_state.get("allow").map_or(true, Value::is_truthy)
    }

    fn component_will_update(
        &mut self,
        _this: &ComponentHandle,
        _next_props: &Props,
        _next_state: &State,
        _next_context: &Context,
    ) -> anyhow::Result<()> {
        log("gate will_update");
        Ok(())
    }

    fn component_did_update(
        &mut self,
        _this: &ComponentHandle,
        _prev_props: &Props,
        _prev_state: &State,
        _prev_context: &Context,
    ) -> anyhow::Result<()> {
        log("gate did_update");
        Ok(())
    }
}

struct Counter;

impl Component for Counter {
    fn hooks(&self) -> Hooks {
        Hooks::DID_MOUNT
    }

    fn initial_state(&self, _props: &Props) -> State {
        values! { "count" => 0 }
    }

    fn render(&mut self, _props: &Props, state: &State, _context: &Context) -> RenderResult {
        log("counter render");
        let count = state.get("count").and_then(Value::as_number).unwrap_or(0.0);
        Ok(Some(h("span", values! {}, [VNode::text(count.to_string())])))
    }

    fn component_did_mount(&mut self, this: &ComponentHandle) -> anyhow::Result<()> {
        remember(this);
        Ok(())
    }
}

struct Flaky;

impl Component for Flaky {
    fn hooks(&self) -> Hooks {
        Hooks::DID_MOUNT
    }

    fn render(&mut self, props: &Props, state: &State, _context: &Context) -> RenderResult {
        if state.get("fail").is_some_and(Value::is_truthy) {
            anyhow::bail!("{} refused to render", label(props));
        }
        let v = state.get("v").and_then(Value::as_number).unwrap_or(0.0);
        Ok(Some(VNode::text(format!("{}:{v}", label(props)))))
    }

    fn component_did_mount(&mut self, this: &ComponentHandle) -> anyhow::Result<()> {
        remember(this);
        Ok(())
    }
}

struct Broken;

impl Component for Broken {
    fn render(&mut self, _props: &Props, _state: &State, _context: &Context) -> RenderResult {
        Err(anyhow::anyhow!("always broken"))
    }
}

struct Switcher;

impl Component for Switcher {
    fn hooks(&self) -> Hooks {
        Hooks::DID_MOUNT
    }

    fn render(&mut self, _props: &Props, state: &State, _context: &Context) -> RenderResult {
        let alt = state.get("alt").is_some_and(Value::is_truthy);
        let tag = if alt { "article" } else { "section" };
        Ok(Some(h(tag, values! {}, [VNode::text("s")])))
    }

    fn component_did_mount(&mut self, this: &ComponentHandle) -> anyhow::Result<()> {
        remember(this);
        Ok(())
    }
}

struct Wrapper;

impl Component for Wrapper {
    fn render(&mut self, _props: &Props, _state: &State, _context: &Context) -> RenderResult {
        Ok(Some(h(ComponentType::class::<Switcher>(), values! {}, [])))
    }
}

fn consumer(_props: &Props, context: &Context) -> RenderResult {
    let theme = context
        .get("theme")
        .and_then(Value::as_str)
        .unwrap_or("none");
    Ok(Some(VNode::text(theme)))
}

struct Provider;

impl Component for Provider {
    fn hooks(&self) -> Hooks {
        Hooks::CHILD_CONTEXT
    }

    fn render(&mut self, _props: &Props, _state: &State, _context: &Context) -> RenderResult {
        Ok(Some(h(ComponentType::function("Consumer", consumer), values! {}, [])))
    }

    fn child_context(&self, _this: &ComponentHandle) -> Context {
        values! { "theme" => "dark" }
    }
}

struct Clicker;

impl Component for Clicker {
    fn render(&mut self, _props: &Props, _state: &State, _context: &Context) -> RenderResult {
        let on_click = EventHandler::new(|event, receiver| {
            let receiver = receiver.map_or("none".to_string(), |this| this.id().to_string());
            log(format!("click {receiver} {}", event.detail.as_str().unwrap_or("-")));
        });
        Ok(Some(h("button", values! { "onClick" => on_click }, [])))
    }
}

/// Every instance binds the same handler, so a recycled root sees no change
/// in its `onClick` prop.
struct Toggle;

impl Component for Toggle {
    fn hooks(&self) -> Hooks {
        Hooks::DID_MOUNT
    }

    fn render(&mut self, _props: &Props, state: &State, _context: &Context) -> RenderResult {
        let on = state.get("on").is_some_and(Value::is_truthy);
        let on_click = TOGGLE.with(EventHandler::clone);
        Ok(Some(h(
            "button",
            values! { "onClick" => on_click },
            [VNode::text(if on { "on" } else { "off" })],
        )))
    }

    fn component_did_mount(&mut self, this: &ComponentHandle) -> anyhow::Result<()> {
        remember(this);
        Ok(())
    }
}

struct Echo;

impl Component for Echo {
    fn hooks(&self) -> Hooks {
        Hooks::DID_MOUNT
    }

    fn render(&mut self, props: &Props, _state: &State, _context: &Context) -> RenderResult {
        let label = label(props);
        log(format!("echo {label}"));
        Ok(Some(VNode::text(label)))
    }

    fn component_did_mount(&mut self, this: &ComponentHandle) -> anyhow::Result<()> {
        remember(this);
        Ok(())
    }
}

unit_class!(
    Tracer, Gate, Counter, Flaky, Broken, Switcher, Wrapper, Provider, Clicker, Toggle, Echo,
);

fn component<T: ComponentClass>(props: Props, children: Vec<VNode>) -> VNode {
    h(ComponentType::class::<T>(), props, children)
}

fn renderer() -> (Renderer<MemoryDocument>, NodeId) {
    let mut document = MemoryDocument::new();
    let container = document.create_element("body", false);
    let runtime = Runtime::new(Arc::new(TestScheduler::default()));
    (Renderer::with_runtime(document, runtime), container)
}

fn mount(vnode: &VNode) -> (Renderer<MemoryDocument>, NodeId) {
    let (mut renderer, container) = renderer();
    renderer.render(vnode, container).expect("initial render");
    (renderer, container)
}

fn markup(renderer: &Renderer<MemoryDocument>, container: NodeId) -> String {
    renderer.document().inner_markup(container)
}

#[test]
fn renders_elements_text_and_attributes() {
    let tree = h(
        "div",
        values! { "class" => "box", "id" => "main" },
        [VNode::text("hi"), h("span", values! {}, [VNode::text("x")])],
    );
    let (renderer, container) = mount(&tree);

    assert_eq!(
        markup(&renderer, container),
        "<div class=\"box\" id=\"main\">hi<span>x</span></div>"
    );
}

#[test]
fn rerendering_an_identical_tree_touches_nothing() {
    let tree = h(
        "div",
        values! { "class" => "box", "style" => Value::style(values! { "width" => 3 }) },
        [h("span", values! {}, [VNode::text("x")])],
    );
    let (mut renderer, container) = mount(&tree);
    let before = renderer.document().stats();
    let invocations = renderer.patcher().invocations();

    renderer.render(&tree.clone(), container).expect("re-render");

    assert_eq!(renderer.document().stats().mutations(), before.mutations());
    assert_eq!(renderer.patcher().invocations(), invocations);
}

#[test]
fn rerendering_a_component_with_same_inputs_patches_nothing() {
    let tree = component::<Tracer>(values! { "label" => "same" }, vec![]);
    let (mut renderer, container) = mount(&tree);
    let invocations = renderer.patcher().invocations();
    let before = renderer.document().stats().mutations();

    renderer.render(&tree, container).expect("re-render");

    assert_eq!(renderer.patcher().invocations(), invocations);
    assert_eq!(renderer.document().stats().mutations(), before);
}

#[test]
fn keyed_children_keep_their_nodes_when_reordered() {
    let list = |keys: &[&str]| {
        h(
            "ul",
            values! {},
            keys.iter()
                .map(|key| h("li", values! { "key" => *key }, [VNode::text(*key)]))
                .collect::<Vec<_>>(),
        )
    };
    let (mut renderer, container) = mount(&list(&["a", "b", "c"]));
    let ul = renderer.root_node(container).expect("list mounted");
    let original = renderer.document().children(ul);
    let created = renderer.document().stats().created;

    renderer.render(&list(&["c", "a", "b"]), container).expect("reorder");

    assert_eq!(
        renderer.document().children(ul),
        vec![original[2], original[0], original[1]]
    );
    assert_eq!(renderer.document().stats().created, created);
    assert_eq!(
        markup(&renderer, container),
        "<ul><li>c</li><li>a</li><li>b</li></ul>"
    );
}

#[test]
fn unkeyed_children_match_by_node_type() {
    let (mut renderer, container) = mount(&h(
        "div",
        values! {},
        [h("p", values! {}, []), h("span", values! {}, [])],
    ));
    let div = renderer.root_node(container).expect("mounted");
    let span = renderer.document().children(div)[1];
    let p = renderer.document().children(div)[0];

    renderer
        .render(&h("div", values! {}, [h("span", values! {}, [])]), container)
        .expect("drop p");

    assert_eq!(renderer.document().children(div), vec![span]);
    assert!(!renderer.document().contains(p));
}

#[test]
fn changed_text_reuses_the_text_node() {
    let (mut renderer, container) = mount(&h("p", values! {}, [VNode::text("a")]));
    let p = renderer.root_node(container).expect("mounted");
    let text = renderer.document().children(p)[0];

    renderer
        .render(&h("p", values! {}, [VNode::text("b")]), container)
        .expect("update text");

    assert_eq!(renderer.document().children(p), vec![text]);
    assert_eq!(renderer.document().text(text), Some("b"));
    assert_eq!(renderer.document().stats().text_writes, 1);
}

#[test]
fn tag_change_replaces_the_node_in_place() {
    let row = |middle: &str| {
        h(
            "div",
            values! {},
            [
                h("b", values! {}, []),
                h(middle, values! {}, []),
                h("i", values! {}, []),
            ],
        )
    };
    let (mut renderer, container) = mount(&row("p"));
    let div = renderer.root_node(container).expect("mounted");
    let old = renderer.document().children(div);

    renderer.render(&row("span"), container).expect("swap tag");

    let now = renderer.document().children(div);
    assert_eq!(now.len(), 3);
    assert_eq!(now[0], old[0]);
    assert_eq!(now[2], old[2]);
    assert_eq!(renderer.document().tag_name(now[1]), Some("span"));
    assert!(!renderer.document().contains(old[1]));
}

#[test]
fn inner_html_and_children_switch_cleanly() {
    let (mut renderer, container) = mount(&h("div", values! {}, [VNode::text("x")]));

    renderer
        .render(
            &h(
                "div",
                values! { "dangerouslySetInnerHTML" => Value::html("<b>y</b>") },
                [],
            ),
            container,
        )
        .expect("to html");
    assert_eq!(markup(&renderer, container), "<div><b>y</b></div>");

    renderer
        .render(&h("div", values! {}, [VNode::text("z")]), container)
        .expect("back to children");
    assert_eq!(markup(&renderer, container), "<div>z</div>");
}

#[test]
fn svg_subtrees_namespace_xlink_attributes() {
    let (renderer, container) = mount(&h(
        "svg",
        values! {},
        [h("use", values! { "xlinkHref" => "#icon" }, [])],
    ));
    let svg = renderer.root_node(container).expect("mounted");
    let used = renderer.document().children(svg)[0];

    assert_eq!(
        renderer.document().attribute_ns(used, Some(XLINK_NS), "href"),
        Some("#icon")
    );
}

#[test]
fn lifecycle_hooks_fire_in_order() {
    let tree = |outer: &str, inner: &str| {
        component::<Tracer>(
            values! { "label" => outer },
            vec![component::<Tracer>(values! { "label" => inner }, vec![])],
        )
    };
    let (mut renderer, container) = mount(&tree("outer", "inner"));
    assert_eq!(
        take_log(),
        vec![
            "will_mount outer",
            "render outer",
            "will_mount inner",
            "render inner",
            "did_mount inner",
            "did_mount outer",
        ]
    );
    let root = renderer.root_component(container).expect("root component");
    assert_eq!(root.phase(), Some(LifecyclePhase::Mounted));

    renderer
        .render(&tree("outer2", "inner2"), container)
        .expect("update");
    assert_eq!(
        take_log(),
        vec![
            "will_receive_props outer2",
            "will_update outer2",
            "render outer2",
            "will_receive_props inner2",
            "will_update inner2",
            "render inner2",
            "did_update inner2",
            "did_update outer2",
        ]
    );

    renderer.unmount_root(container).expect("unmount");
    assert_eq!(take_log(), vec!["will_unmount outer2", "will_unmount inner2"]);
    assert_eq!(markup(&renderer, container), "");
    assert_eq!(renderer.pool().len(), 2);
    assert_eq!(renderer.component_count(), 0);
    assert_eq!(root.phase(), Some(LifecyclePhase::Recycled));
}

#[test]
fn gate_skips_render_but_commits_pending_state() {
    let (mut renderer, container) = mount(&component::<Gate>(values! {}, vec![]));
    take_log();
    let gate = renderer.root_component(container).expect("gate mounted");

    gate.set_state(values! { "allow" => false, "n" => 1 });
    let report = renderer.drain();

    assert!(report.is_clean());
    assert!(take_log().is_empty());
    assert_eq!(gate.state_value("n"), Some(Value::from(1)));
    assert_eq!(markup(&renderer, container), "n=0");

    gate.set_state(values! { "n" => 2 });
    renderer.force_update(gate.id()).expect("force");
    assert_eq!(take_log(), vec!["gate render", "gate did_update"]);
    assert_eq!(markup(&renderer, container), "n=2");

    let report = renderer.drain();
    assert_eq!(report.rendered, 0);
    assert_eq!(report.skipped, 1);
}

#[test]
fn set_state_calls_batch_into_one_render() {
    let (mut renderer, container) = mount(&component::<Counter>(values! {}, vec![]));
    take_log();
    let counter = renderer.root_component(container).expect("counter");

    for _ in 0..3 {
        counter.set_state_with(|state, _| {
            let count = state.get("count").and_then(Value::as_number)?;
            Some(values! { "count" => count + 1.0 })
        });
    }
    assert!(take_log().is_empty());
    assert!(renderer.has_pending_renders());

    let report = renderer.drain();

    assert_eq!(report.rendered, 1);
    assert_eq!(take_log(), vec!["counter render"]);
    assert_eq!(markup(&renderer, container), "<span>3</span>");
    assert!(!renderer.has_pending_renders());
}

#[test]
fn drain_renders_in_the_order_instances_became_dirty() {
    let (mut renderer, container) = mount(&h(
        "div",
        values! {},
        [
            component::<Echo>(values! { "label" => "a" }, vec![]),
            component::<Echo>(values! { "label" => "b" }, vec![]),
            component::<Echo>(values! { "label" => "c" }, vec![]),
        ],
    ));
    take_log();
    let handles = mounted();
    let (a, b, c) = (&handles[0], &handles[1], &handles[2]);

    b.set_state(values! { "n" => 1 });
    a.set_state(values! { "n" => 1 });
    b.set_state(values! { "n" => 2 });
    c.set_state(values! { "n" => 1 });
    let report = renderer.drain();

    assert_eq!(report.rendered, 3);
    assert_eq!(take_log(), vec!["echo b", "echo a", "echo c"]);
    assert_eq!(markup(&renderer, container), "<div>abc</div>");
}

#[test]
fn failing_render_keeps_previous_tree_and_spares_siblings() {
    let (mut renderer, container) = mount(&h(
        "div",
        values! {},
        [
            component::<Flaky>(values! { "label" => "a" }, vec![]),
            component::<Flaky>(values! { "label" => "b" }, vec![]),
        ],
    ));
    let handles = mounted();
    let (a, b) = (&handles[0], &handles[1]);

    a.set_state(values! { "fail" => true });
    b.set_state(values! { "v" => 2 });
    let report = renderer.drain();

    assert_eq!(report.rendered, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].component(), Some(a.id()));
    assert_eq!(report.failures[0].hook(), Some(HookKind::Render));
    assert_eq!(markup(&renderer, container), "<div>a:0b:2</div>");
}

#[test]
fn render_error_on_mount_leaves_an_empty_placeholder() {
    let (mut renderer, container) = renderer();

    let err = renderer
        .render(&component::<Broken>(values! {}, vec![]), container)
        .expect_err("broken render surfaces");

    assert!(matches!(
        err,
        RenderError::Hook {
            hook: HookKind::Render,
            ..
        }
    ));
    let children = renderer.document().children(container);
    assert_eq!(children.len(), 1);
    assert_eq!(renderer.document().text(children[0]), Some(""));
}

#[test]
fn higher_order_parent_follows_child_base() {
    let (mut renderer, container) = mount(&component::<Wrapper>(values! {}, vec![]));
    let wrapper = renderer.root_component(container).expect("wrapper");
    let switcher = mounted().pop().expect("switcher mounted");
    assert_eq!(wrapper.base(), switcher.base());

    switcher.set_state(values! { "alt" => true });
    renderer.drain();

    let article = switcher.base().expect("switcher base");
    assert_eq!(renderer.document().tag_name(article), Some("article"));
    assert_eq!(wrapper.base(), Some(article));
    assert_eq!(renderer.document().children(container), vec![article]);
}

#[test]
fn recycled_instance_reuses_its_cached_root() {
    let with_child = |key: &str| {
        h(
            "div",
            values! {},
            [component::<Tracer>(values! { "key" => key, "label" => key }, vec![])],
        )
    };
    let (mut renderer, container) = mount(&with_child("a"));
    let div = renderer.root_node(container).expect("mounted");
    let cached = renderer.document().children(div)[0];

    renderer
        .render(&h("div", values! {}, []), container)
        .expect("unmount child");
    assert_eq!(renderer.pool().len(), 1);
    assert!(renderer.document().contains(cached));
    assert_eq!(renderer.document().parent(cached), None);

    renderer.render(&with_child("b"), container).expect("remount");

    assert_eq!(renderer.pool().len(), 0);
    assert_eq!(renderer.document().children(div), vec![cached]);
    assert_eq!(renderer.document().class_name(cached), Some("b"));
}

#[test]
fn recycled_root_listeners_follow_the_adopting_instance() {
    let (renderer, container) = renderer();
    let mut renderer = renderer.with_options(RendererOptions::new().with_event_bind(true));
    let tree = h("div", values! {}, [component::<Toggle>(values! {}, vec![])]);
    renderer.render(&tree, container).expect("mount");
    let first = mounted().pop().expect("first toggle");
    let button = first.base().expect("button");

    renderer
        .render(&h("div", values! {}, []), container)
        .expect("unmount toggle");
    renderer.render(&tree, container).expect("remount");
    let second = mounted().pop().expect("second toggle");

    assert_eq!(second.base(), Some(button));
    assert_ne!(second.id(), first.id());
    assert!(!first.is_alive());
    let listener = renderer.patcher().listener(button, "click", false).expect("listener");
    assert_eq!(listener.owner.as_ref().map(ComponentHandle::id), Some(second.id()));

    renderer.dispatch_event(button, Event::new("click", None));
    assert_eq!(take_log(), vec![format!("toggle {} alive=true", second.id())]);
    assert_eq!(renderer.drain().rendered, 1);
    assert_eq!(markup(&renderer, container), "<div><button>on</button></div>");
}

#[test]
fn mount_churn_reuses_arena_slots() {
    let (mut renderer, container) = renderer();
    let echo = component::<Echo>(values! { "label" => "x" }, vec![]);
    let mut ids = Vec::new();
    for _ in 0..50 {
        renderer
            .render(&h("div", values! {}, [echo.clone()]), container)
            .expect("mount");
        ids.push(mounted().pop().expect("echo mounted").id());
        renderer
            .render(&h("div", values! {}, []), container)
            .expect("unmount");
    }

    assert_eq!(renderer.component_count(), 0);
    assert_eq!(renderer.component_slots(), 1);
    assert!(ids.iter().all(|id| id.index() == 0));
    assert_eq!(ids.last().map(|id| id.generation()), Some(49));
    assert!(renderer.handle(ids[0]).is_none());
    assert!(matches!(
        renderer.force_update(ids[0]),
        Err(RenderError::NotMounted(_))
    ));
}

#[test]
fn clearing_the_pool_releases_cached_nodes() {
    let (mut renderer, container) = mount(&h(
        "div",
        values! {},
        [component::<Tracer>(values! { "label" => "x" }, vec![])],
    ));
    let div = renderer.root_node(container).expect("mounted");
    let cached = renderer.document().children(div)[0];
    renderer
        .render(&h("div", values! {}, []), container)
        .expect("unmount child");

    assert_eq!(renderer.clear_pool().expect("clear"), 1);
    assert!(renderer.pool().is_empty());
    assert!(!renderer.document().contains(cached));
}

#[test]
fn component_refs_attach_on_every_pass_and_detach_on_unmount() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let captured: Rc<RefCell<Option<ComponentHandle>>> = Rc::new(RefCell::new(None));
    let callback = {
        let events = events.clone();
        let captured = captured.clone();
        RefCallback::new(move |target| match target {
            Some(RefTarget::Component(handle)) => {
                events.borrow_mut().push("attach");
                captured.borrow_mut().replace(handle);
            }
            Some(RefTarget::Node(_)) => events.borrow_mut().push("node"),
            None => events.borrow_mut().push("detach"),
        })
    };
    let tree = h(
        "div",
        values! {},
        [component::<Tracer>(values! { "label" => "r", "ref" => callback }, vec![])],
    );
    let (mut renderer, container) = mount(&tree);
    renderer.render(&tree, container).expect("update");
    renderer
        .render(&h("div", values! {}, []), container)
        .expect("unmount");

    assert_eq!(*events.borrow(), vec!["attach", "attach", "detach"]);
    let handle = captured.borrow().clone().expect("handle captured");
    assert!(!handle.props().contains_key("ref"));
}

#[test]
fn element_ref_is_detached_before_the_next_is_attached() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let make = |name: &'static str| {
        let events = events.clone();
        RefCallback::new(move |target: Option<RefTarget>| {
            events
                .borrow_mut()
                .push((name, target.and_then(|target| target.node()).is_some()));
        })
    };
    let (mut renderer, container) = mount(&h("input", values! { "ref" => make("f1") }, []));

    renderer
        .render(&h("input", values! { "ref" => make("f2") }, []), container)
        .expect("swap ref");

    assert_eq!(
        *events.borrow(),
        vec![("f1", true), ("f1", false), ("f2", true)]
    );
}

#[test]
fn child_context_reaches_descendants() {
    let (renderer, container) = mount(&component::<Provider>(values! {}, vec![]));
    assert_eq!(markup(&renderer, container), "dark");
}

#[test]
fn dispatch_runs_capture_then_bubble_and_honours_stop() {
    let logged = |entry: &'static str| EventHandler::new(move |_, _| log(entry));
    let tree = |button: EventHandler| {
        h(
            "div",
            values! {
                "onClickCapture" => logged("outer capture"),
                "onClick" => logged("outer bubble"),
            },
            [h("button", values! { "onClick" => button }, [])],
        )
    };
    let (mut renderer, container) = mount(&tree(logged("button")));
    let div = renderer.root_node(container).expect("mounted");
    let button = renderer.document().children(div)[0];

    renderer.dispatch_event(button, Event::new("click", None));
    assert_eq!(take_log(), vec!["outer capture", "button", "outer bubble"]);

    let stopper = EventHandler::new(|event, _| {
        log("button stop");
        event.stop_propagation();
    });
    renderer.render(&tree(stopper), container).expect("rebind");
    let event = renderer.dispatch_event(button, Event::new("click", None));

    assert_eq!(take_log(), vec!["outer capture", "button stop"]);
    assert!(event.is_propagation_stopped());
    assert_eq!(event.target, Some(button));
}

#[test]
fn event_bind_passes_the_owner_and_transform_applies() {
    let (renderer, container) = renderer();
    let options = RendererOptions::new()
        .with_event_bind(true)
        .with_event(|event| event.with_detail(Value::from("wrapped")));
    let mut renderer = renderer.with_options(options);
    renderer
        .render(&component::<Clicker>(values! {}, vec![]), container)
        .expect("mount");
    let clicker = renderer.root_component(container).expect("clicker");
    let button = clicker.base().expect("button");

    renderer.dispatch_event(button, Event::new("click", None));

    assert_eq!(take_log(), vec![format!("click {} wrapped", clicker.id())]);
}

#[test]
fn unknown_targets_are_reported() {
    let (mut renderer, container) = renderer();

    assert!(matches!(
        renderer.force_update(ComponentId::new(99)),
        Err(RenderError::NotMounted(id)) if id == ComponentId::new(99)
    ));
    assert!(matches!(
        renderer.unmount_root(container),
        Err(RenderError::NoRoot(node)) if node == container
    ));
}

#[test]
fn drain_skips_instances_unmounted_meanwhile() {
    let (mut renderer, container) = mount(&h(
        "div",
        values! {},
        [component::<Counter>(values! {}, vec![])],
    ));
    let counter = mounted().pop().expect("counter mounted");

    counter.set_state(values! { "count" => 5 });
    renderer
        .render(&h("div", values! {}, []), container)
        .expect("remove counter");
    let report = renderer.drain();

    assert_eq!(report.rendered, 0);
    assert_eq!(report.skipped, 1);
}

#[test]
fn render_callbacks_fire_in_registration_order() {
    let (mut renderer, container) = mount(&component::<Counter>(values! {}, vec![]));
    let counter = renderer.root_component(container).expect("counter");
    let order = Rc::new(RefCell::new(Vec::new()));
    let push = |value: i32| {
        let order = order.clone();
        move || order.borrow_mut().push(value)
    };

    counter.set_state_then(values! { "count" => 1 }, push(1));
    counter.set_state_then(values! { "count" => 2 }, push(2));
    assert!(order.borrow().is_empty());
    renderer.drain();
    renderer
        .force_update_then(counter.id(), push(3))
        .expect("force");

    assert_eq!(*order.borrow(), vec![1, 2, 3]);
    assert_eq!(markup(&renderer, container), "<span>2</span>");
}
