use std::cell::{Cell, RefCell};
use std::rc::Rc;

use domscope::config::{DebugConfig, Module};
use domscope::error::{ArgError, HandlerError, InstallError};
use domscope::instrument::console::{EventAction, EventSource, RecordingConsole};
use domscope::instrument::DebugContext;
use domscope::legacy::{
    unbind_label, Arg, BindArgs, Binder, EventMap, LegacyEventApi, Selection, UnbindArgs,
};
use domscope::page::dom::NodeId;
use domscope::page::event::{Event, Handler};
use domscope::page::Page;
use serde_json::{json, Value};

fn el(page: &Page, parent: NodeId, tag: &str, class: &str) -> NodeId {
    let node = page.create_element(tag);
    if !class.is_empty() {
        page.set_attribute(node, "class", class).unwrap();
    }
    page.append_child(parent, node).unwrap();
    node
}

fn counter(label: &str) -> (Handler, Rc<Cell<u32>>) {
    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let handler = Handler::named(label, move |_| {
        seen.set(seen.get() + 1);
        Ok(Value::Null)
    });
    (handler, calls)
}

fn click() -> Event {
    Event::new("click").bubbling(true).cancelable(true)
}

fn instrumented() -> (Page, Rc<DebugContext>, Rc<RecordingConsole>) {
    let page = Page::new();
    Binder::load(&page);
    let (ctx, console) = DebugContext::recording(DebugConfig::default(), &page);
    ctx.install_module(&page, Module::LegacyEvents).unwrap();
    (page, ctx, console)
}

// === Argument normalization ===

#[test]
fn test_positional_handler_slots() {
    let (handler, _) = counter("h");

    let parsed = BindArgs::parse(&[Arg::from("click"), Arg::from(&handler)]).unwrap();
    assert!(matches!(parsed, BindArgs::Positional { handler_slot: 1, selector: None, data: None, .. }));

    let parsed = BindArgs::parse(&[Arg::from("click"), Arg::from(".item"), Arg::from(&handler)]).unwrap();
    match parsed {
        BindArgs::Positional { selector, data, handler_slot, .. } => {
            assert_eq!(selector.as_deref(), Some(".item"));
            assert_eq!(data, None);
            assert_eq!(handler_slot, 2);
        }
        other => panic!("unexpected {other:?}"),
    }

    let parsed = BindArgs::parse(&[Arg::from("click"), Arg::Data(json!({"k": 1})), Arg::from(&handler)]).unwrap();
    match parsed {
        BindArgs::Positional { selector, data, .. } => {
            assert_eq!(selector, None);
            assert_eq!(data, Some(json!({"k": 1})));
        }
        other => panic!("unexpected {other:?}"),
    }

    let parsed = BindArgs::parse(&[
        Arg::from("click"),
        Arg::Null,
        Arg::Data(json!(7)),
        Arg::from(&handler),
    ])
    .unwrap();
    assert!(matches!(parsed, BindArgs::Positional { handler_slot: 3, selector: None, .. }));
}

#[test]
fn test_bind_argument_errors() {
    let (handler, _) = counter("h");
    assert_eq!(BindArgs::parse(&[]).unwrap_err(), ArgError::MissingEvents);
    assert_eq!(
        BindArgs::parse(&[Arg::from("click")]).unwrap_err(),
        ArgError::MissingHandler("click".to_string())
    );
    assert_eq!(
        BindArgs::parse(&[Arg::from(&handler)]).unwrap_err(),
        ArgError::Unexpected { position: 0, found: "function" }
    );
    assert_eq!(
        BindArgs::parse(&[Arg::from("click"), Arg::from(&handler), Arg::from("late")]).unwrap_err(),
        ArgError::Unexpected { position: 2, found: "string" }
    );
}

#[test]
fn test_map_form_and_unbind_shapes() {
    let (a, _) = counter("a");
    let (b, _) = counter("b");
    let map: EventMap = vec![("click".to_string(), a.clone()), ("focus".to_string(), b.clone())];

    let parsed = BindArgs::parse(&[Arg::from(map.clone()), Arg::from(".row")]).unwrap();
    let bindings = parsed.bindings();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].0, "click");
    assert_eq!(bindings[1].1, Some(".row"));
    assert_eq!(bindings[1].3, &b);

    let all = UnbindArgs::parse(&[]).unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].names.is_none());

    let specs = UnbindArgs::parse(&[Arg::from("click"), Arg::from(".row"), Arg::from(&a)]).unwrap();
    assert_eq!(specs[0].selector.as_deref(), Some(".row"));
    assert_eq!(specs[0].handler.as_ref(), Some(&a));

    assert_eq!(UnbindArgs::parse(&[Arg::from(map.clone())]).unwrap().len(), 2);

    assert_eq!(unbind_label(&[]), "all");
    assert_eq!(unbind_label(&[Arg::from("click.menu")]), "click.menu");
    assert_eq!(unbind_label(&[Arg::from(map)]), "click focus");
}

// === The library itself ===

#[test]
fn test_direct_binding_and_namespaced_unbind() {
    let page = Page::new();
    let library = Binder::load(&page);
    let button = el(&page, page.body(), "button", "");
    let selection = Selection::of([button]);
    let (plain, plain_calls) = counter("plain");
    let (spaced, spaced_calls) = counter("spaced");

    library.on(&page, &selection, vec![Arg::from("click"), Arg::from(&plain)]).unwrap();
    library.on(&page, &selection, vec![Arg::from("click.menu"), Arg::from(&spaced)]).unwrap();
    // One native dispatcher per element and type
    assert_eq!(page.platform().listener_count(button, "click"), 1);

    page.dispatch_event(button, &click());
    assert_eq!((plain_calls.get(), spaced_calls.get()), (1, 1));

    library.off(&page, &selection, vec![Arg::from(".menu")]).unwrap();
    page.dispatch_event(button, &click());
    assert_eq!((plain_calls.get(), spaced_calls.get()), (2, 1));

    library.off(&page, &selection, vec![]).unwrap();
    assert_eq!(library.bound_count(button, "click"), 0);
    assert_eq!(page.platform().listener_count(button, "click"), 0);
}

#[test]
fn test_delegated_handlers_run_before_direct_ones() {
    let page = Page::new();
    let library = Binder::load(&page);
    let list = el(&page, page.body(), "ul", "menu");
    let item = el(&page, list, "li", "item");
    let label = el(&page, item, "span", "");

    let order = Rc::new(RefCell::new(Vec::new()));
    let log = order.clone();
    let delegated = Handler::named("delegated", move |call| {
        log.borrow_mut().push(("delegated", call.this, call.event.data()));
        Ok(Value::Null)
    });
    let log = order.clone();
    let direct = Handler::named("direct", move |call| {
        log.borrow_mut().push(("direct", call.this, call.event.data()));
        Ok(Value::Null)
    });

    let selection = Selection::of([list]);
    library.on(&page, &selection, vec![Arg::from("click"), Arg::from(&direct)]).unwrap();
    library
        .on(
            &page,
            &selection,
            vec![Arg::from("click"), Arg::from(".item"), Arg::Data(json!("row")), Arg::from(&delegated)],
        )
        .unwrap();

    page.dispatch_event(label, &click());
    assert_eq!(
        *order.borrow(),
        vec![("delegated", item, Some(json!("row"))), ("direct", list, None)]
    );
}

#[test]
fn test_returning_false_cancels_and_stops() {
    let page = Page::new();
    let library = Binder::load(&page);
    let form = el(&page, page.body(), "form", "");
    let submit = el(&page, form, "button", "");
    let (outer, outer_calls) = counter("outer");

    library.on(&page, &Selection::of([form]), vec![Arg::from("click"), Arg::from(&outer)]).unwrap();
    let stopper = Handler::named("stopper", |_| Ok(Value::Bool(false)));
    library.on(&page, &Selection::of([submit]), vec![Arg::from("click"), Arg::from(&stopper)]).unwrap();

    let proceed = page.dispatch_event(submit, &click());
    assert!(!proceed);
    assert_eq!(outer_calls.get(), 0);
}

#[test]
fn test_trigger_passes_extra_arguments() {
    let page = Page::new();
    let library = Binder::load(&page);
    let widget = el(&page, page.body(), "div", "widget");
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    let handler = Handler::new(move |call| {
        sink.borrow_mut().extend(call.args.iter().cloned());
        Ok(Value::Null)
    });
    library.on(&page, &Selection::of([widget]), vec![Arg::from("refresh"), Arg::from(&handler)]).unwrap();

    library.trigger(&page, &Selection::of([widget]), "refresh", &[json!(1), json!("two")]).unwrap();
    assert_eq!(*received.borrow(), vec![json!(1), json!("two")]);
}

// === Interception ===

#[test]
fn test_install_requires_the_library() {
    let page = Page::new();
    let (ctx, _console) = DebugContext::recording(DebugConfig::default(), &page);
    assert_eq!(
        ctx.install_module(&page, Module::LegacyEvents),
        Err(InstallError::LegacyLibraryMissing)
    );
    Binder::load(&page);
    assert_eq!(ctx.install_module(&page, Module::LegacyEvents), Ok(true));
    assert_eq!(ctx.install_module(&page, Module::LegacyEvents), Ok(false));
}

#[test]
fn test_map_binding_logs_one_add_per_event() {
    let (page, _ctx, console) = instrumented();
    let field = el(&page, page.body(), "input", "");
    let (fn1, _) = counter("fn1");
    let (fn2, _) = counter("fn2");
    let map: EventMap = vec![("click".to_string(), fn1.clone()), ("focus".to_string(), fn2.clone())];

    page.legacy().unwrap().on(&page, &Selection::of([field]), vec![Arg::Map(map)]).unwrap();

    let adds: Vec<_> = console
        .events()
        .into_iter()
        .filter(|e| e.action == EventAction::Add && e.source == EventSource::Legacy)
        .collect();
    assert_eq!(adds.len(), 2);
    assert_eq!(adds[0].name, "click");
    assert_eq!(adds[0].handler.as_ref().map(|h| h.id), Some(fn1.id()));
    assert_eq!(adds[1].name, "focus");
    assert_eq!(adds[1].handler.as_ref().map(|h| h.id), Some(fn2.id()));
    assert_eq!(adds[0].target.id, field);
}

#[test]
fn test_wrapped_handler_logs_trigger_then_runs() {
    let (page, ctx, console) = instrumented();
    let list = el(&page, page.body(), "ul", "");
    let item = el(&page, list, "li", "item");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let console_at_call = console.clone();
    let handler = Handler::named("onItem", move |call| {
        // The trigger line is already out when the handler runs
        sink.borrow_mut().push((call.this, console_at_call.events().len()));
        Ok(Value::Null)
    });

    let library = page.legacy().unwrap();
    library
        .on(&page, &Selection::of([list]), vec![Arg::from("click"), Arg::from(".item"), Arg::from(&handler)])
        .unwrap();
    console.drain();

    page.dispatch_event(item, &click());
    assert_eq!(*seen.borrow(), vec![(item, 1)]);
    let trigger = &console.events()[0];
    assert_eq!(trigger.action, EventAction::Trigger);
    assert_eq!(trigger.source, EventSource::Legacy);
    assert_eq!(trigger.name, "click");
    assert_eq!(trigger.target.id, item);
    assert_eq!(trigger.handler.as_ref().map(|h| h.id), Some(handler.id()));
    assert!(trigger.extra.is_none());

    library.trigger(&page, &Selection::of([item]), "click", &[json!("manual")]).unwrap();
    let last = console.events().pop().unwrap();
    assert_eq!(last.extra, Some(vec![json!("manual")]));

    assert_eq!(ctx.legacy().unwrap().wrappers().wrappers_of(&handler).len(), 1);
}

#[test]
fn test_off_logs_once_and_still_detaches_wrappers() {
    let (page, ctx, console) = instrumented();
    let button = el(&page, page.body(), "button", "");
    let selection = Selection::of([button]);
    let (handler, calls) = counter("h");
    let library = page.legacy().unwrap();
    library.on(&page, &selection, vec![Arg::from("click"), Arg::from(&handler)]).unwrap();
    library.on(&page, &selection, vec![Arg::from("focus"), Arg::from(&handler)]).unwrap();
    console.drain();

    // The original reference removes its proxy: same guid
    library.off(&page, &selection, vec![Arg::from("click"), Arg::from(&handler)]).unwrap();
    page.dispatch_event(button, &click());
    assert_eq!(calls.get(), 0);

    library.off(&page, &selection, vec![]).unwrap();
    let removes: Vec<_> = console
        .events()
        .into_iter()
        .filter(|e| e.action == EventAction::Remove)
        .map(|e| e.name)
        .collect();
    assert_eq!(removes, vec!["click".to_string(), "all".to_string()]);
    assert!(ctx.legacy().unwrap().wrappers().is_empty());
}

#[test]
fn test_bad_arguments_pass_through_unchanged() {
    let (page, _ctx, console) = instrumented();
    let button = el(&page, page.body(), "button", "");
    console.drain();
    let err = page
        .legacy()
        .unwrap()
        .on(&page, &Selection::of([button]), vec![Arg::from("click")])
        .unwrap_err();
    assert_eq!(err, ArgError::MissingHandler("click".to_string()));
    assert!(console.events().is_empty());
}

#[test]
fn test_handler_errors_surface_from_trigger() {
    let (page, _ctx, _console) = instrumented();
    let button = el(&page, page.body(), "button", "");
    let failing = Handler::named("failing", |_| Err(HandlerError::new("nope")));
    let library = page.legacy().unwrap();
    library.on(&page, &Selection::of([button]), vec![Arg::from("save"), Arg::from(&failing)]).unwrap();
    let err = library.trigger(&page, &Selection::of([button]), "save", &[]).unwrap_err();
    assert_eq!(err, HandlerError::new("nope"));
}

#[test]
fn test_trigger_logs_the_bound_names() {
    let page = Page::new();
    Binder::load(&page);
    let config = DebugConfig::from_json(r#"{"ignoreEvents":["mousemove"]}"#);
    let (ctx, console) = DebugContext::recording(config, &page);
    ctx.install_module(&page, Module::LegacyEvents).unwrap();
    let button = el(&page, page.body(), "button", "");
    let selection = Selection::of([button]);
    let library = page.legacy().unwrap();
    let (namespaced, _) = counter("namespaced");
    let (multi, multi_calls) = counter("multi");
    library
        .on(&page, &selection, vec![Arg::from("click.menu"), Arg::from(&namespaced)])
        .unwrap();
    library
        .on(&page, &selection, vec![Arg::from("mousemove click"), Arg::from(&multi)])
        .unwrap();
    console.drain();

    page.dispatch_event(button, &click());
    let names: Vec<String> = console
        .events()
        .into_iter()
        .filter(|e| e.action == EventAction::Trigger)
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["click.menu", "mousemove click"]);

    // The ignore list matches the bound string, for Add and Trigger alike
    console.drain();
    page.dispatch_event(button, &Event::new("mousemove"));
    assert_eq!(multi_calls.get(), 2);
    let events = console.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "mousemove click");
    assert_eq!(events[0].handler.as_ref().map(|h| h.id), Some(multi.id()));
}
