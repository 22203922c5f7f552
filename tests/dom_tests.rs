use std::cell::RefCell;
use std::rc::Rc;

use domscope::error::DomError;
use domscope::page::observer::{MutationKind, MutationObserverInit, MutationRecord};
use domscope::page::Page;

fn observe_all(page: &Page) -> Rc<RefCell<Vec<Vec<MutationRecord>>>> {
    let batches = Rc::new(RefCell::new(Vec::new()));
    let sink = batches.clone();
    let root = page.document().document_element();
    page.observe(
        root,
        MutationObserverInit::all(),
        Rc::new(move |_: &Page, records: &[MutationRecord]| sink.borrow_mut().push(records.to_vec())),
    );
    batches
}

#[test]
fn test_document_skeleton() {
    let page = Page::new();
    let doc = page.document();
    let html = doc.document_element();
    assert_eq!(doc.tag_name(html), Some("html"));
    assert_eq!(doc.children(html), &[doc.head(), doc.body()]);
    assert_eq!(doc.parent(html), Some(doc.root()));
    assert_eq!(doc.describe(doc.root()), "#document");
}

#[test]
fn test_records_are_batched_until_flush() {
    let page = Page::new();
    let batches = observe_all(&page);

    let div = page.create_element("div");
    page.append_child(page.body(), div).unwrap();
    page.set_attribute(div, "class", "card").unwrap();
    assert!(batches.borrow().is_empty());

    assert_eq!(page.flush_mutations(), 2);
    let batches = batches.borrow();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0][0].type_name(), "childList");
    assert_eq!(
        batches[0][1].kind,
        MutationKind::Attributes {
            name: "class".to_string(),
            old_value: None
        }
    );
}

#[test]
fn test_moving_a_node_records_removal_then_addition() {
    let page = Page::new();
    let body = page.body();
    let left = page.create_element("div");
    let right = page.create_element("div");
    let item = page.create_element("span");
    page.append_child(body, left).unwrap();
    page.append_child(body, right).unwrap();
    page.append_child(left, item).unwrap();

    let batches = observe_all(&page);
    page.append_child(right, item).unwrap();
    page.flush_mutations();

    let batches = batches.borrow();
    let records = &batches[0];
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].target, left);
    assert_eq!(
        records[0].kind,
        MutationKind::ChildList {
            added: vec![],
            removed: vec![item]
        }
    );
    assert_eq!(records[1].target, right);
    assert_eq!(page.document().parent(item), Some(right));
}

#[test]
fn test_hierarchy_errors() {
    let page = Page::new();
    let outer = page.create_element("div");
    let inner = page.create_element("div");
    page.append_child(page.body(), outer).unwrap();
    page.append_child(outer, inner).unwrap();

    assert_eq!(
        page.append_child(inner, outer),
        Err(DomError::HierarchyRequest {
            parent: inner,
            child: outer
        })
    );
    let stray = page.create_element("p");
    assert_eq!(
        page.remove_child(outer, stray),
        Err(DomError::NotAChild {
            parent: outer,
            child: stray
        })
    );
    let text = page.create_text("x");
    assert_eq!(page.set_attribute(text, "id", "t"), Err(DomError::NotAnElement(text)));
}

#[test]
fn test_character_data_and_text_content() {
    let page = Page::new();
    let p = page.create_element("p");
    let text = page.create_text("old");
    page.append_child(p, text).unwrap();
    page.append_child(page.body(), p).unwrap();

    let batches = observe_all(&page);
    page.set_data(text, "new").unwrap();
    page.set_text_content(p, "replaced").unwrap();
    page.flush_mutations();

    let batches = batches.borrow();
    assert_eq!(
        batches[0][0].kind,
        MutationKind::CharacterData {
            old_value: "old".to_string()
        }
    );
    assert_eq!(batches[0][1].type_name(), "childList");
    assert_eq!(page.document().text_content(p), "replaced");
}

#[test]
fn test_detached_changes_are_not_observed() {
    let page = Page::new();
    let batches = observe_all(&page);
    let div = page.create_element("div");
    page.set_attribute(div, "class", "tracked").unwrap();
    assert_eq!(page.flush_mutations(), 0);
    assert!(batches.borrow().is_empty());
}

#[test]
fn test_observer_callbacks_can_cause_more_records() {
    let page = Page::new();
    let seen = Rc::new(RefCell::new(0usize));
    let counter = seen.clone();
    let root = page.document().document_element();
    page.observe(
        root,
        MutationObserverInit::all(),
        Rc::new(move |page: &Page, records: &[MutationRecord]| {
            *counter.borrow_mut() += records.len();
            // First delivery reacts with one more mutation
            if *counter.borrow() == 1 {
                page.set_attribute(page.body(), "data-seen", "1").unwrap();
            }
        }),
    );
    let div = page.create_element("div");
    page.append_child(page.body(), div).unwrap();

    assert_eq!(page.flush_mutations(), 2);
    assert_eq!(*seen.borrow(), 2);
}
