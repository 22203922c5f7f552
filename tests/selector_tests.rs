use domscope::error::SelectorError;
use domscope::page::dom::NodeId;
use domscope::page::selector::Selector;
use domscope::page::Page;

fn el(page: &Page, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
    let node = page.create_element(tag);
    for (name, value) in attrs {
        page.set_attribute(node, name, value).unwrap();
    }
    page.append_child(parent, node).unwrap();
    node
}

fn matches(page: &Page, selector: &str, node: NodeId) -> bool {
    Selector::parse(selector).unwrap().matches(&page.document(), node)
}

#[test]
fn test_simple_steps() {
    let page = Page::new();
    let body = page.body();
    let div = el(&page, body, "DIV", &[("id", "main"), ("class", "card active")]);

    assert!(matches(&page, "div", div));
    assert!(matches(&page, "DIV", div));
    assert!(matches(&page, "*", div));
    assert!(matches(&page, "#main", div));
    assert!(matches(&page, ".card", div));
    assert!(matches(&page, "div.card.active#main", div));
    assert!(!matches(&page, ".card.hidden", div));
    assert!(!matches(&page, "span", div));
}

#[test]
fn test_attribute_operators() {
    let page = Page::new();
    let link = el(
        &page,
        page.body(),
        "a",
        &[("href", "https://shop.test/cart"), ("rel", "nofollow noopener"), ("lang", "en-US")],
    );

    assert!(matches(&page, "[href]", link));
    assert!(matches(&page, "a[href='https://shop.test/cart']", link));
    assert!(matches(&page, "[rel~=noopener]", link));
    assert!(matches(&page, "[lang|=en]", link));
    assert!(matches(&page, "[href^=\"https://\"]", link));
    assert!(matches(&page, "[href$=cart]", link));
    assert!(matches(&page, "[href*=shop]", link));
    assert!(!matches(&page, "[rel~=noop]", link));
    assert!(!matches(&page, "[title]", link));
}

#[test]
fn test_combinators() {
    let page = Page::new();
    let body = page.body();
    let list = el(&page, body, "ul", &[("class", "menu")]);
    let first = el(&page, list, "li", &[("class", "first")]);
    let second = el(&page, list, "li", &[]);
    let third = el(&page, list, "li", &[]);
    let link = el(&page, second, "a", &[]);

    assert!(matches(&page, ".menu a", link));
    assert!(matches(&page, "body .menu > li > a", link));
    assert!(!matches(&page, ".menu > a", link));
    assert!(matches(&page, ".first + li", second));
    assert!(!matches(&page, ".first + li", third));
    assert!(matches(&page, ".first ~ li", third));
    assert!(!matches(&page, ".first ~ li", first));
}

#[test]
fn test_groups_and_queries() {
    let page = Page::new();
    let body = page.body();
    let section = el(&page, body, "section", &[]);
    let aside = el(&page, section, "aside", &[]);
    let footer = el(&page, body, "footer", &[]);

    let selector = Selector::parse("aside, footer").unwrap();
    let doc = page.document();
    assert!(selector.matches(&doc, aside));
    assert!(selector.matches(&doc, footer));
    assert_eq!(selector.query_all(&doc, body), vec![aside, footer]);
    assert_eq!(selector.query_first(&doc, section), Some(aside));
    // The root itself is not a candidate
    assert_eq!(Selector::parse("section").unwrap().query_first(&doc, section), None);
}

#[test]
fn test_non_elements_never_match() {
    let page = Page::new();
    let text = page.create_text("hello");
    page.append_child(page.body(), text).unwrap();
    assert!(!matches(&page, "*", text));
    assert!(!matches(&page, "*", page.document().root()));
}

#[test]
fn test_unsupported_syntax_is_rejected() {
    for bad in ["", "   ", "div:hover", "a >", "> a", "div,,p", "[href", "#1abc", "a >> b"] {
        let err = Selector::parse(bad).unwrap_err();
        assert!(
            matches!(err, SelectorError::UnsupportedSelector(_) | SelectorError::Empty),
            "{bad:?} should be rejected"
        );
    }
}
