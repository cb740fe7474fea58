//! Integration tests for tether.
//!
//! These tests exercise the public API from outside the crate, verifying that
//! properties, events, entities, bindings and views work together correctly.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::json;

use tether::event::{Flow, BIND, INIT, TEMPLATE_LOADED};
use tether::model::{HashOptions, ListOptions};
use tether::prelude::*;
use tether::reactive::scheduler;
use tether::testing::{render_children, visible_text, Pilot};
use tether::view::StaticTemplateLoader;

fn recorder() -> (Rc<RefCell<Vec<String>>>, Listener) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_c = log.clone();
    let listener = Listener::new(move |e| log_c.borrow_mut().push(e.event_type().to_owned()));
    (log, listener)
}

// ---------------------------------------------------------------------------
// Properties and events
// ---------------------------------------------------------------------------

#[test]
fn make_bindable_twice_notifies_once() {
    let obs = Observable::new();
    obs.set("name", "a");
    obs.make_bindable(&["name"]);
    obs.make_bindable(&["name"]);
    let (log, listener) = recorder();
    obs.add_event_listener("*", listener).unwrap();

    obs.set("name", "b");
    assert_eq!(*log.borrow(), vec!["change:name", "change"]);
}

#[test]
fn deep_equal_write_is_silent() {
    let obs = Observable::new();
    obs.set("name", "Conbo");
    obs.set("tags", Value::from(json!(["a", "b"])));
    obs.make_bindable(&["name", "tags"]);
    let (log, listener) = recorder();
    obs.add_event_listener("*", listener).unwrap();

    obs.set("name", String::from("Conbo"));
    obs.set("tags", Value::from(json!(["a", "b"])));
    assert!(log.borrow().is_empty());
}

#[test]
fn listeners_run_by_descending_priority() {
    let dispatcher = Dispatcher::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    for priority in [1, 5, 3] {
        let order = order.clone();
        dispatcher
            .add_event_listener_with(
                "ping",
                Listener::new(move |_| order.borrow_mut().push(priority)),
                ListenerOptions::new().priority(priority),
            )
            .unwrap();
    }
    dispatcher.dispatch_type("ping").unwrap();
    assert_eq!(*order.borrow(), vec![5, 3, 1]);
}

#[test]
fn once_listener_fires_once_and_is_removed() {
    let dispatcher = Dispatcher::new();
    let (log, listener) = recorder();
    dispatcher
        .add_event_listener_with("ping", listener.clone(), ListenerOptions::new().once())
        .unwrap();
    dispatcher.dispatch_type("ping").unwrap();
    dispatcher.dispatch_type("ping").unwrap();
    assert_eq!(log.borrow().len(), 1);
    assert!(!dispatcher.has_event_listener("ping", Some(&listener), None));
}

#[test]
fn stop_flow_only_affects_current_dispatch() {
    let dispatcher = Dispatcher::new();
    let (log, listener) = recorder();
    dispatcher
        .add_event_listener_with(
            "ping",
            Listener::with_flow(|_| Flow::Stop),
            ListenerOptions::new().priority(10),
        )
        .unwrap();
    dispatcher.add_event_listener("ping pong", listener).unwrap();

    dispatcher.dispatch_type("ping").unwrap();
    assert!(log.borrow().is_empty());
    dispatcher.dispatch_type("pong").unwrap();
    assert_eq!(*log.borrow(), vec!["pong"]);
}

#[test]
fn empty_event_type_is_rejected() {
    let dispatcher = Dispatcher::new();
    assert!(dispatcher.add_event_listener(" ", Listener::new(|_| {})).is_err());
    assert!(Event::new("").is_err());
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[test]
fn list_push_coerces_to_item_class() {
    let point = ItemClass::new("Point", Hash::with_options);
    let list = List::with_options(ListOptions::new().item_class(point.clone()));
    let (log, listener) = recorder();
    list.add_event_listener("*", listener).unwrap();

    list.push(json!({"a": 1}));
    assert_eq!(list.len(), 1);
    assert_eq!(list.get("length"), Value::from(1));
    assert_eq!(*log.borrow(), vec!["add", "change:length", "change"]);

    let item = list.item_at(0);
    assert!(point.is_instance(&item));
    assert_eq!(item.as_hash().map(|h| h.get("a")), Some(Value::from(1)));
}

#[test]
fn list_index_properties_follow_source() {
    let list = List::new();
    list.push(json!({"a": 1}));
    let via_index = list.get("0");
    assert!(via_index.strict_eq(&list.item_at(0)));

    list.pop();
    assert!(!list.observable().has_property("0"));
}

#[test]
fn list_forwards_item_changes() {
    let list = List::from_vec(vec![Value::from(json!({"name": "a"}))]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_c = seen.clone();
    list.add_event_listener(
        "change",
        Listener::new(move |e| seen_c.borrow_mut().push(e.property.clone())),
    )
    .unwrap();
    let item = list.item_at(0);
    item.as_hash().unwrap().set("name", "b");
    assert_eq!(*seen.borrow(), vec![Some("name".to_owned())]);
}

#[test]
fn hash_json_excludes_private_keys() {
    let hash = Hash::with_options(
        HashOptions::new()
            .with("a", 1)
            .with("b", "x")
            .with("_secret", true),
    );
    assert_eq!(hash.to_json(), json!({"a": 1, "b": "x"}));
}

#[test]
fn context_injects_and_runs_commands() {
    struct Save(Rc<RefCell<Vec<String>>>);
    impl Command for Save {
        fn execute(&mut self, event: &Event) {
            self.0.borrow_mut().push(event.event_type().to_owned());
        }
    }

    let context = Context::new();
    context.map_singleton("service", "api").unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_c = log.clone();
    context
        .map_command("save", CommandFactory::new(move |_| Box::new(Save(log_c.clone()))))
        .unwrap();

    let hash = Hash::with_options(HashOptions::new().with("service", Value::Undefined));
    hash.set_context(Some(context.clone()));
    assert_eq!(hash.get("service"), Value::from("api"));

    context.dispatch_event(Event::new("save").unwrap());
    assert_eq!(*log.borrow(), vec!["save"]);

    hash.set_context(None);
    assert!(hash.get("service").is_undefined());
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

#[test]
fn element_binding_is_two_way() {
    let doc = Document::new();
    doc.set_inner_html(doc.body(), "<input type=\"text\">").unwrap();
    let input = doc.element_children(doc.body())[0];
    let source = Observable::new();
    source.set("p", "x");

    let binder = Binder::new();
    let records = binder.bind_element(&source, "p", &doc, input, None).unwrap();
    assert_eq!(doc.value(input), "x");

    source.set("p", "y");
    assert_eq!(doc.value(input), "y");

    doc.simulate_input(input, "z").unwrap();
    assert_eq!(source.get("p"), Value::from("z"));

    doc.simulate_input(input, "42").unwrap();
    assert_eq!(source.get("p"), Value::from(42));

    for record in records {
        record.release();
    }
    source.set("p", "gone");
    assert_eq!(doc.value(input), "42");
}

#[test]
fn unbind_view_tears_down_every_binding() {
    let doc = Document::new();
    let view = View::new(
        ViewOptions::new(&doc)
            .template("<p cb-text=\"title\"></p><input cb-bind=\"title\">")
            .property("title", "one"),
    );
    let p = doc.element_children(view.element())[0];
    assert_eq!(doc.text_content(p), "one");
    assert!(view.binding_count() > 0);

    view.unbind_view();
    assert_eq!(view.binding_count(), 0);
    view.set("title", "two");
    assert_eq!(doc.text_content(p), "one");

    view.bind_view().unwrap();
    assert_eq!(doc.text_content(p), "two");
}

#[test]
fn bind_events_are_deferred() {
    let doc = Document::new();
    doc.set_inner_html(doc.body(), "<div id=\"host\"><b cb-text=\"label\"></b></div>")
        .unwrap();
    let host = doc.get_element_by_id(doc.body(), "host").unwrap();
    let bold = doc.element_children(host)[0];
    let (log, listener) = recorder();
    doc.add_event_listener(bold, BIND, listener).unwrap();

    let _view = View::new(ViewOptions::new(&doc).element(host).property("label", "hi"));
    assert!(log.borrow().is_empty());
    scheduler::flush();
    assert_eq!(*log.borrow(), vec![BIND]);
}

#[test]
fn unresolvable_paths_do_not_stop_the_scan() {
    let doc = Document::new();
    let binder = Binder::new();
    binder.set_log_enabled(false);
    let view = View::new(
        ViewOptions::new(&doc)
            .binder(binder)
            .template(
                "<i cb-text=\"missing.deep.path\"></i><u cb-bogus=\"x\"></u>\
                 <b cb-text=\"ok\"></b>",
            )
            .property("ok", "fine"),
    );
    let bold = doc.element_children(view.element())[2];
    assert_eq!(doc.text_content(bold), "fine");
}

#[test]
fn custom_directive_applies_through_view() {
    let doc = Document::new();
    let binder = Binder::new();
    binder.register_attribute(
        "fxShout",
        Directive::new(|call| {
            let text = call.value.to_display_string().to_uppercase();
            call.document.set_text_content(call.element, &text);
        }),
    );
    let view = View::new(
        ViewOptions::new(&doc)
            .binder(binder)
            .template("<h1 fx-shout=\"title\"></h1>")
            .property("title", "hello"),
    );
    let h1 = doc.element_children(view.element())[0];
    assert_eq!(doc.text_content(h1), "HELLO");
    view.set("title", "bye");
    assert_eq!(doc.text_content(h1), "BYE");
}

#[test]
fn parse_function_formats_value() {
    let doc = Document::new();
    let view = View::new(
        ViewOptions::new(&doc)
            .template("<span cb-text=\"price|currency\"></span>")
            .property("price", 5)
            .setup(|view| {
                view.set(
                    "currency",
                    Callback::new(|v| Value::from(format!("${}", v.to_display_string()))),
                );
            }),
    );
    let span = doc.element_children(view.element())[0];
    assert_eq!(doc.text_content(span), "$5");
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

#[test]
fn repeat_renders_list_items() {
    let pilot = Pilot::new();
    pilot
        .mount(
            "<div cb-app=\"app\"><ul id=\"people\">\
             <li cb-repeat=\"people\" cb-text=\"data.name\"></li></ul></div>",
        )
        .unwrap();
    let people = List::from_vec(vec![
        Value::from(json!({"name": "Ada"})),
        Value::from(json!({"name": "Grace"})),
    ]);
    let app = Application::with_registry(
        pilot.document(),
        AppConfig::new(),
        ViewRegistry::new(),
        |options| options.property("people", people.clone()),
    );
    let ul = pilot.find("people").unwrap();
    insta::assert_snapshot!(render_children(pilot.document(), ul), @r#"
    <li class="cb-repeat cb-view" cb-text="data.name">
      "Ada"
    <li class="cb-repeat cb-view" cb-text="data.name">
      "Grace"
    "#);

    people.push(json!({"name": "Linus"}));
    let names: Vec<String> = pilot
        .document()
        .element_children(ul)
        .into_iter()
        .map(|li| visible_text(pilot.document(), li))
        .collect();
    assert_eq!(names, vec!["Ada", "Grace", "Linus"]);

    app.remove();
    assert!(!pilot.document().contains(ul));
}

#[test]
fn form_round_trip_through_pilot() {
    let pilot = Pilot::new();
    pilot
        .mount(
            "<div cb-app=\"app\">\
             <input id=\"name\" cb-bind=\"name\">\
             <input id=\"agree\" type=\"checkbox\" cb-bind=\"agree\">\
             <button id=\"go\" cb-onclick=\"submit\" cb-enabled=\"agree\">Go</button>\
             <p id=\"greeting\" cb-text=\"name\" cb-show=\"agree\"></p></div>",
        )
        .unwrap();
    let submitted = Rc::new(RefCell::new(0));
    let count = submitted.clone();
    let app = Application::with_registry(
        pilot.document(),
        AppConfig::new(),
        ViewRegistry::new(),
        move |options| {
            let count = count.clone();
            options.setup(move |view| {
                let count = count.clone();
                view.set(
                    "submit",
                    Callback::new(move |_| {
                        *count.borrow_mut() += 1;
                        Value::Undefined
                    }),
                );
            })
        },
    );
    pilot.flush();

    let go = pilot.find("go").unwrap();
    assert!(pilot.document().has_attribute(go, "disabled"));
    assert!(!pilot.is_visible("greeting").unwrap());

    pilot.type_text("name", "Ada").unwrap();
    pilot.toggle("agree", true).unwrap();
    assert!(!pilot.document().has_attribute(go, "disabled"));
    assert!(pilot.is_visible("greeting").unwrap());
    assert_eq!(pilot.text("greeting").unwrap(), "Ada");

    pilot.click("go").unwrap();
    assert_eq!(*submitted.borrow(), 1);
    assert_eq!(app.view().get("agree"), Value::from(true));
}

#[test]
fn nested_view_binds_its_own_scope() {
    let doc = Document::new();
    doc.set_inner_html(
        doc.body(),
        "<div cb-app=\"app\"><span id=\"outer\" cb-text=\"title\"></span>\
         <div cb-view=\"Badge\"><span id=\"inner\" cb-text=\"title\"></span></div></div>",
    )
    .unwrap();
    let registry = ViewRegistry::new();
    registry.register("Badge", |options| View::new(options.property("title", "badge")));
    let app = Application::with_registry(&doc, AppConfig::new(), registry, |options| {
        options.property("title", "app")
    });

    let outer = doc.get_element_by_id(doc.body(), "outer").unwrap();
    let inner = doc.get_element_by_id(doc.body(), "inner").unwrap();
    assert_eq!(doc.text_content(outer), "app");
    assert_eq!(doc.text_content(inner), "badge");

    app.view().set("title", "changed");
    assert_eq!(doc.text_content(inner), "badge");
}

#[test]
fn application_runs_deferred_events_on_start() {
    let doc = Document::new();
    doc.set_inner_html(
        doc.body(),
        "<div cb-app=\"app\"><input id=\"name\" cb-bind=\"name\"></div>",
    )
    .unwrap();
    let input = doc.get_element_by_id(doc.body(), "name").unwrap();
    let (log, listener) = recorder();
    doc.add_event_listener(input, BIND, listener.clone()).unwrap();

    let app = Application::with_registry(&doc, AppConfig::new(), ViewRegistry::new(), |options| {
        let listener = listener.clone();
        options.setup(move |view| {
            view.add_event_listener(INIT, listener.clone()).unwrap();
        })
    });
    assert_eq!(*log.borrow(), vec![BIND, INIT]);
    assert_eq!(scheduler::pending(), 0);

    doc.simulate_input(input, "Ada").unwrap();
    assert_eq!(app.view().get("name"), Value::from("Ada"));
}

#[test]
fn reloading_a_template_rebinds_nested_views_once() {
    let doc = Document::new();
    let shared = Hash::with_options(HashOptions::new().with("x", 1));
    let registry = ViewRegistry::new();
    let model = shared.clone();
    registry.register("Child", move |options| {
        View::new(
            options
                .property("model", model.clone())
                .template("<span cb-text=\"model.x\"></span>"),
        )
    });
    let app = Application::with_registry(&doc, AppConfig::new(), registry, |options| {
        options.template("<div cb-view=\"Child\"></div>")
    });
    let first = app.view().child_views();

    app.view().init_template();
    app.view().init_template();
    app.process();

    assert!(first.iter().all(View::is_removed));
    assert_eq!(app.view().child_views().len(), 1);
    assert_eq!(shared.dispatcher().listener_count("change:x"), 1);

    shared.set("x", 5);
    assert_eq!(visible_text(&doc, app.element()), "5");
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn url_template_loads_then_binds() {
    let doc = Document::new();
    let loader = StaticTemplateLoader::new().with("card.html", "<h2 cb-text=\"title\"></h2>");
    let view = View::new(
        ViewOptions::new(&doc)
            .template_url("card.html")
            .property("title", "Card"),
    );
    let (log, listener) = recorder();
    view.add_event_listener(&format!("{TEMPLATE_LOADED} {INIT}"), listener)
        .unwrap();
    assert!(!view.is_bound());

    view.load_template(&loader, "card.html").await;
    scheduler::flush();
    assert_eq!(doc.inner_html(view.element()), "<h2 cb-text=\"title\">Card</h2>");
    assert_eq!(*log.borrow(), vec![TEMPLATE_LOADED, INIT]);
}

#[tokio::test]
async fn missing_template_reports_error() {
    let doc = Document::new();
    let view = View::new(ViewOptions::new(&doc).template_url("nope.html"));
    let (log, listener) = recorder();
    view.add_event_listener("templateerror", listener).unwrap();

    view.load_template(&StaticTemplateLoader::new(), "nope.html").await;
    assert_eq!(*log.borrow(), vec!["templateerror"]);
    assert!(doc.children(view.element()).is_empty());
}
