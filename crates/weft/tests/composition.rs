#![forbid(unsafe_code)]

//! End-to-end composition tests: scopes, factories, bindings and ticks
//! working together through one `Composer`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::Level;
use weft::prelude::*;
use weft::reactive::{BindingResolutionError, UpdateStage};
use weft::tree::ScopeDisciplineError;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init();
}

mod model {
    use weft::prelude::{MemberTable, Reflect};

    /// Source object with private state, as application code would have.
    #[derive(Default)]
    pub struct Counter {
        count: i32,
        limit: i32,
        name: Option<String>,
    }

    impl Counter {
        pub fn bump(&mut self) {
            self.count += 1;
        }

        pub fn rename(&mut self, name: Option<&str>) {
            self.name = name.map(str::to_string);
        }

        pub fn limit(&self) -> i32 {
            self.limit
        }

        pub fn summary(&self) -> String {
            format!("{} of {}", self.count, self.limit)
        }
    }

    impl Reflect for Counter {
        fn members() -> MemberTable<Self> {
            MemberTable::<Self>::new()
                .field("count", |s| &s.count, |s| &mut s.count)
                .field("name", |s| &s.name, |s| &mut s.name)
                .property_rw("limit", Counter::limit, |s: &mut Counter, v: i32| {
                    s.limit = v.clamp(0, 10);
                })
                .property("summary", Counter::summary)
        }
    }
}

use model::Counter;

fn counter() -> Rc<RefCell<Counter>> {
    Rc::new(RefCell::new(Counter::default()))
}

#[test]
fn panel_scope_collects_label() {
    init_tracing();
    let composer = Composer::headless();
    let panel = composer.element().named("panel");
    {
        let _panel = composer.scope(&panel).unwrap();
        composer.label("only child");
    }
    assert_eq!(panel.child_count(), 1);
    assert_eq!(panel.widget().child_count(), 1);
    assert_eq!(panel.child(0).unwrap().kind(), WidgetKind::Label);
}

#[test]
fn scopes_round_trip_current_parent() {
    let composer = Composer::headless();
    let outer = composer.element();
    let inner = composer.element();

    let mut a = composer.scope(&outer).unwrap();
    assert_eq!(composer.current(), Some(outer.clone()));
    let mut b = composer.scope(&inner).unwrap();
    assert_eq!(composer.current(), Some(inner.clone()));

    assert!(matches!(
        a.close(),
        Err(ScopeDisciplineError::NotTop { .. })
    ));
    assert_eq!(composer.depth(), 2);
    assert_eq!(composer.current(), Some(inner));

    b.close().unwrap();
    assert_eq!(composer.current(), Some(outer));
    a.close().unwrap();
    assert_eq!(composer.current(), None);
}

#[test]
fn scope_error_converts_into_compose_error() {
    fn build(composer: &Composer) -> Result<(), ComposeError> {
        let outer = composer.element();
        let inner = composer.element();
        let mut a = composer.scope(&outer)?;
        let _b = composer.scope(&inner)?;
        a.close()?;
        Ok(())
    }

    let composer = Composer::headless();
    let err = build(&composer).unwrap_err();
    assert!(matches!(err, ComposeError::Scope(ScopeDisciplineError::NotTop { .. })));
    assert_eq!(composer.depth(), 0, "guards unwound in order");
}

#[test]
fn owned_value_fires_once_per_write_and_not_on_tick() {
    let composer = Composer::headless();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let value = composer.bind_value(5, Some(Box::new(move |v: &i32| s.borrow_mut().push(*v))));

    value.set(7).unwrap();
    composer.tick();
    composer.tick();
    assert_eq!(*seen.borrow(), vec![7]);
}

#[test]
fn read_only_fires_once_per_change_across_ticks() {
    let composer = Composer::headless();
    let source = Rc::new(Cell::new(1));
    let s = Rc::clone(&source);
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let _binding = composer.bind_read_only(
        move || s.get(),
        Some(Box::new(move |_: &i32| h.set(h.get() + 1))),
    );

    for _ in 0..5 {
        composer.tick();
    }
    assert_eq!(hits.get(), 0);

    source.set(2);
    for _ in 0..5 {
        composer.tick();
    }
    assert_eq!(hits.get(), 1);
}

#[test]
fn bind_field_tracks_private_field() {
    let composer = Composer::headless();
    let source = counter();
    let count = composer
        .bind_field::<Counter, i32>(&source, "count", None)
        .expect("count is a field");

    source.borrow_mut().bump();
    assert_eq!(count.last_seen(), Some(0));
    composer.tick();
    assert_eq!(count.last_seen(), Some(1));
}

#[test]
fn name_and_member_expression_bind_the_same_property() {
    let composer = Composer::headless();
    let source = counter();
    let by_name = composer
        .bind_property::<Counter, i32>(&source, "limit", None)
        .unwrap();
    let by_expr = composer
        .bind_property::<Counter, i32>(&source, member!(Counter, limit()), None)
        .unwrap();

    by_name.set(50).unwrap();
    composer.tick();
    assert_eq!(by_name.last_seen(), Some(10));
    assert_eq!(by_expr.last_seen(), Some(10));
    assert_eq!(composer.accessors().tables_built(), 1);
}

#[test]
fn target_setter_runs_once_and_publishes_reread_value() {
    let composer = Composer::headless();
    let source = counter();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let limit = composer
        .bind_property::<Counter, i32>(
            &source,
            "limit",
            Some(Box::new(move |v: &i32| s.borrow_mut().push(*v))),
        )
        .unwrap();

    limit.set(99).unwrap();
    assert_eq!(limit.write_count(), 1);
    assert_eq!(*seen.borrow(), vec![10]);
}

#[test]
fn optional_field_transitions_both_ways() {
    let composer = Composer::headless();
    let source = counter();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    composer
        .bind_field::<Counter, Option<String>>(
            &source,
            "name",
            Some(Box::new(move |v: &Option<String>| s.borrow_mut().push(v.clone()))),
        )
        .unwrap();

    source.borrow_mut().rename(Some("alpha"));
    composer.tick();
    source.borrow_mut().rename(None);
    composer.tick();
    assert_eq!(*seen.borrow(), vec![Some("alpha".to_string()), None]);
}

#[test]
fn missing_member_logs_and_returns_none() {
    init_tracing();
    let composer = Composer::headless();
    let source = counter();
    assert!(
        composer
            .bind_property::<Counter, i32>(&source, "missing", None)
            .is_none()
    );
    assert!(
        composer
            .bind_field::<Counter, String>(&source, "count", None)
            .is_none(),
        "type mismatch"
    );
    assert_eq!(composer.binding_count(), 0);

    let err = composer
        .accessors()
        .compile_property::<Counter, i32>("count")
        .unwrap_err();
    assert!(matches!(err, BindingResolutionError::KindMismatch { .. }));
}

#[test]
fn bound_panel_updates_on_tick() {
    init_tracing();
    let composer = Composer::headless();
    let source = counter();
    let panel = composer.element().named("counter");
    {
        let _panel = composer.scope(&panel).unwrap();
        if let Some(summary) = composer.bind_property::<Counter, String>(&source, "summary", None) {
            composer.label("").named("summary").bind_text(&summary);
        }
        if let Some(count) = composer.bind_field::<Counter, i32>(&source, "count", None) {
            composer.integer_field().named("count").bind_value_two_way(&count);
        }
    }

    assert_eq!(panel.child("summary").unwrap().text(), "0 of 0");
    source.borrow_mut().bump();
    composer.tick();
    assert_eq!(panel.child("summary").unwrap().text(), "1 of 0");
    assert_eq!(panel.child("count").unwrap().value_as::<i32>(), Some(1));

    panel.child("count").unwrap().set_value(7_i32);
    composer.tick();
    assert_eq!(panel.child("summary").unwrap().text(), "7 of 0");

    assert_eq!(
        render_tree(panel.widget()),
        "Element #counter\n  Label #summary \"7 of 0\"\n  IntegerField #count = 7\n"
    );
}

#[test]
fn panicking_subscriber_does_not_stop_tick() {
    init_tracing();
    let composer = Composer::headless();
    let source = Rc::new(Cell::new(0));

    let s = Rc::clone(&source);
    let fragile = composer.bind_read_only(move || s.get(), None);
    let _boom = fragile.subscribe(|_| panic!("subscriber failed"));

    let s = Rc::clone(&source);
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    let _healthy = composer.bind_read_only(
        move || s.get() * 2,
        Some(Box::new(move |_: &i32| h.set(h.get() + 1))),
    );

    source.set(1);
    let report = composer.tick();
    assert_eq!(hits.get(), 1);
    assert_eq!(report.changed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, UpdateStage::Notify);
}

#[test]
fn derived_binding_drives_enabled_state() {
    let composer = Composer::headless();
    let source = counter();
    let count = composer
        .bind_field::<Counter, i32>(&source, "count", None)
        .unwrap();
    let has_items = composer.derive(&count, |c: &i32| *c > 0);
    let clear = composer.button("Clear");
    clear.bind_enabled(&has_items);
    assert!(!clear.enabled());

    source.borrow_mut().bump();
    composer.tick();
    assert!(clear.enabled());
}

#[test]
fn bindings_under_raw_root_outlive_the_scope() {
    init_tracing();
    let composer = Composer::headless();
    let source = counter();
    let window = composer.backend().create(&WidgetKind::Element);
    {
        let _root = composer.scope_widget(Rc::clone(&window)).unwrap();
        let summary = composer
            .bind_property::<Counter, String>(&source, "summary", None)
            .unwrap();
        composer.label("").bind_text(&summary);
        let count = composer
            .bind_field::<Counter, i32>(&source, "count", None)
            .unwrap();
        composer.integer_field().bind_value_two_way(&count);
    }
    assert_eq!(composer.depth(), 0);
    assert_eq!(window.child_at(0).unwrap().text(), "0 of 0");

    source.borrow_mut().bump();
    composer.tick();
    assert_eq!(window.child_at(0).unwrap().text(), "1 of 0");
    assert_eq!(window.child_at(1).unwrap().value(), WidgetValue::Int(1));

    window.child_at(1).unwrap().set_value(WidgetValue::Int(4));
    composer.tick();
    assert_eq!(window.child_at(0).unwrap().text(), "4 of 0");

    composer.reset();
    source.borrow_mut().bump();
    composer.tick();
    assert_eq!(window.child_at(0).unwrap().text(), "4 of 0");
}

#[test]
fn composing_over_populated_root_keeps_positions() {
    let composer = Composer::headless();
    let source = counter();
    let window = composer.backend().create(&WidgetKind::Element);
    let existing = composer.backend().create(&WidgetKind::Label);
    existing.set_name(Some("header"));
    existing.set_text("Counter");
    window.add_child(existing);

    let root = {
        let _root = composer.scope_widget(Rc::clone(&window)).unwrap();
        let summary = composer
            .bind_property::<Counter, String>(&source, "summary", None)
            .unwrap();
        composer.label("").named("summary").bind_text(&summary);
        composer.current().unwrap()
    };

    assert!(root.is_mirrored());
    assert_eq!(root.child_count(), 2);
    assert_eq!(root.child(0).unwrap().text(), "Counter");
    assert_eq!(root.child("header"), root.child(0));
    assert_eq!(root.child(1), root.child("summary"));

    source.borrow_mut().bump();
    composer.tick();
    assert_eq!(
        render_tree(&window),
        "Element\n  Label #header \"Counter\"\n  Label #summary \"1 of 0\"\n"
    );
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// 0 adds a label, 1 opens a nested element, anything else closes the
        /// innermost nested scope.
        #[test]
        fn scoped_building_keeps_every_node_mirrored(ops in proptest::collection::vec(0_u8..3, 1..24)) {
            let composer = Composer::headless();
            let root = composer.element().named("root");
            let mut guards = vec![composer.scope(&root).unwrap()];
            for (i, op) in ops.iter().enumerate() {
                match op {
                    0 => {
                        composer.label(&i.to_string());
                    }
                    1 => {
                        let group = composer.element();
                        guards.push(composer.scope(&group).unwrap());
                    }
                    _ => {
                        if guards.len() > 1 {
                            let mut inner = guards.pop().unwrap();
                            inner.close().unwrap();
                        }
                    }
                }
                prop_assert_eq!(composer.depth(), guards.len());
            }
            while let Some(mut guard) = guards.pop() {
                guard.close().unwrap();
            }
            prop_assert_eq!(composer.depth(), 0);

            let mut pending = vec![root];
            while let Some(node) = pending.pop() {
                prop_assert!(node.is_mirrored());
                pending.extend(node.children());
            }
        }
    }
}
