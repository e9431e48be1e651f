mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{engine, names, outcome_of, settled};
use lazymod_core::{DeclState, DependencySpec, Deps, ModuleError, ModuleState};

fn concat(deps: &Deps<String>, aliases: &[&str]) -> String {
    aliases
        .iter()
        .map(|alias| deps.get(alias).unwrap())
        .collect()
}

#[test]
fn resolves_a_leaf_module() {
    let (modules, queue) = engine::<String>();
    modules.define_leaf("A", |p, _, _| {
        p.provide("A".into()).unwrap();
    });

    let outcome = outcome_of(&modules, ["A"]);
    assert_eq!(modules.state("A"), ModuleState::NotResolved);
    queue.run_until_idle();

    let deps = settled(&outcome).unwrap();
    assert_eq!(deps.get("A").unwrap(), "A");
    assert_eq!(modules.state("A"), ModuleState::Resolved);
}

#[test]
fn resolves_a_dependency_chain() {
    let (modules, queue) = engine::<String>();
    modules.define("C", ["B", "A"], |p, d, _| {
        p.provide(format!("C{}", concat(&d, &["B", "A"]))).unwrap();
    });
    modules.define("B", ["A"], |p, d, _| {
        p.provide(format!("B{}", d.get("A").unwrap())).unwrap();
    });
    modules.define_leaf("A", |p, _, _| {
        p.provide("A".into()).unwrap();
    });

    let outcome = outcome_of(&modules, ["C"]);
    queue.run_until_idle();

    assert_eq!(settled(&outcome).unwrap().get("C").unwrap(), "CBAA");
    let stat = modules.stat();
    assert_eq!(names(&stat[&DeclState::Resolved]), ["A", "B", "C"]);
}

#[test]
fn factories_run_once_per_declaration() {
    let (modules, queue) = engine::<String>();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    modules.define_leaf("A", move |p, _, _| {
        counter.set(counter.get() + 1);
        p.provide("A".into()).unwrap();
    });
    modules.define("B", ["A"], |p, d, _| p.provide(d.get("A").unwrap()).unwrap());

    let first = outcome_of(&modules, ["A", "B"]);
    let second = outcome_of(&modules, ["B"]);
    queue.run_until_idle();
    let third = outcome_of(&modules, ["A"]);
    queue.run_until_idle();

    for outcome in [first, second, third] {
        assert!(settled(&outcome).is_ok());
    }
    assert_eq!(calls.get(), 1);
}

#[test]
fn redefinitions_receive_the_previous_value() {
    let (modules, queue) = engine::<String>();
    modules.define_leaf("B", |p, _, _| {
        p.provide("B".into()).unwrap();
    });
    modules.define_leaf("A", |p, _, prev| {
        assert!(prev.is_none());
        p.provide("1".into()).unwrap();
    });
    modules.define_leaf("A", |p, _, prev| {
        p.provide(format!("{}2", prev.unwrap())).unwrap();
    });
    modules.define("A", ["B"], |p, d, prev| {
        p.provide(format!("{}{}3", prev.unwrap(), d.get("B").unwrap()))
            .unwrap();
    });

    let outcome = outcome_of(&modules, ["A"]);
    queue.run_until_idle();

    assert_eq!(settled(&outcome).unwrap().get("A").unwrap(), "12B3");
    assert_eq!(modules.describe("A").unwrap().declarations, 3);
}

#[test]
fn aliases_name_the_dependency_for_the_dependent() {
    let (modules, queue) = engine::<String>();
    modules.define_leaf("A", |p, _, _| {
        p.provide("A".into()).unwrap();
    });
    modules.define("B", [("A", "first")], |p, d, _| {
        assert!(!d.contains("A"));
        p.provide(format!("B{}", d.get("first").unwrap())).unwrap();
    });

    let outcome = outcome_of(&modules, [DependencySpec::new("B").aliased("b")]);
    queue.run_until_idle();

    let deps = settled(&outcome).unwrap();
    assert_eq!(deps.get("b").unwrap(), "BA");
    assert_eq!(deps.aliases().collect::<Vec<_>>(), ["b"]);
}

#[test]
fn overrides_build_and_reuse_variants() {
    let (modules, queue) = engine::<Vec<String>>();
    let calls = Rc::new(Cell::new(0));

    modules.define_leaf("A", |p, _, _| {
        p.provide(vec!["a".into()]).unwrap();
    });
    modules.define_leaf("B", |p, _, _| {
        p.provide(vec!["b".into()]).unwrap();
    });
    let counter = Rc::clone(&calls);
    modules.define("C", ["A"], move |p, d, _| {
        counter.set(counter.get() + 1);
        let mut value = d.get("A").unwrap();
        value.push("c".into());
        p.provide(value).unwrap();
    });
    for name in ["D", "E"] {
        modules.define(
            name,
            [DependencySpec::new("C").with_override("A", "B")],
            |p, d, _| p.provide(d.get("C").unwrap()).unwrap(),
        );
    }

    let outcome = outcome_of(&modules, ["C", "D"]);
    queue.run_until_idle();
    let deps = settled(&outcome).unwrap();
    assert_eq!(deps.get("C").unwrap(), ["a", "c"]);
    assert_eq!(deps.get("D").unwrap(), ["b", "c"]);
    assert_eq!(calls.get(), 2);

    let outcome = outcome_of(&modules, ["E"]);
    queue.run_until_idle();
    assert_eq!(settled(&outcome).unwrap().get("E").unwrap(), ["b", "c"]);
    assert_eq!(calls.get(), 2);
    assert_eq!(modules.describe("C").unwrap().variants, 1);
}

#[test]
fn requests_see_definitions_made_later_in_the_same_turn() {
    let (modules, queue) = engine::<String>();
    let outcome = outcome_of(&modules, ["A"]);
    modules.define_leaf("A", |p, _, _| {
        p.provide("late".into()).unwrap();
    });

    queue.run_until_idle();
    assert_eq!(settled(&outcome).unwrap().get("A").unwrap(), "late");
}

#[test]
fn waiting_dependents_resume_when_a_deferred_provide_lands() {
    let (modules, queue) = engine::<String>();
    let parked = Rc::new(RefCell::new(None));

    let slot = Rc::clone(&parked);
    modules.define_leaf("A", move |p, _, _| *slot.borrow_mut() = Some(p));
    modules.define("B", ["A"], |p, d, _| {
        p.provide(format!("B{}", d.get("A").unwrap())).unwrap();
    });

    let first = outcome_of(&modules, ["A"]);
    let second = outcome_of(&modules, ["B"]);
    queue.run_until_idle();
    assert!(first.borrow().is_none());
    assert_eq!(modules.state("A"), ModuleState::InResolving);
    assert_eq!(modules.state("B"), ModuleState::InResolving);

    let provide = parked.borrow_mut().take().unwrap();
    provide.provide("A".into()).unwrap();

    assert_eq!(settled(&first).unwrap().get("A").unwrap(), "A");
    assert_eq!(settled(&second).unwrap().get("B").unwrap(), "BA");
}

#[derive(Debug)]
struct Node {
    name: &'static str,
    peer: &'static str,
    deps: Deps<Rc<Node>>,
}

impl Node {
    fn peer_name(&self) -> Result<&'static str, ModuleError> {
        Ok(self.deps.get(self.peer)?.name)
    }
}

#[test]
fn cycles_resolve_when_values_are_only_read_later() {
    let (modules, queue) = engine::<Rc<Node>>();
    let early_read = Rc::new(RefCell::new(None));

    modules.define("A", ["B"], |p, deps, _| {
        p.provide(Rc::new(Node {
            name: "A",
            peer: "B",
            deps,
        }))
        .unwrap();
    });
    let seen = Rc::clone(&early_read);
    modules.define("B", ["A"], move |p, deps, _| {
        *seen.borrow_mut() = Some(deps.get("A").map(|node| node.name));
        p.provide(Rc::new(Node {
            name: "B",
            peer: "A",
            deps,
        }))
        .unwrap();
    });

    let outcome = outcome_of(&modules, ["A"]);
    queue.run_until_idle();

    let early = early_read.borrow_mut().take().unwrap().unwrap_err();
    assert_eq!(
        early.to_string(),
        "Circular dependence has been detected: \"A -> B -> A\""
    );

    let a = settled(&outcome).unwrap().get("A").unwrap();
    assert_eq!(a.peer_name().unwrap(), "B");
    let b = a.deps.get("B").unwrap();
    assert_eq!(b.peer_name().unwrap(), "A");
}

#[test]
fn separate_instances_do_not_share_modules() {
    let (first, first_queue) = engine::<String>();
    let (second, second_queue) = engine::<String>();
    first.define_leaf("A", |p, _, _| {
        p.provide("first".into()).unwrap();
    });

    let found = outcome_of(&first, ["A"]);
    let missing = outcome_of(&second, ["A"]);
    first_queue.run_until_idle();
    second_queue.run_until_idle();

    assert_eq!(settled(&found).unwrap().get("A").unwrap(), "first");
    assert!(matches!(
        settled(&missing),
        Err(ModuleError::ModuleNotFound { .. })
    ));
    assert!(!second.is_defined("A"));
}

#[test]
fn single_names_need_no_list() {
    let (modules, queue) = engine::<String>();
    modules.define_leaf("A", |p, _, _| {
        p.provide("A".into()).unwrap();
    });
    modules.define("B", "A", |p, d, _| {
        p.provide(format!("B{}", d.get("A").unwrap())).unwrap();
    });

    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    modules.require("B", move |deps| *sink.borrow_mut() = Some(deps.get("B").unwrap()));
    let aliased = outcome_of(&modules, DependencySpec::new("A").aliased("a"));
    queue.run_until_idle();

    assert_eq!(seen.borrow().as_deref(), Some("BA"));
    assert_eq!(settled(&aliased).unwrap().get("a").unwrap(), "A");
}
