#![no_main]

//! Fuzz target for resolution over arbitrary graphs
//!
//! Builds a small registry whose bindings depend on each other in arbitrary
//! shapes and lifecycles, then checks that every resolution terminates with
//! a value or a typed error, and that repeating it gives the same outcome.

use arbitrary::Arbitrary;
use graph_injector::{
    AnyInstance, Binding, DiError, Generator, Instance, LifeCycle, Parameter, RawType, Resolver,
    Result, TypeDescriptor,
};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

const NODES: usize = 6;

#[derive(Debug, Arbitrary)]
struct Node {
    lifecycle: u8,
    qualifier: Option<u8>,
    edges: Vec<Edge>,
}

#[derive(Debug, Arbitrary)]
struct Edge {
    to: u8,
    lazy: bool,
    any: bool,
}

fn lifecycle(choice: u8) -> LifeCycle {
    let standard = LifeCycle::standard();
    // worker needs an attached context; keep it out of the mix
    let usable: Vec<LifeCycle> = standard
        .into_iter()
        .filter(|l| l.name() != "worker" && !l.is_eager())
        .collect();
    usable[choice as usize % usable.len()].clone()
}

fn outcome(result: &Result<AnyInstance>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(DiError::NoMatch { .. }) => 1,
        Err(DiError::Cycle { .. }) => 2,
        Err(DiError::Unstable { .. }) => 3,
        Err(DiError::GeneratorFailed { .. }) => 4,
        Err(_) => 5,
    }
}

fuzz_target!(|nodes: Vec<Node>| {
    let types: Vec<TypeDescriptor> = (0..NODES)
        .map(|i| RawType::concrete(format!("T{i}")).into())
        .collect();

    let mut builder = Resolver::builder();
    for (i, node) in nodes.iter().take(NODES).enumerate() {
        let parameters: Vec<Parameter> = node
            .edges
            .iter()
            .take(4)
            .map(|edge| {
                let ty = types[edge.to as usize % NODES].clone();
                let instance = if edge.any {
                    Instance::new("*", ty)
                } else {
                    Instance::of(ty)
                };
                if edge.lazy {
                    Parameter::lazy(instance)
                } else {
                    Parameter::relative(instance)
                }
            })
            .collect();
        let instance = match node.qualifier {
            Some(q) => Instance::new(format!("q{}", q % 3), types[i].clone()),
            None => Instance::of(types[i].clone()),
        };
        builder = builder.bind(
            Binding::new(instance, Generator::new(format!("T{i}"), parameters, move |_| Ok(Arc::new(i))))
                .scoped(lifecycle(node.lifecycle)),
        );
    }

    let Ok(resolver) = builder.build() else {
        return;
    };

    for ty in &types {
        let first = resolver.resolve_type(ty.clone());
        let second = resolver.resolve_type(ty.clone());
        assert_eq!(outcome(&first), outcome(&second));
        assert_ne!(outcome(&first), 5, "{first:?}");

        let everything = resolver.resolve_named("*", ty.clone());
        assert_ne!(outcome(&everything), 5);
    }
});
