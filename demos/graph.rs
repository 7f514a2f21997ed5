//! Walkthrough of the resolver with its diagnostics switched on
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example graph --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example graph --features logging-pretty
//! ```

use graph_injector::{
    Binding, DeclarationType, Generator, Instance, LifeCycle, Parameter, Provider, Resolver,
    TypeDescriptor,
};
use std::sync::Arc;

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: Arc<Database>,
}

#[allow(dead_code)]
struct AuditLog {
    users: Provider,
}

struct Handler(&'static str);

fn main() {
    // Initialize logging - uses JSON if logging-json feature enabled,
    // pretty if logging-pretty enabled
    graph_injector::logging::init();

    println!("=== Graph Injector Demo ===\n");

    let resolver = Resolver::builder()
        .bind(
            Binding::new(
                Instance::of_type::<Database>(),
                Generator::value("Database", Database { url: "postgres://localhost/app".into() }),
            )
            .scoped(LifeCycle::application()),
        )
        .bind(
            Binding::new(
                Instance::new("replica", TypeDescriptor::of::<Database>()),
                Generator::value("Replica", Database { url: "postgres://replica/app".into() }),
            )
            .scoped(LifeCycle::eager_application()),
        )
        .bind(Binding::new(
            Instance::of_type::<UserService>(),
            Generator::from_fn(
                "UserService::new",
                [Parameter::relative(Instance::of_type::<Database>())],
                |args| Ok(UserService { db: args.get(0)? }),
            ),
        ))
        // lazy parameter: the audit log may outlive any one user service
        .bind(
            Binding::new(
                Instance::of_type::<AuditLog>(),
                Generator::from_fn(
                    "AuditLog::new",
                    [Parameter::lazy(Instance::of_type::<UserService>())],
                    |args| Ok(AuditLog { users: args.provider(0)? }),
                ),
            )
            .scoped(LifeCycle::application()),
        )
        .bind(Binding::new(
            Instance::new("http", TypeDescriptor::of::<Handler>()),
            Generator::value("http", Handler("http")),
        ))
        .bind(Binding::new(
            Instance::new("grpc", TypeDescriptor::of::<Handler>()),
            Generator::value("grpc", Handler("grpc")),
        ))
        // discovered rather than declared: only used when nothing else matches
        .bind(
            Binding::new(Instance::of_type::<Handler>(), Generator::value("fallback", Handler("fallback")))
                .declared(DeclarationType::Auto),
        )
        .observe(|resource, _| println!("  [Observer] created {resource}"))
        .build()
        .unwrap();

    println!("Registered {} resources", resolver.len());

    let users = resolver.get::<UserService>().unwrap();
    println!("UserService uses {}", users.db.url);

    let replica = resolver.get_named::<Database>("replica").unwrap();
    println!("Replica at {}", replica.url);

    let audit = resolver.get::<AuditLog>().unwrap();
    let fresh = audit.users.get::<UserService>().unwrap();
    println!("Lazy provider resolved a fresh UserService: {}", !Arc::ptr_eq(&users, &fresh));

    let handlers = resolver.get_all::<Handler>().unwrap();
    let names: Vec<&str> = handlers.iter().map(|h| h.0).collect();
    println!("Handlers in precedence order: {names:?}");

    match resolver.get::<String>() {
        Ok(_) => println!("unexpected String binding"),
        Err(err) => println!("Missing binding reported as: {err}"),
    }

    // Worker contexts share instances across threads that attach to them
    let worker = Resolver::builder()
        .bind(
            Binding::new(Instance::of_type::<Handler>(), Generator::from_fn("job", [], |_| Ok(Handler("job"))))
                .scoped(LifeCycle::worker()),
        )
        .build()
        .unwrap();
    let context = worker.worker().unwrap().attach();
    let here = worker.get::<Handler>().unwrap();
    let there = std::thread::spawn({
        let worker = worker.clone();
        move || {
            worker.worker().unwrap().attach_to(&context);
            worker.get::<Handler>().unwrap()
        }
    })
    .join()
    .unwrap();
    println!("Worker context shared across threads: {}", Arc::ptr_eq(&here, &there));

    println!("\n=== Demo Complete ===");
}
