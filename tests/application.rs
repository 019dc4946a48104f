use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bolt::{
    AppConfig, Bolt,
    context::{Context, DefaultContext},
    error::{BoltError, HttpError, PatternError, ServiceError},
    middleware::Middleware,
    request::Req,
    service::Resolver,
    utils::method::Method,
    validation::{NumberRule, Schema, StringRule, ValidationService},
};

struct TestService {
    value: u32,
}

struct DependedService {
    dependency: Arc<TestService>,
}

fn body(res: &bolt::response::Res) -> String {
    String::from_utf8_lossy(res.body_bytes()).to_string()
}

fn sample_app() -> Bolt<DefaultContext> {
    let mut app = Bolt::new();
    app.service(TestService { value: 69 });
    app.services_mut().factory(|r: &Resolver<'_>| {
        Ok(DependedService { dependency: r.resolve::<TestService>()? })
    });

    app.get("/sample/{id:numeric}", |mut c| async move {
        let service = c.service::<TestService>()?;
        let id: u32 = c.require_param("id")?.parse().unwrap_or(0);
        c.res.text(&(service.value + id - 11).to_string());
        Ok(c)
    });
    app.get("/sample/other-action", |mut c| async move {
        c.res.text("other");
        Ok(c)
    });
    app.get("/dependencies/{id:numeric}", |mut c| async move {
        let depended = c.service::<DependedService>()?;
        let id: u32 = c.require_param("id")?.parse().unwrap_or(0);
        c.res.text(&(depended.dependency.value + id - 27).to_string());
        Ok(c)
    })
    .requires::<DependedService>();
    app
}

#[tokio::test]
async fn exposed_routes_are_dispatched() {
    let mut app = sample_app();
    app.ready().unwrap();

    let route = app.find(&Method::GET, "/sample/other-action").unwrap().unwrap();
    assert_eq!(route.name(), "/sample/other-action");

    let res = app.dispatch(Req::new(Method::GET, "/sample/11")).await;
    assert_eq!(res.code, 200);
    assert_eq!(body(&res), "69");

    let res = app.dispatch(Req::new(Method::GET, "/dependencies/33")).await;
    assert_eq!(res.code, 200);
    assert_eq!(body(&res), "75");

    // クエリとパスの揺れは正規化される
    let res = app.dispatch(Req::new(Method::GET, "/sample//other-action/?x=1")).await;
    assert_eq!(body(&res), "other");
}

#[tokio::test]
async fn not_found_and_method_not_allowed() {
    let mut app = sample_app();
    app.ready().unwrap();

    let res = app.dispatch(Req::new(Method::POST, "/sample/11")).await;
    assert_eq!(res.code, 405);

    let res = app.dispatch(Req::new(Method::GET, "/missing")).await;
    assert_eq!(res.code, 404);

    let res = app.dispatch(Req::new(Method::GET, "/sample/abc")).await;
    assert_eq!(res.code, 404);
}

#[tokio::test]
async fn dispatch_before_ready_is_unavailable() {
    let app = sample_app();
    let res = app.dispatch(Req::new(Method::GET, "/sample/11")).await;
    assert_eq!(res.code, 503);
}

#[tokio::test]
async fn services_are_resolved_per_request() {
    let mut app = sample_app();
    app.ready().unwrap();

    let test_service = app.services().resolve::<TestService>().unwrap();
    let depended = app.services().resolve::<DependedService>().unwrap();
    assert!(Arc::ptr_eq(&test_service, &depended.dependency));

    // リクエストごとのスコープはアプリケーションの生成済みインスタンスを共有しない
    assert_eq!(app.services().instantiated(), 1);
    app.dispatch(Req::new(Method::GET, "/dependencies/33")).await;
    assert_eq!(app.services().instantiated(), 1);
}

#[test]
fn ready_fails_on_malformed_rule() {
    let mut app = Bolt::new();
    app.get("/{some}[/{example}", |c| async move { Ok(c) });

    match app.ready() {
        Err(BoltError::Pattern(PatternError::UnbalancedOptionals(rule))) => {
            assert_eq!(rule, "/{some}[/{example}");
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
    assert!(!app.is_ready());
}

#[test]
fn ready_fails_on_missing_dependency() {
    let mut app = Bolt::new();
    app.get("/needs", |c| async move { Ok(c) }).requires::<TestService>();

    match app.ready() {
        Err(BoltError::Dependency { rule, source: ServiceError::Unresolved(name) }) => {
            assert_eq!(rule, "/needs");
            assert!(name.ends_with("TestService"));
        }
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }

    app.service(TestService { value: 1 });
    assert!(app.ready().is_ok());
}

#[tokio::test]
async fn scopes_and_any() {
    let config = AppConfig::new().any_methods([Method::GET, Method::DELETE]);
    let mut app = Bolt::with_config(config, DefaultContext::new());
    {
        let mut api = app.scope("/api/");
        api.get("/users/{id}", |mut c| async move {
            let id = c.require_param("id")?.to_string();
            c.res.text(&id);
            Ok(c)
        });
        api.any("/ping/", |mut c| async move {
            c.res.text("pong");
            Ok(c)
        });
    }
    app.ready().unwrap();

    let res = app.dispatch(Req::new(Method::GET, "/api/users/7")).await;
    assert_eq!(body(&res), "7");
    let res = app.dispatch(Req::new(Method::DELETE, "/api/ping")).await;
    assert_eq!(body(&res), "pong");
    let res = app.dispatch(Req::new(Method::POST, "/api/ping")).await;
    assert_eq!(res.code, 405);
}

#[tokio::test]
async fn settings_reach_the_handler() {
    let mut app = Bolt::new();
    app.post("/items", |mut c| async move {
        let limit = *c.setting::<usize>("max_length").unwrap_or(&0);
        let text = c.req.text()?.to_string();
        if text.len() > limit {
            return Err(HttpError::BadRequest("too long".to_string()));
        }
        c.res.set_status(201).text(&text);
        Ok(c)
    })
    .setting("max_length", 5usize);
    app.ready().unwrap();

    let res = app.dispatch(Req::new(Method::POST, "/items").with_body("abc")).await;
    assert_eq!(res.code, 201);
    assert_eq!(body(&res), "abc");

    let res = app.dispatch(Req::new(Method::POST, "/items").with_body("abcdefg")).await;
    assert_eq!(res.code, 400);
}

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Middleware<DefaultContext> for Recorder {
    async fn before(&self, c: &mut Context<DefaultContext>) -> Result<(), HttpError> {
        self.log.lock().unwrap().push(format!("before {}", self.name));
        if c.req.header.get("X-Deny").is_some() {
            return Err(HttpError::CUSTOM(403, "denied".to_string()));
        }
        Ok(())
    }

    async fn after(&self, c: &mut Context<DefaultContext>) -> Result<(), HttpError> {
        self.log.lock().unwrap().push(format!("after {}", self.name));
        c.res.set_header("X-Middleware", self.name);
        Ok(())
    }
}

#[tokio::test]
async fn middleware_runs_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut app = Bolt::new();
    app.middleware(Recorder { name: "a", log: Arc::clone(&log) })
        .middleware(Recorder { name: "b", log: Arc::clone(&log) });

    let handler_log = Arc::clone(&log);
    app.get("/", move |mut c| {
        let log = Arc::clone(&handler_log);
        async move {
            log.lock().unwrap().push("handler".to_string());
            c.res.text("ok");
            Ok(c)
        }
    });
    app.ready().unwrap();

    let res = app.dispatch(Req::new(Method::GET, "/")).await;
    assert_eq!(res.code, 200);
    assert_eq!(res.header.get("X-Middleware"), Some("b"));
    assert_eq!(
        *log.lock().unwrap(),
        ["before a", "before b", "handler", "after a", "after b"]
    );

    log.lock().unwrap().clear();
    let res = app.dispatch(Req::new(Method::GET, "/").with_header("X-Deny", "1")).await;
    assert_eq!(res.code, 403);
    assert_eq!(body(&res), "denied");
    assert_eq!(*log.lock().unwrap(), ["before a"]);
}

#[tokio::test]
async fn validator_setting_guards_the_body() {
    let mut app = Bolt::new();
    app.middleware(ValidationService::new());
    app.post("/users", |mut c| async move {
        c.res.set_status(201).text("created");
        Ok(c)
    })
    .validator(
        Schema::new()
            .field("name", StringRule::new().required().min(2))
            .field("age", NumberRule::new().integer().min(0.0)),
    );
    app.post("/free", |mut c| async move {
        c.res.text("free");
        Ok(c)
    });
    app.ready().unwrap();

    let res = app
        .dispatch(Req::new(Method::POST, "/users").with_body(r#"{"name": "Bob", "age": 17}"#))
        .await;
    assert_eq!(res.code, 201);
    assert_eq!(body(&res), "created");

    let res = app
        .dispatch(Req::new(Method::POST, "/users").with_body(r#"{"name": "B", "age": 17}"#))
        .await;
    assert_eq!(res.code, 422);
    assert_eq!(body(&res), "Could not validate request: name is too short");

    let res = app.dispatch(Req::new(Method::POST, "/users")).await;
    assert_eq!(res.code, 422);

    let res = app.dispatch(Req::new(Method::POST, "/users").with_body("{not json")).await;
    assert_eq!(res.code, 400);

    // バリデータの無いルートはボディを見ない
    let res = app.dispatch(Req::new(Method::POST, "/free").with_body("{not json")).await;
    assert_eq!(res.code, 200);
}
