use std::env;

use bolt::{
    Bolt,
    error::HttpError,
    request::Req,
    utils::method::Method,
    validation::{NumberRule, Schema, StringRule, ValidationService},
};

/// 挨拶文を組み立てるサービス
struct Greeter {
    greeting: String,
}

#[tokio::main]
async fn main() {
    env_logger::builder().filter_level(log::LevelFilter::Info).init();

    let mut app = Bolt::new();
    app.service(Greeter { greeting: "Hello".to_string() })
        .middleware(ValidationService::new());

    app.get("/", |mut c| async move {
        c.res.text("Bolt is running");
        Ok(c)
    });

    app.get("/hello[/{name:alpha}]", |mut c| async move {
        let greeter = c.service::<Greeter>()?;
        let name = c.param("name").unwrap_or("World").to_string();
        c.res.text(&format!("{}, {}!", greeter.greeting, name));
        Ok(c)
    })
    .requires::<Greeter>();

    app.get("/json", |mut c| async move {
        c.res.json(r#"{"name": "bolt", "version": "0.1"}"#);
        Ok(c)
    });

    {
        let mut api = app.scope("/api");
        api.get("/users/{id:numeric}", |mut c| async move {
            let id = c.require_param("id")?.to_string();
            c.res.json_value(&serde_json::json!({ "id": id }));
            Ok(c)
        });
        api.post("/users", |mut c| async move {
            let body = c.req.text()?.to_string();
            if body.is_empty() {
                return Err(HttpError::BadRequest("empty body".to_string()));
            }
            c.res.set_status(201).text(&body);
            Ok(c)
        })
        .validator(
            Schema::new()
                .field("name", StringRule::new().required().min(2).max(32))
                .field("age", NumberRule::new().integer().min(0.0)),
        );
    }

    if let Err(e) = app.ready() {
        log::error!("{}", e);
        std::process::exit(1);
    }

    // bolt [METHOD] [PATH] [BODY]
    let mut args = env::args().skip(1);
    let method = Method::from_str(&args.next().unwrap_or_else(|| "GET".to_string()));
    let target = args.next().unwrap_or_else(|| "/".to_string());
    let body = args.next().unwrap_or_default();

    let res = app.dispatch(Req::new(method, &target).with_body(body)).await;
    println!("{}", res.status_line());
    for (key, value) in res.header.iter() {
        println!("{}: {}", key, value);
    }
    println!();
    println!("{}", String::from_utf8_lossy(res.body_bytes()));
}
