use actix_web::{post, App, HttpRequest, HttpResponse, HttpServer, Responder};

#[post("/")]
async fn handle(req: HttpRequest, body: String) -> impl Responder {
    let id = req
        .headers()
        .get("ce-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    log::info!("received event {}", id);
    HttpResponse::Ok()
        .insert_header(("ce-id", id))
        .insert_header(("ce-source", "function"))
        .insert_header(("ce-type", "echo"))
        .insert_header(("ce-specversion", "1.0"))
        .body(body)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    HttpServer::new(|| App::new().service(handle))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
