use actix_web::{get, App, HttpResponse, HttpServer, Responder};

#[get("/")]
async fn handle() -> impl Responder {
    HttpResponse::Ok().body("OK")
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
