#[macro_use]
extern crate log;

use actix_web::{get, middleware, web, App, HttpResponse, HttpServer, Responder};
use codespeed::handlers;
use codespeed::settings::Settings;
use codespeed::store::{DieselStore, MemoryStore, Store};
use dotenv::dotenv;
use listenfd::ListenFd;
use std::env;
use std::io;
use std::sync::Arc;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body("Codespeed is running, results go to /result/add/ or /api/v1/")
}

fn open_store() -> io::Result<Arc<dyn Store>> {
    if env::var("DATABASE_URL").is_err() {
        warn!("DATABASE_URL not set, results are kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = DieselStore::connect().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(Arc::new(store))
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings =
        Settings::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let store = web::Data::from(open_store()?);
    let settings = web::Data::new(settings);

    let mut listenfd = ListenFd::from_env();

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(settings.clone())
            .wrap(middleware::Logger::default())
            .service(index)
            .configure(handlers::init_routes)
    });

    server = match listenfd.take_tcp_listener(0)? {
        Some(listener) => server.listen(listener)?,
        None => {
            let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            let port = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
            server.bind(format!("{}:{}", host, port))?
        }
    };

    info!("Starting server 🚀");

    server.run().await
}
