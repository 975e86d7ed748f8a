#[macro_use]
extern crate log;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;
#[macro_use]
extern crate lazy_static;

pub mod api_error;
pub mod db;
pub mod handlers;
pub mod models;
pub mod reports;
pub mod results;
pub mod schema;
pub mod settings;
pub mod store;
pub mod timeline;

#[cfg(test)]
mod test_util;
