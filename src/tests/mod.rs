pub mod common;

mod http_provider;
mod ticket_refresher;
