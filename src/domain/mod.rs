pub mod models;
pub mod routes;
pub mod errors;

pub use models::*;
pub use routes::{Route, View, ROUTES};
pub use errors::*;
