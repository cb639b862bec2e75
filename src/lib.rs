pub mod email;
pub mod entities;
pub mod middleware;
pub mod routes;
pub mod session_cart;

pub use routes::api_router;
