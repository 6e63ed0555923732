pub mod api;
pub mod board;
pub mod categories;
pub mod client;
pub mod config;
pub mod context;
pub mod events;
pub mod store;
pub mod tables;
pub mod tree;
pub const BASE_URL: &str = "http://localhost:8000/api";
pub const API_PREFIX: &str = "/api";
pub const TASKS_API: &str = "tasks";
pub const CATEGORIES_API: &str = "tasks/categories";
pub const HEALTH_API: &str = "health";
