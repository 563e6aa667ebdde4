pub mod agent;
pub mod codec;
pub mod errors;
pub mod events;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod reducer;
pub mod request;
pub mod systems;
