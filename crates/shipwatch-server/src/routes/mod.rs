pub mod deploy;
pub mod events;
pub mod github;
pub mod health;
pub mod webhooks;
pub mod ws;
