pub mod analytics;
pub mod business;
pub mod chatbot;
pub mod conversation;
pub mod message;
pub mod product;
