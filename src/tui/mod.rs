mod app;
mod llm;
mod message;
mod ui;

pub use app::run;
