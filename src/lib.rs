pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod handlers;
pub mod models;
pub mod preprocess;
pub mod server;

pub use classifier::{Classifier, TractClassifier};
pub use error::PredictError;
pub use server::start_app;
