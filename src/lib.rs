pub mod analysis;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod models;
pub mod projects;
pub mod repository;
pub mod reviews;
pub mod routes;
pub mod s3;
pub mod scanner;
pub mod schema;
pub mod state;
pub mod storage;
pub mod validation;
pub mod validator;

