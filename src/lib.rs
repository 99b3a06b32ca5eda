//! learnsite - A course publishing site
//!
//! Courses are made of ordered text lessons and quizzes. Learners browse
//! published courses, authors build quizzes, and staff manage everything
//! through the admin console.

pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
pub mod theme;
pub mod web;
