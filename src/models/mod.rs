// src/models/mod.rs

pub mod category;
pub mod evaluation;
pub mod exam_result;
pub mod exam_session;
pub mod payment;
pub mod question;
pub mod setting;
pub mod user;
