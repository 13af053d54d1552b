pub mod compensation_log;
pub mod course;
pub mod document;
pub mod profile;
pub mod rating;
pub mod subject;
pub mod university;
