pub mod comment;
pub mod movie;
pub mod rating;
pub mod user;
