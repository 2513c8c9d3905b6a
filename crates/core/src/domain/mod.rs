pub mod employee;
pub mod requester;
