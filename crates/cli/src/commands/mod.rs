pub mod ask;
pub mod chat;
pub mod doctor;
pub mod usage;
