pub mod accounts;
pub mod interview;
pub mod membership;
pub mod slug;
pub mod uploads;
