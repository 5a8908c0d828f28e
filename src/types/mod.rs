mod department;
mod fields;
mod issue;
mod status;
mod user;
mod worker;

pub use department::Department;
pub use issue::Issue;
pub use status::IssueStatus;
pub use user::AuthUser;
pub use worker::Worker;
