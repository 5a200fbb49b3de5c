pub mod login;
pub mod logout;

pub use login::handle_login;
pub use logout::handle_logout;
