pub mod auth;
pub mod info;

pub use auth::{callback, login, logout};
pub use info::{commandline, home, kubeconf};
