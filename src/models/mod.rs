// src/models/mod.rs

pub mod employee;
pub mod local;
pub mod package;
pub mod role;
pub mod travel;
pub mod user;

pub use employee::Employee;
pub use local::Local;
pub use package::{Package, PackageState};
pub use role::{Permission, Role};
pub use travel::Travel;
pub use user::{User, UserSummary};
