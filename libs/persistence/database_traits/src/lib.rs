pub mod dao;

pub use dao::{OwnedDao, ReferenceDao};
