pub mod connection;
pub mod dependency;
pub mod retainer;
pub mod subset;
