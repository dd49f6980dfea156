pub mod disk;
pub mod health;
