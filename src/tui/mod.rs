pub mod highway;
pub mod input;
pub mod mode;
pub mod view;
