pub mod backend;
pub mod cmap;
pub mod content;
pub mod layout;
pub mod syntax;
