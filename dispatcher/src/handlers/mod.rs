pub mod admin;
pub mod combat;
pub mod economy;
pub mod movement;
pub mod social;
pub mod support;
