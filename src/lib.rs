// sandloop - sandboxed execution and iterative repair of generated code

pub mod brain;
pub mod contract;
pub mod extract;
pub mod intercept;
pub mod issues;
pub mod repair;
pub mod sandbox;

mod config;
