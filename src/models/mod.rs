pub mod audit;
pub mod export;
pub mod filter;
pub mod folder;
pub mod generate;
pub mod history;
pub mod settings;
pub mod template;
