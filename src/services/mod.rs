pub mod audit_service;
pub mod batch_service;
pub mod classify_service;
pub mod export_service;
pub mod file_service;
pub mod generate_service;
pub mod hierarchy_service;
pub mod search_service;
pub mod settings_service;
pub mod template_service;
pub mod tree_service;
