mod commands;

pub use commands::{check_templates, execute, Cli, Commands, TemplateCheck};
