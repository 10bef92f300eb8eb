mod function;
mod service;
mod task_definition;

pub use function::{FUNCTION_OUTPUT_FIELDS, FunctionDriver, SinkConfig, schedule_rule_name};
pub use service::{DrainReport, SERVICE_OUTPUT_FIELDS, ServiceDriver};
pub use task_definition::{TASK_DEFINITION_OUTPUT_FIELDS, TaskDefinitionDriver};
