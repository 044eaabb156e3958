pub mod backup_config;
pub mod invoker;
pub mod naming;
pub mod orchestrator;
pub mod result_error;
pub mod retention;
pub mod settings;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
