pub mod catalog;
pub mod device;
pub mod extract;
pub mod filter;
pub mod hasher;
pub mod metadata;
pub mod result_error;
pub mod session;
pub mod state;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
