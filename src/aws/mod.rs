//! Cloud collaborators: function name resolution and code upload.

mod context;
mod error;
mod resolver;
mod upload;

pub use context::AwsContext;
pub use error::{AwsError, AwsResult};
pub use resolver::{
    AwsFunctionResolver, FunctionResolver, ResolvedFunction, ResolvedTarget, layer_name_from_arn,
    resolve_targets,
};
pub use upload::{AwsCodeUploader, CodeUploader, zip_directory};
