//! Response transformers written as Rhai scripts.
//!
//! A transformer is compiled once with [`TransformerEngine::compile`] and run
//! any number of times with [`TransformerEngine::invoke`]. The
//! [`ExtensionRegistry`] keeps compiled transformers so recording specs can
//! refer to them by id or name.
//!
//! # Module Structure
//!
//! - `validator` - script checks and error types
//! - `rhai_engine` - compile/invoke and value conversion
//! - `registry` - registered extensions

mod registry;
mod rhai_engine;
mod validator;

pub use registry::{ExtensionRegistry, ExtensionSpec, UserExtension};
pub use rhai_engine::{TransformedResponse, TransformerEngine, TransformerHandle, MAX_OPERATIONS};
pub use validator::{
    validate_batch, validate_transformer, CompileError, InvokeError, TRANSFORM_FN,
    TRANSFORM_PARAMS,
};
