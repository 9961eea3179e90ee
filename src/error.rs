//! Failure modes that abort a single aggregate's transform.
//!
//! These never abort the whole run; the driver logs them and moves on to
//! the next aggregate. Contract violations inside the facade (an access
//! handle of the wrong shape) are programming errors and panic instead.

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PassError {
    #[error("global `{global}` has no initializer to remap")]
    MissingInitializer { global: String },

    #[error("global `{global}` initializer is not a field-wise aggregate constant")]
    InitializerShape { global: String },

    #[error(
        "global `{global}` initializer has {found} elements but `{strukt}` has {expected} fields"
    )]
    InitializerArity {
        global: String,
        strukt: String,
        expected: usize,
        found: usize,
    },
}
