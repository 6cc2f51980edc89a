//! One module per CLI subcommand (§6/§11.3). Only [`run::execute`] and
//! [`visualize::execute`] construct a [`ragtune_core::Controller`]; the rest
//! are plumbing around loading/scaffolding/describing config documents.

pub mod index;
pub mod init;
pub mod list;
pub mod run;
pub mod validate;
pub mod visualize;
