#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod checker;
pub use checker::*;

mod error;
pub use error::IcpError;

mod filters;
pub use filters::*;

mod icp;
pub use icp::*;

mod icp_vanilla;
pub use icp_vanilla::*;

mod matcher;
pub use matcher::*;

mod matches;
pub use matches::*;

mod minimizer;
pub use minimizer::*;

mod outlier;
pub use outlier::*;

mod surface_normal;
pub use surface_normal::*;
