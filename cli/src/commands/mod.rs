pub mod demo;
pub mod query;
pub mod setup;
pub mod top;

pub use demo::DemoArgs;
pub use query::QueryArgs;
pub use setup::SetupArgs;
pub use top::TopArgs;
