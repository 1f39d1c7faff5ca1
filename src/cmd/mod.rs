//! CLI command implementations.
//!
//! | Module          | Commands handled                                   |
//! |-----------------|-----------------------------------------------------|
//! | `serve`         | `Serve`                                            |
//! | `seed`          | `SeedFailures`                                     |
//! | `config`        | `Config`                                           |

pub mod config;
pub mod seed;
pub mod serve;

pub use config::cmd_config;
pub use seed::cmd_seed_failures;
pub use serve::cmd_serve;
