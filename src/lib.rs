//! Relay today's posts from a ZSXQ feed to a Feishu webhook, at most once each.

pub mod config;
pub mod feed;
pub mod feishu;
pub mod format;
pub mod identity;
pub mod ledger;
pub mod model;
pub mod relay;
