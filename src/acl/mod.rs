//! Access control: who may see which Items, Pages and Sitemaps.
//!
//! Items and Pages are gated by ACL tags, Sitemaps by their name. The
//! `AclEvaluator` combines both strategies with the admin bypass and the caches.

mod allow_set;
mod evaluator;
pub mod sitemap_names;
pub mod tags;

pub use allow_set::AllowSet;
pub use evaluator::AclEvaluator;
