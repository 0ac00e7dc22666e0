pub mod cleaner;
pub mod fetcher;
pub mod notifier;

pub use cleaner::TextCleaner;
pub use fetcher::ReqwestFetcher;
pub use notifier::{DiscordConfig, DiscordNotifier};
