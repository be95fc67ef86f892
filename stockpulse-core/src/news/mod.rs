//! News context: adapters and the SearchOrchestrator.

pub mod bocha;
pub mod provider;
pub mod search;
pub mod serpapi;
pub mod tavily;

pub use bocha::BochaProvider;
pub use provider::{build_news_providers, parse_published, NewsItem, NewsProvider, NewsProviderKind, NewsSettings};
pub use search::{news_query, normalize_title, NewsBundle, SearchOrchestrator};
pub use serpapi::SerpApiProvider;
pub use tavily::TavilyProvider;
