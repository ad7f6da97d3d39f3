pub mod error;
mod html;
pub mod listing;
pub mod normalize;
pub mod offers;
pub mod orchestrator;
pub mod render;
mod retry;
pub mod reveal;
pub mod site;

pub use error::{RenderError, ScraperError};
pub use listing::{parse_store_links, DomainLister};
pub use normalize::normalize;
pub use offers::{parse_offer_cards, OfferExtractor};
pub use orchestrator::{CategorySummary, DomainReport, Orchestrator, RunState, RunSummary};
#[cfg(feature = "browser")]
pub use render::BrowserRenderer;
pub use render::{
    build_renderer, render_page, ContextLease, Document, HttpRenderer, RenderContext,
    RenderOptions, Renderer, ResourceType, SelectorWait, WaitCondition,
};
pub use reveal::{CodeResolver, ContextPool, ExtractionStrategy};
pub use site::SiteMap;
