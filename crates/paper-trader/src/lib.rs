pub mod engine;
pub mod store;

pub use engine::{PaperAction, PaperTrader, PortfolioSummary, PositionView, StoppedPosition};
pub use store::{MemoryPaperStore, PaperPosition, PaperStore, PaperTradeRecord, PositionStatus, TradeAction};
