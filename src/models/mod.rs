mod company;
mod portfolio;
mod holding;
mod snapshot;
mod valuation;
mod indicator;

pub use company::Company;
pub use portfolio::{Portfolio, CreatePortfolio, UpdatePortfolio};
pub use holding::{Holding, UpsertHolding};
pub use snapshot::{PortfolioSnapshot, PortfolioHistoryPoint};
pub use valuation::{HoldingValuation, ValuationTotals, PortfolioValuation};
pub use indicator::{
    IndicatorOverlay, IndicatorPoint, IndicatorRequest, IndicatorResponse, OverlayKind,
};
