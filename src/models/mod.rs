mod price_point;
mod event;
mod statistics;
mod impact;
mod change_point;

pub use price_point::{format_date, parse_iso_date, DateRangeResponse, PricePoint, PriceSeriesResponse};
pub use event::{CategoriesResponse, Event, EventFilter, EventsResponse};
pub use statistics::PriceSummary;
pub use impact::{EventImpactResponse, EventImpactSummary, EventImpactsResponse, ImpactOutcome, ImpactResult};
pub use change_point::{
    ChangePointEstimate, ChangePointPosterior, ChangePointResult, ConvergenceWarning,
    CredibleInterval, MultiChangePointResult, RegimeParameters, SamplerDiagnostics, Segment,
};
