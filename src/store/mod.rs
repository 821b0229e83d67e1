mod series_store;

pub use series_store::SeriesStore;
