pub mod caller;
pub mod clusterer;
pub mod scorer;
