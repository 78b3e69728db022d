pub mod accounting;
pub mod annotation_service;
pub mod execution_service;
pub mod market_data_service;
pub mod scale_plan_service;
pub mod trade_service;
