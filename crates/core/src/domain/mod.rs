pub mod approval;
pub mod attachment;
pub mod contract;
pub mod contract_approval;
pub mod contract_review;
pub mod customer;
pub mod estimate;
pub mod product;
pub mod timeline;
pub mod user;
