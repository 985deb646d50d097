use thiserror::Error;

/// Errors produced when constructing or validating stock types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("sku must not be empty")]
    EmptySku,

    #[error("warehouse must not be empty")]
    EmptyWarehouse,
}
