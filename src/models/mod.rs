pub mod chatmodels;
pub mod contactmodels;
pub mod usermodel;
