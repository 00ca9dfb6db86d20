pub mod contactdtos;
