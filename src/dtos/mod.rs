pub mod reviewdtos;
