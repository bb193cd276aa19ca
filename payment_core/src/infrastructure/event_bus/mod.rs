pub mod partitioned_bus;
