pub mod get_payment_status;
pub mod initiate_payment;
pub mod process_payment;
