pub mod borrow_expiry;
