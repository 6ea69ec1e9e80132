pub mod complaint;
pub mod phone;
pub mod product;
pub mod record;
