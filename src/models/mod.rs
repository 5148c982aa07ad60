mod activation;
mod cart;
mod license;
mod order;
mod payment_proof;
mod product;
mod user;

pub use activation::*;
pub use cart::*;
pub use license::*;
pub use order::*;
pub use payment_proof::*;
pub use product::*;
pub use user::*;
