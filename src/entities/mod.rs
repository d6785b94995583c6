pub mod cart;
pub mod cart_item;
pub mod color;
pub mod comment;
pub mod item;
pub mod item_class;
pub mod item_material;
pub mod material;
pub mod purchase_record;
pub mod purchase_snapshot;
pub mod user;
